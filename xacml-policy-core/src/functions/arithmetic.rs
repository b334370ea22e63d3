/*
 * Copyright Cedar Contributors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Integer, double, and date/time arithmetic.

use super::{failed, Function, Params, F1, F3};
use crate::ast::{AttributeValue, DataType, Double, ExprType, Value};
use crate::evaluator::{self, EvaluationError};
use smol_str::SmolStr;
use std::sync::Arc;

const INT: ExprType = ExprType::scalar(DataType::Integer);
const DOUBLE: ExprType = ExprType::scalar(DataType::Double);

fn int(i: i64) -> Value {
    AttributeValue::Integer(i).into()
}

fn double(f: f64) -> Value {
    AttributeValue::Double(Double::new(f)).into()
}

/// `add` and `multiply`: two or more integers
fn integer_fold(name: &str, op: fn(i64, i64) -> Option<i64>) -> Function {
    let id = SmolStr::new(format!("{F1}integer-{name}"));
    let fid = id.clone();
    Function::new(
        id,
        Params::Variadic {
            fixed: Vec::new(),
            rest: INT,
            min_rest: 2,
        },
        INT,
        Arc::new(move |args: &[Value]| {
            let mut acc: Option<i64> = None;
            for a in args {
                let x = *arg!(a, Integer);
                acc = Some(match acc {
                    None => x,
                    Some(acc) => op(acc, x).ok_or_else(|| failed(&fid, "integer overflow"))?,
                });
            }
            acc.map(int)
                .ok_or_else(|| EvaluationError::wrong_num_arguments(fid.clone(), 2, 0))
        }),
    )
}

fn double_fold(name: &str, op: fn(f64, f64) -> f64) -> Function {
    let id = SmolStr::new(format!("{F1}double-{name}"));
    let fid = id.clone();
    Function::new(
        id,
        Params::Variadic {
            fixed: Vec::new(),
            rest: DOUBLE,
            min_rest: 2,
        },
        DOUBLE,
        Arc::new(move |args: &[Value]| {
            let mut acc: Option<f64> = None;
            for a in args {
                let x = arg!(a, Double).get();
                acc = Some(acc.map_or(x, |acc| op(acc, x)));
            }
            acc.map(double)
                .ok_or_else(|| EvaluationError::wrong_num_arguments(fid.clone(), 2, 0))
        }),
    )
}

fn integer_binary(name: &str, op: fn(i64, i64) -> Option<i64>, zero_msg: &'static str) -> Function {
    let id = SmolStr::new(format!("{F1}integer-{name}"));
    let fid = id.clone();
    Function::binary(id, (INT, INT), INT, move |a, b| {
        let (a, b) = (*arg!(a, Integer), *arg!(b, Integer));
        if b == 0 && !zero_msg.is_empty() {
            return Err(failed(&fid, zero_msg));
        }
        op(a, b).map(int).ok_or_else(|| failed(&fid, "integer overflow"))
    })
}

fn double_unary(id: String, op: fn(f64) -> f64) -> Function {
    Function::unary(id, DOUBLE, DOUBLE, move |a| Ok(double(op(arg!(a, Double).get()))))
}

fn numeric() -> Vec<Function> {
    let divide_id = SmolStr::new(format!("{F1}double-divide"));
    let fid = divide_id.clone();
    vec![
        integer_fold("add", i64::checked_add),
        integer_fold("multiply", i64::checked_mul),
        integer_binary("subtract", i64::checked_sub, ""),
        integer_binary("divide", i64::checked_div, "division by zero"),
        integer_binary("mod", i64::checked_rem, "modulus by zero"),
        {
            let id = SmolStr::new(format!("{F1}integer-abs"));
            let fid = id.clone();
            Function::unary(id, INT, INT, move |a| {
                arg!(a, Integer)
                    .checked_abs()
                    .map(int)
                    .ok_or_else(|| failed(&fid, "integer overflow"))
            })
        },
        double_fold("add", |a, b| a + b),
        double_fold("multiply", |a, b| a * b),
        Function::binary(
            format!("{F1}double-subtract"),
            (DOUBLE, DOUBLE),
            DOUBLE,
            |a, b| Ok(double(arg!(a, Double).get() - arg!(b, Double).get())),
        ),
        Function::binary(divide_id, (DOUBLE, DOUBLE), DOUBLE, move |a, b| {
            let divisor = arg!(b, Double).get();
            if divisor == 0.0 {
                return Err(failed(&fid, "division by zero"));
            }
            Ok(double(arg!(a, Double).get() / divisor))
        }),
        double_unary(format!("{F1}double-abs"), f64::abs),
        double_unary(format!("{F1}round"), f64::round_ties_even),
        double_unary(format!("{F1}floor"), f64::floor),
    ]
}

fn temporal_op(
    out: &mut Vec<Function>,
    name: &str,
    args: (DataType, DataType),
    op: fn(&AttributeValue, &AttributeValue) -> Option<AttributeValue>,
) {
    let id = SmolStr::new(format!("{F3}{name}"));
    let fid = id.clone();
    let f = Function::binary(
        id,
        (ExprType::scalar(args.0), ExprType::scalar(args.1)),
        ExprType::scalar(args.0),
        move |a, b| {
            op(a.get_as_attribute()?, b.get_as_attribute()?)
                .map(Value::from)
                .ok_or_else(|| failed(&fid, "result is out of range"))
        },
    );
    out.push(f.alias(format!("{F1}{name}")));
    out.push(f);
}

fn temporal() -> Vec<Function> {
    use AttributeValue as V;
    let mut fs = Vec::new();
    let dt_dtd = (DataType::DateTime, DataType::DayTimeDuration);
    let dt_ymd = (DataType::DateTime, DataType::YearMonthDuration);
    let d_ymd = (DataType::Date, DataType::YearMonthDuration);
    temporal_op(&mut fs, "dateTime-add-dayTimeDuration", dt_dtd, |a, b| match (a, b) {
        (V::DateTime(t), V::DayTimeDuration(d)) => t.checked_add_duration(d).map(V::DateTime),
        _ => None,
    });
    temporal_op(&mut fs, "dateTime-subtract-dayTimeDuration", dt_dtd, |a, b| match (a, b) {
        (V::DateTime(t), V::DayTimeDuration(d)) => {
            t.checked_add_duration(&d.negated()).map(V::DateTime)
        }
        _ => None,
    });
    temporal_op(&mut fs, "dateTime-add-yearMonthDuration", dt_ymd, |a, b| match (a, b) {
        (V::DateTime(t), V::YearMonthDuration(d)) => {
            t.checked_add_months(d.months()).map(V::DateTime)
        }
        _ => None,
    });
    temporal_op(&mut fs, "dateTime-subtract-yearMonthDuration", dt_ymd, |a, b| match (a, b) {
        (V::DateTime(t), V::YearMonthDuration(d)) => t
            .checked_add_months(d.months().checked_neg()?)
            .map(V::DateTime),
        _ => None,
    });
    temporal_op(&mut fs, "date-add-yearMonthDuration", d_ymd, |a, b| match (a, b) {
        (V::Date(t), V::YearMonthDuration(d)) => t.checked_add_months(d.months()).map(V::Date),
        _ => None,
    });
    temporal_op(&mut fs, "date-subtract-yearMonthDuration", d_ymd, |a, b| match (a, b) {
        (V::Date(t), V::YearMonthDuration(d)) => {
            t.checked_add_months(d.months().checked_neg()?).map(V::Date)
        }
        _ => None,
    });
    fs
}

pub(super) fn functions() -> Vec<Function> {
    let mut fs = numeric();
    fs.extend(temporal());
    fs
}

/// Convenience used by the conversion functions
pub(super) fn double_to_integer(id: &str, f: f64) -> evaluator::Result<i64> {
    let t = f.trunc();
    if t.is_finite() && t >= i64::MIN as f64 && t < i64::MAX as f64 {
        // range checked above
        #[allow(clippy::cast_possible_truncation)]
        let i = t as i64;
        Ok(i)
    } else {
        Err(failed(id, format!("{f} cannot be represented as an integer")))
    }
}

#[cfg(test)]
mod test {
    use crate::ast::{AttributeValue, DataType, Value};
    use crate::evaluator::EvaluationErrorKind;
    use crate::functions::FunctionRegistry;
    use cool_asserts::assert_matches;

    fn call(id: &str, args: &[Value]) -> crate::evaluator::Result<Value> {
        FunctionRegistry::standard()
            .get(&format!("urn:oasis:names:tc:xacml:{id}"))
            .unwrap()
            .call(args)
    }

    fn i(n: i64) -> Value {
        AttributeValue::Integer(n).into()
    }

    fn d(f: f64) -> Value {
        AttributeValue::from(f).into()
    }

    fn v(dt: DataType, s: &str) -> Value {
        AttributeValue::parse(dt, s).unwrap().into()
    }

    #[test]
    fn integers() {
        assert_eq!(call("1.0:function:integer-add", &[i(1), i(2), i(3)]).unwrap(), i(6));
        assert_eq!(call("1.0:function:integer-mod", &[i(7), i(3)]).unwrap(), i(1));
        assert_eq!(call("1.0:function:integer-abs", &[i(-7)]).unwrap(), i(7));
        assert_matches!(
            call("1.0:function:integer-divide", &[i(1), i(0)]),
            Err(e) if matches!(e.error_kind(), EvaluationErrorKind::FailedFunctionApplication { .. })
        );
        assert_matches!(call("1.0:function:integer-add", &[i(i64::MAX), i(1)]), Err(_));
    }

    #[test]
    fn doubles() {
        assert_eq!(call("1.0:function:double-divide", &[d(1.0), d(4.0)]).unwrap(), d(0.25));
        assert_matches!(call("1.0:function:double-divide", &[d(1.0), d(0.0)]), Err(_));
        assert_eq!(call("1.0:function:round", &[d(2.5)]).unwrap(), d(2.0));
        assert_eq!(call("1.0:function:floor", &[d(-2.5)]).unwrap(), d(-3.0));
    }

    #[test]
    fn date_arithmetic() {
        assert_eq!(
            call(
                "3.0:function:dateTime-add-dayTimeDuration",
                &[
                    v(DataType::DateTime, "2020-01-01T00:00:00Z"),
                    v(DataType::DayTimeDuration, "P1DT1H"),
                ]
            )
            .unwrap(),
            v(DataType::DateTime, "2020-01-02T01:00:00Z")
        );
        assert_eq!(
            call(
                "1.0:function:date-subtract-yearMonthDuration",
                &[
                    v(DataType::Date, "2020-03-31"),
                    v(DataType::YearMonthDuration, "P1M"),
                ]
            )
            .unwrap(),
            v(DataType::Date, "2020-02-29")
        );
    }
}
