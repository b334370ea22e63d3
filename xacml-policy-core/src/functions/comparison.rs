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

use super::{failed, Function, Params, F1, F2};
use crate::ast::{AttributeValue, DataType, ExprType, Value};
use smol_str::SmolStr;
use std::cmp::Ordering;
use std::sync::Arc;

const ORDERED: [DataType; 6] = [
    DataType::Integer,
    DataType::Double,
    DataType::String,
    DataType::Time,
    DataType::Date,
    DataType::DateTime,
];

/// Compare two values of one ordered type. `None` for unordered doubles
/// (`NaN`) or mismatched types.
fn compare(a: &AttributeValue, b: &AttributeValue) -> Option<Ordering> {
    use AttributeValue as V;
    match (a, b) {
        (V::Integer(a), V::Integer(b)) => Some(a.cmp(b)),
        (V::Double(a), V::Double(b)) => a.get().partial_cmp(&b.get()),
        (V::String(a), V::String(b)) => Some(a.cmp(b)),
        (V::Time(a), V::Time(b)) => Some(a.cmp(b)),
        (V::Date(a), V::Date(b)) => Some(a.date().cmp(&b.date())),
        (V::DateTime(a), V::DateTime(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn comparison(dt: DataType, name: &str, accept: fn(Ordering) -> bool) -> Function {
    let id = SmolStr::new(format!("{F1}{}-{name}", dt.short_name()));
    let fid = id.clone();
    Function::binary(
        id,
        (ExprType::scalar(dt), ExprType::scalar(dt)),
        ExprType::boolean(),
        move |a, b| {
            let (a, b) = (a.get_as_attribute()?, b.get_as_attribute()?);
            match compare(a, b) {
                Some(ord) => Ok(Value::from(accept(ord))),
                None if a.data_type() == b.data_type() => Ok(Value::from(false)),
                None => Err(failed(&fid, format!("cannot compare {a} with {b}"))),
            }
        },
    )
}

/// `time-in-range(t, lower, upper)`. When `upper` is before `lower` the
/// range wraps past midnight.
fn time_in_range() -> Function {
    let id = SmolStr::new(format!("{F2}time-in-range"));
    let time = ExprType::scalar(DataType::Time);
    let fid = id.clone();
    Function::new(
        id,
        Params::Fixed(vec![time, time, time]),
        ExprType::boolean(),
        Arc::new(move |args: &[Value]| {
            let [t, lower, upper] = args else {
                return Err(failed(&fid, "expected three arguments"));
            };
            let (t, lower, upper) = (arg!(t, Time), arg!(lower, Time), arg!(upper, Time));
            let inside = if lower <= upper {
                lower <= t && t <= upper
            } else {
                t >= lower || t <= upper
            };
            Ok(Value::from(inside))
        }),
    )
}

pub(super) fn functions() -> Vec<Function> {
    let mut fs = Vec::new();
    for dt in ORDERED {
        fs.push(comparison(dt, "greater-than", Ordering::is_gt));
        fs.push(comparison(dt, "greater-than-or-equal", Ordering::is_ge));
        fs.push(comparison(dt, "less-than", Ordering::is_lt));
        fs.push(comparison(dt, "less-than-or-equal", Ordering::is_le));
    }
    fs.push(time_in_range());
    fs
}

#[cfg(test)]
mod test {
    use crate::ast::{AttributeValue, DataType, Value};
    use crate::functions::FunctionRegistry;

    #[track_caller]
    fn call(id: &str, args: &[Value]) -> Value {
        FunctionRegistry::standard()
            .get(&format!("urn:oasis:names:tc:xacml:{id}"))
            .unwrap()
            .call(args)
            .unwrap()
    }

    fn v(dt: DataType, s: &str) -> Value {
        AttributeValue::parse(dt, s).unwrap().into()
    }

    #[test]
    fn ordered_types() {
        assert_eq!(
            call(
                "1.0:function:integer-greater-than",
                &[v(DataType::Integer, "5"), v(DataType::Integer, "3")]
            ),
            Value::from(true)
        );
        assert_eq!(
            call(
                "1.0:function:string-less-than-or-equal",
                &[v(DataType::String, "abc"), v(DataType::String, "abc")]
            ),
            Value::from(true)
        );
        assert_eq!(
            call(
                "1.0:function:dateTime-less-than",
                &[
                    v(DataType::DateTime, "2020-01-01T12:00:00+02:00"),
                    v(DataType::DateTime, "2020-01-01T11:00:00Z"),
                ]
            ),
            Value::from(true)
        );
        assert_eq!(
            call(
                "1.0:function:double-greater-than-or-equal",
                &[v(DataType::Double, "NaN"), v(DataType::Double, "1.0")]
            ),
            Value::from(false)
        );
    }

    #[test]
    fn time_ranges() {
        let t = |s| v(DataType::Time, s);
        let in_range = |x, lo, hi| call("2.0:function:time-in-range", &[t(x), t(lo), t(hi)]);
        assert_eq!(in_range("10:00:00", "09:00:00", "17:00:00"), Value::from(true));
        assert_eq!(in_range("18:00:00", "09:00:00", "17:00:00"), Value::from(false));
        assert_eq!(in_range("23:30:00", "22:00:00", "02:00:00"), Value::from(true));
        assert_eq!(in_range("01:00:00", "22:00:00", "02:00:00"), Value::from(true));
        assert_eq!(in_range("12:00:00", "22:00:00", "02:00:00"), Value::from(false));
    }
}
