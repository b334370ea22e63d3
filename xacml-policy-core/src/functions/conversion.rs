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

use super::arithmetic::double_to_integer;
use super::{Function, F1, F3};
use crate::ast::{AttributeValue, DataType, ExprType};
use smol_str::SmolStr;

const STRING: ExprType = ExprType::scalar(DataType::String);

/// Data types with `-from-string` and `string-from-` conversions
fn convertible() -> impl Iterator<Item = DataType> {
    DataType::ALL
        .into_iter()
        .filter(|dt| !matches!(dt, DataType::String | DataType::XPathExpression))
}

pub(super) fn functions() -> Vec<Function> {
    let to_int_id = SmolStr::new(format!("{F1}double-to-integer"));
    let fid = to_int_id.clone();
    let mut fs = vec![
        Function::unary(
            to_int_id,
            ExprType::scalar(DataType::Double),
            ExprType::scalar(DataType::Integer),
            move |a| {
                double_to_integer(&fid, arg!(a, Double).get())
                    .map(|i| AttributeValue::Integer(i).into())
            },
        ),
        Function::unary(
            format!("{F1}integer-to-double"),
            ExprType::scalar(DataType::Integer),
            ExprType::scalar(DataType::Double),
            |a| {
                // precision loss above 2^53 is inherent to the conversion
                #[allow(clippy::cast_precision_loss)]
                let f = *arg!(a, Integer) as f64;
                Ok(AttributeValue::from(f).into())
            },
        ),
    ];
    for dt in convertible() {
        fs.push(Function::unary(
            format!("{F3}{}-from-string", dt.short_name()),
            STRING,
            ExprType::scalar(dt),
            move |a| Ok(AttributeValue::parse(dt, a.get_as_string()?)?.into()),
        ));
        fs.push(Function::unary(
            format!("{F3}string-from-{}", dt.short_name()),
            ExprType::scalar(dt),
            STRING,
            |a| Ok(AttributeValue::String(a.get_as_attribute()?.to_string().into()).into()),
        ));
    }
    fs
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

    #[test]
    fn numeric_conversions() {
        assert_eq!(
            call("1.0:function:double-to-integer", &[AttributeValue::from(-2.7).into()]).unwrap(),
            AttributeValue::Integer(-2).into()
        );
        assert_matches!(
            call("1.0:function:double-to-integer", &[AttributeValue::from(f64::NAN).into()]),
            Err(_)
        );
        assert_eq!(
            call("1.0:function:integer-to-double", &[AttributeValue::Integer(3).into()]).unwrap(),
            AttributeValue::from(3.0).into()
        );
    }

    #[test]
    fn string_conversions() {
        let parsed = call(
            "3.0:function:dayTimeDuration-from-string",
            &[AttributeValue::string("PT36H").into()],
        )
        .unwrap();
        assert_eq!(
            parsed,
            AttributeValue::parse(DataType::DayTimeDuration, "P1DT12H")
                .unwrap()
                .into()
        );
        assert_eq!(
            call("3.0:function:string-from-dayTimeDuration", &[parsed]).unwrap(),
            AttributeValue::string("P1DT12H").into()
        );
        assert_matches!(
            call("3.0:function:integer-from-string", &[AttributeValue::string("x").into()]),
            Err(e) if matches!(e.error_kind(), EvaluationErrorKind::InvalidValue(_))
        );
    }
}
