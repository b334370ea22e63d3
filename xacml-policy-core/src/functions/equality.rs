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

use super::{Function, F1, F3};
use crate::ast::{DataType, ExprType, Value};

/// `<type>-equal` for one data type
fn equal(id: String, dt: DataType) -> Function {
    Function::binary(
        id,
        (ExprType::scalar(dt), ExprType::scalar(dt)),
        ExprType::boolean(),
        |a, b| Ok(Value::from(a.get_as_attribute()? == b.get_as_attribute()?)),
    )
}

pub(super) fn functions() -> Vec<Function> {
    let mut fs = Vec::new();
    for dt in DataType::ALL.into_iter().filter(|dt| dt.has_equality()) {
        match dt {
            DataType::DayTimeDuration | DataType::YearMonthDuration => {
                let f = equal(format!("{F3}{}-equal", dt.short_name()), dt);
                fs.push(f.alias(format!("{F1}{}-equal", dt.short_name())));
                fs.push(f);
            }
            _ => fs.push(equal(format!("{F1}{}-equal", dt.short_name()), dt)),
        }
    }
    fs.push(Function::binary(
        format!("{F3}string-equal-ignore-case"),
        (
            ExprType::scalar(DataType::String),
            ExprType::scalar(DataType::String),
        ),
        ExprType::boolean(),
        |a, b| {
            let (a, b) = (a.get_as_string()?, b.get_as_string()?);
            Ok(Value::from(a.to_lowercase() == b.to_lowercase()))
        },
    ));
    fs
}

#[cfg(test)]
mod test {
    use crate::ast::{AttributeValue, DataType, Value};
    use crate::functions::FunctionRegistry;
    use cool_asserts::assert_matches;

    #[track_caller]
    fn call(id: &str, args: &[Value]) -> Value {
        FunctionRegistry::standard().get(id).unwrap().call(args).unwrap()
    }

    fn v(dt: DataType, s: &str) -> Value {
        AttributeValue::parse(dt, s).unwrap().into()
    }

    #[test]
    fn typed_equality() {
        assert_eq!(
            call(
                "urn:oasis:names:tc:xacml:1.0:function:dateTime-equal",
                &[
                    v(DataType::DateTime, "2002-09-24T09:30:15-05:00"),
                    v(DataType::DateTime, "2002-09-24T14:30:15Z"),
                ]
            ),
            Value::from(true)
        );
        assert_eq!(
            call(
                "urn:oasis:names:tc:xacml:1.0:function:x500Name-equal",
                &[
                    v(DataType::X500Name, "CN=A, O=B"),
                    v(DataType::X500Name, "cn=a,o=b"),
                ]
            ),
            Value::from(true)
        );
        assert_eq!(
            call(
                "urn:oasis:names:tc:xacml:3.0:function:string-equal-ignore-case",
                &[v(DataType::String, "HeLLo"), v(DataType::String, "hello")]
            ),
            Value::from(true)
        );
    }

    #[test]
    fn legacy_duration_alias() {
        let reg = FunctionRegistry::standard();
        let f = reg
            .get("urn:oasis:names:tc:xacml:1.0:function:yearMonthDuration-equal")
            .unwrap();
        assert_matches!(
            f.call(&[
                v(DataType::YearMonthDuration, "P1Y"),
                v(DataType::YearMonthDuration, "P12M"),
            ]),
            Ok(b) if b == Value::from(true)
        );
    }
}
