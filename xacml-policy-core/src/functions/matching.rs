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

use super::{failed, Function, F1, F2};
use crate::ast::{DataType, ExprType, Value};
use regex::Regex;
use smol_str::SmolStr;

/// `<type>-regexp-match(pattern, value)`: whether the pattern matches
/// anywhere in the canonical string form of the value
fn regexp_match(prefix: &str, dt: DataType) -> Function {
    let id = SmolStr::new(format!("{prefix}{}-regexp-match", dt.short_name()));
    let fid = id.clone();
    Function::binary(
        id,
        (ExprType::scalar(DataType::String), ExprType::scalar(dt)),
        ExprType::boolean(),
        move |pattern, value| {
            let pattern = pattern.get_as_string()?;
            let re = Regex::new(pattern)
                .map_err(|e| failed(&fid, format!("invalid pattern `{pattern}`: {e}")))?;
            let text = value.get_as_attribute()?.to_string();
            Ok(Value::from(re.is_match(&text)))
        },
    )
}

pub(super) fn functions() -> Vec<Function> {
    let mut fs = vec![regexp_match(F1, DataType::String)];
    for dt in [
        DataType::AnyUri,
        DataType::IpAddress,
        DataType::DnsName,
        DataType::Rfc822Name,
        DataType::X500Name,
    ] {
        fs.push(regexp_match(F2, dt));
    }
    fs.push(Function::binary(
        format!("{F1}x500Name-match"),
        (
            ExprType::scalar(DataType::X500Name),
            ExprType::scalar(DataType::X500Name),
        ),
        ExprType::boolean(),
        |suffix, name| Ok(Value::from(arg!(suffix, X500Name).is_terminal_of(arg!(name, X500Name)))),
    ));
    fs.push(Function::binary(
        format!("{F1}rfc822Name-match"),
        (
            ExprType::scalar(DataType::String),
            ExprType::scalar(DataType::Rfc822Name),
        ),
        ExprType::boolean(),
        |pattern, name| {
            Ok(Value::from(
                arg!(name, Rfc822Name).matches_pattern(pattern.get_as_string()?),
            ))
        },
    ));
    fs
}

#[cfg(test)]
mod test {
    use crate::ast::{AttributeValue, DataType, Value};
    use crate::functions::FunctionRegistry;
    use cool_asserts::assert_matches;

    fn call(id: &str, args: &[Value]) -> crate::evaluator::Result<Value> {
        FunctionRegistry::standard()
            .get(&format!("urn:oasis:names:tc:xacml:{id}"))
            .unwrap()
            .call(args)
    }

    fn v(dt: DataType, s: &str) -> Value {
        AttributeValue::parse(dt, s).unwrap().into()
    }

    fn s(x: &str) -> Value {
        AttributeValue::string(x).into()
    }

    #[test]
    fn regular_expressions() {
        assert_matches!(
            call("1.0:function:string-regexp-match", &[s("^ab+c$"), s("abbbc")]),
            Ok(b) if b == Value::from(true)
        );
        assert_matches!(
            call(
                "2.0:function:ipAddress-regexp-match",
                &[s(r"^10\.0\."), v(DataType::IpAddress, "10.0.3.4")]
            ),
            Ok(b) if b == Value::from(true)
        );
        assert_matches!(
            call("1.0:function:string-regexp-match", &[s("("), s("x")]),
            Err(_)
        );
    }

    #[test]
    fn name_matching() {
        assert_matches!(
            call(
                "1.0:function:x500Name-match",
                &[
                    v(DataType::X500Name, "O=Medico Corp,C=US"),
                    v(DataType::X500Name, "cn=John Smith,o=Medico Corp, c=US"),
                ]
            ),
            Ok(b) if b == Value::from(true)
        );
        let anderson = v(DataType::Rfc822Name, "Anderson@sun.com");
        for (pattern, expected) in [
            ("Anderson@SUN.COM", true),
            ("anderson@sun.com", false),
            ("sun.com", true),
            (".com", true),
            (".sun.com", false),
        ] {
            assert_matches!(
                call("1.0:function:rfc822Name-match", &[s(pattern), anderson.clone()]),
                Ok(b) if b == Value::from(expected),
                "pattern {pattern}"
            );
        }
    }
}
