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

use super::{failed, Function, Params, F1, F2, F3};
use crate::ast::{AttributeValue, DataType, ExprType, Value};
use itertools::Itertools;
use smol_str::SmolStr;
use std::sync::Arc;

const STRING: ExprType = ExprType::scalar(DataType::String);
const INT: ExprType = ExprType::scalar(DataType::Integer);

fn string(s: impl Into<SmolStr>) -> Value {
    AttributeValue::String(s.into()).into()
}

/// The text of a `string` or `anyURI` argument
fn text(v: &Value) -> crate::evaluator::Result<&SmolStr> {
    match v.get_as_attribute()? {
        AttributeValue::String(s) | AttributeValue::AnyUri(s) => Ok(s),
        other => Err(crate::evaluator::EvaluationError::type_error(
            "string or anyURI",
            ExprType::scalar(other.data_type()),
        )),
    }
}

/// `starts-with`, `ends-with` and `contains`: the first argument is the
/// needle, the second the haystack
fn search(name: &str, hay: DataType, op: fn(&str, &str) -> bool) -> Function {
    Function::binary(
        format!("{F3}{}-{name}", hay.short_name()),
        (STRING, ExprType::scalar(hay)),
        ExprType::boolean(),
        move |needle, hay| Ok(Value::from(op(hay_text(hay)?, needle.get_as_string()?))),
    )
}

fn hay_text(v: &Value) -> crate::evaluator::Result<&str> {
    text(v).map(SmolStr::as_str)
}

/// `substring(s, begin, end)`: characters `begin..end`, where an `end` of
/// `-1` means the end of the string
fn substring(dt: DataType) -> Function {
    let id = SmolStr::new(format!("{F3}{}-substring", dt.short_name()));
    let fid = id.clone();
    Function::new(
        id,
        Params::Fixed(vec![ExprType::scalar(dt), INT, INT]),
        STRING,
        Arc::new(move |args: &[Value]| {
            let [s, begin, end] = args else {
                return Err(failed(&fid, "expected three arguments"));
            };
            let s = text(s)?;
            let (begin, end) = (*arg!(begin, Integer), *arg!(end, Integer));
            let len = s.chars().count();
            let begin = usize::try_from(begin)
                .ok()
                .filter(|b| *b <= len)
                .ok_or_else(|| failed(&fid, format!("begin index {begin} is out of range")))?;
            let end = if end == -1 {
                len
            } else {
                usize::try_from(end)
                    .ok()
                    .filter(|e| *e >= begin && *e <= len)
                    .ok_or_else(|| failed(&fid, format!("end index {end} is out of range")))?
            };
            Ok(string(s.chars().skip(begin).take(end - begin).collect::<String>()))
        }),
    )
}

pub(super) fn functions() -> Vec<Function> {
    vec![
        Function::unary(
            format!("{F1}string-normalize-space"),
            STRING,
            STRING,
            |a| Ok(string(a.get_as_string()?.trim())),
        ),
        Function::unary(
            format!("{F1}string-normalize-to-lower-case"),
            STRING,
            STRING,
            |a| Ok(string(a.get_as_string()?.to_lowercase())),
        ),
        Function::new(
            format!("{F2}string-concatenate"),
            Params::Variadic {
                fixed: Vec::new(),
                rest: STRING,
                min_rest: 2,
            },
            STRING,
            Arc::new(|args: &[Value]| {
                let parts = args
                    .iter()
                    .map(Value::get_as_string)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(string(parts.into_iter().join("")))
            }),
        ),
        search("starts-with", DataType::String, |h, n| h.starts_with(n)),
        search("starts-with", DataType::AnyUri, |h, n| h.starts_with(n)),
        search("ends-with", DataType::String, |h, n| h.ends_with(n)),
        search("ends-with", DataType::AnyUri, |h, n| h.ends_with(n)),
        search("contains", DataType::String, |h, n| h.contains(n)),
        search("contains", DataType::AnyUri, |h, n| h.contains(n)),
        substring(DataType::String),
        substring(DataType::AnyUri),
    ]
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

    fn s(x: &str) -> Value {
        AttributeValue::string(x).into()
    }

    fn i(n: i64) -> Value {
        AttributeValue::Integer(n).into()
    }

    #[test]
    fn needle_comes_first() {
        assert_eq!(
            call("3.0:function:string-starts-with", &[s("ab"), s("abc")]).unwrap(),
            Value::from(true)
        );
        assert_eq!(
            call("3.0:function:string-starts-with", &[s("abc"), s("ab")]).unwrap(),
            Value::from(false)
        );
        let uri = AttributeValue::parse(DataType::AnyUri, "http://example.com/x").unwrap();
        assert_eq!(
            call("3.0:function:anyURI-contains", &[s("example"), uri.into()]).unwrap(),
            Value::from(true)
        );
    }

    #[test]
    fn substrings() {
        assert_eq!(
            call("3.0:function:string-substring", &[s("hello"), i(1), i(3)]).unwrap(),
            s("el")
        );
        assert_eq!(
            call("3.0:function:string-substring", &[s("hello"), i(2), i(-1)]).unwrap(),
            s("llo")
        );
        assert_matches!(
            call("3.0:function:string-substring", &[s("hello"), i(4), i(2)]),
            Err(_)
        );
    }

    #[test]
    fn normalization_and_concatenation() {
        assert_eq!(
            call("1.0:function:string-normalize-space", &[s("  a b ")]).unwrap(),
            s("a b")
        );
        assert_eq!(
            call("1.0:function:string-normalize-to-lower-case", &[s("AbC")]).unwrap(),
            s("abc")
        );
        assert_eq!(
            call("2.0:function:string-concatenate", &[s("a"), s("b"), s("c")]).unwrap(),
            s("abc")
        );
    }
}
