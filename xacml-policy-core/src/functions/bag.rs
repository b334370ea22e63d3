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

use super::{failed, type_prefix, Function, Params};
use crate::ast::{AttributeValue, Bag, DataType, ExprType, Value};
use crate::evaluator::EvaluationError;
use smol_str::SmolStr;
use std::sync::Arc;

/// Data types that have bag and set functions
pub(super) fn bag_types() -> impl Iterator<Item = DataType> {
    DataType::ALL
        .into_iter()
        .filter(|dt| *dt != DataType::XPathExpression)
}

pub(super) fn function_id(dt: DataType, name: &str) -> SmolStr {
    SmolStr::new(format!("{}{}-{name}", type_prefix(dt), dt.short_name()))
}

fn for_type(dt: DataType) -> Vec<Function> {
    let scalar = ExprType::scalar(dt);
    let bag = ExprType::bag(dt);

    let one_id = function_id(dt, "one-and-only");
    let one_fid = one_id.clone();
    let bag_id = function_id(dt, "bag");
    let bag_fid = bag_id.clone();
    vec![
        Function::unary(one_id, bag, scalar, move |b| {
            let b = b.get_as_bag()?;
            b.single()
                .map(|v| Value::from(v.clone()))
                .ok_or_else(|| EvaluationError::not_singleton(one_fid.clone(), b.len()))
        }),
        Function::unary(
            function_id(dt, "bag-size"),
            bag,
            ExprType::scalar(DataType::Integer),
            |b| {
                // bags never approach i64::MAX members
                #[allow(clippy::cast_possible_wrap)]
                let len = b.get_as_bag()?.len() as i64;
                Ok(AttributeValue::Integer(len).into())
            },
        ),
        Function::binary(
            function_id(dt, "is-in"),
            (scalar, bag),
            ExprType::boolean(),
            |v, b| Ok(Value::from(b.get_as_bag()?.contains(v.get_as_attribute()?))),
        ),
        Function::new(
            bag_id,
            Params::Variadic {
                fixed: Vec::new(),
                rest: scalar,
                min_rest: 0,
            },
            bag,
            Arc::new(move |args: &[Value]| {
                let members = args
                    .iter()
                    .map(|a| a.get_as_attribute().cloned())
                    .collect::<Result<Vec<_>, _>>()?;
                Bag::new(dt, members)
                    .map(Value::from)
                    .map_err(|e| failed(&bag_fid, e.to_string()))
            }),
        ),
    ]
}

pub(super) fn functions() -> Vec<Function> {
    bag_types().flat_map(for_type).collect()
}

#[cfg(test)]
mod test {
    use crate::ast::{AttributeValue, Bag, DataType, Value};
    use crate::evaluator::EvaluationErrorKind;
    use crate::functions::FunctionRegistry;
    use cool_asserts::assert_matches;

    fn call(id: &str, args: &[Value]) -> crate::evaluator::Result<Value> {
        FunctionRegistry::standard()
            .get(&format!("urn:oasis:names:tc:xacml:{id}"))
            .unwrap()
            .call(args)
    }

    fn strings(xs: &[&str]) -> Value {
        Bag::new(DataType::String, xs.iter().map(|x| AttributeValue::string(*x)))
            .unwrap()
            .into()
    }

    #[test]
    fn one_and_only() {
        assert_eq!(
            call("1.0:function:string-one-and-only", &[strings(&["a"])]).unwrap(),
            AttributeValue::string("a").into()
        );
        assert_matches!(
            call("1.0:function:string-one-and-only", &[strings(&["a", "b"])]),
            Err(e) if matches!(e.error_kind(), EvaluationErrorKind::NotSingleton { size: 2, .. })
        );
        assert_matches!(
            call("1.0:function:string-one-and-only", &[strings(&[])]),
            Err(e) if matches!(e.error_kind(), EvaluationErrorKind::NotSingleton { size: 0, .. })
        );
    }

    #[test]
    fn size_membership_and_construction() {
        assert_eq!(
            call("1.0:function:string-bag-size", &[strings(&["a", "a", "b"])]).unwrap(),
            AttributeValue::Integer(3).into()
        );
        assert_eq!(
            call(
                "1.0:function:string-is-in",
                &[AttributeValue::string("b").into(), strings(&["a", "b"])]
            )
            .unwrap(),
            Value::from(true)
        );
        assert_eq!(
            call(
                "1.0:function:string-bag",
                &[AttributeValue::string("b").into(), AttributeValue::string("a").into()]
            )
            .unwrap(),
            strings(&["a", "b"])
        );
        assert_eq!(
            call("3.0:function:dayTimeDuration-bag", &[]).unwrap(),
            Bag::empty(DataType::DayTimeDuration).into()
        );
    }
}
