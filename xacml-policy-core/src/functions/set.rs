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

//! Set functions treat bags as sets: results never hold duplicates.

use super::bag::{bag_types, function_id};
use super::{failed, Function, Params};
use crate::ast::{Bag, DataType, ExprType, Value};
use itertools::Itertools;
use std::sync::Arc;

fn is_subset(a: &Bag, b: &Bag) -> bool {
    a.iter().all(|v| b.contains(v))
}

fn for_type(dt: DataType) -> Vec<Function> {
    let bag = ExprType::bag(dt);
    let pair = (bag, bag);
    let intersection_id = function_id(dt, "intersection");
    let intersection_fid = intersection_id.clone();
    let union_id = function_id(dt, "union");
    let union_fid = union_id.clone();
    vec![
        Function::binary(intersection_id, pair, bag, move |a, b| {
            let (a, b) = (a.get_as_bag()?, b.get_as_bag()?);
            Bag::new(dt, a.distinct().filter(|v| b.contains(v)).cloned())
                .map(Value::from)
                .map_err(|e| failed(&intersection_fid, e.to_string()))
        }),
        Function::binary(
            function_id(dt, "at-least-one-member-of"),
            pair,
            ExprType::boolean(),
            |a, b| {
                let (a, b) = (a.get_as_bag()?, b.get_as_bag()?);
                Ok(Value::from(a.iter().any(|v| b.contains(v))))
            },
        ),
        Function::new(
            union_id,
            Params::Variadic {
                fixed: Vec::new(),
                rest: bag,
                min_rest: 2,
            },
            bag,
            Arc::new(move |args: &[Value]| {
                let bags = args
                    .iter()
                    .map(Value::get_as_bag)
                    .collect::<Result<Vec<_>, _>>()?;
                let members = bags.iter().flat_map(|b| b.iter()).unique().cloned();
                Bag::new(dt, members)
                    .map(Value::from)
                    .map_err(|e| failed(&union_fid, e.to_string()))
            }),
        ),
        Function::binary(function_id(dt, "subset"), pair, ExprType::boolean(), |a, b| {
            Ok(Value::from(is_subset(a.get_as_bag()?, b.get_as_bag()?)))
        }),
        Function::binary(
            function_id(dt, "set-equals"),
            pair,
            ExprType::boolean(),
            |a, b| {
                let (a, b) = (a.get_as_bag()?, b.get_as_bag()?);
                Ok(Value::from(is_subset(a, b) && is_subset(b, a)))
            },
        ),
    ]
}

pub(super) fn functions() -> Vec<Function> {
    bag_types().flat_map(for_type).collect()
}

#[cfg(test)]
mod test {
    use crate::ast::{AttributeValue, Bag, DataType, Value};
    use crate::functions::FunctionRegistry;

    #[track_caller]
    fn call(name: &str, args: &[Value]) -> Value {
        FunctionRegistry::standard()
            .get(&format!("urn:oasis:names:tc:xacml:1.0:function:integer-{name}"))
            .unwrap()
            .call(args)
            .unwrap()
    }

    fn ints(xs: &[i64]) -> Value {
        Bag::new(DataType::Integer, xs.iter().map(|x| AttributeValue::Integer(*x)))
            .unwrap()
            .into()
    }

    #[test]
    fn set_operations_drop_duplicates() {
        assert_eq!(call("intersection", &[ints(&[1, 1, 2, 3]), ints(&[1, 3, 4])]), ints(&[1, 3]));
        assert_eq!(call("union", &[ints(&[1, 1]), ints(&[2]), ints(&[2, 3])]), ints(&[1, 2, 3]));
    }

    #[test]
    fn set_predicates() {
        assert_eq!(call("subset", &[ints(&[1, 1]), ints(&[1, 2])]), Value::from(true));
        assert_eq!(call("subset", &[ints(&[1, 3]), ints(&[1, 2])]), Value::from(false));
        assert_eq!(call("set-equals", &[ints(&[1, 2, 2]), ints(&[2, 1])]), Value::from(true));
        assert_eq!(
            call("at-least-one-member-of", &[ints(&[5, 2]), ints(&[1, 2])]),
            Value::from(true)
        );
        assert_eq!(
            call("at-least-one-member-of", &[ints(&[]), ints(&[1, 2])]),
            Value::from(false)
        );
    }
}
