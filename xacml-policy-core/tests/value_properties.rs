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

//! Laws of the value algebra

use proptest::prelude::*;
use xacml_policy_core::ast::{AttributeValue, Bag, DataType, Double};

fn string_bag() -> impl Strategy<Value = Bag> {
    prop::collection::vec("[a-c]{0,2}", 0..6).prop_map(|members| {
        Bag::new(
            DataType::String,
            members.into_iter().map(AttributeValue::string),
        )
        .unwrap()
    })
}

proptest! {
    #[test]
    fn union_with_empty_is_identity(bag in string_bag()) {
        let empty = Bag::empty(DataType::String);
        prop_assert_eq!(bag.union(&empty).unwrap(), bag.clone());
        prop_assert_eq!(empty.union(&bag).unwrap(), bag);
    }

    #[test]
    fn union_is_commutative_and_idempotent(a in string_bag(), b in string_bag()) {
        prop_assert_eq!(a.union(&b).unwrap(), b.union(&a).unwrap());
        prop_assert_eq!(a.union(&a).unwrap(), a);
    }

    #[test]
    fn union_keeps_every_member(a in string_bag(), b in string_bag()) {
        let union = a.union(&b).unwrap();
        prop_assert!(a.iter().chain(b.iter()).all(|v| union.contains(v)));
        prop_assert!(union.len() <= a.len() + b.len());
    }

    #[test]
    fn integers_reparse_from_their_display(i in any::<i64>()) {
        let v = AttributeValue::Integer(i);
        prop_assert_eq!(AttributeValue::parse(DataType::Integer, &v.to_string()).unwrap(), v);
    }

    #[test]
    fn doubles_reparse_from_their_display(f in any::<f64>()) {
        let v = AttributeValue::Double(Double::new(f));
        prop_assert_eq!(AttributeValue::parse(DataType::Double, &v.to_string()).unwrap(), v);
    }

    #[test]
    fn equality_is_reflexive_and_symmetric(a in any::<i64>(), b in any::<i64>()) {
        let (x, y) = (AttributeValue::Integer(a), AttributeValue::Integer(b));
        prop_assert_eq!(&x, &x.clone());
        prop_assert_eq!(x == y, y == x);
        // values of different types are never equal
        prop_assert_ne!(x, AttributeValue::string(a.to_string()));
    }
}

#[test]
fn bags_reject_mixed_types() {
    assert!(Bag::new(
        DataType::String,
        [AttributeValue::string("a"), AttributeValue::Integer(1)]
    )
    .is_err());
    assert!(Bag::empty(DataType::Integer)
        .union(&Bag::empty(DataType::String))
        .is_none());
}
