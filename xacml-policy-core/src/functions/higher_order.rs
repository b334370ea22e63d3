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

//! Higher-order bag functions. The first argument is a function reference;
//! it is applied to members drawn from the bag arguments.

use super::{failed, Function, FunctionInputError, F1, F3};
use crate::ast::{ArgType, AttributeValue, Bag, ExprType, Value};
use crate::evaluator::{self, EvaluationError};
use itertools::Itertools;

/// The higher-order bag functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HigherOrderOp {
    /// `f` holds for some member of the one bag argument
    AnyOf,
    /// `f` holds for every member of the one bag argument
    AllOf,
    /// `f` holds for some combination of members, one from each bag
    AnyOfAny,
    /// every member of the first bag pairs with some member of the second
    AllOfAny,
    /// some member of the first bag pairs with every member of the second
    AnyOfAll,
    /// every member of the first bag pairs with every member of the second
    AllOfAll,
    /// the bag of `f` applied to each member of the one bag argument
    Map,
}

/// How the arguments after the function must look
enum Shape {
    /// Any number of values, at most one of them a bag
    OneBag,
    /// Any number of bags
    AllBags,
    /// Exactly these arguments; `true` marks a bag
    Exactly(&'static [bool]),
}

impl HigherOrderOp {
    fn shape(self, legacy: bool) -> Shape {
        match (self, legacy) {
            (Self::AnyOf | Self::AllOf, true) => Shape::Exactly(&[false, true]),
            (Self::Map, true) => Shape::Exactly(&[true]),
            (Self::AnyOf | Self::AllOf | Self::Map, false) => Shape::OneBag,
            (Self::AnyOfAny, false) => Shape::AllBags,
            (Self::AnyOfAny | Self::AllOfAny | Self::AnyOfAll | Self::AllOfAll, _) => {
                Shape::Exactly(&[true, true])
            }
        }
    }
}

impl Shape {
    fn describe(&self) -> String {
        match self {
            Self::OneBag => "(function, value or bag...)".into(),
            Self::AllBags => "(function, bag...)".into(),
            Self::Exactly(bags) => {
                let rest = bags.iter().map(|b| if *b { "bag" } else { "value" });
                format!("(function, {})", rest.format(", "))
            }
        }
    }
}

/// Check the arguments of higher-order function `f`, returning its result
/// type. The function argument is checked against the member types of the
/// bags it will be applied to.
pub(crate) fn check_inputs(
    f: &Function,
    op: HigherOrderOp,
    legacy: bool,
    args: &[ArgType<'_>],
) -> Result<ExprType, FunctionInputError> {
    let shape = op.shape(legacy);
    let wrong_arity = || FunctionInputError::WrongArity {
        function_id: f.id().clone(),
        expected: shape.describe(),
        actual: args.len(),
    };
    let Some((first, rest)) = args.split_first() else {
        return Err(wrong_arity());
    };
    let ArgType::Function(g) = first else {
        return Err(FunctionInputError::ExpectedFunction {
            function_id: f.id().clone(),
        });
    };
    if g.is_higher_order() {
        return Err(FunctionInputError::HigherOrderArgument {
            function_id: f.id().clone(),
            argument: g.id().clone(),
        });
    }
    let mut types = Vec::with_capacity(rest.len());
    for (i, arg) in rest.iter().enumerate() {
        match arg {
            ArgType::Value(t) => types.push(*t),
            ArgType::Function(h) => {
                return Err(FunctionInputError::UnexpectedFunction {
                    function_id: f.id().clone(),
                    argument: h.id().clone(),
                    index: i + 1,
                })
            }
        }
    }
    if types.is_empty() {
        return Err(wrong_arity());
    }
    match &shape {
        Shape::OneBag => {
            let count = types.iter().filter(|t| t.is_bag).count();
            if count > 1 {
                return Err(FunctionInputError::TooManyBags {
                    function_id: f.id().clone(),
                    count,
                });
            }
        }
        Shape::AllBags => {
            if let Some(i) = types.iter().position(|t| !t.is_bag) {
                return Err(FunctionInputError::ExpectedBag {
                    function_id: f.id().clone(),
                    index: i + 1,
                });
            }
        }
        Shape::Exactly(bags) => {
            if types.len() != bags.len() {
                return Err(wrong_arity());
            }
            let bag_count = types.iter().filter(|t| t.is_bag).count();
            if bags.iter().filter(|b| **b).count() == 1 && bag_count > 1 {
                return Err(FunctionInputError::TooManyBags {
                    function_id: f.id().clone(),
                    count: bag_count,
                });
            }
            // a missing bag is reported before a misplaced one
            for (i, (t, bag)) in types.iter().zip(bags.iter()).enumerate() {
                if *bag && !t.is_bag {
                    return Err(FunctionInputError::ExpectedBag {
                        function_id: f.id().clone(),
                        index: i + 1,
                    });
                }
            }
            for (i, (t, bag)) in types.iter().zip(bags.iter()).enumerate() {
                if !*bag && t.is_bag {
                    return Err(FunctionInputError::TypeMismatch {
                        function_id: f.id().clone(),
                        index: i + 1,
                        expected: ExprType::scalar(t.data_type),
                        actual: *t,
                    });
                }
            }
        }
    }
    let members: Vec<ArgType<'_>> = types
        .iter()
        .map(|t| ArgType::Value(ExprType::scalar(t.data_type)))
        .collect();
    let returns = g.check_inputs(&members)?;
    match op {
        HigherOrderOp::Map if returns.is_bag => Err(FunctionInputError::TypeMismatch {
            function_id: f.id().clone(),
            index: 0,
            expected: ExprType::scalar(returns.data_type),
            actual: returns,
        }),
        HigherOrderOp::Map => Ok(ExprType::bag(returns.data_type)),
        _ if returns != ExprType::boolean() => Err(FunctionInputError::NotBooleanFunction {
            function_id: f.id().clone(),
            argument: g.id().clone(),
            returns,
        }),
        _ => Ok(ExprType::boolean()),
    }
}

fn holds(g: &Function, args: &[Value]) -> evaluator::Result<bool> {
    g.call(args)?.get_as_bool()
}

/// Call `g` once per member of the single bag in `args` (or once, if there
/// is no bag), substituting the member for the bag
fn each_member<'a>(
    id: &str,
    g: &'a Function,
    args: &'a [Value],
) -> evaluator::Result<Box<dyn Iterator<Item = evaluator::Result<Value>> + 'a>> {
    let bags: Vec<usize> = args
        .iter()
        .positions(|a| matches!(a, Value::Bag(_)))
        .collect();
    match bags.as_slice() {
        [] => Ok(Box::new(std::iter::once_with(move || g.call(args)))),
        [pos] => {
            let pos = *pos;
            let bag = args
                .get(pos)
                .ok_or_else(|| failed(id, "bag argument vanished"))?
                .get_as_bag()?;
            Ok(Box::new(bag.iter().map(move |member| {
                let mut call_args = args.to_vec();
                if let Some(slot) = call_args.get_mut(pos) {
                    *slot = Value::from(member.clone());
                }
                g.call(&call_args)
            })))
        }
        more => Err(failed(
            id,
            format!("expected at most one bag argument, got {}", more.len()),
        )),
    }
}

fn two_bags<'a>(id: &str, args: &'a [Value]) -> evaluator::Result<(&'a Bag, &'a Bag)> {
    match args {
        [a, b] => Ok((a.get_as_bag()?, b.get_as_bag()?)),
        _ => Err(EvaluationError::wrong_num_arguments(id.into(), 3, args.len() + 1)),
    }
}

/// Apply higher-order function `op` (identified by `id`) with function
/// argument `g` to the already-evaluated remaining arguments
pub(crate) fn apply(
    op: HigherOrderOp,
    id: &str,
    g: &Function,
    args: &[Value],
) -> evaluator::Result<Value> {
    let member = |v: &AttributeValue| Value::from(v.clone());
    let result = match op {
        HigherOrderOp::AnyOf => {
            for r in each_member(id, g, args)? {
                if r?.get_as_bool()? {
                    return Ok(Value::from(true));
                }
            }
            false
        }
        HigherOrderOp::AllOf => {
            for r in each_member(id, g, args)? {
                if !r?.get_as_bool()? {
                    return Ok(Value::from(false));
                }
            }
            true
        }
        HigherOrderOp::Map => {
            let elements: Vec<ArgType<'_>> = args
                .iter()
                .map(|a| ArgType::Value(ExprType::scalar(a.expr_type().data_type)))
                .collect();
            let returns = g
                .check_inputs(&elements)
                .map_err(|e| failed(id, e.to_string()))?;
            let values = each_member(id, g, args)?
                .map(|r| r.and_then(|v| v.get_as_attribute().cloned()))
                .collect::<evaluator::Result<Vec<_>>>()?;
            return Bag::new(returns.data_type, values)
                .map(Value::from)
                .map_err(|e| failed(id, e.to_string()));
        }
        HigherOrderOp::AnyOfAny => {
            let bags = args
                .iter()
                .map(Value::get_as_bag)
                .collect::<evaluator::Result<Vec<_>>>()?;
            for combination in bags.iter().map(|b| b.iter()).multi_cartesian_product() {
                let call_args: Vec<Value> = combination.into_iter().map(member).collect();
                if holds(g, &call_args)? {
                    return Ok(Value::from(true));
                }
            }
            false
        }
        HigherOrderOp::AllOfAny => {
            let (xs, ys) = two_bags(id, args)?;
            let mut all = true;
            for x in xs {
                if !exists(g, x, ys)? {
                    all = false;
                    break;
                }
            }
            all
        }
        HigherOrderOp::AnyOfAll => {
            let (xs, ys) = two_bags(id, args)?;
            let mut any = false;
            for x in xs {
                if for_all(g, x, ys)? {
                    any = true;
                    break;
                }
            }
            any
        }
        HigherOrderOp::AllOfAll => {
            let (xs, ys) = two_bags(id, args)?;
            let mut all = true;
            for x in xs {
                if !for_all(g, x, ys)? {
                    all = false;
                    break;
                }
            }
            all
        }
    };
    Ok(Value::from(result))
}

/// `g(x, y)` for some `y` in `ys`
fn exists(g: &Function, x: &AttributeValue, ys: &Bag) -> evaluator::Result<bool> {
    for y in ys {
        if holds(g, &[Value::from(x.clone()), Value::from(y.clone())])? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// `g(x, y)` for every `y` in `ys`
fn for_all(g: &Function, x: &AttributeValue, ys: &Bag) -> evaluator::Result<bool> {
    for y in ys {
        if !holds(g, &[Value::from(x.clone()), Value::from(y.clone())])? {
            return Ok(false);
        }
    }
    Ok(true)
}

pub(super) fn functions() -> Vec<Function> {
    use HigherOrderOp::*;
    vec![
        Function::higher_order(format!("{F3}any-of"), AnyOf, false),
        Function::higher_order(format!("{F3}all-of"), AllOf, false),
        Function::higher_order(format!("{F3}any-of-any"), AnyOfAny, false),
        Function::higher_order(format!("{F3}map"), Map, false),
        Function::higher_order(format!("{F1}any-of"), AnyOf, true),
        Function::higher_order(format!("{F1}all-of"), AllOf, true),
        Function::higher_order(format!("{F1}any-of-any"), AnyOfAny, true),
        Function::higher_order(format!("{F1}all-of-any"), AllOfAny, true),
        Function::higher_order(format!("{F1}any-of-all"), AnyOfAll, true),
        Function::higher_order(format!("{F1}all-of-all"), AllOfAll, true),
        Function::higher_order(format!("{F1}map"), Map, true),
    ]
}
