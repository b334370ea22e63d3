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

//! `and`, `or` and `n-of` evaluate their arguments lazily. An argument that
//! fails is remembered, and only reported if no later argument decides the
//! result.

use super::{failed, Function, Params, F1};
use crate::ast::{DataType, ExprType, Value};
use crate::evaluator::{self, EvaluationError};

/// The lazily evaluated boolean connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    /// true unless some argument is false
    And,
    /// false unless some argument is true
    Or,
    /// at least `n` of the remaining arguments are true
    NOf,
}

impl LogicalOp {
    pub(crate) fn params(self) -> Params {
        let fixed = match self {
            Self::And | Self::Or => Vec::new(),
            Self::NOf => vec![ExprType::scalar(DataType::Integer)],
        };
        Params::Variadic {
            fixed,
            rest: ExprType::boolean(),
            min_rest: 0,
        }
    }
}

/// Fold `items` under `op`, evaluating each with `eval` only when its value
/// could still change the result
pub(crate) fn fold<T>(
    op: LogicalOp,
    id: &str,
    items: &[T],
    mut eval: impl FnMut(&T) -> evaluator::Result<Value>,
) -> evaluator::Result<Value> {
    match op {
        LogicalOp::And => short_circuit(items, false, eval),
        LogicalOp::Or => short_circuit(items, true, eval),
        LogicalOp::NOf => {
            let Some((n, rest)) = items.split_first() else {
                return Err(EvaluationError::wrong_num_arguments(id.into(), 1, 0));
            };
            let n = eval(n)?.get_as_integer()?;
            let needed = usize::try_from(n)
                .map_err(|_| failed(id, format!("negative count {n}")))?;
            if needed > rest.len() {
                return Err(failed(
                    id,
                    format!("needs {needed} true arguments but only {} were given", rest.len()),
                ));
            }
            let mut trues = 0;
            let mut first_error = None;
            let mut errors = 0;
            for (i, item) in rest.iter().enumerate() {
                if trues == needed {
                    break;
                }
                // even counting every error as true, `needed` is out of reach
                if trues + errors + (rest.len() - i) < needed {
                    break;
                }
                match eval(item).and_then(|v| v.get_as_bool()) {
                    Ok(true) => trues += 1,
                    Ok(false) => (),
                    Err(e) => {
                        errors += 1;
                        first_error.get_or_insert(e);
                    }
                }
            }
            if trues >= needed {
                Ok(Value::from(true))
            } else {
                first_error.map_or(Ok(Value::from(false)), Err)
            }
        }
    }
}

/// `and` when `decisive` is false, `or` when it is true
fn short_circuit<T>(
    items: &[T],
    decisive: bool,
    mut eval: impl FnMut(&T) -> evaluator::Result<Value>,
) -> evaluator::Result<Value> {
    let mut first_error = None;
    for item in items {
        match eval(item).and_then(|v| v.get_as_bool()) {
            Ok(b) if b == decisive => return Ok(Value::from(decisive)),
            Ok(_) => (),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    first_error.map_or(Ok(Value::from(!decisive)), Err)
}

pub(super) fn functions() -> Vec<Function> {
    vec![
        Function::logical(format!("{F1}and"), LogicalOp::And),
        Function::logical(format!("{F1}or"), LogicalOp::Or),
        Function::logical(format!("{F1}n-of"), LogicalOp::NOf),
        Function::unary(
            format!("{F1}not"),
            ExprType::boolean(),
            ExprType::boolean(),
            |a| Ok(Value::from(!a.get_as_bool()?)),
        ),
    ]
}
