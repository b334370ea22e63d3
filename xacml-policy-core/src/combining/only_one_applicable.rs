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

use super::{CombinerChild, CombiningAlgorithm};
use crate::ast::{CombinerParameter, DecisionResult, IndeterminateKind};
use crate::evaluator::EvaluationError;
use smol_str::SmolStr;
use tracing::debug;

/// `only-one-applicable`, for policy sets only. Targets are evaluated
/// first; exactly one applicable child is then evaluated and decides. Two
/// applicable children, or a target that cannot be evaluated, make the
/// result Indeterminate.
#[derive(Debug, Clone)]
pub struct OnlyOneApplicable {
    id: SmolStr,
}

impl OnlyOneApplicable {
    /// The algorithm under the given identifier
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self { id: id.into() }
    }
}

impl CombiningAlgorithm for OnlyOneApplicable {
    fn id(&self) -> &str {
        &self.id
    }

    fn combine(
        &self,
        _parameters: &[CombinerParameter],
        children: &[&dyn CombinerChild],
    ) -> DecisionResult {
        let mut selected: Option<&dyn CombinerChild> = None;
        for child in children {
            match child.target_applies() {
                Err(err) => {
                    return DecisionResult::from_error(IndeterminateKind::PermitOrDeny, &err)
                }
                Ok(false) => {}
                Ok(true) => {
                    if let Some(first) = selected {
                        debug!(
                            first = first.id(),
                            second = child.id(),
                            "more than one applicable policy"
                        );
                        return DecisionResult::from_error(
                            IndeterminateKind::PermitOrDeny,
                            &EvaluationError::ambiguous_applicability(),
                        );
                    }
                    selected = Some(*child);
                }
            }
        }
        selected.map_or_else(DecisionResult::not_applicable, |child| child.evaluate())
    }
}
