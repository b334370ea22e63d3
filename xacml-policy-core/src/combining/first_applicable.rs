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
use crate::ast::{CombinerParameter, Decision, DecisionResult};
use smol_str::SmolStr;

/// `first-applicable`: the first child that is not NotApplicable decides,
/// Indeterminate included
#[derive(Debug, Clone)]
pub struct FirstApplicable {
    id: SmolStr,
}

impl FirstApplicable {
    /// The algorithm under the given identifier
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self { id: id.into() }
    }
}

impl CombiningAlgorithm for FirstApplicable {
    fn id(&self) -> &str {
        &self.id
    }

    fn combine(
        &self,
        _parameters: &[CombinerParameter],
        children: &[&dyn CombinerChild],
    ) -> DecisionResult {
        children
            .iter()
            .map(|child| child.evaluate())
            .find(|result| result.decision != Decision::NotApplicable)
            .unwrap_or_else(DecisionResult::not_applicable)
    }
}

#[cfg(test)]
// PANIC SAFETY: Unit Test Code
#[allow(clippy::indexing_slicing)]
mod test {
    use super::super::test_children::*;
    use super::*;
    use crate::ast::{Effect, IndeterminateKind};

    #[test]
    fn first_non_not_applicable_wins() {
        let canned = [
            Canned::new("a", Decision::NotApplicable),
            Canned::new("b", Decision::Deny),
            Canned::new("c", Decision::Permit),
        ];
        let result = FirstApplicable::new("f-a").combine(&[], &children(&canned));
        assert_eq!(result.decision, Decision::Deny);
        assert_eq!(canned[2].evaluations(), 0);
    }

    #[test]
    fn indeterminate_is_returned_verbatim() {
        let ind = Decision::Indeterminate(IndeterminateKind::Permit);
        let canned = [
            Canned::new("a", ind),
            Canned::new("b", Decision::Permit)
                .with_obligations(vec![obligation("o", Effect::Permit)]),
        ];
        let result = FirstApplicable::new("f-a").combine(&[], &children(&canned));
        assert_eq!(result.decision, ind);
        assert_eq!(
            result.status.and_then(|s| s.message),
            Some("a".to_string())
        );
        assert!(result.obligations.is_empty());
    }

    #[test]
    fn nothing_applicable() {
        let canned = [Canned::new("a", Decision::NotApplicable)];
        assert_eq!(
            FirstApplicable::new("f-a")
                .combine(&[], &children(&canned))
                .decision,
            Decision::NotApplicable
        );
        assert_eq!(
            FirstApplicable::new("f-a").combine(&[], &[]).decision,
            Decision::NotApplicable
        );
    }
}
