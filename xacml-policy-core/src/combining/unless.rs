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

use super::{CombinerChild, CombiningAlgorithm, Tally};
use crate::ast::{CombinerParameter, Decision, DecisionResult, Effect};
use smol_str::SmolStr;

/// `deny-unless-permit` and `permit-unless-deny`: the default effect holds
/// unless some child decides the other one. The result is always Permit or
/// Deny.
#[derive(Debug, Clone)]
pub struct Unless {
    id: SmolStr,
    default: Effect,
}

impl Unless {
    /// An algorithm that yields `default` unless a child decides otherwise
    pub fn new(id: impl Into<SmolStr>, default: Effect) -> Self {
        Self {
            id: id.into(),
            default,
        }
    }
}

impl CombiningAlgorithm for Unless {
    fn id(&self) -> &str {
        &self.id
    }

    fn combine(
        &self,
        _parameters: &[CombinerParameter],
        children: &[&dyn CombinerChild],
    ) -> DecisionResult {
        let exception = Decision::from_effect(self.default.opposite());
        let mut tally = Tally::new();
        for child in children {
            if tally.record(child.evaluate()) == exception {
                return tally.finish(exception);
            }
        }
        tally.finish(Decision::from_effect(self.default))
    }
}

#[cfg(test)]
// PANIC SAFETY: Unit Test Code
#[allow(clippy::indexing_slicing)]
mod test {
    use super::super::test_children::*;
    use super::*;
    use crate::ast::IndeterminateKind;

    const ALL: [Decision; 6] = [
        Decision::Permit,
        Decision::Deny,
        Decision::NotApplicable,
        Decision::Indeterminate(IndeterminateKind::Permit),
        Decision::Indeterminate(IndeterminateKind::Deny),
        Decision::Indeterminate(IndeterminateKind::PermitOrDeny),
    ];

    #[test]
    fn never_indeterminate_nor_not_applicable() {
        let alg = Unless::new("d-u-p", Effect::Deny);
        for a in ALL {
            for b in ALL {
                let canned = [Canned::new("a", a), Canned::new("b", b)];
                let result = alg.combine(&[], &children(&canned));
                let expected = if a == Decision::Permit || b == Decision::Permit {
                    Decision::Permit
                } else {
                    Decision::Deny
                };
                assert_eq!(result.decision, expected, "{a} then {b}");
                assert!(result.status.is_none());
            }
        }
        assert_eq!(alg.combine(&[], &[]).decision, Decision::Deny);
    }

    #[test]
    fn permit_unless_deny() {
        let alg = Unless::new("p-u-d", Effect::Permit);
        let all_indeterminate: Vec<_> = ALL[3..]
            .iter()
            .map(|d| Canned::new("x", *d))
            .collect();
        assert_eq!(
            alg.combine(&[], &children(&all_indeterminate)).decision,
            Decision::Permit
        );
        let canned = [
            Canned::new("a", Decision::Permit)
                .with_obligations(vec![obligation("log", Effect::Permit)]),
            Canned::new("b", Decision::Deny)
                .with_obligations(vec![obligation("alert", Effect::Deny)]),
        ];
        let result = alg.combine(&[], &children(&canned));
        assert_eq!(result.decision, Decision::Deny);
        assert_eq!(result.obligations, vec![obligation("alert", Effect::Deny)]);
    }
}
