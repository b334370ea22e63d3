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
use crate::ast::{CombinerParameter, Decision, DecisionResult, Effect, IndeterminateKind};
use smol_str::SmolStr;

/// Whether an algorithm combines rules or policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// Rules of a policy
    Rule,
    /// Children of a policy set
    Policy,
}

/// The XACML 1.0 `deny-overrides` and `permit-overrides` algorithms and the
/// 1.1 `ordered-` variants.
///
/// These predate extended Indeterminate values. At rule level an error only
/// matters if the failing rule's effect is the overriding one or nothing
/// else applied. At policy level an error in `deny-overrides` counts as a
/// Deny.
#[derive(Debug, Clone)]
pub struct LegacyOverrides {
    id: SmolStr,
    winner: Effect,
    level: Level,
}

impl LegacyOverrides {
    /// An algorithm in which `winner` takes precedence
    pub fn new(id: impl Into<SmolStr>, winner: Effect, level: Level) -> Self {
        Self {
            id: id.into(),
            winner,
            level,
        }
    }
}

impl CombiningAlgorithm for LegacyOverrides {
    fn id(&self) -> &str {
        &self.id
    }

    fn combine(
        &self,
        _parameters: &[CombinerParameter],
        children: &[&dyn CombinerChild],
    ) -> DecisionResult {
        let winner = Decision::from_effect(self.winner);
        let loser = Decision::from_effect(self.winner.opposite());
        let mut tally = Tally::new();
        let mut saw_loser = false;
        let mut saw_error = false;
        let mut potential_winner = false;
        for child in children {
            match tally.record(child.evaluate()) {
                d if d == winner => return tally.finish(winner),
                d if d == loser => saw_loser = true,
                Decision::Indeterminate(_) => match (self.level, self.winner) {
                    (Level::Policy, Effect::Deny) => return tally.finish(Decision::Deny),
                    (Level::Policy, Effect::Permit) => saw_error = true,
                    (Level::Rule, _) => {
                        saw_error = true;
                        if child.effect() == Some(self.winner) {
                            potential_winner = true;
                        }
                    }
                },
                _ => {}
            }
        }
        let decision = if potential_winner {
            Decision::Indeterminate(IndeterminateKind::PermitOrDeny)
        } else if saw_loser {
            loser
        } else if saw_error {
            Decision::Indeterminate(IndeterminateKind::PermitOrDeny)
        } else {
            Decision::NotApplicable
        };
        tally.finish(decision)
    }
}

#[cfg(test)]
// PANIC SAFETY: Unit Test Code
#[allow(clippy::indexing_slicing)]
mod test {
    use super::super::test_children::*;
    use super::*;

    use Decision::{Deny, NotApplicable, Permit};
    const IND: Decision = Decision::Indeterminate(IndeterminateKind::PermitOrDeny);

    fn combine(alg: &LegacyOverrides, canned: &[Canned]) -> Decision {
        alg.combine(&[], &children(canned)).decision
    }

    #[test]
    fn rule_deny_overrides() {
        let alg = LegacyOverrides::new("d-o", Effect::Deny, Level::Rule);
        assert_eq!(
            combine(&alg, &[Canned::new("a", Permit), Canned::new("b", Deny)]),
            Deny
        );
        // a failing Permit rule cannot hide a Deny
        assert_eq!(
            combine(
                &alg,
                &[
                    Canned::new("a", IND).with_effect(Effect::Permit),
                    Canned::new("b", Permit)
                ]
            ),
            Permit
        );
        // a failing Deny rule could have been the overriding one
        assert_eq!(
            combine(
                &alg,
                &[
                    Canned::new("a", IND).with_effect(Effect::Deny),
                    Canned::new("b", Permit)
                ]
            ),
            IND
        );
        assert_eq!(
            combine(&alg, &[Canned::new("a", IND).with_effect(Effect::Permit)]),
            IND
        );
        assert_eq!(combine(&alg, &[Canned::new("a", NotApplicable)]), NotApplicable);
    }

    #[test]
    fn policy_deny_overrides_treats_errors_as_deny() {
        let alg = LegacyOverrides::new("d-o", Effect::Deny, Level::Policy);
        let canned = [
            Canned::new("a", Permit),
            Canned::new("b", IND),
            Canned::new("c", Permit),
        ];
        assert_eq!(combine(&alg, &canned), Deny);
        assert_eq!(canned[2].evaluations(), 0);
    }

    #[test]
    fn policy_permit_overrides() {
        let alg = LegacyOverrides::new("p-o", Effect::Permit, Level::Policy);
        assert_eq!(
            combine(&alg, &[Canned::new("a", IND), Canned::new("b", Deny)]),
            Deny
        );
        assert_eq!(combine(&alg, &[Canned::new("a", IND)]), IND);
        assert_eq!(
            combine(&alg, &[Canned::new("a", Deny), Canned::new("b", Permit)]),
            Permit
        );
    }
}
