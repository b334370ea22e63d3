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

//! Combining algorithms: how the decisions of the rules of a policy, or of
//! the children of a policy set, fold into one decision.
//!
//! Children are handed to an algorithm unevaluated, as [`CombinerChild`]
//! objects, so that algorithms such as `first-applicable` evaluate only what
//! they need and in document order.

mod first_applicable;
mod legacy;
mod only_one_applicable;
mod overrides;
mod unless;

pub use first_applicable::FirstApplicable;
pub use legacy::{LegacyOverrides, Level};
pub use only_one_applicable::OnlyOneApplicable;
pub use overrides::Overrides;
pub use unless::Unless;

use crate::ast::{
    Advice, CombinerParameter, Decision, DecisionResult, Effect, IndeterminateKind, Obligation,
    PolicyIdentifier, Status, StatusCode,
};
use crate::evaluator::{self, EvaluationError};
use crate::functions::util::collect_no_duplicates;
use miette::Diagnostic;
use smol_str::SmolStr;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;

/// Identifiers of the built-in algorithms
pub mod ids {
    /// XACML 3.0 rule-combining deny-overrides
    pub const RULE_DENY_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:deny-overrides";
    /// XACML 3.0 policy-combining deny-overrides
    pub const POLICY_DENY_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:deny-overrides";
    /// XACML 3.0 rule-combining permit-overrides
    pub const RULE_PERMIT_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:permit-overrides";
    /// XACML 3.0 policy-combining permit-overrides
    pub const POLICY_PERMIT_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:permit-overrides";
    /// XACML 3.0 rule-combining ordered-deny-overrides
    pub const RULE_ORDERED_DENY_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:ordered-deny-overrides";
    /// XACML 3.0 policy-combining ordered-deny-overrides
    pub const POLICY_ORDERED_DENY_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:ordered-deny-overrides";
    /// XACML 3.0 rule-combining ordered-permit-overrides
    pub const RULE_ORDERED_PERMIT_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:ordered-permit-overrides";
    /// XACML 3.0 policy-combining ordered-permit-overrides
    pub const POLICY_ORDERED_PERMIT_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:ordered-permit-overrides";
    /// XACML 3.0 rule-combining deny-unless-permit
    pub const RULE_DENY_UNLESS_PERMIT: &str =
        "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:deny-unless-permit";
    /// XACML 3.0 policy-combining deny-unless-permit
    pub const POLICY_DENY_UNLESS_PERMIT: &str =
        "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:deny-unless-permit";
    /// XACML 3.0 rule-combining permit-unless-deny
    pub const RULE_PERMIT_UNLESS_DENY: &str =
        "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:permit-unless-deny";
    /// XACML 3.0 policy-combining permit-unless-deny
    pub const POLICY_PERMIT_UNLESS_DENY: &str =
        "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:permit-unless-deny";
    /// XACML 1.0 rule-combining first-applicable
    pub const RULE_FIRST_APPLICABLE: &str =
        "urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:first-applicable";
    /// XACML 1.0 policy-combining first-applicable
    pub const POLICY_FIRST_APPLICABLE: &str =
        "urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:first-applicable";
    /// XACML 1.0 policy-combining only-one-applicable
    pub const POLICY_ONLY_ONE_APPLICABLE: &str =
        "urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:only-one-applicable";
    /// XACML 1.0 rule-combining deny-overrides
    pub const LEGACY_RULE_DENY_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:deny-overrides";
    /// XACML 1.0 policy-combining deny-overrides
    pub const LEGACY_POLICY_DENY_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:deny-overrides";
    /// XACML 1.0 rule-combining permit-overrides
    pub const LEGACY_RULE_PERMIT_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:permit-overrides";
    /// XACML 1.0 policy-combining permit-overrides
    pub const LEGACY_POLICY_PERMIT_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:permit-overrides";
    /// XACML 1.1 rule-combining ordered-deny-overrides
    pub const LEGACY_RULE_ORDERED_DENY_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:1.1:rule-combining-algorithm:ordered-deny-overrides";
    /// XACML 1.1 policy-combining ordered-deny-overrides
    pub const LEGACY_POLICY_ORDERED_DENY_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:1.1:policy-combining-algorithm:ordered-deny-overrides";
    /// XACML 1.1 rule-combining ordered-permit-overrides
    pub const LEGACY_RULE_ORDERED_PERMIT_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:1.1:rule-combining-algorithm:ordered-permit-overrides";
    /// XACML 1.1 policy-combining ordered-permit-overrides
    pub const LEGACY_POLICY_ORDERED_PERMIT_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:1.1:policy-combining-algorithm:ordered-permit-overrides";
}

/// A rule, policy, policy set or reference, as seen by a combining
/// algorithm. Nothing is evaluated until the algorithm asks.
pub trait CombinerChild {
    /// Identifier of the child, for diagnostics
    fn id(&self) -> &str;

    /// Evaluate the child
    fn evaluate(&self) -> DecisionResult;

    /// Evaluate only the child's target
    fn target_applies(&self) -> evaluator::Result<bool>;

    /// Combiner parameters attached to this child
    fn parameters(&self) -> &[CombinerParameter];

    /// For a rule, its declared effect. Policies have none.
    fn effect(&self) -> Option<Effect> {
        None
    }
}

/// A combining algorithm. Implementations must evaluate children in the
/// order given whenever they evaluate more than one.
pub trait CombiningAlgorithm: Debug + Send + Sync {
    /// The algorithm's identifier
    fn id(&self) -> &str;

    /// Fold the children's decisions. `parameters` are the combiner
    /// parameters of the enclosing policy or policy set; per-child
    /// parameters are available from each child.
    fn combine(
        &self,
        parameters: &[CombinerParameter],
        children: &[&dyn CombinerChild],
    ) -> DecisionResult;
}

#[derive(Debug, Default)]
struct Contribution {
    obligations: Vec<Obligation>,
    advice: Vec<Advice>,
}

/// What the children contributed while an algorithm folds them: the
/// obligations and advice of every Permit and every Deny, the status of the
/// first Indeterminate, and the identifiers of applicable policies.
#[derive(Debug, Default)]
pub struct Tally {
    permit: Contribution,
    deny: Contribution,
    status: Option<Status>,
    policy_identifiers: Vec<PolicyIdentifier>,
}

impl Tally {
    /// An empty tally
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a child's result, returning its decision
    pub fn record(&mut self, result: DecisionResult) -> Decision {
        let DecisionResult {
            decision,
            status,
            obligations,
            advice,
            policy_identifiers,
            ..
        } = result;
        if decision != Decision::NotApplicable {
            self.policy_identifiers.extend(policy_identifiers);
        }
        let contribution = match decision {
            Decision::Permit => &mut self.permit,
            Decision::Deny => &mut self.deny,
            Decision::Indeterminate(_) => {
                if self.status.is_none() {
                    self.status = status;
                }
                return decision;
            }
            Decision::NotApplicable => return decision,
        };
        contribution.obligations.extend(obligations);
        contribution.advice.extend(advice);
        decision
    }

    /// Build the combined result. Permit and Deny carry the obligations and
    /// advice of every child that had that decision; Indeterminate carries
    /// the status of the first Indeterminate child.
    pub fn finish(self, decision: Decision) -> DecisionResult {
        let mut result = DecisionResult::new(decision);
        match decision {
            Decision::Permit => {
                result.obligations = self.permit.obligations;
                result.advice = self.permit.advice;
            }
            Decision::Deny => {
                result.obligations = self.deny.obligations;
                result.advice = self.deny.advice;
            }
            Decision::Indeterminate(_) => {
                result.status = Some(self.status.unwrap_or_else(|| {
                    Status::new(StatusCode::ProcessingError, "indeterminate child")
                }));
            }
            Decision::NotApplicable => {}
        }
        result.policy_identifiers = self.policy_identifiers;
        result
    }

    /// Build an Indeterminate result reporting `err`, keeping the policy
    /// identifiers recorded so far
    pub fn fail(self, kind: IndeterminateKind, err: &EvaluationError) -> DecisionResult {
        DecisionResult {
            policy_identifiers: self.policy_identifiers,
            ..DecisionResult::from_error(kind, err)
        }
    }
}

/// Which kind of node an algorithm may combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmScope {
    /// Rules of a policy
    Rule,
    /// Children of a policy set
    Policy,
    /// Either
    Both,
}

/// An algorithm identifier was registered twice for the same scope
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
#[error("combining algorithm `{0}` is defined more than once")]
pub struct DuplicateAlgorithmError(pub SmolStr);

/// Combining algorithms available to policies, keyed by identifier. Rule-
/// and policy-combining algorithms live in separate namespaces.
#[derive(Debug, Clone)]
pub struct CombiningAlgorithmRegistry {
    rule: HashMap<SmolStr, Arc<dyn CombiningAlgorithm>>,
    policy: HashMap<SmolStr, Arc<dyn CombiningAlgorithm>>,
}

lazy_static::lazy_static! {
    static ref STANDARD_ALGORITHMS: CombiningAlgorithmRegistry =
        CombiningAlgorithmRegistry::build_standard();
}

fn keyed(
    algorithms: Vec<Arc<dyn CombiningAlgorithm>>,
) -> impl Iterator<Item = (SmolStr, Arc<dyn CombiningAlgorithm>)> {
    algorithms
        .into_iter()
        .map(|a| (SmolStr::new(a.id()), a))
}

impl CombiningAlgorithmRegistry {
    fn build_standard() -> Self {
        use ids::*;
        let rule: Vec<Arc<dyn CombiningAlgorithm>> = vec![
            Arc::new(Overrides::new(RULE_DENY_OVERRIDES, Effect::Deny)),
            Arc::new(Overrides::new(RULE_PERMIT_OVERRIDES, Effect::Permit)),
            Arc::new(Overrides::new(RULE_ORDERED_DENY_OVERRIDES, Effect::Deny)),
            Arc::new(Overrides::new(RULE_ORDERED_PERMIT_OVERRIDES, Effect::Permit)),
            Arc::new(Unless::new(RULE_DENY_UNLESS_PERMIT, Effect::Deny)),
            Arc::new(Unless::new(RULE_PERMIT_UNLESS_DENY, Effect::Permit)),
            Arc::new(FirstApplicable::new(RULE_FIRST_APPLICABLE)),
            Arc::new(LegacyOverrides::new(
                LEGACY_RULE_DENY_OVERRIDES,
                Effect::Deny,
                Level::Rule,
            )),
            Arc::new(LegacyOverrides::new(
                LEGACY_RULE_PERMIT_OVERRIDES,
                Effect::Permit,
                Level::Rule,
            )),
            Arc::new(LegacyOverrides::new(
                LEGACY_RULE_ORDERED_DENY_OVERRIDES,
                Effect::Deny,
                Level::Rule,
            )),
            Arc::new(LegacyOverrides::new(
                LEGACY_RULE_ORDERED_PERMIT_OVERRIDES,
                Effect::Permit,
                Level::Rule,
            )),
        ];
        let policy: Vec<Arc<dyn CombiningAlgorithm>> = vec![
            Arc::new(Overrides::new(POLICY_DENY_OVERRIDES, Effect::Deny)),
            Arc::new(Overrides::new(POLICY_PERMIT_OVERRIDES, Effect::Permit)),
            Arc::new(Overrides::new(POLICY_ORDERED_DENY_OVERRIDES, Effect::Deny)),
            Arc::new(Overrides::new(POLICY_ORDERED_PERMIT_OVERRIDES, Effect::Permit)),
            Arc::new(Unless::new(POLICY_DENY_UNLESS_PERMIT, Effect::Deny)),
            Arc::new(Unless::new(POLICY_PERMIT_UNLESS_DENY, Effect::Permit)),
            Arc::new(FirstApplicable::new(POLICY_FIRST_APPLICABLE)),
            Arc::new(OnlyOneApplicable::new(POLICY_ONLY_ONE_APPLICABLE)),
            Arc::new(LegacyOverrides::new(
                LEGACY_POLICY_DENY_OVERRIDES,
                Effect::Deny,
                Level::Policy,
            )),
            Arc::new(LegacyOverrides::new(
                LEGACY_POLICY_PERMIT_OVERRIDES,
                Effect::Permit,
                Level::Policy,
            )),
            Arc::new(LegacyOverrides::new(
                LEGACY_POLICY_ORDERED_DENY_OVERRIDES,
                Effect::Deny,
                Level::Policy,
            )),
            Arc::new(LegacyOverrides::new(
                LEGACY_POLICY_ORDERED_PERMIT_OVERRIDES,
                Effect::Permit,
                Level::Policy,
            )),
        ];
        // PANIC SAFETY: the standard algorithms have distinct identifiers. Also tested by `standard_algorithms_load`.
        #[allow(clippy::expect_used)]
        let rule = collect_no_duplicates(keyed(rule))
            .expect("standard rule-combining algorithms should never be defined twice");
        // PANIC SAFETY: as above
        #[allow(clippy::expect_used)]
        let policy = collect_no_duplicates(keyed(policy))
            .expect("standard policy-combining algorithms should never be defined twice");
        Self { rule, policy }
    }

    /// The XACML 1.0, 1.1 and 3.0 algorithms
    pub fn standard() -> Self {
        STANDARD_ALGORITHMS.clone()
    }

    /// A registry with no algorithms
    pub fn empty() -> Self {
        Self {
            rule: HashMap::new(),
            policy: HashMap::new(),
        }
    }

    /// Add an algorithm for rules, policies, or both. Nothing is registered
    /// if the identifier is taken in any requested scope.
    pub fn register(
        &mut self,
        algorithm: Arc<dyn CombiningAlgorithm>,
        scope: AlgorithmScope,
    ) -> Result<(), DuplicateAlgorithmError> {
        let id = SmolStr::new(algorithm.id());
        let for_rules = matches!(scope, AlgorithmScope::Rule | AlgorithmScope::Both);
        let for_policies = matches!(scope, AlgorithmScope::Policy | AlgorithmScope::Both);
        if (for_rules && self.rule.contains_key(&id))
            || (for_policies && self.policy.contains_key(&id))
        {
            return Err(DuplicateAlgorithmError(id));
        }
        if for_rules {
            self.rule.insert(id.clone(), Arc::clone(&algorithm));
        }
        if for_policies {
            self.policy.insert(id, algorithm);
        }
        Ok(())
    }

    /// Look up a rule-combining algorithm
    pub fn rule_algorithm(&self, id: &str) -> Option<&Arc<dyn CombiningAlgorithm>> {
        self.rule.get(id)
    }

    /// Look up a policy-combining algorithm
    pub fn policy_algorithm(&self, id: &str) -> Option<&Arc<dyn CombiningAlgorithm>> {
        self.policy.get(id)
    }
}

impl Default for CombiningAlgorithmRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Children with canned results, for testing algorithms in isolation
#[cfg(any(test, feature = "test-util"))]
pub mod test_children {
    use super::*;
    use std::cell::Cell;

    /// A child that returns a fixed result and counts its evaluations
    #[derive(Debug)]
    pub struct Canned {
        id: SmolStr,
        result: DecisionResult,
        applies: evaluator::Result<bool>,
        effect: Option<Effect>,
        parameters: Vec<CombinerParameter>,
        evaluations: Cell<usize>,
    }

    impl Canned {
        /// A child whose evaluation yields `decision`. Indeterminate
        /// decisions carry a processing-error status naming the child.
        pub fn new(id: &str, decision: Decision) -> Self {
            let result = match decision {
                Decision::Indeterminate(kind) => DecisionResult::indeterminate(
                    kind,
                    Status::new(StatusCode::ProcessingError, id),
                ),
                d => DecisionResult::new(d),
            };
            Self {
                id: id.into(),
                applies: Ok(decision != Decision::NotApplicable),
                result,
                effect: None,
                parameters: Vec::new(),
                evaluations: Cell::new(0),
            }
        }

        /// Attach obligations to the canned result
        pub fn with_obligations(mut self, obligations: Vec<Obligation>) -> Self {
            self.result.obligations = obligations;
            self
        }

        /// Declare a rule effect
        pub fn with_effect(self, effect: Effect) -> Self {
            Self {
                effect: Some(effect),
                ..self
            }
        }

        /// Override the outcome of target evaluation
        pub fn with_target(self, applies: evaluator::Result<bool>) -> Self {
            Self { applies, ..self }
        }

        /// Attach combiner parameters
        pub fn with_parameters(self, parameters: Vec<CombinerParameter>) -> Self {
            Self { parameters, ..self }
        }

        /// Attach a policy identifier to the canned result
        pub fn with_identifier(mut self, identifier: PolicyIdentifier) -> Self {
            self.result.policy_identifiers.push(identifier);
            self
        }

        /// How often `evaluate` was called
        pub fn evaluations(&self) -> usize {
            self.evaluations.get()
        }
    }

    impl CombinerChild for Canned {
        fn id(&self) -> &str {
            &self.id
        }

        fn evaluate(&self) -> DecisionResult {
            self.evaluations.set(self.evaluations.get() + 1);
            self.result.clone()
        }

        fn target_applies(&self) -> evaluator::Result<bool> {
            self.applies.clone()
        }

        fn parameters(&self) -> &[CombinerParameter] {
            &self.parameters
        }

        fn effect(&self) -> Option<Effect> {
            self.effect
        }
    }

    /// Borrow canned children as trait objects
    pub fn children(canned: &[Canned]) -> Vec<&dyn CombinerChild> {
        canned.iter().map(|c| c as &dyn CombinerChild).collect()
    }

    /// An obligation with no assignments
    pub fn obligation(id: &str, fulfill_on: Effect) -> Obligation {
        Obligation {
            id: id.into(),
            fulfill_on,
            assignments: Vec::new(),
        }
    }
}
