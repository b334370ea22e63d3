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

use super::rule::RuleChild;
use super::{stack_size_check, EvaluationError, Evaluator, Result};
use crate::ast::*;
use crate::combining::{CombinerChild, CombiningAlgorithm};
use crate::matcher::{match_target, MatchResult};
use std::cell::Cell;
use tracing::{debug, warn};

impl Evaluator<'_> {
    /// Evaluate a policy, a policy set, or the node a reference resolves to
    pub fn evaluate_tree(&self, tree: &PolicyTree) -> DecisionResult {
        if let Err(err) = stack_size_check() {
            return DecisionResult::from_error(IndeterminateKind::PermitOrDeny, &err);
        }
        match tree {
            PolicyTree::Policy(policy) => self.evaluate_policy(policy),
            PolicyTree::PolicySet(set) => self.evaluate_policy_set(set),
            PolicyTree::Reference(reference) => self
                .follow(reference, |resolved| self.evaluate_tree(resolved))
                .unwrap_or_else(|err| {
                    DecisionResult::from_error(IndeterminateKind::PermitOrDeny, &err)
                }),
        }
    }

    /// Evaluate a policy: its target, then its rules under its
    /// rule-combining algorithm
    pub fn evaluate_policy(&self, policy: &Policy) -> DecisionResult {
        let children = policy
            .rules()
            .iter()
            .map(|element| RuleChild {
                evaluator: self,
                element,
            })
            .collect::<Vec<_>>();
        let result = self.under_target(policy.target(), policy.xacml_version(), || {
            combine(policy.algorithm().as_ref(), policy.parameters(), &children)
        });
        let result = self.conclude(result, policy.obligations(), policy.advice(), || {
            policy.identifier()
        });
        debug!(policy = %policy.id(), decision = ?result.decision, "evaluated policy");
        result
    }

    /// Evaluate a policy set: its target, then its children under its
    /// policy-combining algorithm
    pub fn evaluate_policy_set(&self, set: &PolicySet) -> DecisionResult {
        let children = set
            .children()
            .iter()
            .map(|element| TreeChild {
                evaluator: self,
                tree: &element.element,
                parameters: &element.parameters,
            })
            .collect::<Vec<_>>();
        let result = self.under_target(set.target(), set.xacml_version(), || {
            combine(set.algorithm().as_ref(), set.parameters(), &children)
        });
        let result =
            self.conclude(result, set.obligations(), set.advice(), || set.identifier());
        debug!(policy_set = %set.id(), decision = ?result.decision, "evaluated policy set");
        result
    }

    /// Combine the top-level policies of a request
    pub fn evaluate_roots(
        &self,
        algorithm: &dyn CombiningAlgorithm,
        roots: &[PolicyTree],
    ) -> DecisionResult {
        let children = roots
            .iter()
            .map(|tree| TreeChild {
                evaluator: self,
                tree,
                parameters: &[],
            })
            .collect::<Vec<_>>();
        combine(algorithm, &[], &children)
    }

    /// Gate `combine` behind a target.
    ///
    /// Under 3.0 an Indeterminate target still combines the children and
    /// narrows the result: Permit becomes Indeterminate{P}, Deny becomes
    /// Indeterminate{D}. Older versions give Indeterminate{DP} without
    /// looking at the children.
    fn under_target(
        &self,
        target: &Target,
        xacml_version: XacmlVersion,
        combine: impl FnOnce() -> DecisionResult,
    ) -> DecisionResult {
        match match_target(target, self.facade()) {
            MatchResult::Match(_) => combine(),
            MatchResult::NoMatch => DecisionResult::not_applicable(),
            MatchResult::Indeterminate(err) if xacml_version.is_legacy() => {
                DecisionResult::from_error(IndeterminateKind::PermitOrDeny, &err)
            }
            MatchResult::Indeterminate(err) => {
                let combined = combine();
                match combined.decision {
                    Decision::NotApplicable | Decision::Indeterminate(_) => DecisionResult {
                        obligations: Vec::new(),
                        advice: Vec::new(),
                        ..combined
                    },
                    Decision::Permit => DecisionResult::from_error(IndeterminateKind::Permit, &err),
                    Decision::Deny => DecisionResult::from_error(IndeterminateKind::Deny, &err),
                }
            }
        }
    }

    /// Attach a node's own obligations and advice and record it as
    /// applicable
    fn conclude(
        &self,
        result: DecisionResult,
        obligations: &[ObligationExpression],
        advice: &[AdviceExpression],
        identifier: impl FnOnce() -> PolicyIdentifier,
    ) -> DecisionResult {
        let mut result = self.attach_obligations(result, obligations, advice);
        if result.decision != Decision::NotApplicable {
            result.policy_identifiers.push(identifier());
        }
        result
    }

    /// Resolve `reference` and run `f` on the node it names, one level
    /// deeper than the caller
    fn follow<T>(
        &self,
        reference: &PolicyReference,
        f: impl FnOnce(&PolicyTree) -> T,
    ) -> Result<T> {
        if self.reference_depth.get() >= self.max_reference_depth {
            return Err(EvaluationError::reference_depth_exceeded(
                self.max_reference_depth,
            ));
        }
        let Some(resolved) = self.source.find_policy(reference)? else {
            warn!(reference = %reference, "policy reference did not resolve");
            return Err(EvaluationError::unresolved_reference(
                reference.to_string().into(),
            ));
        };
        let _guard = DepthGuard::enter(&self.reference_depth);
        Ok(f(&resolved))
    }

    fn tree_target_applies(&self, tree: &PolicyTree) -> Result<bool> {
        match tree {
            PolicyTree::Policy(policy) => {
                match_target(policy.target(), self.facade()).into_result()
            }
            PolicyTree::PolicySet(set) => match_target(set.target(), self.facade()).into_result(),
            PolicyTree::Reference(reference) => {
                self.follow(reference, |resolved| self.tree_target_applies(resolved))?
            }
        }
    }
}

fn combine<C: CombinerChild>(
    algorithm: &dyn CombiningAlgorithm,
    parameters: &[CombinerParameter],
    children: &[C],
) -> DecisionResult {
    let children = children
        .iter()
        .map(|c| c as &dyn CombinerChild)
        .collect::<Vec<_>>();
    algorithm.combine(parameters, &children)
}

/// Counts one followed reference for as long as it lives
struct DepthGuard<'a>(&'a Cell<usize>);

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get().saturating_add(1));
        Self(depth)
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

/// A policy, policy set or reference handed to a policy-combining algorithm
struct TreeChild<'a, 'e> {
    evaluator: &'a Evaluator<'e>,
    tree: &'a PolicyTree,
    parameters: &'a [CombinerParameter],
}

impl CombinerChild for TreeChild<'_, '_> {
    fn id(&self) -> &str {
        self.tree.id().as_ref()
    }

    fn evaluate(&self) -> DecisionResult {
        self.evaluator.evaluate_tree(self.tree)
    }

    fn target_applies(&self) -> Result<bool> {
        self.evaluator.tree_target_applies(self.tree)
    }

    fn parameters(&self) -> &[CombinerParameter] {
        self.parameters
    }
}

#[cfg(test)]
// PANIC SAFETY: Unit Test Code
#[allow(clippy::indexing_slicing)]
mod test {
    use super::super::test::function;
    use super::*;
    use crate::attributes::{AttributeFacade, Clock};
    use crate::combining::{ids, CombiningAlgorithmRegistry};
    use crate::policy_source::{PolicySource, PolicyStore};
    use std::sync::Arc;

    fn rule_algorithm(id: &str) -> Arc<dyn CombiningAlgorithm> {
        Arc::clone(CombiningAlgorithmRegistry::standard().rule_algorithm(id).unwrap())
    }

    fn policy_algorithm(id: &str) -> Arc<dyn CombiningAlgorithm> {
        Arc::clone(CombiningAlgorithmRegistry::standard().policy_algorithm(id).unwrap())
    }

    /// A target on the subject's role; a required role makes a request
    /// without one Indeterminate
    fn role_target(role: &str, required: bool) -> Target {
        let mut designator =
            AttributeDesignator::new(categories::ACCESS_SUBJECT, "role", DataType::String);
        designator.must_be_present = required;
        let m = Match::new(
            function("string-equal"),
            AttributeValue::string(role),
            MatchLookup::Designator(designator),
        )
        .unwrap();
        Target::AnyOf(vec![AnyOf {
            all_of: vec![AllOf { matches: vec![m] }],
        }])
    }

    fn policy(id: &str, effect: Effect) -> Policy {
        Policy::new(
            PolicyID::from_string(id),
            rule_algorithm(ids::RULE_DENY_OVERRIDES),
        )
        .with_rule(Rule::new(format!("{id}-rule"), effect))
    }

    fn reference(kind: PolicyKind, id: &str) -> PolicyTree {
        PolicyReference {
            kind,
            id: PolicyID::from_string(id),
            constraints: VersionConstraints::default(),
        }
        .into()
    }

    fn evaluate<T>(
        request: &Request,
        source: &dyn PolicySource,
        max_depth: usize,
        f: impl FnOnce(&Evaluator<'_>) -> T,
    ) -> T {
        let clock = Clock::now();
        let eval = Evaluator::new(AttributeFacade::new(request, &[], &clock), source, max_depth);
        f(&eval)
    }

    fn admin() -> Request {
        Request::new().with_attribute(
            categories::ACCESS_SUBJECT,
            "role",
            AttributeValue::string("admin"),
        )
    }

    #[test]
    fn applicable_policy_is_identified() {
        let store = PolicyStore::default();
        let tree: PolicyTree = policy("p", Effect::Permit)
            .with_target(role_target("admin", false))
            .into();
        evaluate(&admin(), &store, 8, |eval| {
            let result = eval.evaluate_tree(&tree);
            assert_eq!(result.decision, Decision::Permit);
            assert_eq!(result.policy_identifiers.len(), 1);
            assert_eq!(result.policy_identifiers[0].id, PolicyID::from_string("p"));
        });
        evaluate(&Request::new(), &store, 8, |eval| {
            let result = eval.evaluate_tree(&tree);
            assert_eq!(result.decision, Decision::NotApplicable);
            assert!(result.policy_identifiers.is_empty());
        });
    }

    #[test]
    fn indeterminate_target_narrows_the_combined_decision() {
        let store = PolicyStore::default();
        let deny: PolicyTree = policy("p", Effect::Deny)
            .with_target(role_target("admin", true))
            .into();
        evaluate(&Request::new(), &store, 8, |eval| {
            let result = eval.evaluate_tree(&deny);
            assert_eq!(result.decision, Decision::Indeterminate(IndeterminateKind::Deny));
            assert_eq!(result.status_code(), StatusCode::MissingAttribute);
        });

        let legacy: PolicyTree = policy("p", Effect::Deny)
            .with_xacml_version(XacmlVersion::V2_0)
            .with_target(role_target("admin", true))
            .into();
        evaluate(&Request::new(), &store, 8, |eval| {
            assert_eq!(
                eval.evaluate_tree(&legacy).decision,
                Decision::Indeterminate(IndeterminateKind::PermitOrDeny)
            );
        });
    }

    #[test]
    fn indeterminate_target_over_not_applicable_children() {
        let store = PolicyStore::default();
        let empty: PolicyTree = Policy::new(
            PolicyID::from_string("p"),
            rule_algorithm(ids::RULE_DENY_OVERRIDES),
        )
        .with_target(role_target("admin", true))
        .into();
        evaluate(&Request::new(), &store, 8, |eval| {
            assert_eq!(eval.evaluate_tree(&empty).decision, Decision::NotApplicable);
        });
    }

    #[test]
    fn references_resolve_through_the_source() {
        let store =
            PolicyStore::with_library(Vec::new(), vec![policy("shared", Effect::Deny).into()]);
        let set: PolicyTree = PolicySet::new(
            PolicyID::from_string("root"),
            policy_algorithm(ids::POLICY_FIRST_APPLICABLE),
        )
        .with_child(reference(PolicyKind::Policy, "shared"))
        .into();
        evaluate(&Request::new(), &store, 8, |eval| {
            let result = eval.evaluate_tree(&set);
            assert_eq!(result.decision, Decision::Deny);
            let ids: Vec<_> = result
                .policy_identifiers
                .iter()
                .map(|p| p.id.to_string())
                .collect();
            assert_eq!(ids, vec!["shared", "root"]);
        });
    }

    #[test]
    fn unresolved_reference_is_indeterminate() {
        let store = PolicyStore::default();
        let tree = reference(PolicyKind::PolicySet, "nowhere");
        evaluate(&Request::new(), &store, 8, |eval| {
            let result = eval.evaluate_tree(&tree);
            assert_eq!(
                result.decision,
                Decision::Indeterminate(IndeterminateKind::PermitOrDeny)
            );
            assert_eq!(result.status_code(), StatusCode::ProcessingError);
        });
    }

    #[test]
    fn reference_cycles_stop_at_the_depth_limit() {
        let looping = PolicySet::new(
            PolicyID::from_string("loop"),
            policy_algorithm(ids::POLICY_DENY_OVERRIDES),
        )
        .with_child(reference(PolicyKind::PolicySet, "loop"));
        let store = PolicyStore::new(vec![looping.into()]);
        let tree = reference(PolicyKind::PolicySet, "loop");
        evaluate(&Request::new(), &store, 4, |eval| {
            let result = eval.evaluate_tree(&tree);
            assert!(result.decision.is_indeterminate());
            assert!(result
                .status
                .and_then(|s| s.message)
                .is_some_and(|m| m.contains("4 levels")));
            assert_eq!(eval.reference_depth.get(), 0);
        });
    }

    #[test]
    fn only_one_applicable_resolves_reference_targets() {
        let store = PolicyStore::with_library(
            Vec::new(),
            vec![policy("admins", Effect::Permit)
                .with_target(role_target("admin", false))
                .into()],
        );
        let roots = vec![
            reference(PolicyKind::Policy, "admins"),
            policy("guests", Effect::Deny)
                .with_target(role_target("guest", false))
                .into(),
        ];
        let only_one = policy_algorithm(ids::POLICY_ONLY_ONE_APPLICABLE);
        evaluate(&admin(), &store, 8, |eval| {
            assert_eq!(
                eval.evaluate_roots(only_one.as_ref(), &roots).decision,
                Decision::Permit
            );
        });
        evaluate(&Request::new(), &store, 8, |eval| {
            assert_eq!(
                eval.evaluate_roots(only_one.as_ref(), &roots).decision,
                Decision::NotApplicable
            );
        });
    }

    #[test]
    fn policy_obligations_follow_rule_obligations() {
        let store = PolicyStore::default();
        let tree: PolicyTree = Policy::new(
            PolicyID::from_string("p"),
            rule_algorithm(ids::RULE_PERMIT_OVERRIDES),
        )
        .with_rule(
            Rule::new("r", Effect::Permit)
                .with_obligations([ObligationExpression::new("from-rule", Effect::Permit)]),
        )
        .with_obligations([
            ObligationExpression::new("from-policy", Effect::Permit),
            ObligationExpression::new("on-deny", Effect::Deny),
        ])
        .into();
        evaluate(&Request::new(), &store, 8, |eval| {
            let result = eval.evaluate_tree(&tree);
            let ids: Vec<_> = result.obligations.iter().map(|o| o.id.as_str()).collect();
            assert_eq!(ids, vec!["from-rule", "from-policy"]);
        });
    }
}
