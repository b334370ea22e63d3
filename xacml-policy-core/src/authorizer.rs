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

//! This module contains the policy decision point, which turns a request
//! into a response.
//!
//! Together with the evaluator, the combining algorithms and a policy
//! source, this comprises the "decision engine".

use crate::ast::*;
use crate::attributes::{AttributeFacade, AttributeResolver, Clock};
use crate::config::EngineConfig;
use crate::est;
use crate::evaluator::{EvaluationError, Evaluator};
use crate::policy_source::PolicySource;
use crate::registry::Registry;
use itertools::Itertools;
use std::sync::Arc;
use tracing::{debug, warn};

/// Policy decision point.
///
/// A `Pdp` is immutable once built and may evaluate requests from many
/// threads at once; each request sees one consistent view of the policy
/// source.
#[derive(Clone)]
pub struct Pdp {
    registry: Arc<Registry>,
    config: EngineConfig,
    source: Arc<dyn PolicySource>,
    resolvers: Vec<Arc<dyn AttributeResolver>>,
}

impl std::fmt::Debug for Pdp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pdp")
            .field("config", &self.config)
            .field("resolvers", &self.resolvers.len())
            .finish_non_exhaustive()
    }
}

impl Pdp {
    /// Create a decision point answering from the policies of `source`
    pub fn new(
        registry: impl Into<Arc<Registry>>,
        config: EngineConfig,
        source: Arc<dyn PolicySource>,
    ) -> Self {
        Self {
            registry: registry.into(),
            config,
            source,
            resolvers: Vec::new(),
        }
    }

    /// Add an attribute resolver. Resolvers are consulted in the order they
    /// were added, and only for attributes the request does not carry.
    pub fn with_resolver(mut self, resolver: Arc<dyn AttributeResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// The registry policies for this decision point are converted with
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the response to `request`.
    ///
    /// A request that repeats an attribute category is split into
    /// individual requests, each of which gets its own result, unless the
    /// request asks for a combined decision.
    pub fn evaluate(&self, request: &Request) -> Response {
        let pinned = self.source.pinned();
        let source = pinned.as_deref().unwrap_or(self.source.as_ref());

        let individual = if request.has_repeated_categories() {
            if !self.config.enable_multiple_decisions {
                let err = EvaluationError::processing(
                    "multiple decision requests are disabled; an attribute category occurs more than once",
                );
                return single(DecisionResult::from_error(IndeterminateKind::PermitOrDeny, &err));
            }
            request.individual_requests()
        } else {
            vec![request.clone()]
        };
        debug!(individual = individual.len(), "evaluating request");

        let results = individual
            .iter()
            .map(|r| self.evaluate_individual(r, source))
            .collect::<Vec<_>>();
        if request.combined_decision {
            single(combine_results(results, request.return_policy_id_list))
        } else {
            Response { results }
        }
    }

    /// Returns the response to a request in its JSON form. A request that
    /// cannot be converted gets an Indeterminate `syntax-error` result.
    pub fn evaluate_est(&self, request: &est::Request) -> Response {
        match request.to_ast() {
            Ok(request) => self.evaluate(&request),
            Err(err) => {
                warn!(error = %err, "malformed request");
                single(DecisionResult::from_error(
                    IndeterminateKind::PermitOrDeny,
                    &EvaluationError::syntax(err.to_string()),
                ))
            }
        }
    }

    /// Returns the response to a JSON-encoded request
    pub fn evaluate_json(&self, json: &str) -> Response {
        match est::Request::from_json_str(json) {
            Ok(request) => self.evaluate_est(&request),
            Err(err) => {
                warn!(error = %err, "unparsable request");
                single(DecisionResult::from_error(
                    IndeterminateKind::PermitOrDeny,
                    &EvaluationError::syntax(err.to_string()),
                ))
            }
        }
    }

    fn evaluate_individual(&self, request: &Request, source: &dyn PolicySource) -> DecisionResult {
        let clock = Clock::now();
        let facade = AttributeFacade::new(request, &self.resolvers, &clock);
        let evaluator = Evaluator::new(facade, source, self.config.max_reference_depth);

        let mut result = match self.decide(&evaluator, request, source) {
            Ok(result) => result,
            Err(err) => DecisionResult::from_error(IndeterminateKind::PermitOrDeny, &err),
        };
        if !request.return_policy_id_list {
            result.policy_identifiers.clear();
        }
        result.attributes = request.echoed_attributes();
        debug!(decision = %result.decision, status = ?result.status_code(), "decided request");
        result
    }

    fn decide(
        &self,
        evaluator: &Evaluator<'_>,
        request: &Request,
        source: &dyn PolicySource,
    ) -> Result<DecisionResult, EvaluationError> {
        let algorithm = self
            .registry
            .algorithms()
            .policy_algorithm(&self.config.root_combining_algorithm)
            .ok_or_else(|| {
                EvaluationError::processing(format!(
                    "unknown root combining algorithm `{}`",
                    self.config.root_combining_algorithm
                ))
            })?;
        let roots = source.find_applicable(request)?;
        Ok(evaluator.evaluate_roots(algorithm.as_ref(), &roots))
    }
}

fn single(result: DecisionResult) -> Response {
    Response {
        results: vec![result],
    }
}

/// Fold individual results into one. The combined decision is the common
/// decision of every result, provided none carries obligations or advice.
fn combine_results(results: Vec<DecisionResult>, return_policy_id_list: bool) -> DecisionResult {
    let decisions = results.iter().map(|r| r.decision).unique().collect::<Vec<_>>();
    let burdened = results
        .iter()
        .any(|r| !r.obligations.is_empty() || !r.advice.is_empty());
    let mut combined = match decisions.as_slice() {
        [Decision::Indeterminate(_)] => results
            .first()
            .map_or_else(DecisionResult::not_applicable, |r| DecisionResult {
                attributes: Vec::new(),
                policy_identifiers: Vec::new(),
                ..r.clone()
            }),
        [decision] if !burdened => DecisionResult::new(*decision),
        _ => DecisionResult::from_error(
            IndeterminateKind::PermitOrDeny,
            &EvaluationError::processing(
                "individual decisions differ or carry obligations; they cannot be combined",
            ),
        ),
    };
    if return_policy_id_list {
        combined.policy_identifiers = results
            .into_iter()
            .flat_map(|r| r.policy_identifiers)
            .unique()
            .collect();
    }
    combined
}
