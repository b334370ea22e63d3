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

use super::{EvaluationError, Evaluator, Result};
use crate::ast::{
    CombinerElement, CombinerParameter, DecisionResult, Effect, IndeterminateKind, Rule,
};
use crate::combining::CombinerChild;
use crate::matcher::match_target;

impl Evaluator<'_> {
    /// Evaluate a rule: its target, then its condition, then the
    /// obligations and advice for its effect
    pub fn evaluate_rule(&self, rule: &Rule) -> DecisionResult {
        let failed = |err: EvaluationError| {
            DecisionResult::from_error(IndeterminateKind::of(rule.effect()), &err)
        };
        match self.rule_target_applies(rule) {
            Ok(true) => {}
            Ok(false) => return DecisionResult::not_applicable(),
            Err(err) => return failed(err),
        }
        if let Some(condition) = rule.condition() {
            match self.interpret(condition).and_then(|v| v.get_as_bool()) {
                Ok(true) => {}
                Ok(false) => return DecisionResult::not_applicable(),
                Err(err) => return failed(err),
            }
        }
        self.attach_obligations(
            DecisionResult::from_effect(rule.effect()),
            rule.obligations(),
            rule.advice(),
        )
    }

    fn rule_target_applies(&self, rule: &Rule) -> Result<bool> {
        match rule.target() {
            None => Ok(true),
            Some(target) => match_target(target, self.facade()).into_result(),
        }
    }
}

/// A rule handed to a rule-combining algorithm
pub(super) struct RuleChild<'a, 'e> {
    pub(super) evaluator: &'a Evaluator<'e>,
    pub(super) element: &'a CombinerElement<Rule>,
}

impl CombinerChild for RuleChild<'_, '_> {
    fn id(&self) -> &str {
        self.element.element.id()
    }

    fn evaluate(&self) -> DecisionResult {
        self.evaluator.evaluate_rule(&self.element.element)
    }

    fn target_applies(&self) -> Result<bool> {
        self.evaluator.rule_target_applies(&self.element.element)
    }

    fn parameters(&self) -> &[CombinerParameter] {
        &self.element.parameters
    }

    fn effect(&self) -> Option<Effect> {
        Some(self.element.element.effect())
    }
}
