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

use super::{AdviceExpression, Effect, Expr, ExprType, ObligationExpression, Target};
use miette::Diagnostic;
use smol_str::SmolStr;
use thiserror::Error;

/// A condition did not have type boolean
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
#[error("the condition of rule `{rule_id}` has type {actual}, but must be boolean")]
pub struct ConditionTypeError {
    rule_id: SmolStr,
    actual: String,
}

/// A rule: if the target matches and the condition holds, the rule's effect
/// is the decision.
///
/// Rules are immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    id: SmolStr,
    effect: Effect,
    description: Option<SmolStr>,
    target: Option<Target>,
    condition: Option<Expr>,
    obligations: Vec<ObligationExpression>,
    advice: Vec<AdviceExpression>,
}

impl Rule {
    /// A rule with no target and no condition
    pub fn new(id: impl Into<SmolStr>, effect: Effect) -> Self {
        Self {
            id: id.into(),
            effect,
            description: None,
            target: None,
            condition: None,
            obligations: Vec::new(),
            advice: Vec::new(),
        }
    }

    /// Set the description
    pub fn with_description(self, description: impl Into<SmolStr>) -> Self {
        Self {
            description: Some(description.into()),
            ..self
        }
    }

    /// Set the target
    pub fn with_target(self, target: Target) -> Self {
        Self {
            target: Some(target),
            ..self
        }
    }

    /// Set the condition, which must be a boolean expression
    pub fn with_condition(self, condition: Expr) -> Result<Self, ConditionTypeError> {
        match condition.expr_type() {
            Some(t) if t == ExprType::boolean() => Ok(Self {
                condition: Some(condition),
                ..self
            }),
            other => Err(ConditionTypeError {
                rule_id: self.id.clone(),
                actual: other.map_or_else(|| "function".into(), |t| t.to_string()),
            }),
        }
    }

    /// Add obligation expressions
    pub fn with_obligations(
        mut self,
        obligations: impl IntoIterator<Item = ObligationExpression>,
    ) -> Self {
        self.obligations.extend(obligations);
        self
    }

    /// Add advice expressions
    pub fn with_advice(mut self, advice: impl IntoIterator<Item = AdviceExpression>) -> Self {
        self.advice.extend(advice);
        self
    }

    /// Rule identifier
    pub fn id(&self) -> &SmolStr {
        &self.id
    }

    /// The decision the rule yields when it applies
    pub fn effect(&self) -> Effect {
        self.effect
    }

    /// Free-text description
    pub fn description(&self) -> Option<&SmolStr> {
        self.description.as_ref()
    }

    /// The target; absent means "matches any"
    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    /// The condition; absent means true
    pub fn condition(&self) -> Option<&Expr> {
        self.condition.as_ref()
    }

    /// Obligation expressions
    pub fn obligations(&self) -> &[ObligationExpression] {
        &self.obligations
    }

    /// Advice expressions
    pub fn advice(&self) -> &[AdviceExpression] {
        &self.advice
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::AttributeValue;
    use cool_asserts::assert_matches;

    #[test]
    fn condition_must_be_boolean() {
        assert_matches!(
            Rule::new("r", Effect::Permit).with_condition(Expr::val(true)),
            Ok(r) if r.condition().is_some()
        );
        assert_matches!(
            Rule::new("r", Effect::Permit).with_condition(Expr::val(AttributeValue::Integer(1))),
            Err(ConditionTypeError { rule_id, .. }) if rule_id == "r"
        );
    }
}
