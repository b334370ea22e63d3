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

use super::{AttributeValue, Effect, Expr};
use serde::Serialize;
use smol_str::SmolStr;

/// One assignment of an obligation or advice expression. The expression is
/// evaluated when the decision is made; static assignments are literals.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeAssignmentExpression {
    /// Identifier of the assigned attribute
    pub attribute_id: SmolStr,
    /// Category of the assigned attribute
    pub category: Option<SmolStr>,
    /// Issuer of the assigned attribute
    pub issuer: Option<SmolStr>,
    /// The value; a bag yields one assignment per member
    pub expr: Expr,
}

/// An obligation or advice as written in a policy or rule
#[derive(Debug, Clone, PartialEq)]
pub struct ObligationExpression {
    /// Obligation identifier
    pub id: SmolStr,
    /// The decision this obligation accompanies
    pub applies_to: Effect,
    /// Assignments, in order
    pub assignments: Vec<AttributeAssignmentExpression>,
}

/// Advice has the same shape as an obligation; only its force differs
pub type AdviceExpression = ObligationExpression;

impl ObligationExpression {
    /// An obligation with no assignments
    pub fn new(id: impl Into<SmolStr>, applies_to: Effect) -> Self {
        Self {
            id: id.into(),
            applies_to,
            assignments: Vec::new(),
        }
    }

    /// Add an assignment
    pub fn with_assignment(mut self, attribute_id: impl Into<SmolStr>, expr: Expr) -> Self {
        self.assignments.push(AttributeAssignmentExpression {
            attribute_id: attribute_id.into(),
            category: None,
            issuer: None,
            expr,
        });
        self
    }
}

/// An evaluated assignment, as returned to the enforcement point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeAssignment {
    /// Identifier of the assigned attribute
    pub attribute_id: SmolStr,
    /// Category of the assigned attribute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<SmolStr>,
    /// Issuer of the assigned attribute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<SmolStr>,
    /// The value
    #[serde(flatten)]
    pub value: AttributeValue,
}

/// An obligation attached to a decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Obligation {
    /// Obligation identifier
    pub id: SmolStr,
    /// The decision it accompanies
    pub fulfill_on: Effect,
    /// Evaluated assignments
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assignments: Vec<AttributeAssignment>,
}

/// Advice attached to a decision
pub type Advice = Obligation;
