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

use super::expr::Variables;
use super::{Expr, FromEstError, Target};
use crate::ast::{self, AttributeValue, Effect, TypedValue, XacmlVersion};
use crate::functions::FunctionRegistry;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Serde JSON structure for a rule in the EST format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct Rule {
    /// Rule identifier
    pub rule_id: SmolStr,
    /// Effect when the rule applies
    pub effect: Effect,
    /// Free text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<SmolStr>,
    /// Target; absent means the rule applies to every request its policy
    /// applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    /// Boolean condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Expr>,
    /// Obligations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obligations: Vec<Obligation>,
    /// Advice
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advice: Vec<Obligation>,
}

/// Serde JSON structure for an obligation or advice expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct Obligation {
    /// Obligation or advice identifier
    pub id: SmolStr,
    /// The decision it accompanies
    pub fulfill_on: Effect,
    /// Assignments, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignments: Vec<Assignment>,
}

/// Serde JSON structure for an attribute assignment expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct Assignment {
    /// Assigned attribute
    pub attribute_id: SmolStr,
    /// Category of the assigned attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<SmolStr>,
    /// Issuer of the assigned attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<SmolStr>,
    /// The value
    pub expr: Expr,
}

/// Serde JSON structure for a combiner parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct CombinerParameter {
    /// Parameter name
    pub parameter_name: SmolStr,
    /// Parameter value
    pub value: TypedValue,
}

/// Serde JSON structure for the combiner parameters of one child, which is
/// named by its identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct ChildParameters {
    /// Identifier of the rule, policy or policy set
    pub id: SmolStr,
    /// Its parameters
    pub parameters: Vec<CombinerParameter>,
}

impl Rule {
    pub(super) fn to_ast(
        &self,
        functions: &FunctionRegistry,
        version: XacmlVersion,
        variables: &mut Variables<'_>,
    ) -> Result<ast::Rule, FromEstError> {
        let convert = |variables: &mut Variables<'_>| -> Result<ast::Rule, FromEstError> {
            let mut rule = ast::Rule::new(self.rule_id.clone(), self.effect)
                .with_obligations(obligations(&self.obligations, functions, variables)?)
                .with_advice(obligations(&self.advice, functions, variables)?);
            if let Some(description) = &self.description {
                rule = rule.with_description(description.clone());
            }
            if let Some(target) = &self.target {
                rule = rule.with_target(target.to_ast(functions, version)?);
            }
            if let Some(condition) = &self.condition {
                rule = rule.with_condition(condition.to_ast(functions, variables)?)?;
            }
            Ok(rule)
        };
        convert(variables).map_err(|e| e.within(self.rule_id.clone()))
    }
}

impl From<&ast::Rule> for Rule {
    fn from(rule: &ast::Rule) -> Self {
        Self {
            rule_id: rule.id().clone(),
            effect: rule.effect(),
            description: rule.description().cloned(),
            target: rule.target().and_then(Target::from_ast),
            condition: rule.condition().map(Expr::from),
            obligations: rule.obligations().iter().map(Obligation::from).collect(),
            advice: rule.advice().iter().map(Obligation::from).collect(),
        }
    }
}

pub(super) fn obligations(
    obligations: &[Obligation],
    functions: &FunctionRegistry,
    variables: &mut Variables<'_>,
) -> Result<Vec<ast::ObligationExpression>, FromEstError> {
    obligations
        .iter()
        .map(|o| {
            let assignments = o
                .assignments
                .iter()
                .map(|a| {
                    Ok(ast::AttributeAssignmentExpression {
                        attribute_id: a.attribute_id.clone(),
                        category: a.category.clone(),
                        issuer: a.issuer.clone(),
                        expr: a.expr.to_ast(functions, variables)?,
                    })
                })
                .collect::<Result<Vec<_>, FromEstError>>()?;
            Ok(ast::ObligationExpression {
                id: o.id.clone(),
                applies_to: o.fulfill_on,
                assignments,
            })
        })
        .collect()
}

impl From<&ast::ObligationExpression> for Obligation {
    fn from(o: &ast::ObligationExpression) -> Self {
        Self {
            id: o.id.clone(),
            fulfill_on: o.applies_to,
            assignments: o
                .assignments
                .iter()
                .map(|a| Assignment {
                    attribute_id: a.attribute_id.clone(),
                    category: a.category.clone(),
                    issuer: a.issuer.clone(),
                    expr: (&a.expr).into(),
                })
                .collect(),
        }
    }
}

pub(super) fn parameters(
    parameters: &[CombinerParameter],
) -> Result<Vec<ast::CombinerParameter>, FromEstError> {
    parameters
        .iter()
        .map(|p| {
            Ok(ast::CombinerParameter {
                name: p.parameter_name.clone(),
                value: AttributeValue::try_from(p.value.clone())?,
            })
        })
        .collect()
}

impl From<&ast::CombinerParameter> for CombinerParameter {
    fn from(p: &ast::CombinerParameter) -> Self {
        Self {
            parameter_name: p.name.clone(),
            value: p.value.clone().into(),
        }
    }
}

/// Reject entries naming none of `child_ids`
pub(super) fn check_child_parameters(
    entries: &[ChildParameters],
    child_ids: &[&str],
) -> Result<(), FromEstError> {
    match entries.iter().find(|e| !child_ids.contains(&e.id.as_str())) {
        Some(stray) => Err(FromEstError::UnknownCombinerChild(stray.id.clone())),
        None => Ok(()),
    }
}

/// The parameters addressed to the child `id`
pub(super) fn parameters_for(
    entries: &[ChildParameters],
    id: &str,
) -> Result<Vec<ast::CombinerParameter>, FromEstError> {
    let mut all = Vec::new();
    for entry in entries.iter().filter(|e| e.id == id) {
        all.extend(parameters(&entry.parameters)?);
    }
    Ok(all)
}

/// The EST entries for children that carry parameters
pub(super) fn child_parameters_from_ast<'a, T: 'a>(
    children: impl IntoIterator<Item = &'a ast::CombinerElement<T>>,
    id: impl Fn(&T) -> SmolStr,
) -> Vec<ChildParameters> {
    children
        .into_iter()
        .filter(|c| !c.parameters.is_empty())
        .map(|c| ChildParameters {
            id: id(&c.element),
            parameters: c.parameters.iter().map(CombinerParameter::from).collect(),
        })
        .collect()
}
