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

use super::FromEstError;
use crate::ast::{self, AttributeValue, DataType, TypedValue, ValueError};
use crate::functions::{Function, FunctionRegistry};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::HashMap;
use std::sync::Arc;

fn is_false(b: &bool) -> bool {
    !*b
}

/// Serde JSON structure for an expression in the EST format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Expr {
    /// A literal
    Value(TypedValue),
    /// Attribute lookup by identifier
    AttributeDesignator(Designator),
    /// Attribute lookup by path
    AttributeSelector(Selector),
    /// Function application
    Apply(Apply),
    /// A function passed to a higher-order function, by identifier
    Function(SmolStr),
    /// Reference to a variable of the enclosing policy
    VariableReference(SmolStr),
}

/// Serde JSON structure for a function application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct Apply {
    /// Function identifier
    pub function_id: SmolStr,
    /// Arguments, in order
    #[serde(default)]
    pub arguments: Vec<Expr>,
}

/// Serde JSON structure for an attribute designator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct Designator {
    /// Category URI
    pub category: SmolStr,
    /// Attribute identifier
    pub attribute_id: SmolStr,
    /// Data type URI
    pub data_type: SmolStr,
    /// Required issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<SmolStr>,
    /// Whether an empty result is an error
    #[serde(default, skip_serializing_if = "is_false")]
    pub must_be_present: bool,
}

/// Serde JSON structure for an attribute selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct Selector {
    /// Category URI
    pub category: SmolStr,
    /// Data type URI
    pub data_type: SmolStr,
    /// The path
    pub path: SmolStr,
    /// Attribute holding the context node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_selector_id: Option<SmolStr>,
    /// Whether an empty result is an error
    #[serde(default, skip_serializing_if = "is_false")]
    pub must_be_present: bool,
    /// Version of the path language
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath_version: Option<SmolStr>,
}

/// Serde JSON structure for a variable definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct VariableDefinition {
    /// Variable name
    pub variable_id: SmolStr,
    /// Bound expression
    pub expr: Expr,
}

fn data_type(uri: &SmolStr) -> Result<DataType, FromEstError> {
    DataType::from_uri(uri).ok_or_else(|| ValueError::UnknownDataType(uri.clone()).into())
}

pub(super) fn function(
    functions: &FunctionRegistry,
    id: &SmolStr,
) -> Result<Arc<Function>, FromEstError> {
    functions
        .get(id)
        .cloned()
        .ok_or_else(|| FromEstError::UnknownFunction(id.clone()))
}

/// The variable definitions of one policy, converted on first use so that
/// definitions may appear in any order
#[derive(Debug)]
pub(super) struct Variables<'a> {
    definitions: HashMap<&'a str, &'a Expr>,
    resolved: HashMap<SmolStr, Arc<ast::VariableDefinition>>,
    resolving: Vec<SmolStr>,
}

impl<'a> Variables<'a> {
    pub(super) fn new(definitions: &'a [VariableDefinition]) -> Result<Self, FromEstError> {
        let mut by_id = HashMap::with_capacity(definitions.len());
        for def in definitions {
            if by_id.insert(def.variable_id.as_str(), &def.expr).is_some() {
                return Err(FromEstError::DuplicateVariable(def.variable_id.clone()));
            }
        }
        Ok(Self {
            definitions: by_id,
            resolved: HashMap::new(),
            resolving: Vec::new(),
        })
    }

    /// A scope with no variables
    pub(super) fn none() -> Self {
        Self {
            definitions: HashMap::new(),
            resolved: HashMap::new(),
            resolving: Vec::new(),
        }
    }

    pub(super) fn resolve(
        &mut self,
        id: &SmolStr,
        functions: &FunctionRegistry,
    ) -> Result<Arc<ast::VariableDefinition>, FromEstError> {
        if let Some(def) = self.resolved.get(id) {
            return Ok(Arc::clone(def));
        }
        if self.resolving.contains(id) {
            return Err(FromEstError::CyclicVariable(id.clone()));
        }
        let expr = *self
            .definitions
            .get(id.as_str())
            .ok_or_else(|| FromEstError::UndefinedVariable(id.clone()))?;
        self.resolving.push(id.clone());
        let converted = expr.to_ast(functions, self);
        self.resolving.pop();
        let def = Arc::new(ast::VariableDefinition {
            id: id.clone(),
            expr: converted?,
        });
        self.resolved.insert(id.clone(), Arc::clone(&def));
        Ok(def)
    }
}

impl Expr {
    /// Convert into an AST expression, resolving function identifiers and
    /// checking every application's argument types
    pub(super) fn to_ast(
        &self,
        functions: &FunctionRegistry,
        variables: &mut Variables<'_>,
    ) -> Result<ast::Expr, FromEstError> {
        match self {
            Self::Value(v) => Ok(ast::Expr::Value(AttributeValue::try_from(v.clone())?)),
            Self::AttributeDesignator(d) => Ok(ast::Expr::Designator(d.to_ast()?)),
            Self::AttributeSelector(s) => Ok(ast::Expr::Selector(s.to_ast()?)),
            Self::Apply(apply) => {
                let f = function(functions, &apply.function_id)?;
                let args = apply
                    .arguments
                    .iter()
                    .map(|arg| arg.to_ast(functions, variables))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ast::Expr::apply(f, args)?)
            }
            Self::Function(id) => Ok(ast::Expr::Function(function(functions, id)?)),
            Self::VariableReference(id) => Ok(ast::Expr::Variable(ast::VariableReference {
                definition: variables.resolve(id, functions)?,
            })),
        }
    }
}

impl Designator {
    pub(super) fn to_ast(&self) -> Result<ast::AttributeDesignator, FromEstError> {
        Ok(ast::AttributeDesignator {
            category: self.category.clone(),
            attribute_id: self.attribute_id.clone(),
            data_type: data_type(&self.data_type)?,
            issuer: self.issuer.clone(),
            must_be_present: self.must_be_present,
        })
    }
}

impl Selector {
    pub(super) fn to_ast(&self) -> Result<ast::AttributeSelector, FromEstError> {
        Ok(ast::AttributeSelector {
            category: self.category.clone(),
            data_type: data_type(&self.data_type)?,
            context_selector_id: self.context_selector_id.clone(),
            path: self.path.clone(),
            must_be_present: self.must_be_present,
            xpath_version: self.xpath_version.clone(),
        })
    }
}

impl From<&ast::Expr> for Expr {
    fn from(expr: &ast::Expr) -> Self {
        match expr {
            ast::Expr::Value(v) => Self::Value(v.clone().into()),
            ast::Expr::Designator(d) => Self::AttributeDesignator(d.into()),
            ast::Expr::Selector(s) => Self::AttributeSelector(s.into()),
            ast::Expr::Apply(apply) => Self::Apply(Apply {
                function_id: apply.function().id().clone(),
                arguments: apply.args().iter().map(Self::from).collect(),
            }),
            ast::Expr::Function(f) => Self::Function(f.id().clone()),
            ast::Expr::Variable(v) => Self::VariableReference(v.id().clone()),
        }
    }
}

impl From<&ast::AttributeDesignator> for Designator {
    fn from(d: &ast::AttributeDesignator) -> Self {
        Self {
            category: d.category.clone(),
            attribute_id: d.attribute_id.clone(),
            data_type: d.data_type.uri(),
            issuer: d.issuer.clone(),
            must_be_present: d.must_be_present,
        }
    }
}

impl From<&ast::AttributeSelector> for Selector {
    fn from(s: &ast::AttributeSelector) -> Self {
        Self {
            category: s.category.clone(),
            data_type: s.data_type.uri(),
            path: s.path.clone(),
            context_selector_id: s.context_selector_id.clone(),
            must_be_present: s.must_be_present,
            xpath_version: s.xpath_version.clone(),
        }
    }
}

impl From<&ast::VariableDefinition> for VariableDefinition {
    fn from(def: &ast::VariableDefinition) -> Self {
        Self {
            variable_id: def.id.clone(),
            expr: (&def.expr).into(),
        }
    }
}
