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

use super::{AttributeValue, DataType, ExprType, MissingAttributeDetail};
use crate::attributes::{AttributeQuery, SelectorQuery};
use crate::functions::{Function, FunctionInputError};
use smol_str::SmolStr;
use std::sync::Arc;

/// Expression AST.
///
/// Expressions are built once, when a policy is loaded, and are never
/// mutated afterwards. Every [`Apply`] has already passed its function's
/// input check, so its static type is known.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value
    Value(AttributeValue),
    /// Look up attributes by category and identifier
    Designator(AttributeDesignator),
    /// Look up attributes by path into category content
    Selector(AttributeSelector),
    /// Apply a function to argument expressions
    Apply(Apply),
    /// A function passed as an argument to a higher-order function
    Function(Arc<Function>),
    /// Reference to a variable defined in the enclosing policy
    Variable(VariableReference),
}

/// The type of one argument, as seen by [`Function::check_inputs`]
#[derive(Debug, Clone, Copy)]
pub enum ArgType<'a> {
    /// An expression producing a value or a bag
    Value(ExprType),
    /// A function reference
    Function(&'a Function),
}

impl Expr {
    /// A literal
    pub fn val(v: impl Into<AttributeValue>) -> Self {
        Self::Value(v.into())
    }

    /// Apply `function` to `args`, checking the argument types
    pub fn apply(function: Arc<Function>, args: Vec<Expr>) -> Result<Self, FunctionInputError> {
        Apply::new(function, args).map(Self::Apply)
    }

    /// The static type of the expression, or `None` for a function reference
    pub fn expr_type(&self) -> Option<ExprType> {
        match self.arg_type() {
            ArgType::Value(t) => Some(t),
            ArgType::Function(_) => None,
        }
    }

    /// How this expression looks to a function's input check
    pub fn arg_type(&self) -> ArgType<'_> {
        match self {
            Self::Value(v) => ArgType::Value(ExprType::scalar(v.data_type())),
            Self::Designator(d) => ArgType::Value(ExprType::bag(d.data_type)),
            Self::Selector(s) => ArgType::Value(ExprType::bag(s.data_type)),
            Self::Apply(a) => ArgType::Value(a.return_type),
            Self::Function(f) => ArgType::Function(f),
            Self::Variable(v) => v.definition.expr.arg_type(),
        }
    }
}

/// A function applied to arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Apply {
    function: Arc<Function>,
    args: Vec<Expr>,
    return_type: ExprType,
}

impl Apply {
    /// Build an application, rejecting argument lists the function cannot
    /// accept
    pub fn new(function: Arc<Function>, args: Vec<Expr>) -> Result<Self, FunctionInputError> {
        let types: Vec<ArgType<'_>> = args.iter().map(Expr::arg_type).collect();
        let return_type = function.check_inputs(&types)?;
        Ok(Self {
            function,
            args,
            return_type,
        })
    }

    /// The function being applied
    pub fn function(&self) -> &Arc<Function> {
        &self.function
    }

    /// The argument expressions
    pub fn args(&self) -> &[Expr] {
        &self.args
    }

    /// The static result type
    pub fn return_type(&self) -> ExprType {
        self.return_type
    }
}

/// Query attributes by category, identifier, data type and issuer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeDesignator {
    /// Category URI
    pub category: SmolStr,
    /// Attribute identifier
    pub attribute_id: SmolStr,
    /// Data type of the values
    pub data_type: DataType,
    /// Required issuer
    pub issuer: Option<SmolStr>,
    /// Whether an empty result is an error
    pub must_be_present: bool,
}

impl AttributeDesignator {
    /// A designator with no issuer that tolerates absence
    pub fn new(
        category: impl Into<SmolStr>,
        attribute_id: impl Into<SmolStr>,
        data_type: DataType,
    ) -> Self {
        Self {
            category: category.into(),
            attribute_id: attribute_id.into(),
            data_type,
            issuer: None,
            must_be_present: false,
        }
    }

    /// Require a non-empty result
    pub fn required(self) -> Self {
        Self {
            must_be_present: true,
            ..self
        }
    }

    /// The query this designator issues
    pub fn query(&self) -> AttributeQuery<'_> {
        AttributeQuery {
            category: &self.category,
            attribute_id: &self.attribute_id,
            data_type: self.data_type,
            issuer: self.issuer.as_deref(),
        }
    }

    /// Status detail reported when a required attribute is absent
    pub fn missing_detail(&self) -> MissingAttributeDetail {
        MissingAttributeDetail {
            category: self.category.clone(),
            attribute_id: self.attribute_id.clone(),
            data_type: self.data_type,
            issuer: self.issuer.clone(),
        }
    }
}

/// Query attributes by a path into a category's content
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeSelector {
    /// Category URI
    pub category: SmolStr,
    /// Data type of the selected values
    pub data_type: DataType,
    /// Attribute holding the context node for `path`
    pub context_selector_id: Option<SmolStr>,
    /// The path
    pub path: SmolStr,
    /// Whether an empty result is an error
    pub must_be_present: bool,
    /// Version of the path language
    pub xpath_version: Option<SmolStr>,
}

impl AttributeSelector {
    /// The query this selector issues
    pub fn query(&self) -> SelectorQuery<'_> {
        SelectorQuery {
            category: &self.category,
            data_type: self.data_type,
            context_selector_id: self.context_selector_id.as_deref(),
            path: &self.path,
            xpath_version: self.xpath_version.as_deref(),
        }
    }

    /// Status detail reported when a required selection is empty
    pub fn missing_detail(&self) -> MissingAttributeDetail {
        MissingAttributeDetail {
            category: self.category.clone(),
            attribute_id: self.path.clone(),
            data_type: self.data_type,
            issuer: None,
        }
    }
}

/// A named expression shared by the conditions of one policy
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    /// Variable name
    pub id: SmolStr,
    /// Bound expression
    pub expr: Expr,
}

/// Reference to a [`VariableDefinition`]
#[derive(Debug, Clone, PartialEq)]
pub struct VariableReference {
    /// The definition referred to
    pub definition: Arc<VariableDefinition>,
}

impl VariableReference {
    /// The variable name
    pub fn id(&self) -> &SmolStr {
        &self.definition.id
    }
}
