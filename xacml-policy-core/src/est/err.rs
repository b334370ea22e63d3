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

use crate::ast::{self, ConditionTypeError, UnknownXacmlVersion, ValueError, VersionError};
use crate::functions::FunctionInputError;
use miette::Diagnostic;
use smol_str::SmolStr;
use thiserror::Error;

/// Errors arising while converting policies from their JSON representation
/// (aka EST) into an AST
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
pub enum FromEstError {
    /// A function identifier is not registered
    #[error("unknown function `{0}`")]
    #[diagnostic(help("custom functions must be registered before policies are loaded"))]
    UnknownFunction(SmolStr),
    /// A rule-combining algorithm identifier is not registered
    #[error("unknown rule-combining algorithm `{0}`")]
    UnknownRuleAlgorithm(SmolStr),
    /// A policy-combining algorithm identifier is not registered
    #[error("unknown policy-combining algorithm `{0}`")]
    UnknownPolicyAlgorithm(SmolStr),
    /// A literal or a data type identifier is invalid
    #[error(transparent)]
    #[diagnostic(transparent)]
    Value(#[from] ValueError),
    /// An application or a match does not type check
    #[error(transparent)]
    #[diagnostic(transparent)]
    FunctionInput(#[from] FunctionInputError),
    /// A condition is not boolean
    #[error(transparent)]
    #[diagnostic(transparent)]
    Condition(#[from] ConditionTypeError),
    /// A variable reference names no definition of the enclosing policy
    #[error("variable `{0}` is not defined")]
    UndefinedVariable(SmolStr),
    /// Two definitions of one policy share a name
    #[error("variable `{0}` is defined more than once")]
    DuplicateVariable(SmolStr),
    /// A variable depends on itself
    #[error("variable `{0}` is defined in terms of itself")]
    CyclicVariable(SmolStr),
    /// A version or version pattern is malformed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Version(#[from] VersionError),
    /// An XACML version is not supported
    #[error(transparent)]
    #[diagnostic(transparent)]
    XacmlVersion(#[from] UnknownXacmlVersion),
    /// Combiner parameters name a child that does not exist
    #[error("combiner parameters refer to `{0}`, which is not a child of this node")]
    UnknownCombinerChild(SmolStr),
    /// The target layout does not belong to the declared XACML version
    #[error("a XACML {version} node cannot have a {layout} target")]
    #[diagnostic(help("XACML 3.0 targets use `anyOf`; older versions use `legacy`"))]
    TargetLayout {
        /// Declared version
        version: ast::XacmlVersion,
        /// Layout found
        layout: &'static str,
    },
    /// An error inside the named policy, policy set or rule
    #[error("in `{id}`: {error}")]
    In {
        /// Identifier of the enclosing node
        id: SmolStr,
        /// The underlying error
        error: Box<FromEstError>,
    },
}

impl FromEstError {
    /// Attach the identifier of the node the error occurred in
    pub(crate) fn within(self, id: impl Into<SmolStr>) -> Self {
        Self::In {
            id: id.into(),
            error: Box::new(self),
        }
    }

    /// The innermost error, without node context
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::In { error, .. } => error.root_cause(),
            other => other,
        }
    }
}

/// Errors converting a request from its JSON representation
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
pub enum RequestError {
    /// A category has no URI
    #[error("attribute category URI is empty")]
    EmptyCategory,
    /// A value of an attribute is invalid
    #[error("invalid value for attribute `{attribute_id}`: {error}")]
    InvalidValue {
        /// The attribute
        attribute_id: SmolStr,
        /// What was wrong with the value
        error: ValueError,
    },
}
