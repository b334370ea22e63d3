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

use crate::ast::*;
use smol_str::SmolStr;
use std::fmt::Display;
use thiserror::Error;

/// An error generated while evaluating an expression, a target or a policy
/// tree. Such errors never escape the engine: they become Indeterminate
/// results carrying a [`Status`].
#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub struct EvaluationError {
    /// The kind of error that occurred
    error_kind: EvaluationErrorKind,
    /// Optional advice on how to fix the error
    advice: Option<String>,
}

impl Display for EvaluationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(help_msg) = &self.advice {
            write!(f, "{}. {}", self.error_kind, help_msg)
        } else {
            self.error_kind.fmt(f)
        }
    }
}

impl EvaluationError {
    /// Extract the kind of issue detected during evaluation
    pub fn error_kind(&self) -> &EvaluationErrorKind {
        &self.error_kind
    }

    /// Set the advice field of an error
    pub fn set_advice(&mut self, advice: String) {
        self.advice = Some(advice);
    }

    fn new(error_kind: EvaluationErrorKind) -> Self {
        Self {
            error_kind,
            advice: None,
        }
    }

    /// Construct a [`EvaluationErrorKind::MissingAttribute`] error
    pub(crate) fn missing_attribute(detail: MissingAttributeDetail) -> Self {
        Self::new(EvaluationErrorKind::MissingAttribute(detail))
    }

    /// Construct a [`EvaluationErrorKind::TypeError`] error
    pub(crate) fn type_error(expected: impl Into<SmolStr>, actual: ExprType) -> Self {
        Self::new(EvaluationErrorKind::TypeError {
            expected: expected.into(),
            actual,
        })
    }

    /// Construct a [`EvaluationErrorKind::WrongNumArguments`] error
    pub(crate) fn wrong_num_arguments(
        function_id: SmolStr,
        expected: usize,
        actual: usize,
    ) -> Self {
        Self::new(EvaluationErrorKind::WrongNumArguments {
            function_id,
            expected,
            actual,
        })
    }

    /// Construct a [`EvaluationErrorKind::FailedFunctionApplication`] error
    pub(crate) fn failed_function_application(
        function_id: impl Into<SmolStr>,
        msg: impl Into<String>,
    ) -> Self {
        Self::new(EvaluationErrorKind::FailedFunctionApplication {
            function_id: function_id.into(),
            msg: msg.into(),
        })
    }

    /// Construct a [`EvaluationErrorKind::NotSingleton`] error
    pub(crate) fn not_singleton(function_id: impl Into<SmolStr>, size: usize) -> Self {
        Self::new(EvaluationErrorKind::NotSingleton {
            function_id: function_id.into(),
            size,
        })
    }

    /// Construct a [`EvaluationErrorKind::InvalidValue`] error
    pub(crate) fn invalid_value(err: ValueError) -> Self {
        Self::new(EvaluationErrorKind::InvalidValue(err))
    }

    /// Construct a [`EvaluationErrorKind::ResolutionFailure`] error
    pub fn resolution_failure(msg: impl Into<String>) -> Self {
        Self::new(EvaluationErrorKind::ResolutionFailure(msg.into()))
    }

    /// Construct a [`EvaluationErrorKind::UnresolvedReference`] error
    pub(crate) fn unresolved_reference(reference: SmolStr) -> Self {
        Self::new(EvaluationErrorKind::UnresolvedReference(reference))
    }

    /// Construct a [`EvaluationErrorKind::ReferenceDepthExceeded`] error
    pub(crate) fn reference_depth_exceeded(limit: usize) -> Self {
        Self::new(EvaluationErrorKind::ReferenceDepthExceeded(limit))
    }

    /// Construct a [`EvaluationErrorKind::AmbiguousApplicability`] error
    pub(crate) fn ambiguous_applicability() -> Self {
        Self::new(EvaluationErrorKind::AmbiguousApplicability)
    }

    /// Construct a [`EvaluationErrorKind::RecursionLimit`] error
    pub(crate) fn recursion_limit() -> Self {
        Self::new(EvaluationErrorKind::RecursionLimit)
    }

    /// Construct a [`EvaluationErrorKind::UnexpectedFunctionReference`] error
    pub(crate) fn unexpected_function_reference(function_id: SmolStr) -> Self {
        Self::new(EvaluationErrorKind::UnexpectedFunctionReference(function_id))
    }

    /// Construct a [`EvaluationErrorKind::Syntax`] error
    pub fn syntax(msg: impl Into<String>) -> Self {
        Self::new(EvaluationErrorKind::Syntax(msg.into()))
    }

    /// Construct a [`EvaluationErrorKind::Processing`] error
    pub fn processing(msg: impl Into<String>) -> Self {
        Self::new(EvaluationErrorKind::Processing(msg.into()))
    }

    /// The XACML status code this error is reported with
    pub fn status_code(&self) -> StatusCode {
        self.error_kind.status_code()
    }

    /// The status reported for this error
    pub fn to_status(&self) -> Status {
        let missing_attributes = match &self.error_kind {
            EvaluationErrorKind::MissingAttribute(detail) => vec![detail.clone()],
            _ => Vec::new(),
        };
        Status {
            code: self.status_code(),
            message: Some(self.to_string()),
            missing_attributes,
        }
    }
}

impl From<ValueError> for EvaluationError {
    fn from(err: ValueError) -> Self {
        Self::invalid_value(err)
    }
}

/// Enumeration of the possible errors that can occur during evaluation
#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum EvaluationErrorKind {
    /// A designator or selector marked must-be-present found nothing
    #[error("missing required attribute {0}")]
    MissingAttribute(MissingAttributeDetail),

    /// A value did not have the expected type
    #[error("type error: expected {expected}, got {actual}")]
    TypeError {
        /// What was expected
        expected: SmolStr,
        /// What was found
        actual: ExprType,
    },

    /// A function was called with the wrong number of arguments
    #[error("wrong number of arguments provided to `{function_id}`: expected {expected}, got {actual}")]
    WrongNumArguments {
        /// Function being called
        function_id: SmolStr,
        /// Expected number of arguments
        expected: usize,
        /// Actual number of arguments
        actual: usize,
    },

    /// A function failed on its arguments (division by zero, overflow, bad
    /// regular expression, ...)
    #[error("error while evaluating `{function_id}`: {msg}")]
    FailedFunctionApplication {
        /// Function being called
        function_id: SmolStr,
        /// Error message
        msg: String,
    },

    /// A `-one-and-only` function was given a bag that is not a singleton
    #[error("`{function_id}` expects a bag of exactly one value, got {size}")]
    NotSingleton {
        /// Function being called
        function_id: SmolStr,
        /// Size of the bag
        size: usize,
    },

    /// A `-from-string` conversion or resolved attribute was not a valid value
    #[error(transparent)]
    InvalidValue(ValueError),

    /// An attribute resolver failed
    #[error("attribute resolution failed: {0}")]
    ResolutionFailure(String),

    /// A policy reference could not be resolved by the policy source
    #[error("unresolved policy reference `{0}`")]
    UnresolvedReference(SmolStr),

    /// Policy references nest deeper than allowed
    #[error("policy references nest deeper than {0} levels")]
    ReferenceDepthExceeded(usize),

    /// More than one policy was applicable under `only-one-applicable`
    #[error("more than one policy is applicable")]
    AmbiguousApplicability,

    /// Maximum recursion limit reached for evaluation
    #[error("recursion limit reached")]
    RecursionLimit,

    /// A function reference appeared outside a higher-order function
    #[error("function `{0}` cannot be evaluated as a value")]
    UnexpectedFunctionReference(SmolStr),

    /// The request or policy is malformed
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Any other processing failure
    #[error("processing error: {0}")]
    Processing(String),
}

impl EvaluationErrorKind {
    /// The XACML status code for this kind of error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingAttribute(_) => StatusCode::MissingAttribute,
            Self::TypeError { .. }
            | Self::WrongNumArguments { .. }
            | Self::UnexpectedFunctionReference(_)
            | Self::Syntax(_) => StatusCode::SyntaxError,
            Self::FailedFunctionApplication { .. }
            | Self::NotSingleton { .. }
            | Self::InvalidValue(_)
            | Self::ResolutionFailure(_)
            | Self::UnresolvedReference(_)
            | Self::ReferenceDepthExceeded(_)
            | Self::AmbiguousApplicability
            | Self::RecursionLimit
            | Self::Processing(_) => StatusCode::ProcessingError,
        }
    }
}

/// Type alias for convenience
pub type Result<T> = std::result::Result<T, EvaluationError>;
