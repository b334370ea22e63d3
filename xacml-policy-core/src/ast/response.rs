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

use super::{Advice, AttributeCategory, DataType, Effect, Obligation, PolicyID, Version};
use crate::evaluator::EvaluationError;
use serde::{Serialize, Serializer};
use smol_str::SmolStr;
use std::fmt;

/// Which effects an Indeterminate result could have had, had evaluation not
/// failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndeterminateKind {
    /// Could only have been Permit
    Permit,
    /// Could only have been Deny
    Deny,
    /// Could have been either
    PermitOrDeny,
}

impl IndeterminateKind {
    /// The Indeterminate kind for a branch whose only possible effect is
    /// `effect`
    pub fn of(effect: Effect) -> Self {
        match effect {
            Effect::Permit => Self::Permit,
            Effect::Deny => Self::Deny,
        }
    }

    /// Whether this Indeterminate could have been `effect`
    pub fn could_be(self, effect: Effect) -> bool {
        matches!(
            (self, effect),
            (Self::PermitOrDeny, _) | (Self::Permit, Effect::Permit) | (Self::Deny, Effect::Deny)
        )
    }
}

impl fmt::Display for IndeterminateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permit => write!(f, "P"),
            Self::Deny => write!(f, "D"),
            Self::PermitOrDeny => write!(f, "DP"),
        }
    }
}

/// An authorization decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// Access is granted
    Permit,
    /// Access is refused
    Deny,
    /// Evaluation failed
    Indeterminate(IndeterminateKind),
    /// No rule or policy applied
    NotApplicable,
}

impl Decision {
    /// The decision for an effect
    pub fn from_effect(effect: Effect) -> Self {
        match effect {
            Effect::Permit => Self::Permit,
            Effect::Deny => Self::Deny,
        }
    }

    /// The effect of a Permit or Deny decision
    pub fn effect(self) -> Option<Effect> {
        match self {
            Self::Permit => Some(Effect::Permit),
            Self::Deny => Some(Effect::Deny),
            _ => None,
        }
    }

    /// Whether this is any kind of Indeterminate
    pub fn is_indeterminate(self) -> bool {
        matches!(self, Self::Indeterminate(_))
    }

    /// The decision as it appears on the wire, without the extended
    /// Indeterminate detail
    pub fn name(self) -> &'static str {
        match self {
            Self::Permit => "Permit",
            Self::Deny => "Deny",
            Self::Indeterminate(_) => "Indeterminate",
            Self::NotApplicable => "NotApplicable",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Indeterminate(kind) => write!(f, "Indeterminate{{{kind}}}"),
            d => write!(f, "{}", d.name()),
        }
    }
}

impl Serialize for Decision {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// XACML status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// Success
    Ok,
    /// A required attribute was absent
    MissingAttribute,
    /// A policy or request was malformed
    SyntaxError,
    /// Any other failure during evaluation
    ProcessingError,
}

impl StatusCode {
    /// The status code URI
    pub fn uri(self) -> &'static str {
        match self {
            Self::Ok => "urn:oasis:names:tc:xacml:1.0:status:ok",
            Self::MissingAttribute => "urn:oasis:names:tc:xacml:1.0:status:missing-attribute",
            Self::SyntaxError => "urn:oasis:names:tc:xacml:1.0:status:syntax-error",
            Self::ProcessingError => "urn:oasis:names:tc:xacml:1.0:status:processing-error",
        }
    }
}

impl Serialize for StatusCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.uri())
    }
}

/// Which attribute was missing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingAttributeDetail {
    /// Category URI
    pub category: SmolStr,
    /// Attribute identifier
    pub attribute_id: SmolStr,
    /// Expected data type
    pub data_type: DataType,
    /// Required issuer, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<SmolStr>,
}

impl fmt::Display for MissingAttributeDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` ({}) in `{}`", self.attribute_id, self.data_type, self.category)?;
        if let Some(issuer) = &self.issuer {
            write!(f, " issued by `{issuer}`")?;
        }
        Ok(())
    }
}

/// Status of a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    /// Status code
    pub code: StatusCode,
    /// Human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Attributes whose absence caused the failure
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_attributes: Vec<MissingAttributeDetail>,
}

impl Status {
    /// A status with the given code and message
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
            missing_attributes: Vec::new(),
        }
    }
}

/// Whether a [`PolicyIdentifier`] names a policy or a policy set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PolicyKind {
    /// A `Policy`
    Policy,
    /// A `PolicySet`
    PolicySet,
}

/// A policy or policy set that contributed to a decision
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyIdentifier {
    /// Policy or policy set
    pub kind: PolicyKind,
    /// Its identifier
    pub id: PolicyID,
    /// Its version
    pub version: Version,
}

/// The outcome of evaluating a rule, a policy, a policy set, or a whole
/// individual request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResult {
    /// The decision
    pub decision: Decision,
    /// Status; absent means `ok`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    /// Obligations the enforcement point must discharge
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub obligations: Vec<Obligation>,
    /// Advice the enforcement point may act on
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub advice: Vec<Advice>,
    /// Request attributes echoed back
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeCategory>,
    /// Policies and policy sets that were applicable
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub policy_identifiers: Vec<PolicyIdentifier>,
}

impl DecisionResult {
    /// A result with just a decision
    pub fn new(decision: Decision) -> Self {
        Self {
            decision,
            status: None,
            obligations: Vec::new(),
            advice: Vec::new(),
            attributes: Vec::new(),
            policy_identifiers: Vec::new(),
        }
    }

    /// NotApplicable
    pub fn not_applicable() -> Self {
        Self::new(Decision::NotApplicable)
    }

    /// Permit or Deny
    pub fn from_effect(effect: Effect) -> Self {
        Self::new(Decision::from_effect(effect))
    }

    /// An Indeterminate result with an explicit status
    pub fn indeterminate(kind: IndeterminateKind, status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::new(Decision::Indeterminate(kind))
        }
    }

    /// An Indeterminate result reporting `err`
    pub fn from_error(kind: IndeterminateKind, err: &EvaluationError) -> Self {
        Self::indeterminate(kind, err.to_status())
    }

    /// The status code, `ok` if none was set
    pub fn status_code(&self) -> StatusCode {
        self.status.as_ref().map_or(StatusCode::Ok, |s| s.code)
    }
}

/// The answer to a request: one result per individual decision
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// The results
    pub results: Vec<DecisionResult>,
}

impl Response {
    /// The decision of a single-result response
    pub fn decision(&self) -> Option<Decision> {
        match self.results.as_slice() {
            [r] => Some(r.decision),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn indeterminate_kinds() {
        assert!(IndeterminateKind::PermitOrDeny.could_be(Effect::Deny));
        assert!(!IndeterminateKind::Permit.could_be(Effect::Deny));
        assert_eq!(
            Decision::Indeterminate(IndeterminateKind::PermitOrDeny).to_string(),
            "Indeterminate{DP}"
        );
    }

    #[test]
    fn serialized_shape() {
        let r = DecisionResult::indeterminate(
            IndeterminateKind::Deny,
            Status::new(StatusCode::ProcessingError, "boom"),
        );
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "decision": "Indeterminate",
                "status": {
                    "code": "urn:oasis:names:tc:xacml:1.0:status:processing-error",
                    "message": "boom"
                }
            })
        );
    }
}
