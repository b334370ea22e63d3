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

//! Policies, policy sets and policy references.
//!
//! The policy tree is a tagged union ([`PolicyTree`]) rather than a class
//! hierarchy; each node records the XACML version whose semantics apply to
//! it.

use super::{
    AdviceExpression, AttributeValue, ObligationExpression, PolicyID, PolicyIdentifier,
    PolicyKind, Rule, Target, VariableDefinition, Version, VersionConstraints,
};
use crate::combining::CombiningAlgorithm;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// The XACML version a policy was written for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum XacmlVersion {
    /// XACML 1.0
    #[serde(rename = "1.0")]
    V1_0,
    /// XACML 1.1
    #[serde(rename = "1.1")]
    V1_1,
    /// XACML 2.0
    #[serde(rename = "2.0")]
    V2_0,
    /// XACML 3.0
    #[serde(rename = "3.0")]
    V3_0,
}

impl XacmlVersion {
    /// Versions before 3.0, which share the older target and Indeterminate
    /// semantics
    pub fn is_legacy(self) -> bool {
        self != Self::V3_0
    }
}

impl Default for XacmlVersion {
    fn default() -> Self {
        Self::V3_0
    }
}

impl fmt::Display for XacmlVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::V1_0 => "1.0",
            Self::V1_1 => "1.1",
            Self::V2_0 => "2.0",
            Self::V3_0 => "3.0",
        };
        write!(f, "{s}")
    }
}

/// Unknown XACML version string
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
#[error("unknown XACML version `{0}`")]
#[diagnostic(help("supported versions are 1.0, 1.1, 2.0 and 3.0"))]
pub struct UnknownXacmlVersion(pub SmolStr);

impl FromStr for XacmlVersion {
    type Err = UnknownXacmlVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1.0" => Ok(Self::V1_0),
            "1.1" => Ok(Self::V1_1),
            "2.0" => Ok(Self::V2_0),
            "3.0" => Ok(Self::V3_0),
            other => Err(UnknownXacmlVersion(other.into())),
        }
    }
}

/// A named constant made available to a combining algorithm
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CombinerParameter {
    /// Parameter name
    pub name: SmolStr,
    /// Parameter value
    pub value: AttributeValue,
}

/// A child of a policy or policy set together with the combiner parameters
/// that apply to it. The parameters are only seen by the combining
/// algorithm, never by the child itself.
#[derive(Debug, Clone)]
pub struct CombinerElement<T> {
    /// The child
    pub element: T,
    /// Parameters for this child
    pub parameters: Vec<CombinerParameter>,
}

impl<T> CombinerElement<T> {
    /// A child without parameters
    pub fn new(element: T) -> Self {
        Self {
            element,
            parameters: Vec::new(),
        }
    }
}

/// A policy: rules folded by a rule-combining algorithm
#[derive(Debug, Clone)]
pub struct Policy {
    id: PolicyID,
    version: Version,
    xacml_version: XacmlVersion,
    description: Option<SmolStr>,
    target: Target,
    algorithm: Arc<dyn CombiningAlgorithm>,
    parameters: Vec<CombinerParameter>,
    variables: Vec<Arc<VariableDefinition>>,
    rules: Vec<CombinerElement<Rule>>,
    obligations: Vec<ObligationExpression>,
    advice: Vec<AdviceExpression>,
}

impl Policy {
    /// An XACML 3.0 policy, version 1.0, with an empty target and no rules
    pub fn new(id: PolicyID, algorithm: Arc<dyn CombiningAlgorithm>) -> Self {
        Self {
            id,
            version: Version::default(),
            xacml_version: XacmlVersion::default(),
            description: None,
            target: Target::any(),
            algorithm,
            parameters: Vec::new(),
            variables: Vec::new(),
            rules: Vec::new(),
            obligations: Vec::new(),
            advice: Vec::new(),
        }
    }

    /// Set the policy version
    pub fn with_version(self, version: Version) -> Self {
        Self { version, ..self }
    }

    /// Set the XACML version
    pub fn with_xacml_version(self, xacml_version: XacmlVersion) -> Self {
        Self {
            xacml_version,
            ..self
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
        Self { target, ..self }
    }

    /// Add policy-wide combiner parameters
    pub fn with_parameters(
        mut self,
        parameters: impl IntoIterator<Item = CombinerParameter>,
    ) -> Self {
        self.parameters.extend(parameters);
        self
    }

    /// Record a variable definition
    pub fn with_variable(mut self, variable: Arc<VariableDefinition>) -> Self {
        self.variables.push(variable);
        self
    }

    /// Append a rule
    pub fn with_rule(self, rule: Rule) -> Self {
        self.with_rule_element(CombinerElement::new(rule))
    }

    /// Append a rule with combiner parameters
    pub fn with_rule_element(mut self, rule: CombinerElement<Rule>) -> Self {
        self.rules.push(rule);
        self
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

    /// Policy identifier
    pub fn id(&self) -> &PolicyID {
        &self.id
    }

    /// Policy version
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// XACML version
    pub fn xacml_version(&self) -> XacmlVersion {
        self.xacml_version
    }

    /// Description
    pub fn description(&self) -> Option<&SmolStr> {
        self.description.as_ref()
    }

    /// Target
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Rule-combining algorithm
    pub fn algorithm(&self) -> &Arc<dyn CombiningAlgorithm> {
        &self.algorithm
    }

    /// Policy-wide combiner parameters
    pub fn parameters(&self) -> &[CombinerParameter] {
        &self.parameters
    }

    /// Variable definitions, in declaration order
    pub fn variables(&self) -> &[Arc<VariableDefinition>] {
        &self.variables
    }

    /// Rules, in document order
    pub fn rules(&self) -> &[CombinerElement<Rule>] {
        &self.rules
    }

    /// Obligation expressions
    pub fn obligations(&self) -> &[ObligationExpression] {
        &self.obligations
    }

    /// Advice expressions
    pub fn advice(&self) -> &[AdviceExpression] {
        &self.advice
    }

    /// How this policy appears in a policy identifier list
    pub fn identifier(&self) -> PolicyIdentifier {
        PolicyIdentifier {
            kind: PolicyKind::Policy,
            id: self.id.clone(),
            version: self.version.clone(),
        }
    }
}

/// A policy set: policies, policy sets and references folded by a
/// policy-combining algorithm
#[derive(Debug, Clone)]
pub struct PolicySet {
    id: PolicyID,
    version: Version,
    xacml_version: XacmlVersion,
    description: Option<SmolStr>,
    target: Target,
    algorithm: Arc<dyn CombiningAlgorithm>,
    parameters: Vec<CombinerParameter>,
    children: Vec<CombinerElement<PolicyTree>>,
    obligations: Vec<ObligationExpression>,
    advice: Vec<AdviceExpression>,
}

impl PolicySet {
    /// An XACML 3.0 policy set, version 1.0, with an empty target and no
    /// children
    pub fn new(id: PolicyID, algorithm: Arc<dyn CombiningAlgorithm>) -> Self {
        Self {
            id,
            version: Version::default(),
            xacml_version: XacmlVersion::default(),
            description: None,
            target: Target::any(),
            algorithm,
            parameters: Vec::new(),
            children: Vec::new(),
            obligations: Vec::new(),
            advice: Vec::new(),
        }
    }

    /// Set the policy set version
    pub fn with_version(self, version: Version) -> Self {
        Self { version, ..self }
    }

    /// Set the XACML version
    pub fn with_xacml_version(self, xacml_version: XacmlVersion) -> Self {
        Self {
            xacml_version,
            ..self
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
        Self { target, ..self }
    }

    /// Add set-wide combiner parameters
    pub fn with_parameters(
        mut self,
        parameters: impl IntoIterator<Item = CombinerParameter>,
    ) -> Self {
        self.parameters.extend(parameters);
        self
    }

    /// Append a child
    pub fn with_child(self, child: PolicyTree) -> Self {
        self.with_child_element(CombinerElement::new(child))
    }

    /// Append a child with combiner parameters
    pub fn with_child_element(mut self, child: CombinerElement<PolicyTree>) -> Self {
        self.children.push(child);
        self
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

    /// Policy set identifier
    pub fn id(&self) -> &PolicyID {
        &self.id
    }

    /// Policy set version
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// XACML version
    pub fn xacml_version(&self) -> XacmlVersion {
        self.xacml_version
    }

    /// Description
    pub fn description(&self) -> Option<&SmolStr> {
        self.description.as_ref()
    }

    /// Target
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Policy-combining algorithm
    pub fn algorithm(&self) -> &Arc<dyn CombiningAlgorithm> {
        &self.algorithm
    }

    /// Set-wide combiner parameters
    pub fn parameters(&self) -> &[CombinerParameter] {
        &self.parameters
    }

    /// Children, in document order
    pub fn children(&self) -> &[CombinerElement<PolicyTree>] {
        &self.children
    }

    /// Obligation expressions
    pub fn obligations(&self) -> &[ObligationExpression] {
        &self.obligations
    }

    /// Advice expressions
    pub fn advice(&self) -> &[AdviceExpression] {
        &self.advice
    }

    /// How this policy set appears in a policy identifier list
    pub fn identifier(&self) -> PolicyIdentifier {
        PolicyIdentifier {
            kind: PolicyKind::PolicySet,
            id: self.id.clone(),
            version: self.version.clone(),
        }
    }
}

/// A reference to a policy or policy set held by the policy source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PolicyReference {
    /// Whether a policy or a policy set is referenced
    pub kind: PolicyKind,
    /// Identifier of the referenced node
    pub id: PolicyID,
    /// Constraints on its version
    pub constraints: VersionConstraints,
}

impl PolicyReference {
    /// Whether `tree` is a node this reference can resolve to
    pub fn accepts(&self, tree: &PolicyTree) -> bool {
        let kind = match tree {
            PolicyTree::Policy(_) => PolicyKind::Policy,
            PolicyTree::PolicySet(_) => PolicyKind::PolicySet,
            PolicyTree::Reference(_) => return false,
        };
        kind == self.kind
            && tree.id() == &self.id
            && tree
                .version()
                .is_some_and(|v| self.constraints.satisfied_by(v))
    }
}

impl fmt::Display for PolicyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            PolicyKind::Policy => "policy",
            PolicyKind::PolicySet => "policy set",
        };
        write!(f, "{kind} `{}`", self.id)
    }
}

/// A node of the policy tree
#[derive(Debug, Clone)]
pub enum PolicyTree {
    /// A policy
    Policy(Arc<Policy>),
    /// A policy set
    PolicySet(Arc<PolicySet>),
    /// A reference resolved through the policy source at evaluation time
    Reference(PolicyReference),
}

impl PolicyTree {
    /// The identifier of the node, or of the referenced node
    pub fn id(&self) -> &PolicyID {
        match self {
            Self::Policy(p) => p.id(),
            Self::PolicySet(s) => s.id(),
            Self::Reference(r) => &r.id,
        }
    }

    /// The version, unknown for references
    pub fn version(&self) -> Option<&Version> {
        match self {
            Self::Policy(p) => Some(p.version()),
            Self::PolicySet(s) => Some(s.version()),
            Self::Reference(_) => None,
        }
    }

    /// The target, unknown for references
    pub fn target(&self) -> Option<&Target> {
        match self {
            Self::Policy(p) => Some(p.target()),
            Self::PolicySet(s) => Some(s.target()),
            Self::Reference(_) => None,
        }
    }

    /// The XACML version, unknown for references
    pub fn xacml_version(&self) -> Option<XacmlVersion> {
        match self {
            Self::Policy(p) => Some(p.xacml_version()),
            Self::PolicySet(s) => Some(s.xacml_version()),
            Self::Reference(_) => None,
        }
    }
}

impl From<Policy> for PolicyTree {
    fn from(p: Policy) -> Self {
        Self::Policy(Arc::new(p))
    }
}

impl From<PolicySet> for PolicyTree {
    fn from(s: PolicySet) -> Self {
        Self::PolicySet(Arc::new(s))
    }
}

impl From<PolicyReference> for PolicyTree {
    fn from(r: PolicyReference) -> Self {
        Self::Reference(r)
    }
}
