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

//! This module contains the External Syntax Tree (EST): the JSON form of
//! policies and requests.
//!
//! Converting an EST into the AST resolves every function and combining
//! algorithm identifier against a [`Registry`] and type checks every
//! expression. Converting back yields a structurally equal EST.

mod err;
pub use err::*;
mod expr;
pub use expr::{Apply, Designator, Expr, Selector, VariableDefinition};
mod request;
pub use request::*;
mod rule;
pub use rule::{Assignment, ChildParameters, CombinerParameter, Obligation, Rule};
mod target;
pub use target::*;

use crate::ast::{self, PolicyID, PolicyKind, PolicyTree, VersionConstraints, XacmlVersion};
use crate::config::EngineConfig;
use crate::policy_source::PolicySnapshot;
use crate::registry::Registry;
use expr::Variables;
use rule::{
    check_child_parameters, child_parameters_from_ast, obligations, parameters, parameters_for,
};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Serde JSON structure for a file of policies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct PolicyDocument {
    /// Top-level policies, considered for every request
    #[serde(default)]
    pub policies: Vec<PolicyNode>,
    /// Policies reachable only through references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub library: Vec<PolicyNode>,
}

/// Serde JSON structure for a node of the policy tree, tagged by its XACML
/// element name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PolicyNode {
    /// A policy
    Policy(Policy),
    /// A policy set
    PolicySet(PolicySet),
    /// A reference to a policy
    PolicyIdReference(Reference),
    /// A reference to a policy set
    PolicySetIdReference(Reference),
}

/// Serde JSON structure for a policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// Policy identifier
    pub policy_id: SmolStr,
    /// Policy version, `1.0` if absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<SmolStr>,
    /// XACML version; absent means that of the enclosing policy set, or the
    /// configured default at the top level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xacml_version: Option<SmolStr>,
    /// Free text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<SmolStr>,
    /// Target; absent matches every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    /// Rule-combining algorithm identifier
    pub rule_combining_algorithm: SmolStr,
    /// Parameters for the algorithm
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub combiner_parameters: Vec<CombinerParameter>,
    /// Parameters for the algorithm about individual rules
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule_combiner_parameters: Vec<ChildParameters>,
    /// Variables shared by the rules
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<VariableDefinition>,
    /// Rules, in order
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Obligations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obligations: Vec<Obligation>,
    /// Advice
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advice: Vec<Obligation>,
}

/// Serde JSON structure for a policy set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySet {
    /// Policy set identifier
    pub policy_set_id: SmolStr,
    /// Policy set version, `1.0` if absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<SmolStr>,
    /// XACML version, inherited by children that do not declare one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xacml_version: Option<SmolStr>,
    /// Free text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<SmolStr>,
    /// Target; absent matches every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    /// Policy-combining algorithm identifier
    pub policy_combining_algorithm: SmolStr,
    /// Parameters for the algorithm
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub combiner_parameters: Vec<CombinerParameter>,
    /// Parameters for the algorithm about individual children
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy_combiner_parameters: Vec<ChildParameters>,
    /// Children, in order
    #[serde(default)]
    pub children: Vec<PolicyNode>,
    /// Obligations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obligations: Vec<Obligation>,
    /// Advice
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advice: Vec<Obligation>,
}

/// Serde JSON structure for a policy or policy set reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    /// Identifier of the referenced node
    pub id: SmolStr,
    /// Pattern the version must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<SmolStr>,
    /// Earliest acceptable version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earliest_version: Option<SmolStr>,
    /// Latest acceptable version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<SmolStr>,
}

impl PolicyDocument {
    /// Parse a document from JSON
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Convert every policy in the document. Nodes that do not declare an
    /// XACML version get the configured default.
    pub fn to_snapshot(
        &self,
        registry: &Registry,
        config: &EngineConfig,
    ) -> Result<PolicySnapshot, FromEstError> {
        let convert = |nodes: &[PolicyNode]| {
            nodes
                .iter()
                .map(|node| node.to_ast(registry, config.default_xacml_version))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(PolicySnapshot::new(
            convert(&self.policies)?,
            convert(&self.library)?,
        ))
    }

    /// The EST of a snapshot
    pub fn from_snapshot(snapshot: &PolicySnapshot) -> Self {
        Self {
            policies: snapshot.roots().iter().map(PolicyNode::from).collect(),
            library: snapshot.library().iter().map(PolicyNode::from).collect(),
        }
    }
}

impl PolicyNode {
    /// Identifier of the node, or of the node referenced
    pub fn id(&self) -> &SmolStr {
        match self {
            Self::Policy(p) => &p.policy_id,
            Self::PolicySet(s) => &s.policy_set_id,
            Self::PolicyIdReference(r) | Self::PolicySetIdReference(r) => &r.id,
        }
    }

    /// Convert into a policy tree node. `inherited` is the XACML version
    /// used if the node declares none.
    pub fn to_ast(
        &self,
        registry: &Registry,
        inherited: XacmlVersion,
    ) -> Result<PolicyTree, FromEstError> {
        match self {
            Self::Policy(p) => p.to_ast(registry, inherited).map(PolicyTree::from),
            Self::PolicySet(s) => s.to_ast(registry, inherited).map(PolicyTree::from),
            Self::PolicyIdReference(r) => r.to_ast(PolicyKind::Policy).map(PolicyTree::from),
            Self::PolicySetIdReference(r) => r.to_ast(PolicyKind::PolicySet).map(PolicyTree::from),
        }
    }
}

fn xacml_version(
    declared: Option<&SmolStr>,
    inherited: XacmlVersion,
) -> Result<XacmlVersion, FromEstError> {
    match declared {
        Some(v) => Ok(v.parse()?),
        None => Ok(inherited),
    }
}

impl Policy {
    /// Convert into an AST policy
    pub fn to_ast(
        &self,
        registry: &Registry,
        inherited: XacmlVersion,
    ) -> Result<ast::Policy, FromEstError> {
        self.build(registry, inherited)
            .map_err(|e| e.within(self.policy_id.clone()))
    }

    fn build(
        &self,
        registry: &Registry,
        inherited: XacmlVersion,
    ) -> Result<ast::Policy, FromEstError> {
        let functions = registry.functions();
        let version = xacml_version(self.xacml_version.as_ref(), inherited)?;
        let algorithm = registry
            .algorithms()
            .rule_algorithm(&self.rule_combining_algorithm)
            .cloned()
            .ok_or_else(|| {
                FromEstError::UnknownRuleAlgorithm(self.rule_combining_algorithm.clone())
            })?;
        let mut variables = Variables::new(&self.variables)?;

        let mut policy = ast::Policy::new(PolicyID::from_smolstr(self.policy_id.clone()), algorithm)
            .with_xacml_version(version)
            .with_parameters(parameters(&self.combiner_parameters)?);
        if let Some(v) = &self.version {
            policy = policy.with_version(v.parse()?);
        }
        if let Some(description) = &self.description {
            policy = policy.with_description(description.clone());
        }
        if let Some(target) = &self.target {
            policy = policy.with_target(target.to_ast(functions, version)?);
        }
        for def in &self.variables {
            policy = policy.with_variable(variables.resolve(&def.variable_id, functions)?);
        }

        let rule_ids: Vec<&str> = self.rules.iter().map(|r| r.rule_id.as_str()).collect();
        check_child_parameters(&self.rule_combiner_parameters, &rule_ids)?;
        for rule in &self.rules {
            policy = policy.with_rule_element(ast::CombinerElement {
                element: rule.to_ast(functions, version, &mut variables)?,
                parameters: parameters_for(&self.rule_combiner_parameters, &rule.rule_id)?,
            });
        }

        Ok(policy
            .with_obligations(obligations(&self.obligations, functions, &mut variables)?)
            .with_advice(obligations(&self.advice, functions, &mut variables)?))
    }
}

impl PolicySet {
    /// Convert into an AST policy set
    pub fn to_ast(
        &self,
        registry: &Registry,
        inherited: XacmlVersion,
    ) -> Result<ast::PolicySet, FromEstError> {
        self.build(registry, inherited)
            .map_err(|e| e.within(self.policy_set_id.clone()))
    }

    fn build(
        &self,
        registry: &Registry,
        inherited: XacmlVersion,
    ) -> Result<ast::PolicySet, FromEstError> {
        let functions = registry.functions();
        let version = xacml_version(self.xacml_version.as_ref(), inherited)?;
        let algorithm = registry
            .algorithms()
            .policy_algorithm(&self.policy_combining_algorithm)
            .cloned()
            .ok_or_else(|| {
                FromEstError::UnknownPolicyAlgorithm(self.policy_combining_algorithm.clone())
            })?;
        // obligations of a policy set cannot see any variables
        let mut no_variables = Variables::none();

        let mut set =
            ast::PolicySet::new(PolicyID::from_smolstr(self.policy_set_id.clone()), algorithm)
                .with_xacml_version(version)
                .with_parameters(parameters(&self.combiner_parameters)?);
        if let Some(v) = &self.version {
            set = set.with_version(v.parse()?);
        }
        if let Some(description) = &self.description {
            set = set.with_description(description.clone());
        }
        if let Some(target) = &self.target {
            set = set.with_target(target.to_ast(functions, version)?);
        }

        let child_ids: Vec<&str> = self.children.iter().map(|c| c.id().as_str()).collect();
        check_child_parameters(&self.policy_combiner_parameters, &child_ids)?;
        for child in &self.children {
            set = set.with_child_element(ast::CombinerElement {
                element: child.to_ast(registry, version)?,
                parameters: parameters_for(&self.policy_combiner_parameters, child.id())?,
            });
        }

        Ok(set
            .with_obligations(obligations(&self.obligations, functions, &mut no_variables)?)
            .with_advice(obligations(&self.advice, functions, &mut no_variables)?))
    }
}

impl Reference {
    /// Convert into an AST reference to a node of the given kind
    pub fn to_ast(&self, kind: PolicyKind) -> Result<ast::PolicyReference, FromEstError> {
        let pattern = |p: &Option<SmolStr>| -> Result<Option<ast::VersionPattern>, FromEstError> {
            Ok(p.as_ref().map(|p| p.parse()).transpose()?)
        };
        Ok(ast::PolicyReference {
            kind,
            id: PolicyID::from_smolstr(self.id.clone()),
            constraints: VersionConstraints {
                version: pattern(&self.version)?,
                earliest: pattern(&self.earliest_version)?,
                latest: pattern(&self.latest_version)?,
            },
        })
    }
}

impl From<&PolicyTree> for PolicyNode {
    fn from(tree: &PolicyTree) -> Self {
        match tree {
            PolicyTree::Policy(p) => Self::Policy(p.as_ref().into()),
            PolicyTree::PolicySet(s) => Self::PolicySet(s.as_ref().into()),
            PolicyTree::Reference(r) => {
                let reference = Reference::from(r);
                match r.kind {
                    PolicyKind::Policy => Self::PolicyIdReference(reference),
                    PolicyKind::PolicySet => Self::PolicySetIdReference(reference),
                }
            }
        }
    }
}

impl From<&ast::Policy> for Policy {
    fn from(p: &ast::Policy) -> Self {
        Self {
            policy_id: p.id().as_ref().into(),
            version: Some(p.version().to_string().into()),
            xacml_version: Some(p.xacml_version().to_string().into()),
            description: p.description().cloned(),
            target: Target::from_ast(p.target()),
            rule_combining_algorithm: p.algorithm().id().into(),
            combiner_parameters: p.parameters().iter().map(CombinerParameter::from).collect(),
            rule_combiner_parameters: child_parameters_from_ast(p.rules(), |r| r.id().clone()),
            variables: p
                .variables()
                .iter()
                .map(|v| VariableDefinition::from(v.as_ref()))
                .collect(),
            rules: p.rules().iter().map(|r| Rule::from(&r.element)).collect(),
            obligations: p.obligations().iter().map(Obligation::from).collect(),
            advice: p.advice().iter().map(Obligation::from).collect(),
        }
    }
}

impl From<&ast::PolicySet> for PolicySet {
    fn from(s: &ast::PolicySet) -> Self {
        Self {
            policy_set_id: s.id().as_ref().into(),
            version: Some(s.version().to_string().into()),
            xacml_version: Some(s.xacml_version().to_string().into()),
            description: s.description().cloned(),
            target: Target::from_ast(s.target()),
            policy_combining_algorithm: s.algorithm().id().into(),
            combiner_parameters: s.parameters().iter().map(CombinerParameter::from).collect(),
            policy_combiner_parameters: child_parameters_from_ast(s.children(), |c| {
                c.id().as_ref().into()
            }),
            children: s
                .children()
                .iter()
                .map(|c| PolicyNode::from(&c.element))
                .collect(),
            obligations: s.obligations().iter().map(Obligation::from).collect(),
            advice: s.advice().iter().map(Obligation::from).collect(),
        }
    }
}

impl From<&ast::PolicyReference> for Reference {
    fn from(r: &ast::PolicyReference) -> Self {
        let pattern = |p: &Option<ast::VersionPattern>| p.as_ref().map(|p| p.to_string().into());
        Self {
            id: r.id.as_ref().into(),
            version: pattern(&r.constraints.version),
            earliest_version: pattern(&r.constraints.earliest),
            latest_version: pattern(&r.constraints.latest),
        }
    }
}

#[cfg(test)]
// PANIC SAFETY: Unit Test Code
#[allow(clippy::indexing_slicing)]
mod test {
    use super::*;
    use cool_asserts::assert_matches;
    use serde_json::json;

    fn document(v: serde_json::Value) -> PolicyDocument {
        serde_json::from_value(v).unwrap()
    }

    fn convert(doc: &PolicyDocument) -> Result<PolicySnapshot, FromEstError> {
        doc.to_snapshot(&Registry::standard(), &EngineConfig::default())
    }

    #[test]
    fn versions_are_inherited() {
        let doc = document(json!({"policies": [{
            "type": "PolicySet",
            "policySetId": "root",
            "xacmlVersion": "2.0",
            "policyCombiningAlgorithm": "urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:first-applicable",
            "children": [{
                "type": "Policy",
                "policyId": "child",
                "ruleCombiningAlgorithm": "urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:first-applicable"
            }]
        }]}));
        let snapshot = convert(&doc).unwrap();
        assert_matches!(&snapshot.roots()[0], PolicyTree::PolicySet(set) => {
            assert_eq!(set.xacml_version(), XacmlVersion::V2_0);
            assert_matches!(&set.children()[0].element, PolicyTree::Policy(p) if p.xacml_version() == XacmlVersion::V2_0);
        });
    }

    #[test]
    fn unknown_algorithms_name_their_node() {
        let doc = document(json!({"policies": [{
            "type": "Policy",
            "policyId": "p",
            "ruleCombiningAlgorithm": "urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:only-one-applicable"
        }]}));
        let err = convert(&doc).unwrap_err();
        assert_eq!(err.to_string(), "in `p`: unknown rule-combining algorithm `urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:only-one-applicable`");
    }

    #[test]
    fn bad_versions() {
        let doc = document(json!({"policies": [{
            "type": "Policy",
            "policyId": "p",
            "version": "1.x",
            "ruleCombiningAlgorithm": "urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:first-applicable"
        }]}));
        assert_matches!(convert(&doc).unwrap_err().root_cause(), FromEstError::Version(_));

        let doc = document(json!({"policies": [{
            "type": "PolicySetIdReference",
            "id": "s",
            "latestVersion": "1.+.2"
        }]}));
        assert_matches!(convert(&doc), Err(FromEstError::Version(_)));

        let doc = document(json!({"policies": [{
            "type": "Policy",
            "policyId": "p",
            "xacmlVersion": "4.0",
            "ruleCombiningAlgorithm": "urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:first-applicable"
        }]}));
        assert_matches!(convert(&doc).unwrap_err().root_cause(), FromEstError::XacmlVersion(_));
    }

    #[test]
    fn child_parameters_attach_to_their_child() {
        let doc = document(json!({"policies": [{
            "type": "Policy",
            "policyId": "p",
            "ruleCombiningAlgorithm": "urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:first-applicable",
            "ruleCombinerParameters": [{
                "id": "second",
                "parameters": [{
                    "parameterName": "weight",
                    "value": {"dataType": "http://www.w3.org/2001/XMLSchema#integer", "value": "3"}
                }]
            }],
            "rules": [
                {"ruleId": "first", "effect": "Deny"},
                {"ruleId": "second", "effect": "Permit"}
            ]
        }]}));
        let snapshot = convert(&doc).unwrap();
        assert_matches!(&snapshot.roots()[0], PolicyTree::Policy(p) => {
            assert!(p.rules()[0].parameters.is_empty());
            assert_eq!(p.rules()[1].parameters.len(), 1);
            assert_eq!(p.rules()[1].parameters[0].value, ast::AttributeValue::Integer(3));
        });
    }
}
