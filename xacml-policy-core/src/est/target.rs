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

use super::expr::function;
use super::{Designator, FromEstError, Selector};
use crate::ast::{self, AttributeValue, TypedValue, XacmlVersion};
use crate::functions::FunctionRegistry;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Serde JSON structure for a target in the EST format. The layout must
/// agree with the XACML version of the enclosing node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Target {
    /// XACML 3.0: every entry must match
    AnyOf(Vec<AnyOf>),
    /// XACML 1.x and 2.0 sections
    Legacy(LegacyTarget),
}

/// Serde JSON structure for an `AnyOf`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct AnyOf {
    /// Alternatives
    pub all_of: Vec<AllOf>,
}

/// Serde JSON structure for an `AllOf`, also used for the match groups of
/// a legacy target section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct AllOf {
    /// Matches that must all hold
    pub matches: Vec<Match>,
}

/// Serde JSON structure for the four sections of a legacy target. Absent
/// sections match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct LegacyTarget {
    /// `<Subjects>`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<AllOf>,
    /// `<Resources>`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<AllOf>,
    /// `<Actions>`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<AllOf>,
    /// `<Environments>`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environments: Vec<AllOf>,
}

/// Serde JSON structure for a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    /// Identifier of the boolean match function
    pub match_id: SmolStr,
    /// The literal, passed as the first argument
    pub value: TypedValue,
    /// Where the second arguments come from
    #[serde(flatten)]
    pub lookup: Lookup,
}

/// Serde JSON structure for the lookup of a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Lookup {
    /// By attribute identifier
    AttributeDesignator(Designator),
    /// By path
    AttributeSelector(Selector),
}

impl Target {
    pub(super) fn to_ast(
        &self,
        functions: &FunctionRegistry,
        version: XacmlVersion,
    ) -> Result<ast::Target, FromEstError> {
        match self {
            Self::AnyOf(any_ofs) if !version.is_legacy() => Ok(ast::Target::AnyOf(
                any_ofs
                    .iter()
                    .map(|any_of| {
                        Ok(ast::AnyOf {
                            all_of: groups(&any_of.all_of, functions)?,
                        })
                    })
                    .collect::<Result<Vec<_>, FromEstError>>()?,
            )),
            Self::Legacy(t) if version.is_legacy() => Ok(ast::Target::Legacy(ast::LegacyTarget {
                subjects: groups(&t.subjects, functions)?,
                resources: groups(&t.resources, functions)?,
                actions: groups(&t.actions, functions)?,
                environments: groups(&t.environments, functions)?,
            })),
            Self::AnyOf(_) => Err(FromEstError::TargetLayout {
                version,
                layout: "anyOf",
            }),
            Self::Legacy(_) => Err(FromEstError::TargetLayout {
                version,
                layout: "legacy",
            }),
        }
    }

    /// The EST form of `target`, or `None` if it matches everything
    pub(super) fn from_ast(target: &ast::Target) -> Option<Self> {
        if target.matches_any() {
            return None;
        }
        Some(match target {
            ast::Target::AnyOf(any_ofs) => Self::AnyOf(
                any_ofs
                    .iter()
                    .map(|any_of| AnyOf {
                        all_of: any_of.all_of.iter().map(AllOf::from).collect(),
                    })
                    .collect(),
            ),
            ast::Target::Legacy(t) => {
                let section = |groups: &[ast::AllOf]| -> Vec<AllOf> {
                    groups.iter().map(AllOf::from).collect()
                };
                Self::Legacy(LegacyTarget {
                    subjects: section(&t.subjects),
                    resources: section(&t.resources),
                    actions: section(&t.actions),
                    environments: section(&t.environments),
                })
            }
        })
    }
}

fn groups(groups: &[AllOf], functions: &FunctionRegistry) -> Result<Vec<ast::AllOf>, FromEstError> {
    groups
        .iter()
        .map(|group| {
            Ok(ast::AllOf {
                matches: group
                    .matches
                    .iter()
                    .map(|m| m.to_ast(functions))
                    .collect::<Result<Vec<_>, _>>()?,
            })
        })
        .collect()
}

impl Match {
    fn to_ast(&self, functions: &FunctionRegistry) -> Result<ast::Match, FromEstError> {
        let lookup = match &self.lookup {
            Lookup::AttributeDesignator(d) => ast::MatchLookup::Designator(d.to_ast()?),
            Lookup::AttributeSelector(s) => ast::MatchLookup::Selector(s.to_ast()?),
        };
        Ok(ast::Match::new(
            function(functions, &self.match_id)?,
            AttributeValue::try_from(self.value.clone())?,
            lookup,
        )?)
    }
}

impl From<&ast::AllOf> for AllOf {
    fn from(group: &ast::AllOf) -> Self {
        Self {
            matches: group.matches.iter().map(Match::from).collect(),
        }
    }
}

impl From<&ast::Match> for Match {
    fn from(m: &ast::Match) -> Self {
        Self {
            match_id: m.function().id().clone(),
            value: m.value().clone().into(),
            lookup: match m.lookup() {
                ast::MatchLookup::Designator(d) => Lookup::AttributeDesignator(d.into()),
                ast::MatchLookup::Selector(s) => Lookup::AttributeSelector(s.into()),
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use cool_asserts::assert_matches;
    use serde_json::json;

    fn role_match() -> serde_json::Value {
        json!({
            "matchId": "urn:oasis:names:tc:xacml:1.0:function:string-equal",
            "value": {"dataType": "http://www.w3.org/2001/XMLSchema#string", "value": "admin"},
            "attributeDesignator": {
                "category": "urn:oasis:names:tc:xacml:1.0:subject-category:access-subject",
                "attributeId": "role",
                "dataType": "http://www.w3.org/2001/XMLSchema#string"
            }
        })
    }

    #[test]
    fn layout_must_agree_with_version() {
        let functions = FunctionRegistry::standard();
        let any_of: Target =
            serde_json::from_value(json!({"anyOf": [{"allOf": [{"matches": [role_match()]}]}]}))
                .unwrap();
        let legacy: Target =
            serde_json::from_value(json!({"legacy": {"subjects": [{"matches": [role_match()]}]}}))
                .unwrap();
        assert_matches!(any_of.to_ast(&functions, XacmlVersion::V3_0), Ok(ast::Target::AnyOf(a)) if a.len() == 1);
        assert_matches!(legacy.to_ast(&functions, XacmlVersion::V2_0), Ok(ast::Target::Legacy(t)) if t.subjects.len() == 1);
        assert_matches!(
            any_of.to_ast(&functions, XacmlVersion::V1_0),
            Err(FromEstError::TargetLayout { layout: "anyOf", .. })
        );
        assert_matches!(
            legacy.to_ast(&functions, XacmlVersion::V3_0),
            Err(FromEstError::TargetLayout { layout: "legacy", .. })
        );
    }

    #[test]
    fn match_function_must_accept_the_lookup() {
        let functions = FunctionRegistry::standard();
        let mut m = role_match();
        m["matchId"] = json!("urn:oasis:names:tc:xacml:1.0:function:integer-equal");
        let target: Target =
            serde_json::from_value(json!({"anyOf": [{"allOf": [{"matches": [m]}]}]})).unwrap();
        assert_matches!(
            target.to_ast(&functions, XacmlVersion::V3_0),
            Err(FromEstError::FunctionInput(_))
        );
    }

    #[test]
    fn empty_targets_are_omitted() {
        assert_eq!(Target::from_ast(&ast::Target::any()), None);
        assert_eq!(
            Target::from_ast(&ast::Target::Legacy(ast::LegacyTarget::default())),
            None
        );
    }
}
