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

//! Engine configuration, built once at startup and passed to the
//! [`crate::Pdp`] and to policy loading.

use crate::ast::XacmlVersion;
use crate::combining::ids;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Settings of one policy decision point.
///
/// Every field has a default, so an empty JSON object is a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Algorithm folding the top-level policies found for a request
    pub root_combining_algorithm: SmolStr,
    /// How many policy references may be followed from a root
    pub max_reference_depth: usize,
    /// Version assumed for policies that do not declare one
    pub default_xacml_version: XacmlVersion,
    /// Whether repeated attribute categories are split into individual
    /// decisions
    pub enable_multiple_decisions: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root_combining_algorithm: SmolStr::new_static(ids::POLICY_ONLY_ONE_APPLICABLE),
            max_reference_depth: 32,
            default_xacml_version: XacmlVersion::V3_0,
            enable_multiple_decisions: true,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use cool_asserts::assert_matches;

    #[test]
    fn empty_object_is_the_default() {
        assert_eq!(EngineConfig::from_json_str("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn camel_case_keys() {
        let config = EngineConfig::from_json_str(
            r#"{
                "rootCombiningAlgorithm": "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:deny-overrides",
                "maxReferenceDepth": 4,
                "defaultXacmlVersion": "2.0"
            }"#,
        )
        .unwrap();
        assert_eq!(config.root_combining_algorithm, ids::POLICY_DENY_OVERRIDES);
        assert_eq!(config.max_reference_depth, 4);
        assert_eq!(config.default_xacml_version, XacmlVersion::V2_0);
        assert!(config.enable_multiple_decisions);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert_matches!(EngineConfig::from_json_str(r#"{"maxDepth": 3}"#), Err(_));
        assert_matches!(
            EngineConfig::from_json_str(r#"{"defaultXacmlVersion": "4.0"}"#),
            Err(_)
        );
    }
}
