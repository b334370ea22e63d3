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

//! Converting policies to the AST and back loses nothing

mod common;

use common::*;
use serde_json::json;
use xacml_policy_core::ast::{categories, Request};
use xacml_policy_core::combining::ids;
use xacml_policy_core::est::PolicyDocument;
use xacml_policy_core::{EngineConfig, Pdp, Registry};

fn rich_document() -> serde_json::Value {
    json!({
        "policies": [{
            "type": "PolicySet",
            "policySetId": "root",
            "version": "2.1",
            "description": "everything at once",
            "target": role_target("staff"),
            "policyCombiningAlgorithm": ids::POLICY_DENY_OVERRIDES,
            "children": [
                {
                    "type": "Policy",
                    "policyId": "documents",
                    "ruleCombiningAlgorithm": ids::RULE_FIRST_APPLICABLE,
                    "variables": [{"variableId": "reader", "expr": has_role("reader")}],
                    "rules": [
                        {
                            "ruleId": "read",
                            "effect": "Permit",
                            "condition": json!({"variableReference": "reader"}),
                            "advice": [{"id": "audit", "fulfillOn": "Permit"}]
                        },
                        {
                            "ruleId": "otherwise",
                            "effect": "Deny",
                            "obligations": [{
                                "id": "notify",
                                "fulfillOn": "Deny",
                                "assignments": [{
                                    "attributeId": "to",
                                    "expr": designator(categories::ACCESS_SUBJECT, "manager", STRING)
                                }]
                            }]
                        }
                    ]
                },
                {
                    "type": "PolicySetIdReference",
                    "id": "shared",
                    "earliestVersion": "1.0",
                    "latestVersion": "1.+"
                },
                {
                    "type": "Policy",
                    "policyId": "legacy",
                    "xacmlVersion": "1.0",
                    "target": {"legacy": {"actions": [{"matches": [{
                        "matchId": format!("{F}string-equal"),
                        "value": {"dataType": STRING, "value": "read"},
                        "attributeDesignator": {
                            "category": categories::ACTION,
                            "attributeId": "id",
                            "dataType": STRING
                        }
                    }]}]}},
                    "ruleCombiningAlgorithm": ids::LEGACY_RULE_PERMIT_OVERRIDES,
                    "rules": [rule("r", "Permit")]
                }
            ]
        }],
        "library": [policy_set("shared", ids::POLICY_PERMIT_UNLESS_DENY, vec![])]
    })
}

fn convert(document: &PolicyDocument) -> PolicyDocument {
    let snapshot = document
        .to_snapshot(&Registry::standard(), &EngineConfig::default())
        .unwrap();
    PolicyDocument::from_snapshot(&snapshot)
}

#[test]
fn normalized_form_is_a_fixed_point() {
    let original: PolicyDocument = serde_json::from_value(rich_document()).unwrap();
    let once = convert(&original);
    let twice = convert(&once);
    similar_asserts::assert_eq!(once, twice);
}

#[test]
fn normalized_form_survives_json() {
    let original: PolicyDocument = serde_json::from_value(rich_document()).unwrap();
    let normalized = convert(&original);
    let text = serde_json::to_string_pretty(&normalized).unwrap();
    let reparsed = PolicyDocument::from_json_str(&text).unwrap();
    similar_asserts::assert_eq!(normalized, reparsed);
}

#[test]
fn normalization_makes_versions_explicit() {
    let original: PolicyDocument = serde_json::from_value(rich_document()).unwrap();
    let normalized = serde_json::to_value(convert(&original)).unwrap();
    let root = &normalized["policies"][0];
    assert_eq!(root["version"], json!("2.1"));
    assert_eq!(root["xacmlVersion"], json!("3.0"));
    assert_eq!(root["children"][0]["version"], json!("1.0"));
    assert_eq!(root["children"][2]["xacmlVersion"], json!("1.0"));
    assert_eq!(root["children"][1]["latestVersion"], json!("1.+"));
}

#[test]
fn normalized_policies_decide_alike() {
    let original: PolicyDocument = serde_json::from_value(rich_document()).unwrap();
    let normalized = convert(&original);
    let pdp = |document: &PolicyDocument| {
        let registry = Registry::standard();
        let config = EngineConfig::default();
        let snapshot = document.to_snapshot(&registry, &config).unwrap();
        Pdp::new(registry, config, std::sync::Arc::new(snapshot))
    };
    let (before, after) = (pdp(&original), pdp(&normalized));
    let cases: [&[&str]; 3] = [&["staff", "reader"], &["staff"], &["guest"]];
    for roles in cases {
        let request = subject_with_roles(roles);
        assert_eq!(before.evaluate(&request), after.evaluate(&request));
    }
    let empty = Request::new();
    assert_eq!(before.evaluate(&empty), after.evaluate(&empty));
}
