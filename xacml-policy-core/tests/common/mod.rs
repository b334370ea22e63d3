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

//! Helpers shared by the integration tests

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;
use xacml_policy_core::ast::{categories, AttributeValue, Request};
use xacml_policy_core::est::PolicyDocument;
use xacml_policy_core::{EngineConfig, Pdp, Registry};

pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const F: &str = "urn:oasis:names:tc:xacml:1.0:function:";

pub fn string(v: &str) -> Value {
    json!({"value": {"dataType": STRING, "value": v}})
}

pub fn integer(v: i64) -> Value {
    json!({"value": {"dataType": INTEGER, "value": v.to_string()}})
}

pub fn designator(category: &str, attribute_id: &str, data_type: &str) -> Value {
    json!({"attributeDesignator": {
        "category": category,
        "attributeId": attribute_id,
        "dataType": data_type
    }})
}

pub fn required(category: &str, attribute_id: &str, data_type: &str) -> Value {
    json!({"attributeDesignator": {
        "category": category,
        "attributeId": attribute_id,
        "dataType": data_type,
        "mustBePresent": true
    }})
}

pub fn apply(function: &str, arguments: Vec<Value>) -> Value {
    json!({"apply": {"functionId": format!("{F}{function}"), "arguments": arguments}})
}

/// `role` is among the subject's roles
pub fn has_role(role: &str) -> Value {
    apply(
        "string-is-in",
        vec![string(role), designator(categories::ACCESS_SUBJECT, "role", STRING)],
    )
}

/// A XACML 3.0 target matching subjects with `role`
pub fn role_target(role: &str) -> Value {
    json!({"anyOf": [{"allOf": [{"matches": [{
        "matchId": format!("{F}string-equal"),
        "value": {"dataType": STRING, "value": role},
        "attributeDesignator": {
            "category": categories::ACCESS_SUBJECT,
            "attributeId": "role",
            "dataType": STRING
        }
    }]}]}]})
}

pub fn rule(id: &str, effect: &str) -> Value {
    json!({"ruleId": id, "effect": effect})
}

pub fn rule_if(id: &str, effect: &str, condition: Value) -> Value {
    json!({"ruleId": id, "effect": effect, "condition": condition})
}

pub fn policy(id: &str, algorithm: &str, rules: Vec<Value>) -> Value {
    json!({
        "type": "Policy",
        "policyId": id,
        "ruleCombiningAlgorithm": algorithm,
        "rules": rules
    })
}

pub fn policy_set(id: &str, algorithm: &str, children: Vec<Value>) -> Value {
    json!({
        "type": "PolicySet",
        "policySetId": id,
        "policyCombiningAlgorithm": algorithm,
        "children": children
    })
}

pub fn load(registry: &Registry, config: &EngineConfig, document: Value) -> Pdp {
    let document: PolicyDocument = serde_json::from_value(document).unwrap();
    let snapshot = document.to_snapshot(registry, config).unwrap();
    Pdp::new(registry.clone(), config.clone(), Arc::new(snapshot))
}

/// A decision point over a single top-level node
pub fn pdp(root: Value) -> Pdp {
    load(
        &Registry::standard(),
        &EngineConfig::default(),
        json!({"policies": [root]}),
    )
}

pub fn subject_with_roles(roles: &[&str]) -> Request {
    roles.iter().fold(Request::new(), |r, role| {
        r.with_attribute(categories::ACCESS_SUBJECT, "role", AttributeValue::string(*role))
    })
}
