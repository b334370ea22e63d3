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

use super::RequestError;
use crate::ast::{self, AttributeValue, TypedValue};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

fn is_false(b: &bool) -> bool {
    !*b
}

/// Serde JSON structure for a decision request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct Request {
    /// Whether results list the applicable policies
    #[serde(default, skip_serializing_if = "is_false")]
    pub return_policy_id_list: bool,
    /// Whether individual results are folded into one
    #[serde(default, skip_serializing_if = "is_false")]
    pub combined_decision: bool,
    /// Attribute categories; a category URI may repeat
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// Serde JSON structure for the attributes of one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct Category {
    /// Category URI
    pub category: SmolStr,
    /// Attributes
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

/// Serde JSON structure for a request attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct Attribute {
    /// Attribute identifier
    pub attribute_id: SmolStr,
    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<SmolStr>,
    /// Whether the attribute is echoed in the result
    #[serde(default, skip_serializing_if = "is_false")]
    pub include_in_result: bool,
    /// Values, each with its own data type
    pub values: Vec<TypedValue>,
}

impl Request {
    /// Parse a request from JSON
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Convert into an AST request, parsing every value
    pub fn to_ast(&self) -> Result<ast::Request, RequestError> {
        let categories = self
            .categories
            .iter()
            .map(Category::to_ast)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ast::Request {
            categories,
            return_policy_id_list: self.return_policy_id_list,
            combined_decision: self.combined_decision,
        })
    }
}

impl Category {
    fn to_ast(&self) -> Result<ast::AttributeCategory, RequestError> {
        if self.category.is_empty() {
            return Err(RequestError::EmptyCategory);
        }
        let attributes = self
            .attributes
            .iter()
            .map(|a| {
                let values = a
                    .values
                    .iter()
                    .map(|v| AttributeValue::try_from(v.clone()))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|error| RequestError::InvalidValue {
                        attribute_id: a.attribute_id.clone(),
                        error,
                    })?;
                Ok(ast::Attribute {
                    attribute_id: a.attribute_id.clone(),
                    issuer: a.issuer.clone(),
                    values,
                    include_in_result: a.include_in_result,
                })
            })
            .collect::<Result<Vec<_>, RequestError>>()?;
        Ok(ast::AttributeCategory {
            category: self.category.clone(),
            attributes,
        })
    }
}

impl From<&ast::Request> for Request {
    fn from(r: &ast::Request) -> Self {
        Self {
            return_policy_id_list: r.return_policy_id_list,
            combined_decision: r.combined_decision,
            categories: r
                .categories
                .iter()
                .map(|c| Category {
                    category: c.category.clone(),
                    attributes: c
                        .attributes
                        .iter()
                        .map(|a| Attribute {
                            attribute_id: a.attribute_id.clone(),
                            issuer: a.issuer.clone(),
                            include_in_result: a.include_in_result,
                            values: a.values.iter().cloned().map(TypedValue::from).collect(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
// PANIC SAFETY: Unit Test Code
#[allow(clippy::indexing_slicing)]
mod test {
    use super::*;
    use crate::ast::categories;
    use cool_asserts::assert_matches;
    use serde_json::json;

    #[test]
    fn values_are_parsed() {
        let request: Request = serde_json::from_value(json!({
            "returnPolicyIdList": true,
            "categories": [{
                "category": categories::ACCESS_SUBJECT,
                "attributes": [{
                    "attributeId": "age",
                    "includeInResult": true,
                    "values": [
                        {"dataType": "http://www.w3.org/2001/XMLSchema#integer", "value": "42"},
                        {"dataType": "http://www.w3.org/2001/XMLSchema#string", "value": "x"}
                    ]
                }]
            }]
        }))
        .unwrap();
        let ast = request.to_ast().unwrap();
        assert!(ast.return_policy_id_list);
        assert!(!ast.combined_decision);
        let attribute = &ast.categories[0].attributes[0];
        assert!(attribute.include_in_result);
        assert_eq!(
            attribute.values,
            vec![AttributeValue::Integer(42), AttributeValue::string("x")]
        );
        similar_asserts::assert_eq!(Request::from(&ast), request);
    }

    #[test]
    fn invalid_values_name_their_attribute() {
        let request: Request = serde_json::from_value(json!({
            "categories": [{
                "category": categories::RESOURCE,
                "attributes": [{
                    "attributeId": "size",
                    "values": [{"dataType": "http://www.w3.org/2001/XMLSchema#integer", "value": "big"}]
                }]
            }]
        }))
        .unwrap();
        assert_matches!(
            request.to_ast(),
            Err(RequestError::InvalidValue { attribute_id, .. }) if attribute_id == "size"
        );
    }

    #[test]
    fn empty_category_is_rejected() {
        let request: Request =
            serde_json::from_value(json!({"categories": [{"category": ""}]})).unwrap();
        assert_matches!(request.to_ast(), Err(RequestError::EmptyCategory));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(Request::from_json_str(r#"{"categorys": []}"#).is_err());
    }
}
