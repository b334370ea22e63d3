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

use super::{AttributeValue, Bag};
use crate::attributes::AttributeQuery;
use itertools::Itertools;
use serde::Serialize;
use smol_str::SmolStr;

fn is_false(b: &bool) -> bool {
    !*b
}

/// One attribute of a request category: an identifier and its values
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    /// Attribute identifier
    pub attribute_id: SmolStr,
    /// Issuer of the attribute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<SmolStr>,
    /// Values; they need not share a data type
    pub values: Vec<AttributeValue>,
    /// Whether the attribute is echoed in the result
    #[serde(skip_serializing_if = "is_false")]
    pub include_in_result: bool,
}

impl Attribute {
    /// An attribute with no issuer that is not echoed
    pub fn new(attribute_id: impl Into<SmolStr>, values: Vec<AttributeValue>) -> Self {
        Self {
            attribute_id: attribute_id.into(),
            issuer: None,
            values,
            include_in_result: false,
        }
    }

    /// Set the issuer
    pub fn with_issuer(self, issuer: impl Into<SmolStr>) -> Self {
        Self {
            issuer: Some(issuer.into()),
            ..self
        }
    }

    /// Mark the attribute to be echoed in the result
    pub fn included_in_result(self) -> Self {
        Self {
            include_in_result: true,
            ..self
        }
    }
}

/// The attributes of one category (subject, resource, action, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeCategory {
    /// Category URI
    pub category: SmolStr,
    /// Its attributes
    pub attributes: Vec<Attribute>,
}

impl AttributeCategory {
    /// An empty category
    pub fn new(category: impl Into<SmolStr>) -> Self {
        Self {
            category: category.into(),
            attributes: Vec::new(),
        }
    }

    /// Add an attribute
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }
}

/// A decision request.
///
/// A category URI may occur more than once; under the multiple decision
/// profile each combination of occurrences is decided separately (see
/// [`Request::individual_requests`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Attribute categories, in request order
    pub categories: Vec<AttributeCategory>,
    /// Whether results list the applicable policies
    pub return_policy_id_list: bool,
    /// Whether individual results are folded into one
    pub combined_decision: bool,
}

impl Request {
    /// An empty request
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single-valued attribute to the (last) category `category`,
    /// creating the category if needed
    pub fn with_attribute(
        self,
        category: impl Into<SmolStr>,
        attribute_id: impl Into<SmolStr>,
        value: AttributeValue,
    ) -> Self {
        self.with_category_attribute(category, Attribute::new(attribute_id, vec![value]))
    }

    /// Add an attribute to the (last) category `category`, creating the
    /// category if needed
    pub fn with_category_attribute(
        mut self,
        category: impl Into<SmolStr>,
        attribute: Attribute,
    ) -> Self {
        let category = category.into();
        match self
            .categories
            .iter_mut()
            .rev()
            .find(|c| c.category == category)
        {
            Some(c) => c.attributes.push(attribute),
            None => self
                .categories
                .push(AttributeCategory::new(category).with_attribute(attribute)),
        }
        self
    }

    /// Append a category, even if one with the same URI exists
    pub fn with_category(mut self, category: AttributeCategory) -> Self {
        self.categories.push(category);
        self
    }

    /// Ask for the list of applicable policies
    pub fn with_return_policy_id_list(self, on: bool) -> Self {
        Self {
            return_policy_id_list: on,
            ..self
        }
    }

    /// Ask for a single combined result
    pub fn with_combined_decision(self, on: bool) -> Self {
        Self {
            combined_decision: on,
            ..self
        }
    }

    /// All values in the request matching `query`, as a bag of the queried
    /// type. Values of other types are skipped.
    pub fn find(&self, query: &AttributeQuery<'_>) -> Bag {
        let values = self
            .categories
            .iter()
            .filter(|c| c.category == query.category)
            .flat_map(|c| &c.attributes)
            .filter(|a| {
                a.attribute_id == query.attribute_id
                    && query
                        .issuer
                        .is_none_or(|issuer| a.issuer.as_deref() == Some(issuer))
            })
            .flat_map(|a| &a.values)
            .filter(|v| v.data_type() == query.data_type)
            .cloned()
            .collect::<Vec<_>>();
        match Bag::new(query.data_type, values) {
            Ok(bag) => bag,
            Err(_) => Bag::empty(query.data_type),
        }
    }

    /// Whether some category URI occurs more than once
    pub fn has_repeated_categories(&self) -> bool {
        !self.categories.iter().map(|c| &c.category).all_unique()
    }

    /// Split a request with repeated categories into one request per
    /// combination of category occurrences. A request without repetitions
    /// yields just itself.
    pub fn individual_requests(&self) -> Vec<Request> {
        if !self.has_repeated_categories() {
            return vec![self.clone()];
        }
        let groups = self
            .categories
            .iter()
            .into_group_map_by(|c| c.category.clone());
        let order = self.categories.iter().map(|c| &c.category).unique();
        order
            .filter_map(|uri| groups.get(uri).cloned())
            .multi_cartesian_product()
            .map(|combination| Request {
                categories: combination.into_iter().cloned().collect(),
                return_policy_id_list: self.return_policy_id_list,
                combined_decision: false,
            })
            .collect()
    }

    /// The attributes marked for echoing, grouped by category
    pub fn echoed_attributes(&self) -> Vec<AttributeCategory> {
        self.categories
            .iter()
            .filter_map(|c| {
                let attributes = c
                    .attributes
                    .iter()
                    .filter(|a| a.include_in_result)
                    .cloned()
                    .collect::<Vec<_>>();
                (!attributes.is_empty()).then(|| AttributeCategory {
                    category: c.category.clone(),
                    attributes,
                })
            })
            .collect()
    }
}

// PANIC SAFETY: Unit Test Code
#[allow(clippy::indexing_slicing)]
#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::{categories, DataType};

    fn s(v: &str) -> AttributeValue {
        AttributeValue::string(v)
    }

    #[test]
    fn find_filters_on_type_and_issuer() {
        let req = Request::new()
            .with_category_attribute(
                categories::ACCESS_SUBJECT,
                Attribute::new("role", vec![s("admin"), AttributeValue::Integer(3)])
                    .with_issuer("hr"),
            )
            .with_attribute(categories::ACCESS_SUBJECT, "role", s("user"));
        let any_issuer = AttributeQuery {
            category: categories::ACCESS_SUBJECT,
            attribute_id: "role",
            data_type: DataType::String,
            issuer: None,
        };
        assert_eq!(req.find(&any_issuer).len(), 2);
        let hr = AttributeQuery {
            issuer: Some("hr"),
            ..any_issuer
        };
        assert_eq!(req.find(&hr).len(), 1);
        let ints = AttributeQuery {
            data_type: DataType::Integer,
            ..any_issuer
        };
        assert_eq!(req.find(&ints).len(), 1);
    }

    #[test]
    fn repeated_categories_expand() {
        let req = Request::new()
            .with_category(
                AttributeCategory::new(categories::RESOURCE)
                    .with_attribute(Attribute::new("id", vec![s("r1")])),
            )
            .with_category(
                AttributeCategory::new(categories::ACCESS_SUBJECT)
                    .with_attribute(Attribute::new("id", vec![s("alice")])),
            )
            .with_category(
                AttributeCategory::new(categories::RESOURCE)
                    .with_attribute(Attribute::new("id", vec![s("r2")])),
            );
        assert!(req.has_repeated_categories());
        let individual = req.individual_requests();
        assert_eq!(individual.len(), 2);
        assert!(individual.iter().all(|r| !r.has_repeated_categories()));
        assert_eq!(individual[0].categories.len(), 2);
    }

    #[test]
    fn echo_only_flagged_attributes() {
        let req = Request::new()
            .with_category_attribute(
                categories::ACTION,
                Attribute::new("id", vec![s("read")]).included_in_result(),
            )
            .with_attribute(categories::ACTION, "other", s("x"));
        let echoed = req.echoed_attributes();
        assert_eq!(echoed.len(), 1);
        assert_eq!(echoed[0].attributes.len(), 1);
        assert_eq!(echoed[0].attributes[0].attribute_id, "id");
    }
}
