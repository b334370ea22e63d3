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

use super::{AttributeValue, DataType};
use itertools::Itertools;
use miette::Diagnostic;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A bag member did not have the bag's declared type
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
#[error("bag of {expected} cannot hold `{value}`, which is a {actual}")]
pub struct BagError {
    expected: DataType,
    actual: DataType,
    value: AttributeValue,
}

/// An unordered multiset of values of one declared data type.
///
/// Bags are cheap to clone; the members are shared.
#[derive(Debug, Clone)]
pub struct Bag {
    data_type: DataType,
    values: Arc<Vec<AttributeValue>>,
}

impl Bag {
    /// Build a bag, checking that every member has type `data_type`
    pub fn new(
        data_type: DataType,
        values: impl IntoIterator<Item = AttributeValue>,
    ) -> Result<Self, BagError> {
        let values: Vec<_> = values.into_iter().collect();
        if let Some(bad) = values.iter().find(|v| v.data_type() != data_type) {
            return Err(BagError {
                expected: data_type,
                actual: bad.data_type(),
                value: bad.clone(),
            });
        }
        Ok(Self {
            data_type,
            values: Arc::new(values),
        })
    }

    /// An empty bag of `data_type`
    pub fn empty(data_type: DataType) -> Self {
        Self {
            data_type,
            values: Arc::new(Vec::new()),
        }
    }

    /// A bag holding exactly `value`
    pub fn singleton(value: AttributeValue) -> Self {
        Self {
            data_type: value.data_type(),
            values: Arc::new(vec![value]),
        }
    }

    /// The declared member type
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Number of members, counting duplicates
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the bag has no members
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether `value` is a member
    pub fn contains(&self, value: &AttributeValue) -> bool {
        self.values.contains(value)
    }

    /// Iterate over the members in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, AttributeValue> {
        self.values.iter()
    }

    /// The only member, if the bag has exactly one
    pub fn single(&self) -> Option<&AttributeValue> {
        match self.values.as_slice() {
            [v] => Some(v),
            _ => None,
        }
    }

    /// Multiset union: each value occurs as often as it does in whichever
    /// operand holds more copies of it.
    ///
    /// Returns `None` if the bags have different data types.
    pub fn union(&self, other: &Bag) -> Option<Bag> {
        if self.data_type != other.data_type {
            return None;
        }
        if other.is_empty() {
            return Some(self.clone());
        }
        let mine = self.counts();
        let mut values: Vec<AttributeValue> = self.values.as_ref().clone();
        for (v, n) in other.counts_ordered() {
            let have = mine.get(v).copied().unwrap_or(0);
            values.extend(std::iter::repeat_n(v.clone(), n.saturating_sub(have)));
        }
        Some(Self {
            data_type: self.data_type,
            values: Arc::new(values),
        })
    }

    /// The distinct members, in first-occurrence order
    pub fn distinct(&self) -> impl Iterator<Item = &AttributeValue> + '_ {
        self.values.iter().unique()
    }

    fn counts(&self) -> HashMap<&AttributeValue, usize> {
        self.values.iter().counts()
    }

    fn counts_ordered(&self) -> Vec<(&AttributeValue, usize)> {
        let counts = self.counts();
        self.distinct()
            .map(|v| (v, counts.get(v).copied().unwrap_or(0)))
            .collect()
    }
}

impl PartialEq for Bag {
    fn eq(&self, other: &Self) -> bool {
        self.data_type == other.data_type
            && self.len() == other.len()
            && self.counts() == other.counts()
    }
}

impl Eq for Bag {}

impl fmt::Display for Bag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bag<{}>{{{}}}", self.data_type, self.values.iter().join(", "))
    }
}

impl<'a> IntoIterator for &'a Bag {
    type Item = &'a AttributeValue;
    type IntoIter = std::slice::Iter<'a, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
