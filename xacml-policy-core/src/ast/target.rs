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

use super::{
    ArgType, AttributeDesignator, AttributeSelector, AttributeValue, DataType, ExprType,
    MissingAttributeDetail,
};
use crate::functions::{Function, FunctionInputError};
use smol_str::SmolStr;
use std::sync::Arc;

/// Where a [`Match`] finds the values it compares its literal with
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatchLookup {
    /// By attribute identifier
    Designator(AttributeDesignator),
    /// By path
    Selector(AttributeSelector),
}

impl MatchLookup {
    /// Data type of the looked-up values
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Designator(d) => d.data_type,
            Self::Selector(s) => s.data_type,
        }
    }

    /// Whether an empty lookup is an error
    pub fn must_be_present(&self) -> bool {
        match self {
            Self::Designator(d) => d.must_be_present,
            Self::Selector(s) => s.must_be_present,
        }
    }

    /// Status detail when a required lookup is empty
    pub fn missing_detail(&self) -> MissingAttributeDetail {
        match self {
            Self::Designator(d) => d.missing_detail(),
            Self::Selector(s) => s.missing_detail(),
        }
    }
}

/// Compare a literal with every value of a lookup using a boolean function.
/// The match holds when the function holds for some looked-up value.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    function: Arc<Function>,
    value: AttributeValue,
    lookup: MatchLookup,
}

impl Match {
    /// Build a match. `function` must take the literal's type and the
    /// lookup's type, in that order, and return a boolean.
    pub fn new(
        function: Arc<Function>,
        value: AttributeValue,
        lookup: MatchLookup,
    ) -> Result<Self, FunctionInputError> {
        let returns = function.check_inputs(&[
            ArgType::Value(ExprType::scalar(value.data_type())),
            ArgType::Value(ExprType::scalar(lookup.data_type())),
        ])?;
        if returns != ExprType::boolean() {
            return Err(FunctionInputError::NotBooleanFunction {
                function_id: SmolStr::new_static("Match"),
                argument: function.id().clone(),
                returns,
            });
        }
        Ok(Self {
            function,
            value,
            lookup,
        })
    }

    /// The match function
    pub fn function(&self) -> &Arc<Function> {
        &self.function
    }

    /// The literal, passed as the first argument
    pub fn value(&self) -> &AttributeValue {
        &self.value
    }

    /// The lookup supplying second arguments
    pub fn lookup(&self) -> &MatchLookup {
        &self.lookup
    }
}

/// A conjunction of matches
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AllOf {
    /// The matches, evaluated in order
    pub matches: Vec<Match>,
}

/// A disjunction of [`AllOf`]s
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnyOf {
    /// The alternatives, evaluated in order
    pub all_of: Vec<AllOf>,
}

/// A target in the XACML 1.x/2.0 layout: four sections, each a list of
/// alternatives. An empty section matches anything.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LegacyTarget {
    /// `<Subjects>`
    pub subjects: Vec<AllOf>,
    /// `<Resources>`
    pub resources: Vec<AllOf>,
    /// `<Actions>`
    pub actions: Vec<AllOf>,
    /// `<Environments>` (XACML 2.0 only)
    pub environments: Vec<AllOf>,
}

impl LegacyTarget {
    /// The sections in evaluation order, with their names
    pub fn sections(&self) -> [(&'static str, &[AllOf]); 4] {
        [
            ("Subjects", &self.subjects),
            ("Resources", &self.resources),
            ("Actions", &self.actions),
            ("Environments", &self.environments),
        ]
    }
}

/// The applicability test of a rule, policy or policy set.
///
/// The two layouts have different semantics and are never mixed: a policy
/// declares which one it uses through its XACML version.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// XACML 1.x and 2.0
    Legacy(LegacyTarget),
    /// XACML 3.0: every [`AnyOf`] must match
    AnyOf(Vec<AnyOf>),
}

impl Target {
    /// The target that matches every request
    pub fn any() -> Self {
        Self::AnyOf(Vec::new())
    }

    /// Whether the target matches every request without looking at it
    pub fn matches_any(&self) -> bool {
        match self {
            Self::Legacy(t) => t.sections().iter().all(|(_, groups)| groups.is_empty()),
            Self::AnyOf(any_ofs) => any_ofs.is_empty(),
        }
    }

    /// Every match in the target, in evaluation order
    pub fn matches(&self) -> Box<dyn Iterator<Item = &Match> + '_> {
        match self {
            Self::Legacy(t) => Box::new(
                [&t.subjects, &t.resources, &t.actions, &t.environments]
                    .into_iter()
                    .flatten()
                    .flat_map(|all_of| &all_of.matches),
            ),
            Self::AnyOf(any_ofs) => Box::new(
                any_ofs
                    .iter()
                    .flat_map(|any_of| &any_of.all_of)
                    .flat_map(|all_of| &all_of.matches),
            ),
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::any()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::categories;
    use crate::functions::FunctionRegistry;
    use cool_asserts::assert_matches;

    fn function(name: &str) -> Arc<Function> {
        Arc::clone(
            FunctionRegistry::standard()
                .get(&format!("urn:oasis:names:tc:xacml:1.0:function:{name}"))
                .unwrap(),
        )
    }

    fn role_designator(dt: DataType) -> MatchLookup {
        MatchLookup::Designator(AttributeDesignator::new(
            categories::ACCESS_SUBJECT,
            "role",
            dt,
        ))
    }

    #[test]
    fn match_checks_function_signature() {
        assert_matches!(
            Match::new(
                function("string-equal"),
                AttributeValue::string("admin"),
                role_designator(DataType::String)
            ),
            Ok(_)
        );
        assert_matches!(
            Match::new(
                function("string-equal"),
                AttributeValue::string("admin"),
                role_designator(DataType::Integer)
            ),
            Err(FunctionInputError::TypeMismatch { index: 1, .. })
        );
        assert_matches!(
            Match::new(
                function("integer-add"),
                AttributeValue::Integer(1),
                role_designator(DataType::Integer)
            ),
            Err(FunctionInputError::NotBooleanFunction { .. })
        );
    }

    #[test]
    fn empty_targets_match_anything() {
        assert!(Target::any().matches_any());
        assert!(Target::Legacy(LegacyTarget::default()).matches_any());
        let m = Match::new(
            function("string-equal"),
            AttributeValue::string("admin"),
            role_designator(DataType::String),
        )
        .unwrap();
        let t = Target::Legacy(LegacyTarget {
            actions: vec![AllOf { matches: vec![m] }],
            ..LegacyTarget::default()
        });
        assert!(!t.matches_any());
        assert_eq!(t.matches().count(), 1);
    }
}
