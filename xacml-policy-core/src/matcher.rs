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

//! Target matching.
//!
//! The two target layouts are matched by separate functions and never
//! unified. XACML 1.x/2.0 targets stop at the first section, group or match
//! that fails. XACML 3.0 targets follow the OASIS tables, in which a
//! definite No-match outranks an Indeterminate found earlier.

use crate::ast::{
    AllOf, AnyOf, AttributeValue, Bag, LegacyTarget, Match, MatchLookup, Target, Value,
};
use crate::attributes::AttributeFacade;
use crate::evaluator::{self, EvaluationError};
use tracing::trace;

/// The outcome of matching a target
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    /// The target applies. Carries the literal of every match that held.
    Match(Vec<AttributeValue>),
    /// The target does not apply
    NoMatch,
    /// Matching failed
    Indeterminate(EvaluationError),
}

impl MatchResult {
    /// Whether the target applies
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match(_))
    }

    /// `Ok(true)` on Match, `Ok(false)` on NoMatch, the error otherwise
    pub fn into_result(self) -> evaluator::Result<bool> {
        match self {
            Self::Match(_) => Ok(true),
            Self::NoMatch => Ok(false),
            Self::Indeterminate(err) => Err(err),
        }
    }
}

/// Match `target` against the request behind `facade`. A target that
/// matches anything is accepted without resolving a single attribute.
pub fn match_target(target: &Target, facade: &AttributeFacade<'_>) -> MatchResult {
    if target.matches_any() {
        return MatchResult::Match(Vec::new());
    }
    let result = match target {
        Target::Legacy(t) => match_legacy(t, facade),
        Target::AnyOf(any_ofs) => match_any_ofs(any_ofs, facade),
    };
    trace!(result = ?result, "target matched");
    result
}

/// Apply a match's function to its literal and each looked-up value. Holds
/// if the function holds for some value; errors count only if none does.
pub fn evaluate_match(m: &Match, facade: &AttributeFacade<'_>) -> MatchResult {
    let bag = match lookup(m.lookup(), facade) {
        Ok(bag) => bag,
        Err(err) => return MatchResult::Indeterminate(err),
    };
    let literal = Value::from(m.value().clone());
    let mut first_error = None;
    for member in &bag {
        let outcome = m
            .function()
            .call(&[literal.clone(), Value::from(member.clone())])
            .and_then(|v| v.get_as_bool());
        match outcome {
            Ok(true) => return MatchResult::Match(vec![m.value().clone()]),
            Ok(false) => {}
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }
    first_error.map_or(MatchResult::NoMatch, MatchResult::Indeterminate)
}

fn lookup(l: &MatchLookup, facade: &AttributeFacade<'_>) -> evaluator::Result<Bag> {
    match l {
        MatchLookup::Designator(d) => evaluator::resolve_designator(d, facade),
        MatchLookup::Selector(s) => evaluator::resolve_selector(s, facade),
    }
}

fn match_legacy(target: &LegacyTarget, facade: &AttributeFacade<'_>) -> MatchResult {
    let mut matched = Vec::new();
    for (name, groups) in target.sections() {
        if groups.is_empty() {
            continue;
        }
        match first_matching(groups, |g| match_legacy_group(g, facade)) {
            MatchResult::Match(values) => matched.extend(values),
            other => {
                trace!(section = name, "target section did not match");
                return other;
            }
        }
    }
    MatchResult::Match(matched)
}

/// A legacy group: every match in order, stopping at the first that fails
fn match_legacy_group(group: &AllOf, facade: &AttributeFacade<'_>) -> MatchResult {
    let mut matched = Vec::new();
    for m in &group.matches {
        match evaluate_match(m, facade) {
            MatchResult::Match(values) => matched.extend(values),
            other => return other,
        }
    }
    MatchResult::Match(matched)
}

/// OR over alternatives: the first Match wins, otherwise the first
/// Indeterminate, otherwise NoMatch
fn first_matching<T>(alternatives: &[T], mut eval: impl FnMut(&T) -> MatchResult) -> MatchResult {
    let mut first_error = None;
    for alternative in alternatives {
        match eval(alternative) {
            MatchResult::Match(values) => return MatchResult::Match(values),
            MatchResult::NoMatch => {}
            MatchResult::Indeterminate(err) => {
                first_error.get_or_insert(err);
            }
        }
    }
    first_error.map_or(MatchResult::NoMatch, MatchResult::Indeterminate)
}

/// AND under the 3.0 tables: any NoMatch wins, otherwise the first
/// Indeterminate, otherwise Match
fn all_matching<T>(conjuncts: &[T], mut eval: impl FnMut(&T) -> MatchResult) -> MatchResult {
    let mut matched = Vec::new();
    let mut first_error = None;
    for conjunct in conjuncts {
        match eval(conjunct) {
            MatchResult::Match(values) => matched.extend(values),
            MatchResult::NoMatch => return MatchResult::NoMatch,
            MatchResult::Indeterminate(err) => {
                first_error.get_or_insert(err);
            }
        }
    }
    first_error.map_or(MatchResult::Match(matched), MatchResult::Indeterminate)
}

fn match_any_ofs(any_ofs: &[AnyOf], facade: &AttributeFacade<'_>) -> MatchResult {
    all_matching(any_ofs, |any_of| {
        first_matching(&any_of.all_of, |all_of| {
            all_matching(&all_of.matches, |m| evaluate_match(m, facade))
        })
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::{categories, AttributeDesignator, DataType, Request};
    use crate::attributes::test_resolvers::CountingResolver;
    use crate::attributes::{AttributeResolver, Clock};
    use crate::evaluator::EvaluationErrorKind;
    use crate::functions::FunctionRegistry;
    use cool_asserts::assert_matches;
    use std::sync::Arc;

    fn string_match(category: &str, id: &str, literal: &str, required: bool) -> Match {
        let mut designator = AttributeDesignator::new(category, id, DataType::String);
        designator.must_be_present = required;
        Match::new(
            Arc::clone(
                FunctionRegistry::standard()
                    .get("urn:oasis:names:tc:xacml:1.0:function:string-equal")
                    .unwrap(),
            ),
            AttributeValue::string(literal),
            MatchLookup::Designator(designator),
        )
        .unwrap()
    }

    fn all_of(matches: Vec<Match>) -> AllOf {
        AllOf { matches }
    }

    fn request() -> Request {
        Request::new()
            .with_attribute(categories::ACCESS_SUBJECT, "role", AttributeValue::string("admin"))
            .with_attribute(categories::ACCESS_SUBJECT, "role", AttributeValue::string("auditor"))
            .with_attribute(categories::ACTION, "action-id", AttributeValue::string("read"))
    }

    fn with_facade<T>(request: &Request, f: impl FnOnce(&AttributeFacade<'_>) -> T) -> T {
        let clock = Clock::now();
        let facade = AttributeFacade::new(request, &[], &clock);
        f(&facade)
    }

    #[test]
    fn match_holds_on_any_member() {
        let req = request();
        with_facade(&req, |facade| {
            let m = string_match(categories::ACCESS_SUBJECT, "role", "auditor", false);
            assert_matches!(evaluate_match(&m, facade), MatchResult::Match(v) if v == vec![AttributeValue::string("auditor")]);
            let m = string_match(categories::ACCESS_SUBJECT, "role", "guest", false);
            assert_eq!(evaluate_match(&m, facade), MatchResult::NoMatch);
        });
    }

    #[test]
    fn required_attribute_missing_is_indeterminate() {
        let req = request();
        with_facade(&req, |facade| {
            let m = string_match(categories::RESOURCE, "owner", "alice", true);
            assert_matches!(
                evaluate_match(&m, facade),
                MatchResult::Indeterminate(e) if matches!(e.error_kind(), EvaluationErrorKind::MissingAttribute(_))
            );
            let m = string_match(categories::RESOURCE, "owner", "alice", false);
            assert_eq!(evaluate_match(&m, facade), MatchResult::NoMatch);
        });
    }

    #[test]
    fn empty_target_never_resolves() {
        let resolver = Arc::new(CountingResolver::serving("role", vec![]));
        let resolvers: Vec<Arc<dyn AttributeResolver>> = vec![resolver.clone()];
        let req = Request::new();
        let clock = Clock::now();
        let facade = AttributeFacade::new(&req, &resolvers, &clock);
        assert!(match_target(&Target::any(), &facade).is_match());
        assert!(match_target(&Target::Legacy(LegacyTarget::default()), &facade).is_match());
        assert_eq!(resolver.calls(), 0);
    }

    #[test]
    fn legacy_sections_stop_at_first_failure() {
        let resolver = Arc::new(CountingResolver::serving("action-id", vec![]));
        let resolvers: Vec<Arc<dyn AttributeResolver>> = vec![resolver.clone()];
        let req = Request::new()
            .with_attribute(categories::ACCESS_SUBJECT, "role", AttributeValue::string("admin"));
        let clock = Clock::now();
        let facade = AttributeFacade::new(&req, &resolvers, &clock);
        let target = Target::Legacy(LegacyTarget {
            subjects: vec![
                all_of(vec![string_match(categories::ACCESS_SUBJECT, "role", "guest", false)]),
            ],
            actions: vec![all_of(vec![string_match(
                categories::ACTION,
                "action-id",
                "read",
                false,
            )])],
            ..LegacyTarget::default()
        });
        assert_eq!(match_target(&target, &facade), MatchResult::NoMatch);
        assert_eq!(resolver.calls(), 0);
    }

    #[test]
    fn legacy_group_stops_at_first_indeterminate() {
        let req = request();
        with_facade(&req, |facade| {
            let target = Target::Legacy(LegacyTarget {
                subjects: vec![all_of(vec![
                    string_match(categories::ACCESS_SUBJECT, "clearance", "high", true),
                    string_match(categories::ACCESS_SUBJECT, "role", "guest", false),
                ])],
                ..LegacyTarget::default()
            });
            assert_matches!(match_target(&target, facade), MatchResult::Indeterminate(_));
        });
    }

    #[test]
    fn v3_no_match_outranks_indeterminate() {
        let req = request();
        with_facade(&req, |facade| {
            let missing = string_match(categories::ACCESS_SUBJECT, "clearance", "high", true);
            let no = string_match(categories::ACCESS_SUBJECT, "role", "guest", false);
            let yes = string_match(categories::ACTION, "action-id", "read", false);

            // AllOf: Indeterminate then NoMatch is NoMatch
            let target = Target::AnyOf(vec![AnyOf {
                all_of: vec![all_of(vec![missing.clone(), no.clone()])],
            }]);
            assert_eq!(match_target(&target, facade), MatchResult::NoMatch);

            // AnyOf: Indeterminate or Match is Match
            let target = Target::AnyOf(vec![AnyOf {
                all_of: vec![all_of(vec![missing.clone()]), all_of(vec![yes.clone()])],
            }]);
            assert!(match_target(&target, facade).is_match());

            // Target: Indeterminate and NoMatch is NoMatch
            let target = Target::AnyOf(vec![
                AnyOf {
                    all_of: vec![all_of(vec![missing.clone()])],
                },
                AnyOf {
                    all_of: vec![all_of(vec![no])],
                },
            ]);
            assert_eq!(match_target(&target, facade), MatchResult::NoMatch);

            // Target: Indeterminate and Match is Indeterminate
            let target = Target::AnyOf(vec![
                AnyOf {
                    all_of: vec![all_of(vec![missing])],
                },
                AnyOf {
                    all_of: vec![all_of(vec![yes])],
                },
            ]);
            assert_matches!(match_target(&target, facade), MatchResult::Indeterminate(_));
        });
    }

    #[test]
    fn matched_literals_are_reported() {
        let req = request();
        with_facade(&req, |facade| {
            let target = Target::AnyOf(vec![
                AnyOf {
                    all_of: vec![all_of(vec![string_match(
                        categories::ACCESS_SUBJECT,
                        "role",
                        "admin",
                        false,
                    )])],
                },
                AnyOf {
                    all_of: vec![all_of(vec![string_match(
                        categories::ACTION,
                        "action-id",
                        "read",
                        false,
                    )])],
                },
            ]);
            assert_eq!(
                match_target(&target, facade),
                MatchResult::Match(vec![
                    AttributeValue::string("admin"),
                    AttributeValue::string("read")
                ])
            );
        });
    }
}
