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

//! Attribute resolution: how designators and selectors obtain their bags.
//!
//! The request is consulted first. Only when it holds no matching value are
//! the configured [`AttributeResolver`]s asked, in order, and the first
//! non-empty bag wins. Whether an empty result is an error is decided by the
//! designator, never here.

use crate::ast::{attributes, categories, AttributeValue, Bag, DataType, DateTime, Request};
use crate::evaluator::{self, EvaluationError};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A lookup by category, attribute identifier, data type and issuer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeQuery<'a> {
    /// Category URI
    pub category: &'a str,
    /// Attribute identifier
    pub attribute_id: &'a str,
    /// Only values of this type are returned
    pub data_type: DataType,
    /// If set, only attributes from this issuer are returned
    pub issuer: Option<&'a str>,
}

/// A lookup by path into the content of a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelectorQuery<'a> {
    /// Category URI
    pub category: &'a str,
    /// Only values of this type are returned
    pub data_type: DataType,
    /// Attribute holding the context node for `path`
    pub context_selector_id: Option<&'a str>,
    /// The path
    pub path: &'a str,
    /// Version of the path language
    pub xpath_version: Option<&'a str>,
}

/// A source of attributes outside the request, such as a directory or a
/// database.
///
/// Implementations are shared between concurrently evaluated requests.
pub trait AttributeResolver: Send + Sync {
    /// Find the values of an attribute the request does not carry. An empty
    /// bag means the resolver knows nothing about it.
    fn find_attribute(&self, query: &AttributeQuery<'_>, request: &Request)
        -> evaluator::Result<Bag>;

    /// Evaluate a selector. Resolvers that do not support paths return an
    /// empty bag.
    fn select(&self, query: &SelectorQuery<'_>, request: &Request) -> evaluator::Result<Bag> {
        let _ = request;
        Ok(Bag::empty(query.data_type))
    }
}

/// The time at which an individual request is evaluated. Every
/// `current-time`, `current-date` and `current-dateTime` lookup in one
/// evaluation sees the same instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clock {
    now: DateTime,
}

impl Clock {
    /// The current system time
    pub fn now() -> Self {
        Self {
            now: DateTime::now(),
        }
    }

    /// A fixed instant
    pub fn fixed(now: DateTime) -> Self {
        Self { now }
    }

    /// The instant
    pub fn instant(&self) -> &DateTime {
        &self.now
    }

    /// The value of one of the environment's current time attributes, if
    /// `query` asks for one
    fn environment_value(&self, query: &AttributeQuery<'_>) -> Option<AttributeValue> {
        if query.category != categories::ENVIRONMENT || query.issuer.is_some() {
            return None;
        }
        let value = match query.attribute_id {
            attributes::CURRENT_TIME => AttributeValue::Time(self.now.time()),
            attributes::CURRENT_DATE => AttributeValue::Date(self.now.date()),
            attributes::CURRENT_DATE_TIME => AttributeValue::DateTime(self.now.clone()),
            _ => return None,
        };
        (value.data_type() == query.data_type).then_some(value)
    }
}

/// Everything attribute lookups may consult while one individual request is
/// evaluated
#[derive(Clone, Copy)]
pub struct AttributeFacade<'a> {
    request: &'a Request,
    resolvers: &'a [Arc<dyn AttributeResolver>],
    clock: &'a Clock,
}

impl<'a> AttributeFacade<'a> {
    /// A façade over `request`, falling back to `resolvers`
    pub fn new(
        request: &'a Request,
        resolvers: &'a [Arc<dyn AttributeResolver>],
        clock: &'a Clock,
    ) -> Self {
        Self {
            request,
            resolvers,
            clock,
        }
    }

    /// The request being evaluated
    pub fn request(&self) -> &'a Request {
        self.request
    }

    /// Resolve a designator's query
    pub fn find(&self, query: &AttributeQuery<'_>) -> evaluator::Result<Bag> {
        let bag = self.request.find(query);
        if !bag.is_empty() {
            return Ok(bag);
        }
        if let Some(value) = self.clock.environment_value(query) {
            return Ok(Bag::singleton(value));
        }
        for (i, resolver) in self.resolvers.iter().enumerate() {
            let bag = resolver.find_attribute(query, self.request).map_err(|e| {
                warn!(
                    resolver = i,
                    attribute = query.attribute_id,
                    error = %e,
                    "attribute resolver failed"
                );
                EvaluationError::resolution_failure(e.to_string())
            })?;
            checked_type(&bag, query.data_type)?;
            if !bag.is_empty() {
                debug!(
                    resolver = i,
                    attribute = query.attribute_id,
                    size = bag.len(),
                    "attribute supplied by resolver"
                );
                return Ok(bag);
            }
        }
        Ok(Bag::empty(query.data_type))
    }

    /// Resolve a selector's query
    pub fn select(&self, query: &SelectorQuery<'_>) -> evaluator::Result<Bag> {
        for (i, resolver) in self.resolvers.iter().enumerate() {
            let bag = resolver.select(query, self.request).map_err(|e| {
                warn!(resolver = i, path = query.path, error = %e, "attribute selector failed");
                EvaluationError::resolution_failure(e.to_string())
            })?;
            checked_type(&bag, query.data_type)?;
            if !bag.is_empty() {
                return Ok(bag);
            }
        }
        debug!(path = query.path, "selector found nothing");
        Ok(Bag::empty(query.data_type))
    }
}

impl fmt::Debug for AttributeFacade<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeFacade")
            .field("request", self.request)
            .field("resolvers", &self.resolvers.len())
            .field("clock", self.clock)
            .finish()
    }
}

fn checked_type(bag: &Bag, expected: DataType) -> evaluator::Result<()> {
    if bag.data_type() == expected {
        Ok(())
    } else {
        Err(EvaluationError::resolution_failure(format!(
            "resolver returned a bag of {} where {expected} was requested",
            bag.data_type()
        )))
    }
}

#[cfg(test)]
pub(crate) mod test_resolvers {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves one attribute and counts how often it is asked
    #[derive(Debug, Default)]
    pub struct CountingResolver {
        pub calls: AtomicUsize,
        pub attribute_id: &'static str,
        pub values: Vec<AttributeValue>,
    }

    impl CountingResolver {
        pub fn serving(attribute_id: &'static str, values: Vec<AttributeValue>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                attribute_id,
                values,
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl AttributeResolver for CountingResolver {
        fn find_attribute(
            &self,
            query: &AttributeQuery<'_>,
            _request: &Request,
        ) -> evaluator::Result<Bag> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if query.attribute_id == self.attribute_id {
                Bag::new(query.data_type, self.values.iter().cloned())
                    .map_err(|e| EvaluationError::resolution_failure(e.to_string()))
            } else {
                Ok(Bag::empty(query.data_type))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::test_resolvers::CountingResolver;
    use super::*;
    use crate::ast::StatusCode;
    use crate::evaluator::EvaluationErrorKind;
    use cool_asserts::assert_matches;

    fn query<'a>(attribute_id: &'a str, data_type: DataType) -> AttributeQuery<'a> {
        AttributeQuery {
            category: categories::ACCESS_SUBJECT,
            attribute_id,
            data_type,
            issuer: None,
        }
    }

    #[test]
    fn request_wins_over_resolvers() {
        let request = Request::new().with_attribute(
            categories::ACCESS_SUBJECT,
            "role",
            AttributeValue::string("admin"),
        );
        let resolver = Arc::new(CountingResolver::serving(
            "role",
            vec![AttributeValue::string("guest")],
        ));
        let resolvers: Vec<Arc<dyn AttributeResolver>> = vec![resolver.clone()];
        let clock = Clock::now();
        let facade = AttributeFacade::new(&request, &resolvers, &clock);

        let bag = facade.find(&query("role", DataType::String)).unwrap();
        assert_eq!(bag, Bag::singleton(AttributeValue::string("admin")));
        assert_eq!(resolver.calls(), 0);

        let bag = facade.find(&query("nickname", DataType::String)).unwrap();
        assert!(bag.is_empty());
        assert_eq!(resolver.calls(), 1);
    }

    #[test]
    fn first_non_empty_resolver_wins() {
        let request = Request::new();
        let resolvers: Vec<Arc<dyn AttributeResolver>> = vec![
            Arc::new(CountingResolver::serving("other", vec![])),
            Arc::new(CountingResolver::serving(
                "role",
                vec![AttributeValue::string("a")],
            )),
            Arc::new(CountingResolver::serving(
                "role",
                vec![AttributeValue::string("b")],
            )),
        ];
        let clock = Clock::now();
        let facade = AttributeFacade::new(&request, &resolvers, &clock);
        assert_eq!(
            facade.find(&query("role", DataType::String)).unwrap(),
            Bag::singleton(AttributeValue::string("a"))
        );
    }

    #[test]
    fn mistyped_resolver_result_is_an_error() {
        #[derive(Debug)]
        struct Wrong;
        impl AttributeResolver for Wrong {
            fn find_attribute(
                &self,
                _query: &AttributeQuery<'_>,
                _request: &Request,
            ) -> evaluator::Result<Bag> {
                Ok(Bag::singleton(AttributeValue::Integer(1)))
            }
        }
        let request = Request::new();
        let resolvers: Vec<Arc<dyn AttributeResolver>> = vec![Arc::new(Wrong)];
        let clock = Clock::now();
        let facade = AttributeFacade::new(&request, &resolvers, &clock);
        assert_matches!(
            facade.find(&query("role", DataType::String)),
            Err(e) if matches!(e.error_kind(), EvaluationErrorKind::ResolutionFailure(_))
        );
    }

    #[test]
    fn resolver_errors_are_processing_errors() {
        #[derive(Debug)]
        struct Failing;
        impl AttributeResolver for Failing {
            fn find_attribute(
                &self,
                _query: &AttributeQuery<'_>,
                _request: &Request,
            ) -> evaluator::Result<Bag> {
                Err(EvaluationError::syntax("backend said no"))
            }

            fn select(
                &self,
                _query: &SelectorQuery<'_>,
                _request: &Request,
            ) -> evaluator::Result<Bag> {
                Err(EvaluationError::syntax("backend said no"))
            }
        }
        let request = Request::new();
        let resolvers: Vec<Arc<dyn AttributeResolver>> = vec![Arc::new(Failing)];
        let clock = Clock::now();
        let facade = AttributeFacade::new(&request, &resolvers, &clock);

        let err = facade.find(&query("role", DataType::String)).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::ProcessingError);
        assert!(err.to_string().contains("backend said no"), "{err}");

        let selector = SelectorQuery {
            category: categories::RESOURCE,
            data_type: DataType::String,
            context_selector_id: None,
            path: "/record/owner",
            xpath_version: None,
        };
        let err = facade.select(&selector).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::ProcessingError);
    }

    #[test]
    fn current_time_comes_from_the_clock() {
        let now: DateTime = "2024-05-01T10:15:00Z".parse().unwrap();
        let clock = Clock::fixed(now.clone());
        let request = Request::new();
        let facade = AttributeFacade::new(&request, &[], &clock);
        let q = AttributeQuery {
            category: categories::ENVIRONMENT,
            attribute_id: attributes::CURRENT_DATE_TIME,
            data_type: DataType::DateTime,
            issuer: None,
        };
        assert_eq!(
            facade.find(&q).unwrap(),
            Bag::singleton(AttributeValue::DateTime(now))
        );
        let wrong_type = AttributeQuery {
            data_type: DataType::Date,
            ..q
        };
        assert!(facade.find(&wrong_type).unwrap().is_empty());
    }
}
