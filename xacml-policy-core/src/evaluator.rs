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

//! This module contains the evaluator: expressions, rules and policy trees.

use crate::ast::*;
use crate::attributes::AttributeFacade;
use crate::functions::{higher_order, logical, FunctionKind};
use crate::policy_source::PolicySource;
use std::cell::Cell;

mod err;
pub use err::*;
mod rule;
mod tree;

const REQUIRED_STACK_SPACE: usize = 1024 * 100;

/// Evaluator object.
///
/// Holds everything one individual request is evaluated against. An
/// evaluator is created per individual request and never shared between
/// threads; the policies it evaluates are.
pub struct Evaluator<'e> {
    /// Attribute lookups for the current request
    facade: AttributeFacade<'e>,
    /// Resolves policy references
    source: &'e dyn PolicySource,
    /// How many references may be followed from the root
    max_reference_depth: usize,
    /// References currently being followed
    reference_depth: Cell<usize>,
}

impl<'e> Evaluator<'e> {
    /// Create a fresh evaluator for one individual request
    pub fn new(
        facade: AttributeFacade<'e>,
        source: &'e dyn PolicySource,
        max_reference_depth: usize,
    ) -> Self {
        Self {
            facade,
            source,
            max_reference_depth,
            reference_depth: Cell::new(0),
        }
    }

    /// The attribute façade of the current request
    pub fn facade(&self) -> &AttributeFacade<'e> {
        &self.facade
    }

    /// Interpret an expression into a value or a bag.
    ///
    /// Arguments of strict functions are evaluated left to right and the
    /// first error is returned without evaluating the rest. Logical
    /// functions evaluate only what can still change their result.
    pub fn interpret(&self, expr: &Expr) -> Result<Value> {
        stack_size_check()?;

        match expr {
            Expr::Value(v) => Ok(Value::from(v.clone())),
            Expr::Designator(d) => resolve_designator(d, &self.facade).map(Value::from),
            Expr::Selector(s) => resolve_selector(s, &self.facade).map(Value::from),
            Expr::Apply(apply) => self.interpret_apply(apply),
            Expr::Function(f) => Err(EvaluationError::unexpected_function_reference(
                f.id().clone(),
            )),
            Expr::Variable(v) => self.interpret(&v.definition.expr),
        }
    }

    fn interpret_apply(&self, apply: &Apply) -> Result<Value> {
        let function = apply.function();
        match function.kind() {
            FunctionKind::Strict { .. } => {
                let args = apply
                    .args()
                    .iter()
                    .map(|arg| self.interpret(arg))
                    .collect::<Result<Vec<_>>>()?;
                function.call(&args)
            }
            FunctionKind::Logical(op) => {
                logical::fold(*op, function.id(), apply.args(), |arg| self.interpret(arg))
            }
            FunctionKind::HigherOrder { op, .. } => match apply.args().split_first() {
                Some((Expr::Function(g), rest)) => {
                    let args = rest
                        .iter()
                        .map(|arg| self.interpret(arg))
                        .collect::<Result<Vec<_>>>()?;
                    higher_order::apply(*op, function.id(), g, &args)
                }
                _ => Err(EvaluationError::failed_function_application(
                    function.id().clone(),
                    "the first argument must be a function",
                )),
            },
        }
    }

    /// Evaluate the obligation or advice expressions that accompany
    /// `effect`. A bag-valued assignment yields one assignment per member.
    pub(crate) fn fulfil(
        &self,
        effect: Effect,
        expressions: &[ObligationExpression],
    ) -> Result<Vec<Obligation>> {
        expressions
            .iter()
            .filter(|o| o.applies_to == effect)
            .map(|o| {
                let mut assignments = Vec::with_capacity(o.assignments.len());
                for a in &o.assignments {
                    let assign = |value: AttributeValue| AttributeAssignment {
                        attribute_id: a.attribute_id.clone(),
                        category: a.category.clone(),
                        issuer: a.issuer.clone(),
                        value,
                    };
                    match self.interpret(&a.expr)? {
                        Value::Attribute(v) => assignments.push(assign(v)),
                        Value::Bag(bag) => assignments.extend(bag.iter().cloned().map(assign)),
                    }
                }
                Ok(Obligation {
                    id: o.id.clone(),
                    fulfill_on: effect,
                    assignments,
                })
            })
            .collect()
    }

    /// Attach the obligations and advice of a rule or policy to a Permit or
    /// Deny result, after those already carried. Failing to evaluate them
    /// makes the result Indeterminate.
    pub(crate) fn attach_obligations(
        &self,
        mut result: DecisionResult,
        obligations: &[ObligationExpression],
        advice: &[AdviceExpression],
    ) -> DecisionResult {
        let Some(effect) = result.decision.effect() else {
            return result;
        };
        let evaluated = self
            .fulfil(effect, obligations)
            .and_then(|o| Ok((o, self.fulfil(effect, advice)?)));
        match evaluated {
            Ok((obligations, advice)) => {
                result.obligations.extend(obligations);
                result.advice.extend(advice);
                result
            }
            Err(err) => DecisionResult {
                policy_identifiers: result.policy_identifiers,
                ..DecisionResult::from_error(IndeterminateKind::of(effect), &err)
            },
        }
    }
}

impl std::fmt::Debug for Evaluator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<Evaluator at reference depth {} of {}>",
            self.reference_depth.get(),
            self.max_reference_depth
        )
    }
}

/// Evaluate a designator: resolve its query, and fail if the result is
/// empty and the designator requires a value
pub(crate) fn resolve_designator(
    designator: &AttributeDesignator,
    facade: &AttributeFacade<'_>,
) -> Result<Bag> {
    let bag = facade.find(&designator.query())?;
    if bag.is_empty() && designator.must_be_present {
        return Err(EvaluationError::missing_attribute(
            designator.missing_detail(),
        ));
    }
    Ok(bag)
}

/// Evaluate a selector, with the same presence rule as a designator
pub(crate) fn resolve_selector(
    selector: &AttributeSelector,
    facade: &AttributeFacade<'_>,
) -> Result<Bag> {
    let bag = facade.select(&selector.query())?;
    if bag.is_empty() && selector.must_be_present {
        return Err(EvaluationError::missing_attribute(selector.missing_detail()));
    }
    Ok(bag)
}

fn stack_size_check() -> Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if stacker::remaining_stack().unwrap_or(0) < REQUIRED_STACK_SPACE {
            return Err(EvaluationError::recursion_limit());
        }
    }
    Ok(())
}

#[cfg(test)]
// PANIC SAFETY: Unit Test Code
#[allow(clippy::indexing_slicing)]
pub(crate) mod test {
    use super::*;
    use crate::attributes::test_resolvers::CountingResolver;
    use crate::attributes::{AttributeResolver, Clock};
    use crate::functions::{Function, FunctionRegistry};
    use crate::policy_source::PolicyStore;
    use cool_asserts::assert_matches;
    use std::sync::Arc;

    pub fn function(id: &str) -> Arc<Function> {
        let uri = if id.contains(':') {
            id.to_string()
        } else {
            format!("urn:oasis:names:tc:xacml:1.0:function:{id}")
        };
        Arc::clone(FunctionRegistry::standard().get(&uri).unwrap())
    }

    pub fn apply(id: &str, args: Vec<Expr>) -> Expr {
        Expr::apply(function(id), args).unwrap()
    }

    pub fn designator(category: &str, id: &str, dt: DataType) -> AttributeDesignator {
        AttributeDesignator::new(category, id, dt)
    }

    /// Run `f` with an evaluator over `request` and no policies
    pub fn with_evaluator<T>(request: &Request, f: impl FnOnce(&Evaluator<'_>) -> T) -> T {
        let clock = Clock::now();
        let store = PolicyStore::default();
        let eval = Evaluator::new(AttributeFacade::new(request, &[], &clock), &store, 8);
        f(&eval)
    }

    fn beatles() -> Request {
        Request::new().with_category_attribute(
            categories::ACCESS_SUBJECT,
            Attribute::new(
                "band",
                vec![
                    AttributeValue::string("Paul"),
                    AttributeValue::string("George"),
                    AttributeValue::string("Ringo"),
                ],
            ),
        )
    }

    #[test]
    fn interpret_literals_and_applications() {
        with_evaluator(&Request::new(), |eval| {
            assert_eq!(
                eval.interpret(&Expr::val(AttributeValue::Integer(3))).unwrap(),
                Value::from(AttributeValue::Integer(3))
            );
            let sum = apply(
                "integer-add",
                vec![
                    Expr::val(AttributeValue::Integer(3)),
                    Expr::val(AttributeValue::Integer(4)),
                ],
            );
            assert_eq!(
                eval.interpret(&sum).unwrap(),
                Value::from(AttributeValue::Integer(7))
            );
        });
    }

    #[test]
    fn higher_order_over_designator() {
        let request = beatles();
        with_evaluator(&request, |eval| {
            let band = Expr::Designator(designator(
                categories::ACCESS_SUBJECT,
                "band",
                DataType::String,
            ));
            let any_of = apply(
                "urn:oasis:names:tc:xacml:3.0:function:any-of",
                vec![
                    Expr::Function(function("string-equal")),
                    Expr::val("Paul"),
                    band.clone(),
                ],
            );
            assert_eq!(eval.interpret(&any_of).unwrap(), Value::from(true));
            let all_of = apply(
                "urn:oasis:names:tc:xacml:3.0:function:all-of",
                vec![
                    Expr::Function(function("string-equal")),
                    Expr::val("Paul"),
                    band,
                ],
            );
            assert_eq!(eval.interpret(&all_of).unwrap(), Value::from(false));
        });
    }

    #[test]
    fn must_be_present() {
        with_evaluator(&Request::new(), |eval| {
            let d = designator(categories::RESOURCE, "owner", DataType::String);
            assert_eq!(
                eval.interpret(&Expr::Designator(d.clone())).unwrap(),
                Value::from(Bag::empty(DataType::String))
            );
            assert_matches!(
                eval.interpret(&Expr::Designator(d.required())),
                Err(e) if e.status_code() == StatusCode::MissingAttribute
            );
        });
    }

    #[test]
    fn strict_arguments_short_circuit() {
        let resolver = Arc::new(CountingResolver::serving("owner", vec![]));
        let resolvers: Vec<Arc<dyn AttributeResolver>> = vec![resolver.clone()];
        let request = Request::new();
        let clock = Clock::now();
        let store = PolicyStore::default();
        let eval = Evaluator::new(AttributeFacade::new(&request, &resolvers, &clock), &store, 8);
        let failing = apply(
            "integer-divide",
            vec![
                Expr::val(AttributeValue::Integer(1)),
                Expr::val(AttributeValue::Integer(0)),
            ],
        );
        let lookup = apply(
            "string-bag-size",
            vec![Expr::Designator(designator(
                categories::RESOURCE,
                "owner",
                DataType::String,
            ))],
        );
        let sum = apply("integer-add", vec![failing, lookup]);
        assert_matches!(
            eval.interpret(&sum),
            Err(e) if matches!(e.error_kind(), EvaluationErrorKind::FailedFunctionApplication { .. })
        );
        assert_eq!(resolver.calls(), 0);
    }

    #[test]
    fn function_reference_is_not_a_value() {
        with_evaluator(&Request::new(), |eval| {
            assert_matches!(
                eval.interpret(&Expr::Function(function("string-equal"))),
                Err(e) if matches!(e.error_kind(), EvaluationErrorKind::UnexpectedFunctionReference(_))
            );
        });
    }

    #[test]
    fn variables_evaluate_their_definition() {
        let definition = Arc::new(VariableDefinition {
            id: "seven".into(),
            expr: apply(
                "integer-add",
                vec![
                    Expr::val(AttributeValue::Integer(3)),
                    Expr::val(AttributeValue::Integer(4)),
                ],
            ),
        });
        with_evaluator(&Request::new(), |eval| {
            assert_eq!(
                eval.interpret(&Expr::Variable(VariableReference { definition }))
                    .unwrap(),
                Value::from(AttributeValue::Integer(7))
            );
        });
    }

    #[test]
    fn obligations_expand_bags() {
        let request = beatles();
        with_evaluator(&request, |eval| {
            let expressions = vec![
                ObligationExpression::new("notify", Effect::Permit).with_assignment(
                    "member",
                    Expr::Designator(designator(
                        categories::ACCESS_SUBJECT,
                        "band",
                        DataType::String,
                    )),
                ),
                ObligationExpression::new("audit", Effect::Deny),
            ];
            let obligations = eval.fulfil(Effect::Permit, &expressions).unwrap();
            assert_eq!(obligations.len(), 1);
            let members: Vec<_> = obligations[0]
                .assignments
                .iter()
                .map(|a| a.value.to_string())
                .collect();
            assert_eq!(members.len(), 3);
            assert!(members.contains(&"Ringo".to_string()));
        });
    }
}
