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

//! The function catalog: every function an `Apply` can call, identified by
//! URI, together with its signature.

/// Extract the payload of one `AttributeValue` variant from an argument,
/// or fail with a type error
macro_rules! arg {
    ($value:expr, $variant:ident) => {
        match $value.get_as_attribute()? {
            $crate::ast::AttributeValue::$variant(x) => x,
            other => {
                return Err($crate::evaluator::EvaluationError::type_error(
                    stringify!($variant),
                    $crate::ast::ExprType::scalar(other.data_type()),
                ))
            }
        }
    };
}

mod arithmetic;
mod bag;
mod comparison;
mod conversion;
mod equality;
pub(crate) mod higher_order;
pub(crate) mod logical;
mod matching;
mod set;
mod string;

pub use higher_order::HigherOrderOp;
pub use logical::LogicalOp;

use crate::ast::{ArgType, DataType, ExprType, Value};
use crate::evaluator::{self, EvaluationError};
use itertools::Itertools;
use miette::Diagnostic;
use smol_str::SmolStr;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub(crate) const F1: &str = "urn:oasis:names:tc:xacml:1.0:function:";
pub(crate) const F2: &str = "urn:oasis:names:tc:xacml:2.0:function:";
pub(crate) const F3: &str = "urn:oasis:names:tc:xacml:3.0:function:";

/// The Rust closure implementing a strict function. Arguments have already
/// been checked against the declared [`Params`].
pub type FunctionObject = Arc<dyn Fn(&[Value]) -> evaluator::Result<Value> + Send + Sync + 'static>;

/// Declared parameters of a strict or logical function
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Params {
    /// Exactly these parameters
    Fixed(Vec<ExprType>),
    /// `fixed` followed by at least `min_rest` parameters of type `rest`
    Variadic {
        /// Leading parameters
        fixed: Vec<ExprType>,
        /// Type of every further parameter
        rest: ExprType,
        /// Minimum number of further parameters
        min_rest: usize,
    },
}

impl Params {
    /// Whether `n` arguments are acceptable
    pub fn accepts(&self, n: usize) -> bool {
        match self {
            Self::Fixed(ps) => ps.len() == n,
            Self::Variadic {
                fixed, min_rest, ..
            } => n >= fixed.len() + min_rest,
        }
    }

    /// The smallest acceptable number of arguments
    pub fn min_len(&self) -> usize {
        match self {
            Self::Fixed(ps) => ps.len(),
            Self::Variadic {
                fixed, min_rest, ..
            } => fixed.len() + min_rest,
        }
    }

    /// The declared type of the argument at `index`
    pub fn get(&self, index: usize) -> Option<ExprType> {
        match self {
            Self::Fixed(ps) => ps.get(index).copied(),
            Self::Variadic { fixed, rest, .. } => Some(fixed.get(index).copied().unwrap_or(*rest)),
        }
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(ps) => write!(f, "({})", ps.iter().join(", ")),
            Self::Variadic {
                fixed,
                rest,
                min_rest,
            } => {
                let leading = fixed.iter().map(ToString::to_string);
                let repeated = std::iter::repeat_n(rest.to_string(), *min_rest);
                write!(f, "({}, {rest}...)", leading.chain(repeated).join(", "))
            }
        }
    }
}

pub(crate) enum FunctionKind {
    Strict {
        params: Params,
        return_type: ExprType,
        func: FunctionObject,
    },
    Logical(LogicalOp),
    HigherOrder {
        op: HigherOrderOp,
        /// XACML 1.0 signatures, which take exactly two arguments after the
        /// function
        legacy: bool,
    },
}

/// A function that can be applied in expressions.
///
/// Functions are compared by identifier.
pub struct Function {
    id: SmolStr,
    kind: FunctionKind,
}

impl Function {
    /// A strict function: arguments are evaluated left to right before the
    /// call and the first error short-circuits
    pub fn new(
        id: impl Into<SmolStr>,
        params: Params,
        return_type: ExprType,
        func: FunctionObject,
    ) -> Self {
        Self {
            id: id.into(),
            kind: FunctionKind::Strict {
                params,
                return_type,
                func,
            },
        }
    }

    /// A strict function of one argument
    pub fn unary(
        id: impl Into<SmolStr>,
        arg: ExprType,
        return_type: ExprType,
        func: impl Fn(&Value) -> evaluator::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        let id: SmolStr = id.into();
        let name = id.clone();
        Self::new(
            id,
            Params::Fixed(vec![arg]),
            return_type,
            Arc::new(move |args: &[Value]| match args {
                [a] => func(a),
                _ => Err(EvaluationError::wrong_num_arguments(
                    name.clone(),
                    1,
                    args.len(),
                )),
            }),
        )
    }

    /// A strict function of two arguments
    pub fn binary(
        id: impl Into<SmolStr>,
        args: (ExprType, ExprType),
        return_type: ExprType,
        func: impl Fn(&Value, &Value) -> evaluator::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        let id: SmolStr = id.into();
        let name = id.clone();
        Self::new(
            id,
            Params::Fixed(vec![args.0, args.1]),
            return_type,
            Arc::new(move |args: &[Value]| match args {
                [a, b] => func(a, b),
                _ => Err(EvaluationError::wrong_num_arguments(
                    name.clone(),
                    2,
                    args.len(),
                )),
            }),
        )
    }

    pub(crate) fn logical(id: impl Into<SmolStr>, op: LogicalOp) -> Self {
        Self {
            id: id.into(),
            kind: FunctionKind::Logical(op),
        }
    }

    pub(crate) fn higher_order(id: impl Into<SmolStr>, op: HigherOrderOp, legacy: bool) -> Self {
        Self {
            id: id.into(),
            kind: FunctionKind::HigherOrder { op, legacy },
        }
    }

    /// The same function under another identifier
    pub fn alias(&self, id: impl Into<SmolStr>) -> Self {
        let kind = match &self.kind {
            FunctionKind::Strict {
                params,
                return_type,
                func,
            } => FunctionKind::Strict {
                params: params.clone(),
                return_type: *return_type,
                func: Arc::clone(func),
            },
            FunctionKind::Logical(op) => FunctionKind::Logical(*op),
            FunctionKind::HigherOrder { op, legacy } => FunctionKind::HigherOrder {
                op: *op,
                legacy: *legacy,
            },
        };
        Self {
            id: id.into(),
            kind,
        }
    }

    /// The function identifier
    pub fn id(&self) -> &SmolStr {
        &self.id
    }

    pub(crate) fn kind(&self) -> &FunctionKind {
        &self.kind
    }

    /// Whether the function takes another function as its first argument
    pub fn is_higher_order(&self) -> bool {
        matches!(self.kind, FunctionKind::HigherOrder { .. })
    }

    /// The declared parameters, if the function has a fixed signature
    pub fn params(&self) -> Option<Params> {
        match &self.kind {
            FunctionKind::Strict { params, .. } => Some(params.clone()),
            FunctionKind::Logical(op) => Some(op.params()),
            FunctionKind::HigherOrder { .. } => None,
        }
    }

    /// Check argument types when an `Apply` is built, returning the type of
    /// the result
    pub fn check_inputs(&self, args: &[ArgType<'_>]) -> Result<ExprType, FunctionInputError> {
        match &self.kind {
            FunctionKind::Strict {
                params,
                return_type,
                ..
            } => {
                self.check_params(params, args)?;
                Ok(*return_type)
            }
            FunctionKind::Logical(op) => {
                self.check_params(&op.params(), args)?;
                Ok(ExprType::boolean())
            }
            FunctionKind::HigherOrder { op, legacy } => {
                higher_order::check_inputs(self, *op, *legacy, args)
            }
        }
    }

    fn check_params(
        &self,
        params: &Params,
        args: &[ArgType<'_>],
    ) -> Result<(), FunctionInputError> {
        if !params.accepts(args.len()) {
            return Err(FunctionInputError::WrongArity {
                function_id: self.id.clone(),
                expected: params.to_string(),
                actual: args.len(),
            });
        }
        for (index, arg) in args.iter().enumerate() {
            let expected = params.get(index);
            match (arg, expected) {
                (ArgType::Function(f), _) => {
                    return Err(FunctionInputError::UnexpectedFunction {
                        function_id: self.id.clone(),
                        argument: f.id.clone(),
                        index,
                    })
                }
                (ArgType::Value(actual), Some(expected)) if *actual != expected => {
                    return Err(FunctionInputError::TypeMismatch {
                        function_id: self.id.clone(),
                        index,
                        expected,
                        actual: *actual,
                    })
                }
                _ => (),
            }
        }
        Ok(())
    }

    /// Check evaluated arguments against the declared parameters
    pub fn check_values(&self, args: &[Value]) -> evaluator::Result<()> {
        let Some(params) = self.params() else {
            return Ok(());
        };
        if !params.accepts(args.len()) {
            return Err(EvaluationError::wrong_num_arguments(
                self.id.clone(),
                params.min_len(),
                args.len(),
            ));
        }
        for (index, arg) in args.iter().enumerate() {
            if let Some(expected) = params.get(index) {
                if arg.expr_type() != expected {
                    return Err(EvaluationError::type_error(
                        expected.to_string(),
                        arg.expr_type(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Call the function on already-evaluated arguments.
    ///
    /// Logical functions evaluate eagerly here; this path is taken when they
    /// are passed to a higher-order function.
    pub fn call(&self, args: &[Value]) -> evaluator::Result<Value> {
        self.check_values(args)?;
        match &self.kind {
            FunctionKind::Strict { func, .. } => func(args),
            FunctionKind::Logical(op) => logical::fold(*op, &self.id, args, |v| Ok(v.clone())),
            FunctionKind::HigherOrder { .. } => {
                Err(EvaluationError::unexpected_function_reference(self.id.clone()))
            }
        }
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.id)
    }
}

/// An `Apply` was built with arguments its function cannot accept
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
pub enum FunctionInputError {
    /// Wrong number of arguments
    #[error("`{function_id}` expects arguments {expected}, got {actual}")]
    WrongArity {
        /// Function being applied
        function_id: SmolStr,
        /// Human readable description of the expected arguments
        expected: String,
        /// Number of arguments given
        actual: usize,
    },
    /// An argument had the wrong type
    #[error("argument {index} of `{function_id}` must be {expected}, got {actual}")]
    TypeMismatch {
        /// Function being applied
        function_id: SmolStr,
        /// Zero-based argument position
        index: usize,
        /// Declared type
        expected: ExprType,
        /// Type of the argument expression
        actual: ExprType,
    },
    /// The first argument of a higher-order function was not a function
    #[error("the first argument of `{function_id}` must be a function")]
    ExpectedFunction {
        /// Function being applied
        function_id: SmolStr,
    },
    /// A function reference was given where a value is needed
    #[error("argument {index} of `{function_id}` is the function `{argument}`, but a value is needed")]
    UnexpectedFunction {
        /// Function being applied
        function_id: SmolStr,
        /// The function passed
        argument: SmolStr,
        /// Zero-based argument position
        index: usize,
    },
    /// More than one bag was passed to `any-of`, `all-of` or `map`
    #[error("`{function_id}` accepts at most one bag argument, got {count}")]
    #[diagnostic(help("use `any-of-any` to range over several bags"))]
    TooManyBags {
        /// Function being applied
        function_id: SmolStr,
        /// Number of bag arguments
        count: usize,
    },
    /// A value was given where a bag is needed
    #[error("argument {index} of `{function_id}` must be a bag")]
    ExpectedBag {
        /// Function being applied
        function_id: SmolStr,
        /// Zero-based argument position
        index: usize,
    },
    /// A higher-order function was given a function that does not return a
    /// single boolean
    #[error("`{function_id}` needs a function returning boolean, but `{argument}` returns {returns}")]
    NotBooleanFunction {
        /// Function being applied
        function_id: SmolStr,
        /// The function passed
        argument: SmolStr,
        /// What it returns
        returns: ExprType,
    },
    /// A higher-order function was passed to a higher-order function
    #[error("`{function_id}` cannot take the higher-order function `{argument}` as an argument")]
    HigherOrderArgument {
        /// Function being applied
        function_id: SmolStr,
        /// The function passed
        argument: SmolStr,
    },
}

/// A function was registered twice
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
#[error("function `{0}` is defined more than once")]
pub struct RegistryError(pub SmolStr);

/// Functions available to policies, keyed by identifier
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<SmolStr, Arc<Function>>,
}

lazy_static::lazy_static! {
    static ref STANDARD_FUNCTIONS: FunctionRegistry = FunctionRegistry::build_standard();
}

impl FunctionRegistry {
    fn build_standard() -> Self {
        let all = equality::functions()
            .into_iter()
            .chain(arithmetic::functions())
            .chain(string::functions())
            .chain(conversion::functions())
            .chain(logical::functions())
            .chain(comparison::functions())
            .chain(bag::functions())
            .chain(set::functions())
            .chain(higher_order::functions())
            .chain(matching::functions());
        // PANIC SAFETY: the standard catalog defines every identifier once. Also tested by `standard_catalog_loads`.
        #[allow(clippy::expect_used)]
        let functions = util::collect_no_duplicates(all.map(|f| (f.id.clone(), Arc::new(f))))
            .expect("standard functions should never be defined twice");
        Self { functions }
    }

    /// The standard XACML 1.0, 2.0 and 3.0 functions
    pub fn standard() -> Self {
        STANDARD_FUNCTIONS.clone()
    }

    /// A registry with no functions
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Add a function; identifiers must be unique
    pub fn register(&mut self, function: Function) -> Result<(), RegistryError> {
        if self.functions.contains_key(&function.id) {
            return Err(RegistryError(function.id.clone()));
        }
        self.functions.insert(function.id.clone(), Arc::new(function));
        Ok(())
    }

    /// Look up a function by identifier
    pub fn get(&self, id: &str) -> Option<&Arc<Function>> {
        self.functions.get(id)
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether no function is registered
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Prefix of the bag and set functions for `dt`
pub(crate) fn type_prefix(dt: DataType) -> &'static str {
    match dt {
        DataType::DayTimeDuration | DataType::YearMonthDuration => F3,
        DataType::IpAddress | DataType::DnsName => F2,
        _ => F1,
    }
}

pub(crate) fn failed(id: &str, msg: impl Into<String>) -> EvaluationError {
    EvaluationError::failed_function_application(id, msg)
}

pub(crate) mod util {
    use std::collections::hash_map::Entry;
    use std::collections::HashMap;

    /// Collect key-value pairs into a map, failing with the first key seen
    /// twice
    pub fn collect_no_duplicates<K, V>(
        i: impl Iterator<Item = (K, V)>,
    ) -> std::result::Result<HashMap<K, V>, K>
    where
        K: Clone + std::hash::Hash + Eq,
    {
        let mut map = HashMap::with_capacity(i.size_hint().0);
        for (k, v) in i {
            match map.entry(k) {
                Entry::Occupied(occupied) => {
                    return Err(occupied.key().clone());
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(v);
                }
            }
        }
        Ok(map)
    }
}
