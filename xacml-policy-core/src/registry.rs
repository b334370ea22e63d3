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

//! The functions and combining algorithms policies may name.

use crate::combining::{
    AlgorithmScope, CombiningAlgorithm, CombiningAlgorithmRegistry, DuplicateAlgorithmError,
};
use crate::functions::{Function, FunctionRegistry, RegistryError};
use std::sync::Arc;

/// Everything identifiers in a policy are resolved against.
///
/// Built once, extended with custom functions and algorithms if needed, and
/// then shared by policy loading and the [`crate::Pdp`].
#[derive(Debug, Clone, Default)]
pub struct Registry {
    functions: FunctionRegistry,
    algorithms: CombiningAlgorithmRegistry,
}

impl Registry {
    /// The standard XACML functions and combining algorithms
    pub fn standard() -> Self {
        Self {
            functions: FunctionRegistry::standard(),
            algorithms: CombiningAlgorithmRegistry::standard(),
        }
    }

    /// A registry built from explicit parts
    pub fn new(functions: FunctionRegistry, algorithms: CombiningAlgorithmRegistry) -> Self {
        Self {
            functions,
            algorithms,
        }
    }

    /// Add a custom function
    pub fn register_function(&mut self, function: Function) -> Result<(), RegistryError> {
        self.functions.register(function)
    }

    /// Add a custom combining algorithm
    pub fn register_algorithm(
        &mut self,
        algorithm: Arc<dyn CombiningAlgorithm>,
        scope: AlgorithmScope,
    ) -> Result<(), DuplicateAlgorithmError> {
        self.algorithms.register(algorithm, scope)
    }

    /// The functions
    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// The combining algorithms
    pub fn algorithms(&self) -> &CombiningAlgorithmRegistry {
        &self.algorithms
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::{DataType, ExprType, Value};
    use crate::combining::{ids, FirstApplicable};
    use cool_asserts::assert_matches;

    #[test]
    fn extensions_do_not_shadow_standard_ids() {
        let mut registry = Registry::standard();
        assert_matches!(
            registry.register_algorithm(
                Arc::new(FirstApplicable::new(ids::POLICY_FIRST_APPLICABLE)),
                AlgorithmScope::Policy
            ),
            Err(DuplicateAlgorithmError(_))
        );
        registry
            .register_algorithm(
                Arc::new(FirstApplicable::new("urn:example:first")),
                AlgorithmScope::Both,
            )
            .unwrap();
        assert!(registry.algorithms().rule_algorithm("urn:example:first").is_some());
        assert!(registry.algorithms().policy_algorithm("urn:example:first").is_some());
    }

    #[test]
    fn custom_functions_are_found() {
        let mut registry = Registry::standard();
        let before = registry.functions().len();
        registry
            .register_function(Function::unary(
                "urn:example:function:always-true",
                ExprType::scalar(DataType::String),
                ExprType::boolean(),
                |_| Ok(Value::from(true)),
            ))
            .unwrap();
        assert_eq!(registry.functions().len(), before + 1);
        assert!(registry
            .functions()
            .get("urn:example:function:always-true")
            .is_some());
    }
}
