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

//! Implementation of an XACML policy decision point in Rust.
//!
//! The crate is organised leaf-first: the [`ast`] value algebra and policy
//! tree, the [`functions`] catalog, the [`evaluator`] (expressions, rules and
//! policy trees), the [`combining`] algorithms, and finally the [`authorizer`]
//! which turns a [`ast::Request`] into an [`ast::Response`].
#![forbid(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod ast;
pub mod attributes;
pub mod authorizer;
pub mod combining;
pub mod config;
pub mod est;
pub mod evaluator;
pub mod functions;
pub mod matcher;
pub mod policy_source;
pub mod registry;

pub use authorizer::Pdp;
pub use config::EngineConfig;
pub use registry::Registry;
