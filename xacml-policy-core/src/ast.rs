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

//! This module contains the AST datatypes.

mod bag;
pub use bag::*;
mod data_type;
pub use data_type::*;
mod expr;
pub use expr::*;
mod id;
pub use id::*;
mod name_types;
pub use name_types::*;
mod network;
pub use network::*;
mod obligation;
pub use obligation::*;
mod policy;
pub use policy::*;
mod request;
pub use request::*;
mod response;
pub use response::*;
mod rule;
pub use rule::*;
mod target;
pub use target::*;
mod temporal;
pub use temporal::*;
mod value;
pub use value::*;
mod version;
pub use version::*;
