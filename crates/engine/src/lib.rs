// EDB - Ethereum Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! ceval engine - C++ expression evaluation over a debugger backend.
//!
//! The engine wraps debugger-supplied types and values ([`Type`], [`Value`]),
//! classifies them by C++ category, implements the C++ conversions and casts
//! ([`casting`]), synthesizes new values ([`construct`]) and evaluates
//! expression strings against a stack frame or a value ([`eval`]).
//!
//! Everything the engine needs from the debugger goes through the object-safe
//! traits in [`backend`]. [`backend::memory`] is an in-memory implementation
//! of them used by the tests and the command line tool.

pub mod apfloat;
pub mod apint;
pub mod backend;
pub mod casting;
pub mod config;
pub mod construct;
pub mod context;
pub mod error;
pub mod eval;
pub mod smart_ptr;
pub mod types;
pub mod value;

pub use config::EngineConfig;
pub use context::{Context, ContextVariable, Options, Scope};
pub use error::{Error, ErrorKind, Result};
pub use eval::{
    evaluate_expression, evaluate_expression_in_value, evaluate_expression_in_value_with_options,
    evaluate_expression_with_options, ExpressionEvaluator,
};
pub use smart_ptr::{SmartPtrRule, SmartPtrTable};
pub use types::{compare_types, Type};
pub use value::Value;
