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


//! Expression evaluation for ceval.
//!
//! Evaluates C++ expressions against a stack frame or against a value used
//! as the evaluation base, producing a typed [`Value`].
//!
//! # Main Components
//!
//! - [`lexer`] and [`parser`] - turn the expression text into an [`ast::Expr`]
//! - [`conversions`] - promotions, usual arithmetic conversions and pointer arithmetic
//! - [`ExpressionEvaluator`] - the entry points, carrying the [`EngineConfig`]
//!
//! # Basic Usage
//!
//! ```rust,ignore
//! use ceval_engine::{ExpressionEvaluator, ContextVariable, Options};
//!
//! let evaluator = ExpressionEvaluator::default();
//! let value = evaluator.evaluate_expression(&frame, "points[1].x * 2")?;
//!
//! let vars = [ContextVariable::new("limit", limit)];
//! let options = Options::new().with_side_effects(true).with_context_vars(&vars);
//! evaluator.evaluate_expression_with_options(&frame, "counter += limit", &options)?;
//! ```
//!
//! # Supported Expressions
//!
//! - **Literals**: `42`, `0x2aUL`, `1.5f`, `'a'`, `L'x'`, `true`, `nullptr`
//! - **Names**: locals, members of `this`, globals, `this`, context variables such as `$ptr`
//! - **Access**: `a.b`, `p->b`, `arr[i]`, `*p`, `&x`, smart pointers through `*` and `->`
//! - **Arithmetic**: `+`, `-`, `*`, `/`, `%`, `<<`, `>>`, `&`, `|`, `^`, `~`, pointer arithmetic
//! - **Comparison and logic**: `==`, `!=`, `<`, `<=`, `>`, `>=`, `&&`, `||`, `!`, `?:`
//! - **Mutation** (side effects enabled): `=`, `+=` and friends, `++`, `--`
//! - **Types**: `(T)x`, `T(x)`, `static_cast<T>(x)`, `reinterpret_cast<T>(x)`, `sizeof`

pub mod ast;
pub mod conversions;
mod evaluator;
pub mod lexer;
pub mod parser;

use tracing::debug;

use crate::{
    backend::FrameRef,
    config::EngineConfig,
    context::{Context, Options, Scope},
    error::Result,
    value::Value,
};

use evaluator::Evaluator;
use parser::parse_expression;

/// Entry points for expression evaluation.
///
/// Holds the engine configuration; every call builds a fresh [`Context`]
/// and nothing is cached between calls.
#[derive(Debug, Clone, Default)]
pub struct ExpressionEvaluator {
    config: EngineConfig,
}

impl ExpressionEvaluator {
    /// Create an evaluator with the given configuration
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// The configuration in use
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Options used by the entry points that take none
    pub fn default_options(&self) -> Options<'static> {
        Options::new().with_side_effects(self.config.allow_side_effects)
    }

    /// Evaluate `expr` in the scope of `frame`
    pub fn evaluate_expression(&self, frame: &FrameRef, expr: &str) -> Result<Value> {
        self.evaluate_in_scope(Scope::Frame(frame.clone()), expr, self.default_options())
    }

    /// Evaluate `expr` in the scope of `frame` with explicit options
    pub fn evaluate_expression_with_options(
        &self,
        frame: &FrameRef,
        expr: &str,
        options: &Options<'_>,
    ) -> Result<Value> {
        self.evaluate_in_scope(Scope::Frame(frame.clone()), expr, *options)
    }

    /// Evaluate `expr` with the members of `value` as its scope
    pub fn evaluate_expression_in_value(&self, value: &Value, expr: &str) -> Result<Value> {
        self.evaluate_in_scope(Scope::Value(value.clone()), expr, self.default_options())
    }

    /// Evaluate `expr` with the members of `value` as its scope and explicit options
    pub fn evaluate_expression_in_value_with_options(
        &self,
        value: &Value,
        expr: &str,
        options: &Options<'_>,
    ) -> Result<Value> {
        self.evaluate_in_scope(Scope::Value(value.clone()), expr, *options)
    }

    fn evaluate_in_scope(&self, scope: Scope, expr: &str, options: Options<'_>) -> Result<Value> {
        debug!(
            expr,
            allow_side_effects = options.allow_side_effects,
            context_vars = options.context_vars.len(),
            "evaluating expression"
        );

        let ctx = Context::new(scope, options, &self.config.smart_pointers)?;
        let parsed = parse_expression(expr, &|name| ctx.find_type(name).is_some())?;
        let result = Evaluator::new(&ctx).evaluate_expression(&parsed);

        match &result {
            Ok(value) => debug!(expr, ty = %value.ty(), "expression evaluated"),
            Err(err) => debug!(expr, kind = %err.kind(), %err, "expression evaluation failed"),
        }
        result
    }
}

/// [`ExpressionEvaluator::evaluate_expression`] with the default configuration
pub fn evaluate_expression(frame: &FrameRef, expr: &str) -> Result<Value> {
    ExpressionEvaluator::default().evaluate_expression(frame, expr)
}

/// [`ExpressionEvaluator::evaluate_expression_with_options`] with the default configuration
pub fn evaluate_expression_with_options(frame: &FrameRef, expr: &str, options: &Options<'_>) -> Result<Value> {
    ExpressionEvaluator::default().evaluate_expression_with_options(frame, expr, options)
}

/// [`ExpressionEvaluator::evaluate_expression_in_value`] with the default configuration
pub fn evaluate_expression_in_value(value: &Value, expr: &str) -> Result<Value> {
    ExpressionEvaluator::default().evaluate_expression_in_value(value, expr)
}

/// [`ExpressionEvaluator::evaluate_expression_in_value_with_options`] with the default configuration
pub fn evaluate_expression_in_value_with_options(
    value: &Value,
    expr: &str,
    options: &Options<'_>,
) -> Result<Value> {
    ExpressionEvaluator::default().evaluate_expression_in_value_with_options(value, expr, options)
}
