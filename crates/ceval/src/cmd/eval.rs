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


//! `ceval eval`

use std::path::PathBuf;

use ceval_engine::{backend::scope_file::ScopeFile, ContextVariable, EngineConfig, ExpressionEvaluator, Options};
use clap::Args;
use eyre::{Result, WrapErr};
use tracing::{debug, info};

/// A `name=expression` context variable binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBinding {
    /// Name the expression can refer to
    pub name: String,
    /// Expression evaluated in the frame to produce the value
    pub expr: String,
}

fn parse_binding(text: &str) -> Result<VarBinding, String> {
    let (name, expr) = text
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=EXPRESSION, got '{text}'"))?;
    let name = name.trim();
    if name.is_empty() || expr.trim().is_empty() {
        return Err(format!("expected NAME=EXPRESSION, got '{text}'"));
    }
    Ok(VarBinding { name: name.to_string(), expr: expr.trim().to_string() })
}

/// Arguments of `ceval eval`
#[derive(Debug, Args)]
pub struct EvalArgs {
    /// TOML file describing the frame's types and variables
    #[arg(long)]
    pub scope: PathBuf,

    /// Allow assignments, increments and decrements
    #[arg(long)]
    pub allow_side_effects: bool,

    /// Context variable `NAME=EXPRESSION`, evaluated in the frame before the
    /// main expression; later bindings see earlier ones
    #[arg(long = "var", value_name = "NAME=EXPRESSION", value_parser = parse_binding)]
    pub vars: Vec<VarBinding>,

    /// Expression to evaluate
    pub expression: String,
}

/// Evaluate the expression and print `(<type>) <value>`
pub fn run_eval(args: &EvalArgs, config: EngineConfig) -> Result<()> {
    let scope = ScopeFile::load(&args.scope)?;
    let (_target, frame) = scope.build().wrap_err("Failed to build the frame from the scope file")?;
    let frame = frame.as_frame();

    let evaluator = ExpressionEvaluator::new(config);
    let allow_side_effects = args.allow_side_effects || evaluator.config().allow_side_effects;

    let mut vars: Vec<ContextVariable> = Vec::with_capacity(args.vars.len());
    for binding in &args.vars {
        let value = {
            let options = Options::new().with_side_effects(allow_side_effects).with_context_vars(&vars);
            evaluator
                .evaluate_expression_with_options(&frame, &binding.expr, &options)
                .wrap_err_with(|| format!("Failed to evaluate context variable '{}'", binding.name))?
        };
        debug!(name = %binding.name, ty = %value.ty(), "bound context variable");
        vars.push(ContextVariable::new(binding.name.clone(), value));
    }

    let options = Options::new().with_side_effects(allow_side_effects).with_context_vars(&vars);
    let value = evaluator.evaluate_expression_with_options(&frame, &args.expression, &options)?;
    info!(expression = %args.expression, ty = %value.ty(), "evaluated");
    println!("({}) {}", value.ty(), value.summary()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_binding() {
        assert_eq!(
            parse_binding("$limit = x == 1").unwrap(),
            VarBinding { name: "$limit".to_string(), expr: "x == 1".to_string() }
        );
        assert!(parse_binding("limit").is_err());
        assert!(parse_binding("=x").is_err());
        assert!(parse_binding("limit=").is_err());
    }
}
