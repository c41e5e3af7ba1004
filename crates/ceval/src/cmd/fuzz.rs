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


//! `ceval fuzz`

use std::{collections::BTreeMap, path::PathBuf};

use ceval_engine::{backend::scope_file::ScopeFile, EngineConfig, ExpressionEvaluator, Options};
use ceval_fuzzer::{ExprGenerator, FuzzRng};
use clap::Args;
use eyre::{Result, WrapErr};
use tracing::{debug, info};

/// Arguments of `ceval fuzz`
#[derive(Debug, Args)]
pub struct FuzzArgs {
    /// TOML file describing the frame's types and variables
    #[arg(long)]
    pub scope: PathBuf,

    /// Seed of the random source
    #[arg(long, default_value = "0")]
    pub seed: u32,

    /// Number of expressions to evaluate
    #[arg(long, default_value = "100")]
    pub count: usize,

    /// Maximum operator nesting of generated expressions
    #[arg(long, default_value_t = ExprGenerator::DEFAULT_MAX_DEPTH)]
    pub depth: u32,

    /// Generate and allow assignments, increments and decrements
    #[arg(long)]
    pub allow_side_effects: bool,

    /// Print every expression with its outcome
    #[arg(long)]
    pub show: bool,
}

/// Evaluate `count` generated expressions and print how often each outcome
/// occurred.
pub fn run_fuzz(args: &FuzzArgs, config: EngineConfig) -> Result<()> {
    let scope = ScopeFile::load(&args.scope)?;
    let (_target, frame) = scope.build().wrap_err("Failed to build the frame from the scope file")?;
    let frame = frame.as_frame();

    let generator = ExprGenerator::new(scope.variables.iter().map(|var| var.name.clone()))
        .with_max_depth(args.depth)
        .with_side_effects(args.allow_side_effects);
    let evaluator = ExpressionEvaluator::new(config);
    let options = Options::new().with_side_effects(args.allow_side_effects);
    let mut rng = FuzzRng::seeded(args.seed);

    info!(seed = args.seed, count = args.count, depth = args.depth, "fuzzing");
    let mut outcomes: BTreeMap<String, usize> = BTreeMap::new();
    for _ in 0..args.count {
        let expr = generator.generate(&mut rng)?;
        let outcome = match evaluator.evaluate_expression_with_options(&frame, &expr, &options) {
            Ok(value) => {
                debug!(%expr, ty = %value.ty(), "evaluated");
                "ok".to_string()
            }
            Err(err) => {
                debug!(%expr, %err, "evaluation failed");
                err.kind().to_string()
            }
        };
        if args.show {
            println!("{expr} => {outcome}");
        }
        *outcomes.entry(outcome).or_default() += 1;
    }

    println!("{} expressions evaluated (seed {})", args.count, args.seed);
    for (outcome, count) in &outcomes {
        println!("{outcome}: {count}");
    }
    Ok(())
}
