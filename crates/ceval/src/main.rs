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


//! ceval - C++ expression evaluator
//!
//! Evaluates expressions against a stack frame described in a TOML scope
//! file, and fuzzes the evaluator with generated expressions.

use std::path::PathBuf;

use ceval_engine::EngineConfig;
use clap::{Parser, Subcommand};
use eyre::Result;
use tracing::Level;

mod cmd;

use cmd::{EvalArgs, FuzzArgs};

/// Command-line interface for ceval
#[derive(Debug, Parser)]
#[command(name = "ceval")]
#[command(about = "C++ expression evaluator - evaluate expressions against a described stack frame")]
#[command(version)]
pub struct Cli {
    /// Engine configuration file (smart pointer rules, side effect default)
    #[arg(long, global = true, env = "CEVAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log with full formatting, also to a rolling file in the temp directory
    #[arg(long, global = true)]
    pub log_file: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Evaluate one expression and print its type and value
    Eval(EvalArgs),
    /// Evaluate generated expressions and report the outcomes
    Fuzz(FuzzArgs),
}

fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    if cli.log_file {
        ceval_common::logging::init_logging("ceval", true)?;
    } else {
        ceval_common::logging::init_simple_logging(Level::WARN)?;
    }

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    tracing::debug!(?config, "engine configuration");

    match &cli.command {
        Commands::Eval(args) => cmd::run_eval(args, config),
        Commands::Fuzz(args) => cmd::run_fuzz(args, config),
    }
}
