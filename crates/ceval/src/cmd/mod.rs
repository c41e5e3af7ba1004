//! Command modules for the ceval CLI

pub mod eval;
pub mod fuzz;

pub use eval::{run_eval, EvalArgs};
pub use fuzz::{run_fuzz, FuzzArgs};
