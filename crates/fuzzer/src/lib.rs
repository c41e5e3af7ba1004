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


//! ceval fuzzer - random expression generation
//!
//! [`FuzzRng`] is the single random source the fuzzer draws from. It either
//! replays a fixed sequence of numbers (to reproduce a recorded run) or
//! draws from a seeded generator, and reports every produced number to an
//! optional observer so a run can be recorded. [`ExprGenerator`] turns those
//! draws into C++ expression strings over a set of variable names.

pub mod generator;
pub mod rng;

pub use generator::ExprGenerator;
pub use rng::{FuzzRng, Mt19937, RngError, RngSource};
