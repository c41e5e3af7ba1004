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


//! Random C++ expression generation

use tracing::debug;

use crate::rng::{FuzzRng, RngError};

const ARITHMETIC_OPS: &[&str] = &["+", "-", "*", "/", "%"];
const BITWISE_OPS: &[&str] = &["&", "|", "^", "<<", ">>"];
const COMPARISON_OPS: &[&str] = &["<", ">", "<=", ">=", "==", "!="];
const LOGICAL_OPS: &[&str] = &["&&", "||"];
const UNARY_OPS: &[&str] = &["-", "+", "!", "~"];
const COMPOUND_OPS: &[&str] = &["=", "+=", "-=", "*=", "<<=", "|="];

const CAST_TYPES: &[&str] = &[
    "bool",
    "char",
    "signed char",
    "unsigned char",
    "short",
    "unsigned short",
    "int",
    "unsigned int",
    "long",
    "unsigned long",
    "long long",
    "float",
    "double",
];

const INTEGER_SUFFIXES: &[&str] = &["", "", "", "u", "l", "ul", "ll"];

#[derive(Debug, Clone, Copy)]
enum Shape {
    Leaf,
    Paren,
    Unary,
    Binary,
    Conditional,
    CStyleCast,
    NamedCast,
    SizeOf,
    AddressRoundTrip,
    Mutation,
}

/// Generates random expressions over a fixed set of variable names.
///
/// Every decision draws from the [`FuzzRng`], so the same sequence always
/// produces the same expression.
#[derive(Debug, Clone)]
pub struct ExprGenerator {
    variables: Vec<String>,
    max_depth: u32,
    side_effects: bool,
}

impl ExprGenerator {
    /// Default nesting depth
    pub const DEFAULT_MAX_DEPTH: u32 = 4;

    /// A generator referring to `variables`. Without variables only literals
    /// appear in leaves.
    pub fn new<I, S>(variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            variables: variables.into_iter().map(Into::into).collect(),
            max_depth: Self::DEFAULT_MAX_DEPTH,
            side_effects: false,
        }
    }

    /// Limit nesting to `max_depth` operators
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Also emit increments and assignments to variables
    pub fn with_side_effects(mut self, side_effects: bool) -> Self {
        self.side_effects = side_effects;
        self
    }

    /// Configured nesting limit
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Variables leaves may refer to
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// One random expression
    pub fn generate(&self, rng: &mut FuzzRng) -> Result<String, RngError> {
        let expr = self.expression(rng, 0)?;
        debug!(%expr, drawn = rng.drawn(), "generated expression");
        Ok(expr)
    }

    fn shapes(&self) -> Vec<Shape> {
        let mut shapes = vec![
            Shape::Leaf,
            Shape::Paren,
            Shape::Unary,
            Shape::Binary,
            Shape::Binary,
            Shape::Binary,
            Shape::Conditional,
            Shape::CStyleCast,
            Shape::NamedCast,
            Shape::SizeOf,
        ];
        if !self.variables.is_empty() {
            shapes.push(Shape::AddressRoundTrip);
            if self.side_effects {
                shapes.push(Shape::Mutation);
            }
        }
        shapes
    }

    fn expression(&self, rng: &mut FuzzRng, depth: u32) -> Result<String, RngError> {
        if depth >= self.max_depth {
            return self.leaf(rng);
        }
        let shapes = self.shapes();
        let shape = rng.choose(&shapes)?.copied().unwrap_or(Shape::Leaf);
        let next = depth + 1;

        Ok(match shape {
            Shape::Leaf => self.leaf(rng)?,
            Shape::Paren => format!("({})", self.expression(rng, next)?),
            Shape::Unary => {
                let op = pick(rng, UNARY_OPS)?;
                format!("{op}({})", self.expression(rng, next)?)
            }
            Shape::Binary => {
                let family = match rng.below(4)? {
                    0 => ARITHMETIC_OPS,
                    1 => BITWISE_OPS,
                    2 => COMPARISON_OPS,
                    _ => LOGICAL_OPS,
                };
                let op = pick(rng, family)?;
                let lhs = self.expression(rng, next)?;
                let rhs = self.expression(rng, next)?;
                format!("({lhs} {op} {rhs})")
            }
            Shape::Conditional => {
                let condition = self.expression(rng, next)?;
                let then = self.expression(rng, next)?;
                let otherwise = self.expression(rng, next)?;
                format!("({condition} ? {then} : {otherwise})")
            }
            Shape::CStyleCast => {
                let ty = pick(rng, CAST_TYPES)?;
                format!("({ty})({})", self.expression(rng, next)?)
            }
            Shape::NamedCast => {
                let ty = pick(rng, CAST_TYPES)?;
                format!("static_cast<{ty}>({})", self.expression(rng, next)?)
            }
            Shape::SizeOf => {
                if rng.below(2)? == 0 {
                    format!("sizeof({})", pick(rng, CAST_TYPES)?)
                } else {
                    format!("sizeof({})", self.expression(rng, next)?)
                }
            }
            Shape::AddressRoundTrip => format!("(*&{})", self.variable(rng)?),
            Shape::Mutation => {
                let variable = self.variable(rng)?;
                match rng.below(3)? {
                    0 => format!("(++{variable})"),
                    1 => format!("({variable}--)"),
                    _ => {
                        let op = pick(rng, COMPOUND_OPS)?;
                        format!("({variable} {op} {})", self.expression(rng, next)?)
                    }
                }
            }
        })
    }

    fn leaf(&self, rng: &mut FuzzRng) -> Result<String, RngError> {
        if !self.variables.is_empty() && rng.below(2)? == 0 {
            return self.variable(rng);
        }
        Ok(match rng.below(6)? {
            0 | 1 => {
                let value = rng.below(1000)?;
                format!("{value}{}", pick(rng, INTEGER_SUFFIXES)?)
            }
            2 => format!("0x{:x}", rng.next_u32()?),
            3 => {
                let whole = rng.below(100)?;
                let fraction = rng.below(100)?;
                let suffix = if rng.below(2)? == 0 { "" } else { "f" };
                format!("{whole}.{fraction}{suffix}")
            }
            4 => (if rng.below(2)? == 0 { "true" } else { "false" }).to_string(),
            _ => {
                let c = char::from(b'a' + (rng.below(26)? as u8));
                format!("'{c}'")
            }
        })
    }

    fn variable(&self, rng: &mut FuzzRng) -> Result<String, RngError> {
        Ok(rng.choose(&self.variables)?.cloned().unwrap_or_else(|| "0".to_string()))
    }
}

fn pick(rng: &mut FuzzRng, items: &[&'static str]) -> Result<&'static str, RngError> {
    Ok(rng.choose(items)?.copied().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_zero_is_a_leaf() {
        let generator = ExprGenerator::new(["x"]).with_max_depth(0);
        // below(2) == 0 picks a variable, then choose index 0
        let mut rng = FuzzRng::fixed([0, 0]);
        assert_eq!(generator.generate(&mut rng).unwrap(), "x");
    }

    #[test]
    fn test_literal_leaves_without_variables() {
        let generator = ExprGenerator::new(Vec::<String>::new()).with_max_depth(0);
        // integer literal 42 with the "u" suffix
        let mut rng = FuzzRng::fixed([0, 42, 3]);
        assert_eq!(generator.generate(&mut rng).unwrap(), "42u");
        let mut rng = FuzzRng::fixed([3, 12, 5, 1]);
        assert_eq!(generator.generate(&mut rng).unwrap(), "12.5f");
        let mut rng = FuzzRng::fixed([5, 2]);
        assert_eq!(generator.generate(&mut rng).unwrap(), "'c'");
    }

    #[test]
    fn test_fixed_sequence_builds_binary_expression() {
        let generator = ExprGenerator::new(["a", "b"]).with_max_depth(1);
        // shape Binary, arithmetic family, '-', then leaves b and a
        let mut rng = FuzzRng::fixed([3, 0, 1, 0, 1, 0, 0]);
        assert_eq!(generator.generate(&mut rng).unwrap(), "(b - a)");
        assert_eq!(rng.drawn(), 7);
    }

    #[test]
    fn test_exhaustion_is_reported() {
        let generator = ExprGenerator::new(["a"]);
        let mut rng = FuzzRng::fixed([3]);
        assert!(matches!(generator.generate(&mut rng), Err(RngError::Exhausted { .. })));
    }
}
