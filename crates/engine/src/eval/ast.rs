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


//! Expression tree produced by the parser.

use std::fmt;

use crate::backend::BasicType;

/// Byte range of a node in the expression text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// First byte
    pub start: usize,
    /// One past the last byte
    pub end: usize,
}

impl Span {
    /// A span covering `start..end`
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The smallest span covering both
    pub fn to(self, other: Self) -> Self {
        Self { start: self.start.min(other.start), end: self.end.max(other.end) }
    }
}

/// Integer literal suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntegerSuffix {
    /// `u` / `U`
    pub unsigned: bool,
    /// Number of `l` / `L` (0, 1 or 2)
    pub longs: u8,
}

/// Floating point literal suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FloatSuffix {
    /// `double`
    #[default]
    None,
    /// `f` / `F`: `float`
    Float,
    /// `l` / `L`: `long double`
    Long,
}

/// Prefix operators and the postfix increment/decrement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `+x`
    Plus,
    /// `-x`
    Minus,
    /// `!x`
    LogicalNot,
    /// `~x`
    BitNot,
    /// `*x`
    Deref,
    /// `&x`
    AddressOf,
    /// `++x`
    PreInc,
    /// `--x`
    PreDec,
    /// `x++`
    PostInc,
    /// `x--`
    PostDec,
}

impl UnaryOp {
    /// Operator spelling
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::LogicalNot => "!",
            Self::BitNot => "~",
            Self::Deref => "*",
            Self::AddressOf => "&",
            Self::PreInc | Self::PostInc => "++",
            Self::PreDec | Self::PostDec => "--",
        }
    }

    /// Whether the operator writes to its operand
    pub fn is_increment_or_decrement(self) -> bool {
        matches!(self, Self::PreInc | Self::PreDec | Self::PostInc | Self::PostDec)
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `&`
    BitAnd,
    /// `^`
    BitXor,
    /// `|`
    BitOr,
    /// `&&`
    LogicalAnd,
    /// `||`
    LogicalOr,
    /// `,`
    Comma,
}

impl BinaryOp {
    /// Operator spelling
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::BitAnd => "&",
            Self::BitXor => "^",
            Self::BitOr => "|",
            Self::LogicalAnd => "&&",
            Self::LogicalOr => "||",
            Self::Comma => ",",
        }
    }

    /// Relational and equality operators
    pub fn is_comparison(self) -> bool {
        matches!(self, Self::Lt | Self::Gt | Self::Le | Self::Ge | Self::Eq | Self::Ne)
    }
}

/// Flavour of an explicit conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    /// `(T)x` and `T(x)`
    CStyle,
    /// `static_cast<T>(x)`
    Static,
    /// `reinterpret_cast<T>(x)`
    Reinterpret,
}

/// Declarator applied to a base type name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declarator {
    /// `*`
    Pointer,
    /// `&`
    Reference,
}

/// A type as written in the expression, e.g. `const Point *`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName {
    /// Base spelling without cv-qualifiers: `unsigned int`, `Point`, `std::unique_ptr<int>`
    pub base: String,
    /// Declarators, innermost first
    pub declarators: Vec<Declarator>,
}

impl TypeName {
    /// A bare type name
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into(), declarators: Vec::new() }
    }

    /// The fundamental type when the base spelling is one
    pub fn basic_type(&self) -> Option<BasicType> {
        BasicType::from_type_name(&self.base)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        for declarator in &self.declarators {
            match declarator {
                Declarator::Pointer => f.write_str(" *")?,
                Declarator::Reference => f.write_str(" &")?,
            }
        }
        Ok(())
    }
}

/// Expression node kinds
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Integer literal
    IntegerLiteral {
        /// Value as written
        value: u128,
        /// Suffix
        suffix: IntegerSuffix,
        /// Written in decimal (affects the choice of type)
        decimal: bool,
    },
    /// Floating point literal
    FloatLiteral {
        /// Value as written
        value: f64,
        /// Suffix
        suffix: FloatSuffix,
    },
    /// Character literal with the type selected by its prefix
    CharLiteral {
        /// Code unit
        value: u32,
        /// `char`, `wchar_t`, `char16_t` or `char32_t`
        ty: BasicType,
    },
    /// `true` / `false`
    BoolLiteral(bool),
    /// `nullptr`
    NullPtr,
    /// A (possibly qualified) identifier
    Identifier(String),
    /// `this`
    This,
    /// Unary operator
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// Binary operator
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
    },
    /// `lhs = rhs` or `lhs op= rhs`
    Assign {
        /// The arithmetic part of a compound assignment
        op: Option<BinaryOp>,
        /// Destination
        lhs: Box<Expr>,
        /// Source
        rhs: Box<Expr>,
    },
    /// `cond ? then : otherwise`
    Conditional {
        /// Condition
        cond: Box<Expr>,
        /// Value when true
        then: Box<Expr>,
        /// Value when false
        otherwise: Box<Expr>,
    },
    /// `base.member` / `base->member`
    Member {
        /// Object or pointer
        base: Box<Expr>,
        /// Member name
        member: String,
        /// `->`
        arrow: bool,
    },
    /// `base[index]`
    Index {
        /// Array or pointer
        base: Box<Expr>,
        /// Subscript
        index: Box<Expr>,
    },
    /// Explicit conversion
    Cast {
        /// Cast flavour
        kind: CastKind,
        /// Destination type
        ty: TypeName,
        /// Converted expression
        operand: Box<Expr>,
    },
    /// `sizeof(T)`
    SizeOfType(TypeName),
    /// `sizeof expr`
    SizeOfExpr(Box<Expr>),
    /// `callee(args...)`
    Call {
        /// Called expression
        callee: Box<Expr>,
        /// Arguments
        args: Vec<Expr>,
    },
}

/// An expression node with its location
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// What the node is
    pub kind: ExprKind,
    /// Where it was written
    pub span: Span,
}

impl Expr {
    /// Build a node
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Whether the node is the integer literal `0`, a null pointer constant
    pub fn is_null_pointer_constant(&self) -> bool {
        matches!(self.kind, ExprKind::IntegerLiteral { value: 0, .. } | ExprKind::NullPtr)
    }

    /// Whether evaluating the expression can write to debuggee storage
    pub fn has_side_effects(&self) -> bool {
        match &self.kind {
            ExprKind::Assign { .. } | ExprKind::Call { .. } => true,
            ExprKind::Unary { op, operand } => {
                op.is_increment_or_decrement() || operand.has_side_effects()
            }
            ExprKind::Binary { lhs, rhs, .. } => lhs.has_side_effects() || rhs.has_side_effects(),
            ExprKind::Conditional { cond, then, otherwise } => {
                cond.has_side_effects() || then.has_side_effects() || otherwise.has_side_effects()
            }
            ExprKind::Member { base, .. } => base.has_side_effects(),
            ExprKind::Index { base, index } => base.has_side_effects() || index.has_side_effects(),
            ExprKind::Cast { operand, .. } => operand.has_side_effects(),
            // The operand of sizeof is never evaluated for effect.
            ExprKind::SizeOfExpr(_) | ExprKind::SizeOfType(_) => false,
            ExprKind::IntegerLiteral { .. }
            | ExprKind::FloatLiteral { .. }
            | ExprKind::CharLiteral { .. }
            | ExprKind::BoolLiteral(_)
            | ExprKind::NullPtr
            | ExprKind::Identifier(_)
            | ExprKind::This => false,
        }
    }
}
