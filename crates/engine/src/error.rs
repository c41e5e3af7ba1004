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


//! Error type shared by every fallible operation of the engine.
//!
//! Failures are values, never unwinding: casting, construction and the
//! evaluator all return [`Result`], and the evaluator aborts on the first
//! [`Error`] it sees.

use std::fmt;

use thiserror::Error;

use crate::backend::BackendError;

/// The category of an evaluation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    /// The frame or value used as evaluation scope cannot be resolved
    InvalidScope,
    /// Operand types are incompatible with the attempted operation or cast
    TypeMismatch,
    /// A value does not fit the destination representation
    OutOfRange,
    /// A mutation was attempted while side effects are disallowed
    SideEffectNotPermitted,
    /// The requested conversion path is not defined
    UnsupportedConversion,
    /// The debugger backend could not materialize or synthesize a value
    BackendFailure,
    /// The expression text is not well formed
    ParseError,
    /// An identifier, member or type name could not be resolved
    UndeclaredIdentifier,
    /// The operation is well typed but cannot be carried out
    /// (division by zero, dereferencing null, assigning to an rvalue, ...)
    InvalidOperation,
}

impl ErrorKind {
    /// Stable, human readable name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidScope => "invalid scope",
            Self::TypeMismatch => "type mismatch",
            Self::OutOfRange => "out of range",
            Self::SideEffectNotPermitted => "side effect not permitted",
            Self::UnsupportedConversion => "unsupported conversion",
            Self::BackendFailure => "backend failure",
            Self::ParseError => "parse error",
            Self::UndeclaredIdentifier => "undeclared identifier",
            Self::InvalidOperation => "invalid operation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reportable evaluation failure: a kind plus a descriptive message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    /// Create a new error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    /// The error category
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The human readable description
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        Self::new(ErrorKind::BackendFailure, err.to_string())
    }
}

/// Result alias used across the engine
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Return early with an [`Error`] of the given kind.
///
/// ```rust,ignore
/// bail!(TypeMismatch, "invalid operands to binary expression ('{}' and '{}')", lhs, rhs);
/// ```
#[macro_export]
macro_rules! bail {
    ($kind:ident, $($arg:tt)+) => {
        return Err($crate::Error::new($crate::ErrorKind::$kind, format!($($arg)+)))
    };
}

/// Build an [`Error`] of the given kind, for use with `ok_or_else` and friends.
#[macro_export]
macro_rules! eval_err {
    ($kind:ident, $($arg:tt)+) => {
        $crate::Error::new($crate::ErrorKind::$kind, format!($($arg)+))
    };
}
