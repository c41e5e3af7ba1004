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


//! Backend contract for the expression evaluator.
//!
//! The evaluator never touches debuggee memory, registers or symbol tables
//! itself. Everything it knows about types and values comes through the
//! object-safe handle traits defined here, which a debugger integration
//! implements on top of its own native handles:
//!
//! - [`TypeHandle`] - describes one type (classification, size, template arguments)
//! - [`ValueHandle`] - one value living in backend-managed storage
//! - [`TargetHandle`] - the capability to look up types and synthesize new values
//! - [`FrameHandle`] - a stack frame used as evaluation scope
//!
//! Handles are shared (`Arc`) and read-mostly. The only mutation path is
//! [`ValueHandle::set_data`], which the evaluator gates behind the caller's
//! side-effect policy.
//!
//! [`memory`] contains a complete in-process implementation used by tests
//! and by the command line tool.

use std::{fmt, sync::Arc};

use thiserror::Error;

pub mod memory;
pub mod scope_file;

/// Shared handle to a backend type
pub type TypeRef = Arc<dyn TypeHandle>;
/// Shared handle to a backend value
pub type ValueRef = Arc<dyn ValueHandle>;
/// Shared handle to a backend target
pub type TargetRef = Arc<dyn TargetHandle>;
/// Shared handle to a backend stack frame
pub type FrameRef = Arc<dyn FrameHandle>;

/// Fundamental C++ types the backend knows how to describe and synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BasicType {
    /// Not a fundamental type
    Invalid,
    /// `void`
    Void,
    /// `bool`
    Bool,
    /// plain `char`
    Char,
    /// `signed char`
    SignedChar,
    /// `unsigned char`
    UnsignedChar,
    /// `wchar_t`
    WChar,
    /// `char16_t`
    Char16,
    /// `char32_t`
    Char32,
    /// `short`
    Short,
    /// `unsigned short`
    UnsignedShort,
    /// `int`
    Int,
    /// `unsigned int`
    UnsignedInt,
    /// `long`
    Long,
    /// `unsigned long`
    UnsignedLong,
    /// `long long`
    LongLong,
    /// `unsigned long long`
    UnsignedLongLong,
    /// `__int128`
    Int128,
    /// `unsigned __int128`
    UnsignedInt128,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `long double`
    LongDouble,
    /// `std::nullptr_t`
    NullPtr,
}

impl BasicType {
    /// Canonical C++ spelling of the type
    pub fn name(self) -> &'static str {
        match self {
            Self::Invalid => "<invalid>",
            Self::Void => "void",
            Self::Bool => "bool",
            Self::Char => "char",
            Self::SignedChar => "signed char",
            Self::UnsignedChar => "unsigned char",
            Self::WChar => "wchar_t",
            Self::Char16 => "char16_t",
            Self::Char32 => "char32_t",
            Self::Short => "short",
            Self::UnsignedShort => "unsigned short",
            Self::Int => "int",
            Self::UnsignedInt => "unsigned int",
            Self::Long => "long",
            Self::UnsignedLong => "unsigned long",
            Self::LongLong => "long long",
            Self::UnsignedLongLong => "unsigned long long",
            Self::Int128 => "__int128",
            Self::UnsignedInt128 => "unsigned __int128",
            Self::Float => "float",
            Self::Double => "double",
            Self::LongDouble => "long double",
            Self::NullPtr => "std::nullptr_t",
        }
    }

    /// Integral types, `bool` and the character types included
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Bool
                | Self::Char
                | Self::SignedChar
                | Self::UnsignedChar
                | Self::WChar
                | Self::Char16
                | Self::Char32
                | Self::Short
                | Self::UnsignedShort
                | Self::Int
                | Self::UnsignedInt
                | Self::Long
                | Self::UnsignedLong
                | Self::LongLong
                | Self::UnsignedLongLong
                | Self::Int128
                | Self::UnsignedInt128
        )
    }

    /// Floating point types
    pub fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Double | Self::LongDouble)
    }

    /// Signedness. Plain `char` and `wchar_t` follow the x86-64 SysV ABI (signed).
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Self::Char
                | Self::SignedChar
                | Self::WChar
                | Self::Short
                | Self::Int
                | Self::Long
                | Self::LongLong
                | Self::Int128
        ) || self.is_float()
    }

    /// Integer conversion rank, used by the usual arithmetic conversions.
    ///
    /// The wide character types have no rank of their own here: they are
    /// always promoted before a rank comparison happens.
    pub fn integer_rank(self) -> Option<u8> {
        match self {
            Self::Bool => Some(1),
            Self::Char | Self::SignedChar | Self::UnsignedChar => Some(2),
            Self::Short | Self::UnsignedShort => Some(3),
            Self::Int | Self::UnsignedInt => Some(4),
            Self::Long | Self::UnsignedLong => Some(5),
            Self::LongLong | Self::UnsignedLongLong => Some(6),
            Self::Int128 | Self::UnsignedInt128 => Some(7),
            _ => None,
        }
    }

    /// Floating point conversion rank
    pub fn float_rank(self) -> Option<u8> {
        match self {
            Self::Float => Some(1),
            Self::Double => Some(2),
            Self::LongDouble => Some(3),
            _ => None,
        }
    }

    /// The unsigned integer type of the same rank
    pub fn to_unsigned(self) -> Self {
        match self {
            Self::Char | Self::SignedChar => Self::UnsignedChar,
            Self::Short => Self::UnsignedShort,
            Self::Int => Self::UnsignedInt,
            Self::Long => Self::UnsignedLong,
            Self::LongLong => Self::UnsignedLongLong,
            Self::Int128 => Self::UnsignedInt128,
            other => other,
        }
    }

    /// Parse a fundamental type spelling such as `unsigned long long int`.
    ///
    /// Specifier order is free, as in C++. Returns `None` for anything that is
    /// not a valid combination of fundamental type specifiers.
    pub fn from_type_name(name: &str) -> Option<Self> {
        let mut signedness: Option<bool> = None;
        let mut longs = 0u8;
        let mut short = false;
        let mut base: Option<&str> = None;

        for word in name.split_whitespace() {
            match word {
                "signed" | "unsigned" => {
                    if signedness.is_some() {
                        return None;
                    }
                    signedness = Some(word == "signed");
                }
                "short" => {
                    if short {
                        return None;
                    }
                    short = true;
                }
                "long" => longs += 1,
                "int" | "char" | "bool" | "float" | "double" | "void" | "wchar_t" | "char16_t"
                | "char32_t" | "__int128" | "nullptr_t" | "std::nullptr_t" => {
                    if base.is_some() {
                        return None;
                    }
                    base = Some(word);
                }
                _ => return None,
            }
        }

        let unsigned = signedness == Some(false);
        let plain = signedness.is_none() && !short && longs == 0;
        match base {
            None | Some("int") => {
                if base.is_none() && signedness.is_none() && !short && longs == 0 {
                    return None;
                }
                match (short, longs) {
                    (true, 0) => Some(if unsigned { Self::UnsignedShort } else { Self::Short }),
                    (false, 0) => Some(if unsigned { Self::UnsignedInt } else { Self::Int }),
                    (false, 1) => Some(if unsigned { Self::UnsignedLong } else { Self::Long }),
                    (false, 2) => {
                        Some(if unsigned { Self::UnsignedLongLong } else { Self::LongLong })
                    }
                    _ => None,
                }
            }
            Some("char") if !short && longs == 0 => Some(match signedness {
                None => Self::Char,
                Some(true) => Self::SignedChar,
                Some(false) => Self::UnsignedChar,
            }),
            Some("__int128") if !short && longs == 0 => {
                Some(if unsigned { Self::UnsignedInt128 } else { Self::Int128 })
            }
            Some("double") if signedness.is_none() && !short && longs <= 1 => {
                Some(if longs == 1 { Self::LongDouble } else { Self::Double })
            }
            Some("bool") if plain => Some(Self::Bool),
            Some("float") if plain => Some(Self::Float),
            Some("void") if plain => Some(Self::Void),
            Some("wchar_t") if plain => Some(Self::WChar),
            Some("char16_t") if plain => Some(Self::Char16),
            Some("char32_t") if plain => Some(Self::Char32),
            Some("nullptr_t") | Some("std::nullptr_t") if plain => Some(Self::NullPtr),
            _ => None,
        }
    }
}

impl fmt::Display for BasicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Coarse classification of a type handle, mirroring what debuggers expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    /// Not a valid type
    Invalid,
    /// A fundamental type, see [`TypeHandle::basic_type`]
    Builtin,
    /// `T *`
    Pointer,
    /// `T &`
    Reference,
    /// `enum` or `enum class`
    Enumeration,
    /// `struct`
    Struct,
    /// `class`
    Class,
    /// `union`
    Union,
    /// `T[N]`
    Array,
    /// A typedef or alias; see [`TypeHandle::desugared_type`]
    Typedef,
    /// A function type
    Function,
    /// Anything else the backend knows about
    Other,
}

/// Byte order of the debuggee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// Least significant byte first
    #[default]
    Little,
    /// Most significant byte first
    Big,
}

/// Backend-defined type identity. Two handles with the same identity denote
/// the same type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeIdentity(pub u64);

/// Errors reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Synthetic storage could not be allocated
    #[error("cannot allocate {0} bytes of synthetic storage")]
    Allocation(u64),
    /// Debuggee memory could not be read
    #[error("memory at {0:#x} is not readable")]
    Unreadable(u64),
    /// The destination storage cannot be written
    #[error("'{0}' is not writable")]
    NotWritable(String),
    /// A data buffer has the wrong length for its type
    #[error("expected {expected} bytes of data, got {actual}")]
    SizeMismatch {
        /// Size required by the type
        expected: u64,
        /// Size supplied by the caller
        actual: u64,
    },
    /// The backend does not know the given type handle
    #[error("type '{0}' does not belong to this target")]
    ForeignType(String),
}

/// A type description supplied by the backend.
///
/// Every query must be side-effect free and stable for the lifetime of the
/// handle.
pub trait TypeHandle: fmt::Debug + Send + Sync {
    /// Whether the handle resolved to a real type
    fn is_valid(&self) -> bool {
        true
    }

    /// Backend type identity
    fn identity(&self) -> TypeIdentity;

    /// Display name, e.g. `unsigned int`, `Point *`, `std::unique_ptr<int>`
    fn name(&self) -> String;

    /// Coarse type class of this (possibly sugared) type
    fn type_class(&self) -> TypeClass;

    /// The fundamental type for [`TypeClass::Builtin`] types, `Invalid` otherwise
    fn basic_type(&self) -> BasicType;

    /// Size in bytes of an object of this type
    fn byte_size(&self) -> u64;

    /// For typedefs and aliases, the type they stand for; `None` when the
    /// type is already canonical
    fn desugared_type(&self) -> Option<TypeRef>;

    /// Pointee of a pointer, referent of a reference
    fn pointee_type(&self) -> Option<TypeRef>;

    /// Element type of an array
    fn array_element_type(&self) -> Option<TypeRef>;

    /// Whether an enumeration is scoped (`enum class`)
    fn is_scoped_enum(&self) -> bool;

    /// Declared underlying type of an enumeration, if the backend knows it
    fn enum_integer_type(&self) -> Option<TypeRef>;

    /// Template type argument at `index` of a class template specialization
    fn template_argument(&self, index: usize) -> Option<TypeRef>;
}

/// A value held in backend-managed storage.
///
/// The storage lifetime is governed by the backend (frame lifetime for
/// locals, the handle's lifetime for synthesized values).
pub trait ValueHandle: fmt::Debug + Send + Sync {
    /// Variable or expression name
    fn name(&self) -> String;

    /// The value's type
    fn ty(&self) -> TypeRef;

    /// The target this value belongs to
    fn target(&self) -> TargetRef;

    /// Raw object representation, `byte_size` bytes in target byte order
    fn data(&self) -> Result<Vec<u8>, BackendError>;

    /// Overwrite the object representation in place
    fn set_data(&self, data: &[u8]) -> Result<(), BackendError>;

    /// Address of the storage in debuggee memory, `None` for synthetic values
    fn load_address(&self) -> Option<u64>;

    /// A pointer-typed value referencing this value's storage
    fn address_of(&self) -> Option<ValueRef>;

    /// The object a pointer or reference value refers to
    fn dereference(&self) -> Option<ValueRef>;

    /// Named data member of a record value
    fn member(&self, name: &str) -> Option<ValueRef>;

    /// Element of an array value
    fn child_at_index(&self, index: u64) -> Option<ValueRef>;

    /// An independent copy backed by fresh synthetic storage
    fn persist(&self) -> Result<ValueRef, BackendError>;
}

/// The capability to resolve types and synthesize values in one debuggee.
pub trait TargetHandle: fmt::Debug + Send + Sync {
    /// Handle for a fundamental type
    fn basic_type(&self, basic: BasicType) -> TypeRef;

    /// Look up a named type (records, enums, typedefs, template specializations)
    fn find_type(&self, name: &str) -> Option<TypeRef>;

    /// The pointer type `pointee *`
    fn pointer_type_to(&self, pointee: &TypeRef) -> Result<TypeRef, BackendError>;

    /// Debuggee byte order
    fn byte_order(&self) -> ByteOrder;

    /// Size of a data pointer in bytes
    fn address_byte_size(&self) -> u32;

    /// Copy `data` into fresh synthetic storage typed as `ty`
    fn create_value_from_data(
        &self,
        name: &str,
        data: &[u8],
        ty: &TypeRef,
    ) -> Result<ValueRef, BackendError>;
}

/// A stack frame used as evaluation scope.
pub trait FrameHandle: fmt::Debug + Send + Sync {
    /// Whether the frame is still live
    fn is_valid(&self) -> bool {
        true
    }

    /// Name of the function the frame belongs to
    fn function_name(&self) -> String;

    /// The target the frame belongs to
    fn target(&self) -> TargetRef;

    /// Local variables and arguments visible in the frame, including `this`
    fn find_variable(&self, name: &str) -> Option<ValueRef>;

    /// Global and namespace-scope variables
    fn find_global(&self, name: &str) -> Option<ValueRef>;
}
