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


//! C++ type classification on top of a backend type handle.
//!
//! [`Type`] answers the semantic questions the casting engine and the
//! evaluator ask ("is this an unscoped enum?", "is this contextually
//! convertible to bool?"). Every query looks through typedefs first, so a
//! `typedef unsigned char uint8_t` classifies exactly like `unsigned char`.

use std::fmt;

use crate::{
    apfloat::FloatSemantics,
    backend::{BasicType, TargetRef, TypeClass, TypeRef},
    smart_ptr::SmartPtrTable,
};

/// Upper bound on typedef chains, guards against a backend cycle.
const MAX_DESUGAR_DEPTH: usize = 64;

/// Signed builtins an enum without a declared underlying type is read as,
/// in order of preference
const ENUM_FALLBACK_TYPES: [BasicType; 6] = [
    BasicType::Int,
    BasicType::SignedChar,
    BasicType::Short,
    BasicType::Long,
    BasicType::LongLong,
    BasicType::Int128,
];

/// Byte sizes covered by [`ENUM_FALLBACK_TYPES`]
const ENUM_FALLBACK_SIZES: [u64; 5] = [1, 2, 4, 8, 16];

/// A possibly invalid C++ type.
#[derive(Clone, Default)]
pub struct Type {
    handle: Option<TypeRef>,
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Type").field(&self.name()).finish()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl From<TypeRef> for Type {
    fn from(handle: TypeRef) -> Self {
        Self::new(handle)
    }
}

impl From<Option<TypeRef>> for Type {
    fn from(handle: Option<TypeRef>) -> Self {
        handle.map(Self::new).unwrap_or_default()
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        compare_types(self, other)
    }
}

impl Type {
    /// Wrap a backend handle
    pub fn new(handle: TypeRef) -> Self {
        Self { handle: Some(handle) }
    }

    /// The invalid type
    pub fn invalid() -> Self {
        Self::default()
    }

    /// Whether the type resolved to something real
    pub fn is_valid(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| handle.is_valid())
    }

    /// The wrapped backend handle
    pub fn handle(&self) -> Option<&TypeRef> {
        self.handle.as_ref().filter(|handle| handle.is_valid())
    }

    /// Display name as reported by the backend
    pub fn name(&self) -> String {
        match self.handle() {
            Some(handle) => handle.name(),
            None => "<invalid type>".to_string(),
        }
    }

    /// The type with every typedef layer stripped
    pub fn canonical(&self) -> Self {
        Self { handle: self.canonical_handle() }
    }

    fn canonical_handle(&self) -> Option<TypeRef> {
        let mut current = self.handle()?.clone();
        for _ in 0..MAX_DESUGAR_DEPTH {
            match current.desugared_type() {
                Some(next) => current = next,
                None => return Some(current),
            }
        }
        Some(current)
    }

    /// Canonical type class
    pub fn type_class(&self) -> TypeClass {
        self.canonical_handle().map_or(TypeClass::Invalid, |handle| handle.type_class())
    }

    /// Canonical fundamental type, `Invalid` for everything that is not builtin
    pub fn basic_type(&self) -> BasicType {
        match self.canonical_handle() {
            Some(handle) if handle.type_class() == TypeClass::Builtin => handle.basic_type(),
            _ => BasicType::Invalid,
        }
    }

    /// Size in bytes
    pub fn byte_size(&self) -> u64 {
        self.canonical_handle().map_or(0, |handle| handle.byte_size())
    }

    /// Width in bits of the object representation
    pub fn bit_width(&self) -> u32 {
        (self.byte_size() * 8) as u32
    }

    /// `bool`
    pub fn is_bool(&self) -> bool {
        self.basic_type() == BasicType::Bool
    }

    /// Integral types, `bool` and the character types included
    pub fn is_integer(&self) -> bool {
        self.basic_type().is_integer()
    }

    /// Floating point types
    pub fn is_float(&self) -> bool {
        self.basic_type().is_float()
    }

    /// Arithmetic types
    pub fn is_scalar(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Any fundamental type, `void` and `std::nullptr_t` included
    pub fn is_basic_type(&self) -> bool {
        self.type_class() == TypeClass::Builtin
    }

    /// `void`
    pub fn is_void(&self) -> bool {
        self.basic_type() == BasicType::Void
    }

    /// `std::nullptr_t`
    pub fn is_nullptr(&self) -> bool {
        self.basic_type() == BasicType::NullPtr
    }

    /// Raw pointers
    pub fn is_pointer(&self) -> bool {
        self.type_class() == TypeClass::Pointer
    }

    /// `void *` (with any typedef on the pointee)
    pub fn is_pointer_to_void(&self) -> bool {
        self.is_pointer() && self.pointee_type().is_void()
    }

    /// References
    pub fn is_reference(&self) -> bool {
        self.type_class() == TypeClass::Reference
    }

    /// Arrays
    pub fn is_array(&self) -> bool {
        self.type_class() == TypeClass::Array
    }

    /// Structs, classes and unions
    pub fn is_record(&self) -> bool {
        matches!(self.type_class(), TypeClass::Struct | TypeClass::Class | TypeClass::Union)
    }

    /// Enumerations of both kinds
    pub fn is_enum(&self) -> bool {
        self.type_class() == TypeClass::Enumeration
    }

    /// `enum class`
    pub fn is_scoped_enum(&self) -> bool {
        self.is_enum() && self.canonical_handle().is_some_and(|handle| handle.is_scoped_enum())
    }

    /// Plain `enum`
    pub fn is_unscoped_enum(&self) -> bool {
        self.is_enum() && !self.is_scoped_enum()
    }

    /// Signed integer or floating point type. Enumerations answer for their
    /// declared underlying type; without one they are read through a signed
    /// builtin of their size (see [`enum_integer_type`](Self::enum_integer_type)).
    pub fn is_signed(&self) -> bool {
        if self.is_enum() {
            return match self.canonical_handle().and_then(|handle| handle.enum_integer_type()) {
                Some(underlying) => Self::new(underlying).is_signed(),
                None => ENUM_FALLBACK_SIZES.contains(&self.byte_size()),
            };
        }
        self.basic_type().is_signed()
    }

    /// Smart pointer according to the built-in table
    pub fn is_smart_ptr(&self) -> bool {
        self.is_smart_ptr_in(SmartPtrTable::builtin())
    }

    /// Smart pointer according to `table`
    pub fn is_smart_ptr_in(&self, table: &SmartPtrTable) -> bool {
        self.is_record() && table.find(&self.canonical().name()).is_some()
    }

    /// [`is_scalar`](Self::is_scalar) or [`is_unscoped_enum`](Self::is_unscoped_enum)
    pub fn is_scalar_or_unscoped_enum(&self) -> bool {
        self.is_scalar() || self.is_unscoped_enum()
    }

    /// [`is_integer`](Self::is_integer) or [`is_unscoped_enum`](Self::is_unscoped_enum)
    pub fn is_integer_or_unscoped_enum(&self) -> bool {
        self.is_integer() || self.is_unscoped_enum()
    }

    /// Types that undergo integral promotion before arithmetic: unscoped
    /// enums, `bool`, the character types, `short` and `unsigned short`.
    pub fn is_promotable_integer(&self) -> bool {
        if self.is_unscoped_enum() {
            return true;
        }
        matches!(
            self.basic_type(),
            BasicType::Bool
                | BasicType::Char
                | BasicType::SignedChar
                | BasicType::UnsignedChar
                | BasicType::WChar
                | BasicType::Char16
                | BasicType::Char32
                | BasicType::Short
                | BasicType::UnsignedShort
        )
    }

    /// Types usable directly as a condition
    pub fn is_contextually_convertible_to_bool(&self) -> bool {
        self.is_scalar() || self.is_unscoped_enum() || self.is_pointer() || self.is_nullptr()
    }

    /// Pointee of a pointer or referent of a reference
    pub fn pointee_type(&self) -> Self {
        self.canonical_handle().and_then(|handle| handle.pointee_type()).into()
    }

    /// Element type of an array
    pub fn array_element_type(&self) -> Self {
        self.canonical_handle().and_then(|handle| handle.array_element_type()).into()
    }

    /// Template type argument of a class template specialization
    pub fn template_argument(&self, index: usize) -> Self {
        self.canonical_handle().and_then(|handle| handle.template_argument(index)).into()
    }

    /// Pointee of a smart pointer recognized by the built-in table
    pub fn smart_ptr_pointee_type(&self) -> Self {
        self.smart_ptr_pointee_type_in(SmartPtrTable::builtin())
    }

    /// Pointee of a smart pointer recognized by `table`; invalid when the
    /// type is not a recognized smart pointer.
    pub fn smart_ptr_pointee_type_in(&self, table: &SmartPtrTable) -> Self {
        if !self.is_record() {
            return Self::invalid();
        }
        match table.find(&self.canonical().name()) {
            Some(rule) => self.template_argument(rule.pointee_argument),
            None => Self::invalid(),
        }
    }

    /// Underlying integer type of an enumeration.
    ///
    /// The declared underlying type when the backend knows it, otherwise the
    /// signed builtin integer of the enum's size. Invalid for non-enums.
    pub fn enum_integer_type(&self, target: &TargetRef) -> Self {
        if !self.is_enum() {
            return Self::invalid();
        }
        if let Some(declared) = self.canonical_handle().and_then(|handle| handle.enum_integer_type())
        {
            return Self::new(declared);
        }
        let size = self.byte_size();
        ENUM_FALLBACK_TYPES
            .into_iter()
            .map(|basic| Self::new(target.basic_type(basic)))
            .find(|candidate| candidate.byte_size() == size)
            .unwrap_or_default()
    }

    /// Float format for floating point types
    pub fn float_semantics(&self) -> Option<FloatSemantics> {
        FloatSemantics::for_basic_type(self.basic_type(), self.byte_size())
    }

    /// Integer conversion rank of the canonical builtin type
    pub fn integer_rank(&self) -> Option<u8> {
        self.basic_type().integer_rank()
    }

    /// Floating point conversion rank of the canonical builtin type
    pub fn float_rank(&self) -> Option<u8> {
        self.basic_type().float_rank()
    }
}

/// Strip top-level cv-qualifiers from a type spelling
fn unqualified_name(name: &str) -> &str {
    let mut name = name.trim();
    loop {
        if let Some(rest) = name.strip_prefix("const ").or_else(|| name.strip_prefix("volatile ")) {
            name = rest.trim_start();
        } else if let Some(rest) =
            name.strip_suffix(" const").or_else(|| name.strip_suffix(" volatile"))
        {
            name = rest.trim_end();
        } else {
            return name;
        }
    }
}

/// Whether two types denote the same C++ type.
///
/// Equal backend identities match; otherwise the canonical types must be
/// the same fundamental type or carry the same unqualified name. Invalid
/// types never compare equal.
pub fn compare_types(lhs: &Type, rhs: &Type) -> bool {
    let (Some(lhs_handle), Some(rhs_handle)) = (lhs.handle(), rhs.handle()) else {
        return false;
    };
    if lhs_handle.identity() == rhs_handle.identity() {
        return true;
    }

    let (lhs, rhs) = (lhs.canonical(), rhs.canonical());
    if let (Some(l), Some(r)) = (lhs.handle(), rhs.handle()) {
        if l.identity() == r.identity() {
            return true;
        }
    }

    let (lhs_basic, rhs_basic) = (lhs.basic_type(), rhs.basic_type());
    if lhs_basic != BasicType::Invalid || rhs_basic != BasicType::Invalid {
        return lhs_basic == rhs_basic;
    }

    unqualified_name(&lhs.name()) == unqualified_name(&rhs.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryTarget;

    #[test]
    fn test_builtin_classification() {
        let target = MemoryTarget::new();
        let int = target.ty(BasicType::Int);
        assert!(int.is_integer() && int.is_scalar() && int.is_signed());
        assert!(!int.is_promotable_integer());
        assert!(int.is_contextually_convertible_to_bool());

        let uchar = target.ty(BasicType::UnsignedChar);
        assert!(uchar.is_promotable_integer());
        assert!(!uchar.is_signed());

        let boolean = target.ty(BasicType::Bool);
        assert!(boolean.is_bool() && boolean.is_integer());
        assert_eq!(boolean.byte_size(), 1);

        let double = target.ty(BasicType::Double);
        assert!(double.is_float() && double.is_scalar() && double.is_signed());
        assert_eq!(double.float_semantics(), Some(FloatSemantics::Double));

        let nullptr = target.ty(BasicType::NullPtr);
        assert!(!nullptr.is_scalar());
        assert!(nullptr.is_nullptr() && nullptr.is_contextually_convertible_to_bool());
        assert!(!Type::invalid().is_valid());
    }

    #[test]
    fn test_typedef_is_transparent() {
        let target = MemoryTarget::new();
        let uint8 = target.typedef("uint8_t", &target.ty(BasicType::UnsignedChar));
        assert_eq!(uint8.name(), "uint8_t");
        assert!(uint8.is_integer() && uint8.is_promotable_integer());
        assert_eq!(uint8.basic_type(), BasicType::UnsignedChar);
        assert!(compare_types(&uint8, &target.ty(BasicType::UnsignedChar)));
    }

    #[test]
    fn test_pointer_classification() {
        let target = MemoryTarget::new();
        let void_ptr = target.pointer_to(&target.ty(BasicType::Void));
        assert!(void_ptr.is_pointer() && void_ptr.is_pointer_to_void());
        assert!(void_ptr.is_contextually_convertible_to_bool());
        assert!(!void_ptr.is_scalar());

        let int_ptr = target.pointer_to(&target.ty(BasicType::Int));
        assert!(!int_ptr.is_pointer_to_void());
        assert!(int_ptr.pointee_type().is_integer());
    }

    #[test]
    fn test_enum_classification() {
        let target = MemoryTarget::new();
        let uint8 = target.ty(BasicType::UnsignedChar);
        let color = target.define_enum("Color", Some(&uint8), false);
        let shape = target.define_enum("Shape", None, true);

        assert!(color.is_unscoped_enum() && color.is_promotable_integer());
        assert!(color.is_scalar_or_unscoped_enum() && color.is_integer_or_unscoped_enum());
        assert!(!color.is_signed());
        assert!(shape.is_scoped_enum() && !shape.is_promotable_integer());
        assert!(!shape.is_contextually_convertible_to_bool());

        let target_ref = target.as_target();
        assert_eq!(color.enum_integer_type(&target_ref).basic_type(), BasicType::UnsignedChar);
        assert_eq!(shape.enum_integer_type(&target_ref).basic_type(), BasicType::Int);
        assert!(shape.is_signed());
        assert_eq!(shape.is_signed(), shape.enum_integer_type(&target_ref).is_signed());
        assert!(!uint8.enum_integer_type(&target_ref).is_valid());
    }

    #[test]
    fn test_smart_pointer_pointee() {
        let target = MemoryTarget::new();
        let int = target.ty(BasicType::Int);
        let unique = target.define_smart_ptr("std::unique_ptr", &int);
        assert!(unique.is_smart_ptr());
        assert!(unique.smart_ptr_pointee_type().is_integer());

        let vector = target.define_template("std::vector", &[&int], &[]);
        assert!(!vector.is_smart_ptr());
        assert!(!vector.smart_ptr_pointee_type().is_valid());
        assert!(!unique.smart_ptr_pointee_type_in(&SmartPtrTable::empty()).is_valid());
    }

    #[test]
    fn test_compare_types() {
        let target = MemoryTarget::new();
        let int = target.ty(BasicType::Int);
        let long = target.ty(BasicType::Long);
        assert!(compare_types(&int, &target.ty(BasicType::Int)));
        assert!(!compare_types(&int, &long));
        assert!(compare_types(&target.pointer_to(&int), &target.pointer_to(&int)));
        assert!(!compare_types(&Type::invalid(), &Type::invalid()));
        assert_eq!(unqualified_name("const volatile Point"), "Point");
    }
}
