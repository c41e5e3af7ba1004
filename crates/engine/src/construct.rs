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


//! Factories that synthesize new values in backend-held storage.
//!
//! None of these read or write debuggee-owned memory: each copies the bytes
//! it computes into fresh synthetic storage through
//! [`TargetHandle::create_value_from_data`](crate::backend::TargetHandle::create_value_from_data).

use tracing::trace;

use crate::{
    apfloat::ApFloat,
    apint::ApInt,
    backend::{BasicType, TargetRef},
    bail,
    error::Result,
    types::Type,
    value::Value,
};

fn synthesize(target: &TargetRef, name: &str, bytes: &[u8], ty: &Type) -> Result<Value> {
    let Some(handle) = ty.handle() else {
        bail!(BackendFailure, "cannot create a value of an invalid type");
    };
    trace!(ty = %ty, len = bytes.len(), "synthesizing value");
    Ok(Value::new(target.create_value_from_data(name, bytes, handle)?))
}

/// Copy the first `sizeof(ty)` bytes of `bytes` into a new value of type `ty`.
///
/// Supplying fewer bytes than the type needs is rejected.
pub fn create_value_from_bytes(target: &TargetRef, bytes: &[u8], ty: &Type) -> Result<Value> {
    let size = ty.byte_size() as usize;
    if bytes.len() < size {
        bail!(
            BackendFailure,
            "need {} bytes to create a value of type '{}', got {}",
            size,
            ty,
            bytes.len()
        );
    }
    synthesize(target, "", &bytes[..size], ty)
}

/// [`create_value_from_bytes`] for a fundamental type
pub fn create_value_from_bytes_basic(
    target: &TargetRef,
    bytes: &[u8],
    basic: BasicType,
) -> Result<Value> {
    create_value_from_bytes(target, bytes, &Type::new(target.basic_type(basic)))
}

/// A value of type `ty` holding `value`, zero extended or truncated to the
/// type's width. A `bool` destination stores `value != 0`.
pub fn create_value_from_ap_int(target: &TargetRef, value: &ApInt, ty: &Type) -> Result<Value> {
    let size = ty.byte_size() as usize;
    let bits = if ty.is_bool() { ApInt::new(8, !value.is_zero() as u128) } else { *value };
    synthesize(target, "", &bits.to_bytes(size, target.byte_order()), ty)
}

/// A value of floating point type `ty` holding `value` rounded to the
/// type's format.
pub fn create_value_from_ap_float(target: &TargetRef, value: &ApFloat, ty: &Type) -> Result<Value> {
    let Some(semantics) = ty.float_semantics() else {
        bail!(TypeMismatch, "cannot store a floating point value in type '{}'", ty);
    };
    let rounded = value.convert(semantics);
    let bytes = rounded.to_bytes(ty.byte_size() as usize, target.byte_order());
    synthesize(target, "", &bytes, ty)
}

/// A pointer of type `ty` holding `address`
pub fn create_value_from_pointer(target: &TargetRef, address: u64, ty: &Type) -> Result<Value> {
    if !ty.is_pointer() && !ty.is_nullptr() {
        bail!(TypeMismatch, "cannot store an address in type '{}'", ty);
    }
    let bits = ApInt::new(64, address as u128);
    synthesize(target, "", &bits.to_bytes(ty.byte_size() as usize, target.byte_order()), ty)
}

/// A `bool`
pub fn create_value_from_bool(target: &TargetRef, value: bool) -> Result<Value> {
    let ty = Type::new(target.basic_type(BasicType::Bool));
    create_value_from_ap_int(target, &ApInt::new(1, value as u128), &ty)
}

/// The null pointer of pointer type `ty` (or `std::nullptr_t`)
pub fn create_value_nullptr(target: &TargetRef, ty: &Type) -> Result<Value> {
    create_value_from_pointer(target, 0, ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{apint::ApSInt, backend::memory::MemoryTarget, ErrorKind};

    #[test]
    fn test_from_bytes() {
        let memory = MemoryTarget::new();
        let target = memory.as_target();
        let value =
            create_value_from_bytes_basic(&target, &[0x78, 0x56, 0x34, 0x12, 0xff], BasicType::Int)
                .unwrap();
        assert_eq!(value.get_i64().unwrap(), 0x1234_5678);
        assert!(!value.is_lvalue());

        let err = create_value_from_bytes_basic(&target, &[1, 2], BasicType::Int).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendFailure);
    }

    #[test]
    fn test_from_ap_int_truncates() {
        let memory = MemoryTarget::new();
        let target = memory.as_target();
        let uchar = memory.ty(BasicType::UnsignedChar);
        let value = create_value_from_ap_int(&target, &ApInt::new(32, 0x1ff), &uchar).unwrap();
        assert_eq!(value.get_u64().unwrap(), 0xff);

        let long = memory.ty(BasicType::Long);
        let value = create_value_from_ap_int(&target, &ApInt::new(8, 0x80), &long).unwrap();
        assert_eq!(value.get_i64().unwrap(), 0x80);
    }

    #[test]
    fn test_from_ap_float_rounds() {
        let memory = MemoryTarget::new();
        let target = memory.as_target();
        let float = memory.ty(BasicType::Float);
        let value = create_value_from_ap_float(&target, &ApFloat::from_f64(0.1), &float).unwrap();
        assert_eq!(value.get_float().unwrap().to_f64(), 0.1f32 as f64);

        let int = memory.ty(BasicType::Int);
        let err = create_value_from_ap_float(&target, &ApFloat::from_f64(1.0), &int).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_pointer_bool_and_null() {
        let memory = MemoryTarget::new();
        let target = memory.as_target();
        let int_ptr = memory.pointer_to(&memory.ty(BasicType::Int));

        let pointer = create_value_from_pointer(&target, 0xdead_beef, &int_ptr).unwrap();
        assert_eq!(pointer.get_u64().unwrap(), 0xdead_beef);

        let null = create_value_nullptr(&target, &int_ptr).unwrap();
        assert!(!null.get_bool().unwrap());

        let yes = create_value_from_bool(&target, true).unwrap();
        assert!(yes.ty().is_bool());
        assert_eq!(yes.get_integer().unwrap(), ApSInt::new(ApInt::new(1, 1), true));
    }
}
