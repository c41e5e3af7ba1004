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


//! The C++ cast families.
//!
//! Every function returns a new value in synthetic storage and leaves its
//! source untouched. The source is expected to be valid and of the accepted
//! category; violations are reported as errors rather than panics.

use tracing::trace;

use crate::{
    apfloat::ApFloat,
    apint::{ApInt, ApSInt},
    backend::TargetRef,
    bail,
    construct::{
        create_value_from_ap_float, create_value_from_ap_int, create_value_from_pointer,
    },
    error::Result,
    types::Type,
    value::Value,
};

fn require_valid(value: &Value) -> Result<()> {
    if !value.is_valid() {
        bail!(BackendFailure, "cannot cast an invalid value");
    }
    Ok(())
}

/// Store an integer in a scalar destination: integer destinations truncate
/// or extend, float destinations round, `bool` tests for zero.
fn integer_to_scalar(target: &TargetRef, value: &ApSInt, ty: &Type) -> Result<Value> {
    if ty.is_bool() {
        return create_value_from_ap_int(target, &ApInt::new(1, !value.is_zero() as u128), ty);
    }
    if ty.is_integer() {
        return create_value_from_ap_int(target, &value.extend(ty.bit_width()), ty);
    }
    if let Some(semantics) = ty.float_semantics() {
        return create_value_from_ap_float(target, &ApFloat::from_integer(value, semantics), ty);
    }
    bail!(UnsupportedConversion, "cannot convert an integer to '{}'", ty)
}

/// Truncate a float toward zero into `width` bits, failing when the result
/// would not be representable.
fn float_to_integer(value: &ApFloat, width: u32, unsigned: bool, ty: &Type) -> Result<ApInt> {
    match value.to_integer(width, unsigned) {
        Some(int) => Ok(*int.value()),
        None => bail!(
            OutOfRange,
            "value {} is outside the range of representable values of type '{}'",
            value,
            ty
        ),
    }
}

/// Scalar (integer, float, `bool`) to another scalar type.
pub fn cast_scalar_to_basic_type(target: &TargetRef, value: &Value, ty: &Type) -> Result<Value> {
    require_valid(value)?;
    trace!(from = %value.ty(), to = %ty, "scalar cast");
    let source = value.ty();
    if !source.is_scalar() {
        bail!(TypeMismatch, "cannot cast non-scalar type '{}' to '{}'", source, ty);
    }
    if !ty.is_scalar() {
        bail!(UnsupportedConversion, "cannot cast '{}' to non-scalar type '{}'", source, ty);
    }

    if source.is_float() {
        let float = value.get_float()?;
        if ty.is_bool() {
            return create_value_from_ap_int(target, &ApInt::new(1, !float.is_zero() as u128), ty);
        }
        if let Some(semantics) = ty.float_semantics() {
            return create_value_from_ap_float(target, &float.convert(semantics), ty);
        }
        let bits = float_to_integer(&float, ty.bit_width(), !ty.is_signed(), ty)?;
        return create_value_from_ap_int(target, &bits, ty);
    }

    integer_to_scalar(target, &value.get_integer()?, ty)
}

/// Enumeration to a scalar type, through its underlying integer value.
pub fn cast_enum_to_basic_type(target: &TargetRef, value: &Value, ty: &Type) -> Result<Value> {
    require_valid(value)?;
    trace!(from = %value.ty(), to = %ty, "enum cast");
    if !value.ty().is_enum() {
        bail!(TypeMismatch, "'{}' is not an enumeration type", value.ty());
    }
    if !ty.is_scalar() {
        bail!(UnsupportedConversion, "cannot cast '{}' to non-scalar type '{}'", value.ty(), ty);
    }
    integer_to_scalar(target, &value.get_integer()?, ty)
}

/// Pointer (or `std::nullptr_t`) to an integer or `bool`.
pub fn cast_pointer_to_basic_type(target: &TargetRef, value: &Value, ty: &Type) -> Result<Value> {
    require_valid(value)?;
    trace!(from = %value.ty(), to = %ty, "pointer cast");
    let source = value.ty();
    if !source.is_pointer() && !source.is_nullptr() {
        bail!(TypeMismatch, "'{}' is not a pointer type", source);
    }
    let address = value.get_integer()?;
    if ty.is_bool() {
        return create_value_from_ap_int(target, &ApInt::new(1, !address.is_zero() as u128), ty);
    }
    if ty.is_integer() {
        let bits = address.value().zext_or_trunc(ty.bit_width());
        return create_value_from_ap_int(target, &bits, ty);
    }
    bail!(UnsupportedConversion, "cannot cast from pointer type '{}' to '{}'", source, ty)
}

/// Integer or enumeration to an enumeration type.
///
/// The source value is extended or truncated to the width of the
/// destination's underlying type. Enumerator ranges are not checked.
pub fn cast_integer_or_enum_to_enum_type(
    target: &TargetRef,
    value: &Value,
    ty: &Type,
) -> Result<Value> {
    require_valid(value)?;
    trace!(from = %value.ty(), to = %ty, "integer to enum cast");
    let source = value.ty();
    if !source.is_integer() && !source.is_enum() {
        bail!(TypeMismatch, "cannot cast '{}' to enumeration type '{}'", source, ty);
    }
    let underlying = ty.enum_integer_type(target);
    if !underlying.is_valid() {
        bail!(TypeMismatch, "'{}' is not an enumeration type", ty);
    }
    let bits = value.get_integer()?.extend(underlying.bit_width());
    create_value_from_ap_int(target, &bits, ty)
}

/// Floating point to an enumeration type, range checked against the
/// underlying integer type.
pub fn cast_float_to_enum_type(target: &TargetRef, value: &Value, ty: &Type) -> Result<Value> {
    require_valid(value)?;
    trace!(from = %value.ty(), to = %ty, "float to enum cast");
    if !value.ty().is_float() {
        bail!(TypeMismatch, "'{}' is not a floating point type", value.ty());
    }
    let underlying = ty.enum_integer_type(target);
    if !underlying.is_valid() {
        bail!(TypeMismatch, "'{}' is not an enumeration type", ty);
    }
    let bits =
        float_to_integer(&value.get_float()?, underlying.bit_width(), !underlying.is_signed(), ty)?;
    create_value_from_ap_int(target, &bits, ty)
}

/// Pointer, integer, unscoped enumeration or `nullptr` to a pointer type.
pub fn cast_to_pointer_type(target: &TargetRef, value: &Value, ty: &Type) -> Result<Value> {
    require_valid(value)?;
    trace!(from = %value.ty(), to = %ty, "pointer conversion");
    if !ty.is_pointer() {
        bail!(TypeMismatch, "'{}' is not a pointer type", ty);
    }
    let source = value.ty();
    if source.is_pointer() || source.is_nullptr() || source.is_integer_or_unscoped_enum() {
        let address = value.get_integer()?.extend(64).bits() as u64;
        return create_value_from_pointer(target, address, ty);
    }
    if source.is_float() {
        bail!(UnsupportedConversion, "cannot cast from '{}' to pointer type '{}'", source, ty);
    }
    bail!(TypeMismatch, "cannot cast from '{}' to pointer type '{}'", source, ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{memory::MemoryTarget, BasicType},
        ErrorKind,
    };

    #[test]
    fn test_integer_narrowing_is_bit_exact() {
        let memory = MemoryTarget::new();
        let target = memory.as_target();
        let value = memory.variable("v", &memory.ty(BasicType::Int), &0x1234_5680i32.to_le_bytes());

        let char_value =
            cast_scalar_to_basic_type(&target, &value, &memory.ty(BasicType::SignedChar)).unwrap();
        assert_eq!(char_value.data().unwrap(), vec![0x80]);
        assert_eq!(char_value.get_i64().unwrap(), -128);
    }

    #[test]
    fn test_sign_extension() {
        let memory = MemoryTarget::new();
        let target = memory.as_target();
        let value = memory.variable("v", &memory.ty(BasicType::SignedChar), &[0xfe]);
        let widened =
            cast_scalar_to_basic_type(&target, &value, &memory.ty(BasicType::UnsignedInt)).unwrap();
        assert_eq!(widened.get_u64().unwrap(), 0xffff_fffe);
    }

    #[test]
    fn test_bool_destination() {
        let memory = MemoryTarget::new();
        let target = memory.as_target();
        let value = memory.variable("v", &memory.ty(BasicType::Int), &256i32.to_le_bytes());
        let boolean = cast_scalar_to_basic_type(&target, &value, &memory.ty(BasicType::Bool)).unwrap();
        assert!(boolean.get_bool().unwrap());
        assert_eq!(boolean.data().unwrap(), vec![1]);
    }

    #[test]
    fn test_float_to_int_range() {
        let memory = MemoryTarget::new();
        let target = memory.as_target();
        let double = memory.ty(BasicType::Double);
        let schar = memory.ty(BasicType::SignedChar);

        let edge = memory.variable("a", &double, &(-128.0f64).to_le_bytes());
        assert_eq!(cast_scalar_to_basic_type(&target, &edge, &schar).unwrap().get_i64().unwrap(), -128);

        let over = memory.variable("b", &double, &128.0f64.to_le_bytes());
        let err = cast_scalar_to_basic_type(&target, &over, &schar).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn test_pointer_to_basic() {
        let memory = MemoryTarget::new();
        let target = memory.as_target();
        let ptr = memory.pointer_to(&memory.ty(BasicType::Int));
        let value = memory.variable("p", &ptr, &0x1_0000_0010u64.to_le_bytes());

        let low = cast_pointer_to_basic_type(&target, &value, &memory.ty(BasicType::UnsignedInt))
            .unwrap();
        assert_eq!(low.get_u64().unwrap(), 0x10);
        let flag = cast_pointer_to_basic_type(&target, &value, &memory.ty(BasicType::Bool)).unwrap();
        assert!(flag.get_bool().unwrap());
        let err =
            cast_pointer_to_basic_type(&target, &value, &memory.ty(BasicType::Double)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedConversion);
    }

    #[test]
    fn test_invalid_source() {
        let memory = MemoryTarget::new();
        let target = memory.as_target();
        let err = cast_scalar_to_basic_type(&target, &Value::invalid(), &memory.ty(BasicType::Int))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendFailure);
    }

    #[test]
    fn test_to_pointer() {
        let memory = MemoryTarget::new();
        let target = memory.as_target();
        let ptr = memory.pointer_to(&memory.ty(BasicType::Char));
        let value = memory.variable("v", &memory.ty(BasicType::Long), &0x4000i64.to_le_bytes());
        let pointer = cast_to_pointer_type(&target, &value, &ptr).unwrap();
        assert!(pointer.ty().is_pointer());
        assert_eq!(pointer.get_u64().unwrap(), 0x4000);

        let float = memory.variable("f", &memory.ty(BasicType::Float), &1.0f32.to_le_bytes());
        assert_eq!(
            cast_to_pointer_type(&target, &float, &ptr).unwrap_err().kind(),
            ErrorKind::UnsupportedConversion
        );
    }
}
