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


//! Implicit conversions: integral promotion, the usual arithmetic
//! conversions, assignment conversions, array decay and pointer arithmetic.
//!
//! Type-level rules are computed on [`Type`]s first; values are then moved
//! to the chosen type with the cast engine.

use crate::{
    apint::ApInt,
    backend::BasicType,
    bail,
    casting::{
        cast_enum_to_basic_type, cast_float_to_enum_type, cast_integer_or_enum_to_enum_type,
        cast_pointer_to_basic_type, cast_scalar_to_basic_type, cast_to_pointer_type,
    },
    construct::{create_value_from_ap_int, create_value_from_pointer, create_value_nullptr},
    context::Context,
    error::Result,
    types::{compare_types, Type},
    value::Value,
};

/// The target's fundamental type `basic`
pub fn basic_type(ctx: &Context<'_>, basic: BasicType) -> Type {
    Type::new(ctx.target().basic_type(basic))
}

/// `ty *`
pub fn pointer_to(ctx: &Context<'_>, ty: &Type) -> Result<Type> {
    let Some(handle) = ty.handle() else {
        bail!(BackendFailure, "cannot form a pointer to an invalid type");
    };
    Ok(Type::new(ctx.target().pointer_type_to(handle)?))
}

/// The type an operand of `ty` has after integral promotion.
///
/// Unscoped enums promote through their underlying type. Promotable types
/// narrower than `int`, or as wide and signed, become `int`; the rest
/// become `unsigned int`. Other types are returned canonicalized.
pub fn promoted_type(ctx: &Context<'_>, ty: &Type) -> Type {
    let ty = if ty.is_unscoped_enum() { ty.enum_integer_type(ctx.target()) } else { ty.canonical() };
    if !ty.is_promotable_integer() {
        return ty;
    }
    let int = basic_type(ctx, BasicType::Int);
    if ty.byte_size() < int.byte_size() || (ty.byte_size() == int.byte_size() && ty.is_signed()) {
        int
    } else {
        basic_type(ctx, BasicType::UnsignedInt)
    }
}

/// The common type of the usual arithmetic conversions
pub fn common_arithmetic_type(ctx: &Context<'_>, lhs: &Type, rhs: &Type) -> Result<Type> {
    if !lhs.is_scalar_or_unscoped_enum() || !rhs.is_scalar_or_unscoped_enum() {
        bail!(TypeMismatch, "invalid operands to binary expression ('{}' and '{}')", lhs, rhs);
    }

    match (lhs.float_rank(), rhs.float_rank()) {
        (Some(l), Some(r)) => return Ok(if l >= r { lhs.canonical() } else { rhs.canonical() }),
        (Some(_), None) => return Ok(lhs.canonical()),
        (None, Some(_)) => return Ok(rhs.canonical()),
        (None, None) => {}
    }

    let (lhs, rhs) = (promoted_type(ctx, lhs), promoted_type(ctx, rhs));
    if lhs.basic_type() == rhs.basic_type() {
        return Ok(lhs);
    }

    let lhs_rank = lhs.integer_rank().unwrap_or_default();
    let rhs_rank = rhs.integer_rank().unwrap_or_default();
    if lhs.is_signed() == rhs.is_signed() {
        return Ok(if lhs_rank >= rhs_rank { lhs } else { rhs });
    }

    let ((signed, signed_rank), (unsigned, unsigned_rank)) =
        if lhs.is_signed() { ((lhs, lhs_rank), (rhs, rhs_rank)) } else { ((rhs, rhs_rank), (lhs, lhs_rank)) };
    if unsigned_rank >= signed_rank {
        Ok(unsigned)
    } else if signed.byte_size() > unsigned.byte_size() {
        Ok(signed)
    } else {
        Ok(basic_type(ctx, signed.basic_type().to_unsigned()))
    }
}

/// Convert `value` to `ty` the way `static_cast` does for arithmetic,
/// enumeration and pointer destinations. Returns `value` itself when the
/// types already agree.
pub fn convert_to(ctx: &Context<'_>, value: &Value, ty: &Type) -> Result<Value> {
    if compare_types(value.ty(), ty) {
        return Ok(value.clone());
    }
    let target = ctx.target();
    let source = value.ty();

    if ty.is_enum() {
        if source.is_integer() || source.is_enum() {
            return cast_integer_or_enum_to_enum_type(target, value, ty);
        }
        if source.is_float() {
            return cast_float_to_enum_type(target, value, ty);
        }
        bail!(UnsupportedConversion, "cannot convert '{}' to enumeration type '{}'", source, ty);
    }
    if ty.is_pointer() {
        return cast_to_pointer_type(target, value, ty);
    }
    if ty.is_scalar() {
        if source.is_enum() {
            return cast_enum_to_basic_type(target, value, ty);
        }
        if source.is_pointer() || source.is_nullptr() {
            return cast_pointer_to_basic_type(target, value, ty);
        }
        return cast_scalar_to_basic_type(target, value, ty);
    }
    bail!(UnsupportedConversion, "cannot convert '{}' to '{}'", source, ty)
}

/// Apply integral promotion to an arithmetic or unscoped enum value
pub fn promote(ctx: &Context<'_>, value: &Value) -> Result<Value> {
    let promoted = promoted_type(ctx, value.ty());
    convert_to(ctx, value, &promoted)
}

/// Implicit conversion of `value` to the type of an assignment target.
///
/// `null_constant` marks a source written as the literal `0`, which may
/// initialize a pointer.
pub fn assignment_conversion(
    ctx: &Context<'_>,
    value: &Value,
    ty: &Type,
    null_constant: bool,
) -> Result<Value> {
    let source = value.ty();
    if compare_types(source, ty) {
        return Ok(value.clone());
    }
    if ty.is_bool() && (source.is_pointer() || source.is_nullptr()) {
        return convert_to(ctx, value, ty);
    }
    if ty.is_scalar() && source.is_scalar_or_unscoped_enum() {
        return convert_to(ctx, value, ty);
    }
    if ty.is_pointer() {
        if source.is_nullptr() || (null_constant && source.is_integer()) {
            return create_value_nullptr(ctx.target(), ty);
        }
        if source.is_pointer()
            && (ty.is_pointer_to_void() || compare_types(&source.pointee_type(), &ty.pointee_type()))
        {
            return cast_to_pointer_type(ctx.target(), value, ty);
        }
    }
    bail!(TypeMismatch, "assigning to '{}' from incompatible type '{}'", ty, source)
}

/// Look through a reference and turn an array into a pointer to its first
/// element. Other values are returned as they are.
pub fn decay(ctx: &Context<'_>, value: Value) -> Result<Value> {
    let value = if value.ty().is_reference() { value.dereference()? } else { value };
    if !value.ty().is_array() {
        return Ok(value);
    }
    let Some(address) = value.load_address() else {
        bail!(InvalidOperation, "cannot decay a temporary array of type '{}'", value.ty());
    };
    let pointer = pointer_to(ctx, &value.ty().array_element_type())?;
    create_value_from_pointer(ctx.target(), address, &pointer)
}

fn pointee_size(pointer: &Type) -> Result<u64> {
    let pointee = pointer.pointee_type();
    let size = pointee.byte_size();
    if size == 0 || pointee.is_void() {
        bail!(TypeMismatch, "arithmetic on a pointer to an incomplete type '{}'", pointee);
    }
    Ok(size)
}

/// `pointer + count`, scaled by the size of the pointee
pub fn pointer_offset(ctx: &Context<'_>, pointer: &Value, count: i128) -> Result<Value> {
    let size = pointee_size(pointer.ty())?;
    let offset = count.wrapping_mul(size as i128) as u64;
    let address = pointer.get_u64()?.wrapping_add(offset);
    create_value_from_pointer(ctx.target(), address, pointer.ty())
}

/// `lhs - rhs` for two pointers to the same type, as a `long`
pub fn pointer_difference(ctx: &Context<'_>, lhs: &Value, rhs: &Value) -> Result<Value> {
    if !compare_types(&lhs.ty().pointee_type(), &rhs.ty().pointee_type()) {
        bail!(
            TypeMismatch,
            "'{}' and '{}' are not pointers to compatible types",
            lhs.ty(),
            rhs.ty()
        );
    }
    let size = pointee_size(lhs.ty())?;
    let bytes = lhs.get_u64()?.wrapping_sub(rhs.get_u64()?) as i64 as i128;
    let long = basic_type(ctx, BasicType::Long);
    let difference = ApInt::from_i128(long.bit_width(), bytes / size as i128);
    create_value_from_ap_int(ctx.target(), &difference, &long)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::memory::MemoryTarget,
        context::{Options, Scope},
        smart_ptr::SmartPtrTable,
        ErrorKind,
    };

    fn with_context(test: impl FnOnce(&MemoryTarget, &Context<'_>)) {
        let target = MemoryTarget::new();
        let frame = target.frame("main");
        let table = SmartPtrTable::default();
        let ctx = Context::new(Scope::Frame(frame.as_frame()), Options::new(), &table).unwrap();
        test(&target, &ctx);
    }

    #[test]
    fn test_promotion() {
        with_context(|target, ctx| {
            let int = target.ty(BasicType::Int);
            for basic in [BasicType::Bool, BasicType::Char, BasicType::UnsignedShort, BasicType::WChar] {
                assert_eq!(promoted_type(ctx, &target.ty(basic)), int, "{basic}");
            }
            assert_eq!(
                promoted_type(ctx, &target.ty(BasicType::Char32)),
                target.ty(BasicType::UnsignedInt)
            );
            assert_eq!(promoted_type(ctx, &target.ty(BasicType::Long)), target.ty(BasicType::Long));

            let color = target.define_enum("Color", Some(&target.ty(BasicType::UnsignedChar)), false);
            assert_eq!(promoted_type(ctx, &color), int);
            let wide = target.define_enum("Wide", Some(&target.ty(BasicType::UnsignedLong)), false);
            assert_eq!(promoted_type(ctx, &wide), target.ty(BasicType::UnsignedLong));
        });
    }

    #[test]
    fn test_usual_arithmetic_conversions() {
        with_context(|target, ctx| {
            let common = |a: BasicType, b: BasicType| {
                common_arithmetic_type(ctx, &target.ty(a), &target.ty(b)).unwrap().basic_type()
            };
            assert_eq!(common(BasicType::Char, BasicType::Short), BasicType::Int);
            assert_eq!(common(BasicType::Int, BasicType::UnsignedInt), BasicType::UnsignedInt);
            assert_eq!(common(BasicType::Long, BasicType::UnsignedInt), BasicType::Long);
            assert_eq!(common(BasicType::LongLong, BasicType::UnsignedLong), BasicType::UnsignedLongLong);
            assert_eq!(common(BasicType::Int, BasicType::Float), BasicType::Float);
            assert_eq!(common(BasicType::Double, BasicType::Float), BasicType::Double);

            let point = target.define_struct("Point", &[("x", &target.ty(BasicType::Int))]);
            let err = common_arithmetic_type(ctx, &point, &target.ty(BasicType::Int)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        });
    }

    #[test]
    fn test_assignment_conversion() {
        with_context(|target, ctx| {
            let int = target.ty(BasicType::Int);
            let int_ptr = target.pointer_to(&int);
            let zero = target.variable("zero", &int, &[0; 4]);

            let null = assignment_conversion(ctx, &zero, &int_ptr, true).unwrap();
            assert!(null.ty().is_pointer());
            assert_eq!(null.get_u64().unwrap(), 0);

            let err = assignment_conversion(ctx, &zero, &int_ptr, false).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::TypeMismatch);

            let double = target.ty(BasicType::Double);
            let converted = assignment_conversion(ctx, &zero, &double, false).unwrap();
            assert!(converted.ty().is_float());
        });
    }

    #[test]
    fn test_decay_and_pointer_arithmetic() {
        with_context(|target, ctx| {
            let int = target.ty(BasicType::Int);
            let array = target.array_of(&int, 3);
            let values = target.variable("values", &array, &[1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0]);

            let first = decay(ctx, values.clone()).unwrap();
            assert_eq!(first.get_u64().unwrap(), values.load_address().unwrap());

            let third = pointer_offset(ctx, &first, 2).unwrap();
            assert_eq!(third.dereference().unwrap().get_i64().unwrap(), 3);

            let difference = pointer_difference(ctx, &third, &first).unwrap();
            assert_eq!(difference.ty().basic_type(), BasicType::Long);
            assert_eq!(difference.get_i64().unwrap(), 2);

            let void_ptr = target.pointer_to(&target.ty(BasicType::Void));
            let raw = cast_to_pointer_type(ctx.target(), &first, &void_ptr).unwrap();
            assert_eq!(pointer_offset(ctx, &raw, 1).unwrap_err().kind(), ErrorKind::TypeMismatch);
        });
    }
}
