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


use std::cmp::Ordering;

use tracing::{trace, warn};

use crate::{
    apfloat::ApFloat,
    apint::ApInt,
    backend::{BasicType, TargetRef},
    bail,
    casting::{cast_pointer_to_basic_type, cast_to_pointer_type},
    construct::{
        create_value_from_ap_float, create_value_from_ap_int, create_value_from_bool,
        create_value_from_pointer, create_value_nullptr,
    },
    context::Context,
    error::Result,
    eval::{
        ast::{BinaryOp, CastKind, Declarator, Expr, ExprKind, FloatSuffix, IntegerSuffix, TypeName, UnaryOp},
        conversions::{
            assignment_conversion, basic_type, common_arithmetic_type, convert_to, decay,
            pointer_difference, pointer_offset, pointer_to, promote,
        },
    },
    eval_err,
    types::{compare_types, Type},
    value::Value,
};

/// Which operands of a binary operator were written as a null pointer constant
#[derive(Debug, Clone, Copy, Default)]
struct NullConstants {
    lhs: bool,
    rhs: bool,
}

/// Walks an expression tree against one [`Context`].
pub(crate) struct Evaluator<'a, 'c> {
    ctx: &'a Context<'c>,
    allow_side_effects: bool,
}

impl<'a, 'c> Evaluator<'a, 'c> {
    /// Create an evaluator honouring the context's side-effect option
    pub fn new(ctx: &'a Context<'c>) -> Self {
        Self { ctx, allow_side_effects: ctx.allow_side_effects() }
    }

    /// The same evaluator with mutations forbidden, for operands that are
    /// only inspected
    fn without_side_effects(&self) -> Self {
        Self { ctx: self.ctx, allow_side_effects: false }
    }

    fn target(&self) -> &TargetRef {
        self.ctx.target()
    }

    fn basic(&self, basic: BasicType) -> Type {
        basic_type(self.ctx, basic)
    }

    /// Main evaluation dispatcher for the different expression kinds
    pub fn evaluate_expression(&self, expr: &Expr) -> Result<Value> {
        match &expr.kind {
            // Literals
            ExprKind::IntegerLiteral { value, suffix, decimal } => {
                self.evaluate_integer_literal(*value, *suffix, *decimal)
            }
            ExprKind::FloatLiteral { value, suffix } => self.evaluate_float_literal(*value, *suffix),
            ExprKind::CharLiteral { value, ty } => {
                let ty = self.basic(*ty);
                create_value_from_ap_int(self.target(), &ApInt::new(ty.bit_width(), *value as u128), &ty)
            }
            ExprKind::BoolLiteral(value) => create_value_from_bool(self.target(), *value),
            ExprKind::NullPtr => create_value_nullptr(self.target(), &self.basic(BasicType::NullPtr)),

            // Names
            ExprKind::Identifier(name) => self.evaluate_identifier(name),
            ExprKind::This => self.ctx.this_value(),

            // Operators
            ExprKind::Unary { op, operand } => self.evaluate_unary(*op, operand),
            ExprKind::Binary { op, lhs, rhs } => self.evaluate_binary(*op, lhs, rhs),
            ExprKind::Assign { op, lhs, rhs } => self.evaluate_assignment(*op, lhs, rhs),
            ExprKind::Conditional { cond, then, otherwise } => {
                self.evaluate_conditional(cond, then, otherwise)
            }

            // Member and element access
            ExprKind::Member { base, member, arrow } => self.evaluate_member(base, member, *arrow),
            ExprKind::Index { base, index } => self.evaluate_index(base, index),

            // Types
            ExprKind::Cast { kind, ty, operand } => self.evaluate_cast(*kind, ty, operand),
            ExprKind::SizeOfType(ty) => {
                let (ty, _) = self.resolve_type_name(ty)?;
                self.size_of(&ty)
            }
            ExprKind::SizeOfExpr(operand) => {
                let value = self.without_side_effects().evaluate_expression(operand)?;
                self.size_of(value.ty())
            }

            ExprKind::Call { .. } => {
                if !self.allow_side_effects {
                    bail!(SideEffectNotPermitted, "function calls require side effects to be enabled");
                }
                bail!(InvalidOperation, "function calls are not supported")
            }
        }
    }

    /// Evaluate and apply the lvalue-to-rvalue adjustments of an operand:
    /// references are looked through and arrays decay to pointers.
    fn evaluate_rvalue(&self, expr: &Expr) -> Result<Value> {
        decay(self.ctx, self.evaluate_expression(expr)?)
    }

    /// Evaluate a condition
    fn evaluate_condition(&self, expr: &Expr) -> Result<bool> {
        let value = self.evaluate_rvalue(expr)?;
        if !value.ty().is_contextually_convertible_to_bool() {
            bail!(
                TypeMismatch,
                "value of type '{}' is not contextually convertible to 'bool'",
                value.ty()
            );
        }
        value.get_bool()
    }

    fn require_side_effects(&self, what: &str) -> Result<()> {
        if !self.allow_side_effects {
            bail!(SideEffectNotPermitted, "{} modifies the debuggee and side effects are disabled", what);
        }
        Ok(())
    }

    fn require_lvalue(value: &Value) -> Result<()> {
        if !value.is_lvalue() {
            bail!(InvalidOperation, "expression of type '{}' is not assignable", value.ty());
        }
        Ok(())
    }

    /// Type an integer literal: the first candidate type that can hold the
    /// value, where decimal literals only consider signed types unless
    /// suffixed with `u`.
    fn evaluate_integer_literal(&self, value: u128, suffix: IntegerSuffix, decimal: bool) -> Result<Value> {
        use BasicType::*;

        let candidates: &[BasicType] = match (suffix.unsigned, suffix.longs, decimal) {
            (false, 0, true) => &[Int, Long, LongLong],
            (false, 0, false) => &[Int, UnsignedInt, Long, UnsignedLong, LongLong, UnsignedLongLong],
            (false, 1, true) => &[Long, LongLong],
            (false, 1, false) => &[Long, UnsignedLong, LongLong, UnsignedLongLong],
            (false, _, true) => &[LongLong],
            (false, _, false) => &[LongLong, UnsignedLongLong],
            (true, 0, _) => &[UnsignedInt, UnsignedLong, UnsignedLongLong],
            (true, 1, _) => &[UnsignedLong, UnsignedLongLong],
            (true, _, _) => &[UnsignedLongLong],
        };

        let fits = |ty: &Type| {
            let width = ty.bit_width();
            width > 0 && value <= ApInt::mask(if ty.is_signed() { width - 1 } else { width })
        };
        let ty = match candidates.iter().map(|basic| self.basic(*basic)).find(|ty| fits(ty)) {
            Some(ty) => ty,
            None => {
                let fallback = self.basic(UnsignedLongLong);
                if !fits(&fallback) {
                    bail!(ParseError, "integer literal {} is too large for any integer type", value);
                }
                warn!(value = %value, "integer literal is too large for a signed type, treating it as unsigned");
                fallback
            }
        };
        create_value_from_ap_int(self.target(), &ApInt::new(ty.bit_width(), value), &ty)
    }

    fn evaluate_float_literal(&self, value: f64, suffix: FloatSuffix) -> Result<Value> {
        let ty = self.basic(match suffix {
            FloatSuffix::None => BasicType::Double,
            FloatSuffix::Float => BasicType::Float,
            FloatSuffix::Long => BasicType::LongDouble,
        });
        create_value_from_ap_float(self.target(), &ApFloat::from_f64(value), &ty)
    }

    /// Resolve a name; variables of reference type designate their referent
    fn evaluate_identifier(&self, name: &str) -> Result<Value> {
        let value = self.ctx.lookup_identifier(name)?;
        if value.ty().is_reference() {
            return value.dereference();
        }
        Ok(value)
    }

    /// Evaluate unary operators
    fn evaluate_unary(&self, op: UnaryOp, operand: &Expr) -> Result<Value> {
        match op {
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => {
                self.evaluate_increment(op, operand)
            }
            UnaryOp::AddressOf => self.evaluate_expression(operand)?.address_of(),
            UnaryOp::Deref => {
                let value = self.evaluate_rvalue(operand)?;
                self.dereference(&value)
            }
            UnaryOp::LogicalNot => {
                let value = self.evaluate_condition(operand)?;
                create_value_from_bool(self.target(), !value)
            }
            UnaryOp::Plus => {
                let value = self.evaluate_rvalue(operand)?;
                if value.ty().is_pointer() {
                    return Ok(value);
                }
                self.require_arithmetic(op, &value)?;
                promote(self.ctx, &value)
            }
            UnaryOp::Minus => {
                let value = self.evaluate_rvalue(operand)?;
                self.require_arithmetic(op, &value)?;
                let value = promote(self.ctx, &value)?;
                if value.ty().is_float() {
                    return create_value_from_ap_float(self.target(), &value.get_float()?.neg(), value.ty());
                }
                let negated = value.get_integer()?.value().wrapping_neg();
                create_value_from_ap_int(self.target(), &negated, value.ty())
            }
            UnaryOp::BitNot => {
                let value = self.evaluate_rvalue(operand)?;
                if !value.ty().is_integer_or_unscoped_enum() {
                    bail!(TypeMismatch, "invalid argument type '{}' to unary expression '~'", value.ty());
                }
                let value = promote(self.ctx, &value)?;
                let complement = value.get_integer()?.value().bit_not();
                create_value_from_ap_int(self.target(), &complement, value.ty())
            }
        }
    }

    fn require_arithmetic(&self, op: UnaryOp, value: &Value) -> Result<()> {
        if !value.ty().is_scalar_or_unscoped_enum() {
            bail!(
                TypeMismatch,
                "invalid argument type '{}' to unary expression '{}'",
                value.ty(),
                op.as_str()
            );
        }
        Ok(())
    }

    /// `*value`, following recognized smart pointers to their pointee
    fn dereference(&self, value: &Value) -> Result<Value> {
        if value.ty().is_smart_ptr_in(self.ctx.smart_pointers()) {
            return self.smart_ptr_raw_pointer(value)?.dereference();
        }
        value.dereference()
    }

    /// The raw pointer held by a smart pointer, found through the member
    /// path of its rule
    fn smart_ptr_raw_pointer(&self, value: &Value) -> Result<Value> {
        let name = value.ty().canonical().name();
        let Some(rule) = self.ctx.smart_pointers().find(&name) else {
            bail!(TypeMismatch, "'{}' is not a recognized smart pointer", name);
        };
        let mut current = value.clone();
        for member in rule.member_path() {
            current = current.member(member).ok_or_else(|| {
                eval_err!(BackendFailure, "smart pointer '{}' has no member '{}'", name, member)
            })?;
        }
        if !current.ty().is_pointer() {
            bail!(BackendFailure, "member '{}' of '{}' is not a pointer", rule.pointer_member, name);
        }
        Ok(current)
    }

    /// `++x`, `--x`, `x++` and `x--`
    fn evaluate_increment(&self, op: UnaryOp, operand: &Expr) -> Result<Value> {
        self.require_side_effects(&format!("'{}'", op.as_str()))?;
        let mut destination = self.evaluate_expression(operand)?;
        Self::require_lvalue(&destination)?;

        let ty = destination.ty().clone();
        let delta: i128 = if matches!(op, UnaryOp::PreInc | UnaryOp::PostInc) { 1 } else { -1 };
        let updated = if ty.is_pointer() {
            pointer_offset(self.ctx, &destination, delta)?
        } else if ty.is_integer() && !ty.is_bool() {
            let current = destination.get_integer()?;
            let bits = current.value().wrapping_add(&ApInt::from_i128(current.width(), delta));
            create_value_from_ap_int(self.target(), &bits, &ty)?
        } else if ty.is_float() {
            let current = destination.get_float()?;
            let next = current.add(&ApFloat::new(current.semantics(), delta as f64));
            create_value_from_ap_float(self.target(), &next, &ty)?
        } else {
            bail!(TypeMismatch, "cannot apply '{}' to a value of type '{}'", op.as_str(), ty);
        };

        let previous = match op {
            UnaryOp::PostInc | UnaryOp::PostDec => Some(destination.clone_value()?),
            _ => None,
        };
        destination.update_from(&updated)?;
        Ok(previous.unwrap_or(destination))
    }

    /// Evaluate binary operators
    fn evaluate_binary(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value> {
        match op {
            BinaryOp::Comma => {
                self.evaluate_expression(lhs)?;
                self.evaluate_expression(rhs)
            }
            BinaryOp::LogicalAnd => {
                let result = self.evaluate_condition(lhs)? && self.evaluate_condition(rhs)?;
                create_value_from_bool(self.target(), result)
            }
            BinaryOp::LogicalOr => {
                let result = self.evaluate_condition(lhs)? || self.evaluate_condition(rhs)?;
                create_value_from_bool(self.target(), result)
            }
            _ => {
                let left = self.evaluate_rvalue(lhs)?;
                let right = self.evaluate_rvalue(rhs)?;
                let nulls = NullConstants {
                    lhs: lhs.is_null_pointer_constant(),
                    rhs: rhs.is_null_pointer_constant(),
                };
                self.apply_binary(op, &left, &right, nulls)
            }
        }
    }

    /// Apply a non-short-circuiting binary operator to evaluated operands
    fn apply_binary(&self, op: BinaryOp, lhs: &Value, rhs: &Value, nulls: NullConstants) -> Result<Value> {
        match op {
            BinaryOp::Add | BinaryOp::Sub if lhs.ty().is_pointer() || rhs.ty().is_pointer() => {
                self.evaluate_pointer_arithmetic(op, lhs, rhs)
            }
            BinaryOp::Shl | BinaryOp::Shr => self.evaluate_shift(op, lhs, rhs),
            op if op.is_comparison() => self.evaluate_comparison(op, lhs, rhs, nulls),
            _ => self.evaluate_arithmetic(op, lhs, rhs),
        }
    }

    /// `p + n`, `n + p`, `p - n` and `p - q`
    fn evaluate_pointer_arithmetic(&self, op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value> {
        let (lhs_ty, rhs_ty) = (lhs.ty(), rhs.ty());
        match (op, lhs_ty.is_pointer(), rhs_ty.is_pointer()) {
            (BinaryOp::Sub, true, true) => pointer_difference(self.ctx, lhs, rhs),
            (_, true, false) if rhs_ty.is_integer_or_unscoped_enum() => {
                let count = rhs.get_integer()?.to_i128();
                let count = if op == BinaryOp::Sub { count.wrapping_neg() } else { count };
                pointer_offset(self.ctx, lhs, count)
            }
            (BinaryOp::Add, false, true) if lhs_ty.is_integer_or_unscoped_enum() => {
                pointer_offset(self.ctx, rhs, lhs.get_integer()?.to_i128())
            }
            _ => bail!(
                TypeMismatch,
                "invalid operands to binary expression ('{}' {} '{}')",
                lhs_ty,
                op.as_str(),
                rhs_ty
            ),
        }
    }

    /// `* / % + - & ^ |` on arithmetic operands
    fn evaluate_arithmetic(&self, op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value> {
        let common = common_arithmetic_type(self.ctx, lhs.ty(), rhs.ty())?;
        let integral_only = matches!(op, BinaryOp::Rem | BinaryOp::BitAnd | BinaryOp::BitXor | BinaryOp::BitOr);
        if integral_only && common.is_float() {
            bail!(
                TypeMismatch,
                "invalid operands to binary expression ('{}' {} '{}')",
                lhs.ty(),
                op.as_str(),
                rhs.ty()
            );
        }
        let lhs = convert_to(self.ctx, lhs, &common)?;
        let rhs = convert_to(self.ctx, rhs, &common)?;

        if common.is_float() {
            let (a, b) = (lhs.get_float()?, rhs.get_float()?);
            let result = match op {
                BinaryOp::Add => a.add(&b),
                BinaryOp::Sub => a.sub(&b),
                BinaryOp::Mul => a.mul(&b),
                BinaryOp::Div => a.div(&b),
                _ => bail!(InvalidOperation, "operator '{}' is not arithmetic", op.as_str()),
            };
            return create_value_from_ap_float(self.target(), &result, &common);
        }

        let (a, b) = (lhs.get_integer()?, rhs.get_integer()?);
        let (x, y) = (a.value(), b.value());
        let signed = common.is_signed();
        let result = match op {
            BinaryOp::Add => x.wrapping_add(y),
            BinaryOp::Sub => x.wrapping_sub(y),
            BinaryOp::Mul => x.wrapping_mul(y),
            BinaryOp::Div => (if signed { x.sdiv(y) } else { x.udiv(y) })
                .ok_or_else(|| eval_err!(InvalidOperation, "division by zero"))?,
            BinaryOp::Rem => (if signed { x.srem(y) } else { x.urem(y) })
                .ok_or_else(|| eval_err!(InvalidOperation, "remainder by zero"))?,
            BinaryOp::BitAnd => x.bit_and(y),
            BinaryOp::BitXor => x.bit_xor(y),
            BinaryOp::BitOr => x.bit_or(y),
            _ => bail!(InvalidOperation, "operator '{}' is not arithmetic", op.as_str()),
        };
        create_value_from_ap_int(self.target(), &result, &common)
    }

    /// `<<` and `>>`. Operands are promoted separately and the result has the
    /// promoted type of the left operand.
    fn evaluate_shift(&self, op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value> {
        if !lhs.ty().is_integer_or_unscoped_enum() || !rhs.ty().is_integer_or_unscoped_enum() {
            bail!(
                TypeMismatch,
                "invalid operands to binary expression ('{}' {} '{}')",
                lhs.ty(),
                op.as_str(),
                rhs.ty()
            );
        }
        let lhs = promote(self.ctx, lhs)?;
        let count = promote(self.ctx, rhs)?.get_integer()?;
        if count.is_negative() {
            bail!(InvalidOperation, "shift count {} is negative", count.to_i128());
        }
        let amount = u32::try_from(count.to_u128()).unwrap_or(u32::MAX);
        let bits = *lhs.get_integer()?.value();
        let result = match op {
            BinaryOp::Shl => bits.shl(amount),
            _ if lhs.ty().is_signed() => bits.ashr(amount),
            _ => bits.lshr(amount),
        };
        create_value_from_ap_int(self.target(), &result, lhs.ty())
    }

    /// Relational and equality operators
    fn evaluate_comparison(&self, op: BinaryOp, lhs: &Value, rhs: &Value, nulls: NullConstants) -> Result<Value> {
        let (lhs_ty, rhs_ty) = (lhs.ty(), rhs.ty());
        let pointer_like = |ty: &Type, null: bool| ty.is_pointer() || ty.is_nullptr() || (null && ty.is_integer());
        let equality = matches!(op, BinaryOp::Eq | BinaryOp::Ne);

        let ordering = if lhs_ty.is_scalar_or_unscoped_enum() && rhs_ty.is_scalar_or_unscoped_enum() {
            let common = common_arithmetic_type(self.ctx, lhs_ty, rhs_ty)?;
            let lhs = convert_to(self.ctx, lhs, &common)?;
            let rhs = convert_to(self.ctx, rhs, &common)?;
            if common.is_float() {
                lhs.get_float()?.compare(&rhs.get_float()?)
            } else {
                Some(lhs.get_integer()?.cmp_value(&rhs.get_integer()?))
            }
        } else if pointer_like(lhs_ty, nulls.lhs) && pointer_like(rhs_ty, nulls.rhs) {
            if !equality && (lhs_ty.is_nullptr() || rhs_ty.is_nullptr()) {
                bail!(TypeMismatch, "invalid operands to binary expression ('{}' {} '{}')", lhs_ty, op.as_str(), rhs_ty);
            }
            if lhs_ty.is_pointer()
                && rhs_ty.is_pointer()
                && !lhs_ty.is_pointer_to_void()
                && !rhs_ty.is_pointer_to_void()
                && !compare_types(&lhs_ty.pointee_type(), &rhs_ty.pointee_type())
            {
                bail!(TypeMismatch, "comparison of distinct pointer types ('{}' and '{}')", lhs_ty, rhs_ty);
            }
            Some(lhs.get_u64()?.cmp(&rhs.get_u64()?))
        } else if lhs_ty.is_scoped_enum() && compare_types(lhs_ty, rhs_ty) {
            Some(lhs.get_integer()?.cmp_value(&rhs.get_integer()?))
        } else {
            bail!(TypeMismatch, "invalid operands to binary expression ('{}' {} '{}')", lhs_ty, op.as_str(), rhs_ty);
        };

        // Unordered (NaN) operands compare unequal to everything
        let result = match (op, ordering) {
            (BinaryOp::Ne, None) => true,
            (_, None) => false,
            (BinaryOp::Eq, Some(ordering)) => ordering == Ordering::Equal,
            (BinaryOp::Ne, Some(ordering)) => ordering != Ordering::Equal,
            (BinaryOp::Lt, Some(ordering)) => ordering == Ordering::Less,
            (BinaryOp::Gt, Some(ordering)) => ordering == Ordering::Greater,
            (BinaryOp::Le, Some(ordering)) => ordering != Ordering::Greater,
            (BinaryOp::Ge, Some(ordering)) => ordering != Ordering::Less,
            _ => bail!(InvalidOperation, "operator '{}' is not a comparison", op.as_str()),
        };
        create_value_from_bool(self.target(), result)
    }

    /// `lhs = rhs` and the compound assignments
    ///
    /// The permission check comes before either operand is evaluated, so a
    /// rejected assignment writes nothing.
    fn evaluate_assignment(&self, op: Option<BinaryOp>, lhs: &Expr, rhs: &Expr) -> Result<Value> {
        let spelling = op.map_or_else(|| "=".to_string(), |op| format!("{}=", op.as_str()));
        self.require_side_effects(&format!("assignment '{spelling}'"))?;

        let mut destination = self.evaluate_expression(lhs)?;
        Self::require_lvalue(&destination)?;
        let ty = destination.ty().clone();
        if ty.is_array() {
            bail!(TypeMismatch, "array type '{}' is not assignable", ty);
        }
        let source = self.evaluate_rvalue(rhs)?;

        let converted = match op {
            None if ty.is_record() => {
                if !compare_types(&ty, source.ty()) {
                    bail!(TypeMismatch, "assigning to '{}' from incompatible type '{}'", ty, source.ty());
                }
                source
            }
            None => assignment_conversion(self.ctx, &source, &ty, rhs.is_null_pointer_constant())?,
            Some(_) if ty.is_enum() || ty.is_record() => {
                bail!(TypeMismatch, "invalid compound assignment '{}' to a value of type '{}'", spelling, ty);
            }
            Some(op) => {
                let result = self.apply_binary(op, &destination, &source, NullConstants::default())?;
                if ty.is_pointer() { result } else { convert_to(self.ctx, &result, &ty)? }
            }
        };

        trace!(destination = %destination.name(), op = %spelling, "writing to debuggee storage");
        destination.update_from(&converted)?;
        Ok(destination)
    }

    /// `cond ? then : otherwise`
    ///
    /// Only the selected branch is evaluated for its value. The other branch
    /// is inspected, without side effects, to find the common type of
    /// arithmetic operands; if it cannot be evaluated the selected value is
    /// returned as is.
    fn evaluate_conditional(&self, cond: &Expr, then: &Expr, otherwise: &Expr) -> Result<Value> {
        let (selected, other) = if self.evaluate_condition(cond)? { (then, otherwise) } else { (otherwise, then) };
        let value = self.evaluate_expression(selected)?;
        if other.has_side_effects() {
            return Ok(value);
        }
        let other_value = match self.without_side_effects().evaluate_expression(other) {
            Ok(other_value) => other_value,
            Err(err) => {
                trace!(%err, "unselected branch of conditional is not evaluable");
                return Ok(value);
            }
        };
        if compare_types(value.ty(), other_value.ty()) {
            return Ok(value);
        }

        let value = decay(self.ctx, value)?;
        let (value_ty, other_ty) = (value.ty(), other_value.ty());
        if value_ty.is_scalar_or_unscoped_enum() && other_ty.is_scalar_or_unscoped_enum() {
            let common = common_arithmetic_type(self.ctx, value_ty, other_ty)?;
            return convert_to(self.ctx, &value, &common);
        }
        if (value_ty.is_nullptr() || selected.is_null_pointer_constant()) && other_ty.is_pointer() {
            return create_value_nullptr(self.target(), other_ty);
        }
        Ok(value)
    }

    /// `base.member` and `base->member`
    fn evaluate_member(&self, base: &Expr, member: &str, arrow: bool) -> Result<Value> {
        let base = self.evaluate_expression(base)?;
        let object = if arrow {
            let pointer = decay(self.ctx, base)?;
            let ty = pointer.ty();
            if !ty.is_pointer() && !ty.is_smart_ptr_in(self.ctx.smart_pointers()) {
                bail!(TypeMismatch, "member reference type '{}' is not a pointer", ty);
            }
            self.dereference(&pointer)?
        } else {
            let object = if base.ty().is_reference() { base.dereference()? } else { base };
            if object.ty().is_pointer() {
                bail!(
                    TypeMismatch,
                    "member reference type '{}' is a pointer; did you mean to use '->'?",
                    object.ty()
                );
            }
            object
        };

        if !object.ty().is_record() {
            bail!(TypeMismatch, "member reference base type '{}' is not a structure or union", object.ty());
        }
        let value = object
            .member(member)
            .ok_or_else(|| eval_err!(UndeclaredIdentifier, "no member named '{}' in '{}'", member, object.ty()))?;
        if value.ty().is_reference() {
            return value.dereference();
        }
        Ok(value)
    }

    /// `base[index]`, including the reversed `index[base]` form
    fn evaluate_index(&self, base: &Expr, index: &Expr) -> Result<Value> {
        let mut base = self.evaluate_expression(base)?;
        if base.ty().is_reference() {
            base = base.dereference()?;
        }
        let mut index = self.evaluate_rvalue(index)?;
        if base.ty().is_integer_or_unscoped_enum() && (index.ty().is_pointer() || index.ty().is_array()) {
            std::mem::swap(&mut base, &mut index);
        }
        if !index.ty().is_integer_or_unscoped_enum() {
            bail!(TypeMismatch, "array subscript has non-integer type '{}'", index.ty());
        }
        let position = index.get_integer()?.to_i128();

        if base.ty().is_array() {
            if let Some(element) = u64::try_from(position).ok().and_then(|i| base.child_at_index(i)) {
                return Ok(element);
            }
            if !base.is_lvalue() {
                bail!(InvalidOperation, "index {} is out of bounds for a temporary of type '{}'", position, base.ty());
            }
        }

        let pointer = decay(self.ctx, base)?;
        if !pointer.ty().is_pointer() {
            bail!(TypeMismatch, "subscripted value of type '{}' is not an array or pointer", pointer.ty());
        }
        pointer_offset(self.ctx, &pointer, position)?.dereference()
    }

    /// Resolve a written type. The flag is set for a reference type, in which
    /// case the returned type is the referent.
    fn resolve_type_name(&self, name: &TypeName) -> Result<(Type, bool)> {
        let mut ty = match name.basic_type() {
            Some(basic) => self.basic(basic),
            None => self
                .ctx
                .find_type(&name.base)
                .ok_or_else(|| eval_err!(UndeclaredIdentifier, "unknown type name '{}'", name.base))?,
        };
        let mut reference = false;
        for declarator in &name.declarators {
            if reference {
                bail!(TypeMismatch, "'{}' declares a pointer or reference to a reference", name);
            }
            match declarator {
                Declarator::Pointer => ty = pointer_to(self.ctx, &ty)?,
                Declarator::Reference => reference = true,
            }
        }
        Ok((ty, reference))
    }

    /// Evaluate explicit conversions
    fn evaluate_cast(&self, kind: CastKind, ty: &TypeName, operand: &Expr) -> Result<Value> {
        let (destination, reference) = self.resolve_type_name(ty)?;
        let value = self.evaluate_expression(operand)?;

        if reference {
            if kind == CastKind::Static && !compare_types(value.ty(), &destination) {
                bail!(UnsupportedConversion, "static_cast from '{}' to '{} &' is not allowed", value.ty(), destination);
            }
            return self.reinterpret_reference(&value, &destination);
        }

        let value = decay(self.ctx, value)?;
        if compare_types(value.ty(), &destination) {
            return Ok(value);
        }
        match kind {
            CastKind::CStyle => self.c_style_cast(&value, &destination),
            CastKind::Static => self.static_cast(&value, &destination, operand.is_null_pointer_constant()),
            CastKind::Reinterpret => self.reinterpret_cast(&value, &destination),
        }
    }

    /// View the storage of an lvalue as another type
    fn reinterpret_reference(&self, value: &Value, ty: &Type) -> Result<Value> {
        let Some(address) = value.load_address() else {
            bail!(InvalidOperation, "cannot bind a reference of type '{}' to a temporary", ty);
        };
        let pointer = pointer_to(self.ctx, ty)?;
        create_value_from_pointer(self.target(), address, &pointer)?.dereference()
    }

    /// `(T)x`: the first of the static and reinterpret conversions that applies
    fn c_style_cast(&self, value: &Value, ty: &Type) -> Result<Value> {
        if ty.is_void() {
            bail!(UnsupportedConversion, "casting to 'void' produces no value");
        }
        if ty.is_nullptr() {
            bail!(UnsupportedConversion, "cannot cast '{}' to 'std::nullptr_t'", value.ty());
        }
        if ty.is_pointer() {
            return cast_to_pointer_type(self.target(), value, ty);
        }
        convert_to(self.ctx, value, ty)
    }

    /// `static_cast<T>(x)`
    fn static_cast(&self, value: &Value, ty: &Type, null_constant: bool) -> Result<Value> {
        let source = value.ty();
        if ty.is_pointer() {
            if source.is_nullptr() || (null_constant && source.is_integer()) {
                return create_value_nullptr(self.target(), ty);
            }
            let related = source.is_pointer()
                && (source.is_pointer_to_void()
                    || ty.is_pointer_to_void()
                    || compare_types(&source.pointee_type(), &ty.pointee_type()));
            if related {
                return cast_to_pointer_type(self.target(), value, ty);
            }
            bail!(UnsupportedConversion, "static_cast from '{}' to '{}' is not allowed", source, ty);
        }
        if (source.is_pointer() || source.is_nullptr()) && !ty.is_bool() {
            bail!(UnsupportedConversion, "static_cast from '{}' to '{}' is not allowed", source, ty);
        }
        if ty.is_void() || ty.is_nullptr() {
            bail!(UnsupportedConversion, "static_cast from '{}' to '{}' is not allowed", source, ty);
        }
        convert_to(self.ctx, value, ty)
    }

    /// `reinterpret_cast<T>(x)`: pointers and integers only
    fn reinterpret_cast(&self, value: &Value, ty: &Type) -> Result<Value> {
        let source = value.ty();
        if ty.is_pointer() && (source.is_pointer() || source.is_integer_or_unscoped_enum()) {
            return cast_to_pointer_type(self.target(), value, ty);
        }
        if ty.is_integer() && !ty.is_bool() && (source.is_pointer() || source.is_nullptr()) {
            if ty.byte_size() < source.byte_size() {
                bail!(UnsupportedConversion, "cast from pointer to smaller type '{}' loses information", ty);
            }
            return cast_pointer_to_basic_type(self.target(), value, ty);
        }
        bail!(UnsupportedConversion, "reinterpret_cast from '{}' to '{}' is not allowed", source, ty)
    }

    /// `sizeof` as an `unsigned long`
    fn size_of(&self, ty: &Type) -> Result<Value> {
        let size = ty.byte_size();
        if ty.is_void() || size == 0 {
            bail!(TypeMismatch, "invalid application of 'sizeof' to an incomplete type '{}'", ty);
        }
        let size_t = self.basic(BasicType::UnsignedLong);
        create_value_from_ap_int(self.target(), &ApInt::new(size_t.bit_width(), size as u128), &size_t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::memory::{MemoryFrame, MemoryTarget},
        context::{Options, Scope},
        eval::parser::parse_expression,
        smart_ptr::SmartPtrTable,
        ErrorKind,
    };

    fn eval_in(target: &MemoryTarget, frame: &MemoryFrame, source: &str, side_effects: bool) -> Result<Value> {
        let table = SmartPtrTable::default();
        let options = Options::new().with_side_effects(side_effects);
        let ctx = Context::new(Scope::Frame(frame.as_frame()), options, &table)?;
        let expr = parse_expression(source, &|name| target.lookup_type(name).is_some())?;
        Evaluator::new(&ctx).evaluate_expression(&expr)
    }

    #[test]
    fn test_integer_literal_types() {
        let target = MemoryTarget::new();
        let frame = target.frame("main");
        let type_of = |source: &str| eval_in(&target, &frame, source, false).unwrap().ty().basic_type();

        assert_eq!(type_of("1"), BasicType::Int);
        assert_eq!(type_of("2147483648"), BasicType::Long);
        assert_eq!(type_of("0x80000000"), BasicType::UnsignedInt);
        assert_eq!(type_of("1u"), BasicType::UnsignedInt);
        assert_eq!(type_of("1ll"), BasicType::LongLong);
        assert_eq!(type_of("18446744073709551615"), BasicType::UnsignedLongLong);
        assert_eq!(type_of("'a'"), BasicType::Char);
        assert_eq!(type_of("1.5f"), BasicType::Float);

        let err = eval_in(&target, &frame, "18446744073709551616", false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseError);
    }

    #[test]
    fn test_arithmetic_semantics() {
        let target = MemoryTarget::new();
        let frame = target.frame("main");
        let eval = |source: &str| eval_in(&target, &frame, source, false);

        assert_eq!(eval("7 / -2").unwrap().get_i64().unwrap(), -3);
        assert_eq!(eval("7 % -2").unwrap().get_i64().unwrap(), 1);
        assert!(!eval("-1 < 0u").unwrap().get_bool().unwrap());
        assert_eq!(eval("1 << 40").unwrap().get_i64().unwrap(), 0);
        assert_eq!(eval("-8 >> 1").unwrap().get_i64().unwrap(), -4);
        assert_eq!(eval("1 / 0").unwrap_err().kind(), ErrorKind::InvalidOperation);
        assert_eq!(eval("1 << -1").unwrap_err().kind(), ErrorKind::InvalidOperation);
        assert!(eval("1.0 / 0").unwrap().get_float().unwrap().to_f64().is_infinite());
        assert_eq!(eval("1.5 % 2").unwrap_err().kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_function_call_is_rejected() {
        let target = MemoryTarget::new();
        let frame = target.frame("main");
        let err = eval_in(&target, &frame, "f(1)", false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SideEffectNotPermitted);
        let err = eval_in(&target, &frame, "f(1)", true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    }
}
