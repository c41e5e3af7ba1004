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


//! Typed values on top of a backend value handle.

use std::fmt;

use crate::{
    apfloat::ApFloat,
    apint::{ApInt, ApSInt},
    backend::{BasicType, ByteOrder, TargetRef, ValueRef},
    bail, eval_err,
    error::Result,
    types::Type,
};

/// A backend value plus its cached [`Type`].
///
/// A `Value` never owns debuggee memory: it refers to storage whose lifetime
/// the backend governs. The default `Value` is invalid.
#[derive(Clone, Default)]
pub struct Value {
    handle: Option<ValueRef>,
    ty: Type,
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.handle {
            Some(handle) => f
                .debug_struct("Value")
                .field("name", &handle.name())
                .field("type", &self.ty.name())
                .finish(),
            None => f.write_str("Value(<invalid>)"),
        }
    }
}

impl From<ValueRef> for Value {
    fn from(handle: ValueRef) -> Self {
        Self::new(handle)
    }
}

impl Value {
    /// Wrap a backend handle, capturing its type
    pub fn new(handle: ValueRef) -> Self {
        let ty = Type::new(handle.ty());
        Self { handle: Some(handle), ty }
    }

    /// The invalid value
    pub fn invalid() -> Self {
        Self::default()
    }

    /// Whether a backend handle is attached
    pub fn is_valid(&self) -> bool {
        self.handle.is_some()
    }

    /// The backend handle
    pub fn handle(&self) -> Option<&ValueRef> {
        self.handle.as_ref()
    }

    fn require_handle(&self) -> Result<&ValueRef> {
        self.handle.as_ref().ok_or_else(|| eval_err!(BackendFailure, "use of an invalid value"))
    }

    /// The cached type
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Name reported by the backend
    pub fn name(&self) -> String {
        self.handle.as_ref().map(|handle| handle.name()).unwrap_or_default()
    }

    /// The target the value belongs to
    pub fn target(&self) -> Result<TargetRef> {
        Ok(self.require_handle()?.target())
    }

    /// Whether the value designates addressable storage
    pub fn is_lvalue(&self) -> bool {
        self.load_address().is_some()
    }

    /// Address of the storage, `None` for synthetic values
    pub fn load_address(&self) -> Option<u64> {
        self.handle.as_ref().and_then(|handle| handle.load_address())
    }

    /// Raw object representation
    pub fn data(&self) -> Result<Vec<u8>> {
        Ok(self.require_handle()?.data()?)
    }

    fn byte_order(&self) -> Result<ByteOrder> {
        Ok(self.target()?.byte_order())
    }

    /// The value as an integer.
    ///
    /// Accepts integral types (`bool` reads as a 1-bit unsigned value),
    /// enumerations (with the signedness of their underlying type) and
    /// pointers (as an unsigned address).
    pub fn get_integer(&self) -> Result<ApSInt> {
        let ty = &self.ty;
        let data = self.data()?;
        let order = self.byte_order()?;

        if ty.is_bool() {
            let set = data.iter().any(|byte| *byte != 0);
            return Ok(ApSInt::new(ApInt::new(1, set as u128), true));
        }

        let unsigned = if ty.is_integer() {
            !ty.is_signed()
        } else if ty.is_enum() {
            !ty.enum_integer_type(&self.target()?).is_signed()
        } else if ty.is_pointer() || ty.is_nullptr() {
            true
        } else {
            bail!(TypeMismatch, "cannot read a value of type '{}' as an integer", ty);
        };

        let width = ty.bit_width().min(ApInt::MAX_WIDTH);
        Ok(ApSInt::new(ApInt::from_bytes(&data, width, order), unsigned))
    }

    /// The value of a floating point object
    pub fn get_float(&self) -> Result<ApFloat> {
        let Some(semantics) = self.ty.float_semantics() else {
            bail!(TypeMismatch, "cannot read a value of type '{}' as a float", self.ty);
        };
        Ok(ApFloat::from_bytes(&self.data()?, semantics, self.byte_order()?))
    }

    /// The value converted to `bool` the way a condition would
    pub fn get_bool(&self) -> Result<bool> {
        if self.ty.is_float() {
            return Ok(!self.get_float()?.is_zero());
        }
        if self.ty.is_integer() || self.ty.is_enum() || self.ty.is_pointer() || self.ty.is_nullptr() {
            return Ok(!self.get_integer()?.is_zero());
        }
        bail!(TypeMismatch, "value of type '{}' is not contextually convertible to 'bool'", self.ty)
    }

    /// Integer or pointer value, truncated or extended to 64 bits
    pub fn get_u64(&self) -> Result<u64> {
        Ok(self.get_integer()?.extend(64).bits() as u64)
    }

    /// Integer value, truncated or extended to 64 bits
    pub fn get_i64(&self) -> Result<i64> {
        Ok(self.get_integer()?.extend(64).as_signed() as i64)
    }

    /// A pointer to this value's storage
    pub fn address_of(&self) -> Result<Self> {
        self.require_handle()?
            .address_of()
            .map(Self::new)
            .ok_or_else(|| eval_err!(InvalidOperation, "cannot take the address of an rvalue of type '{}'", self.ty))
    }

    /// The object a pointer or reference refers to
    pub fn dereference(&self) -> Result<Self> {
        let handle = self.require_handle()?;
        if self.ty.is_pointer() {
            if self.ty.is_pointer_to_void() {
                bail!(TypeMismatch, "indirection requires pointer to object type ('{}' invalid)", self.ty);
            }
            if self.get_u64()? == 0 {
                bail!(InvalidOperation, "dereference of a null pointer of type '{}'", self.ty);
            }
        } else if !self.ty.is_reference() {
            bail!(TypeMismatch, "indirection requires pointer operand ('{}' invalid)", self.ty);
        }
        handle
            .dereference()
            .map(Self::new)
            .ok_or_else(|| eval_err!(BackendFailure, "backend could not dereference '{}'", self.name()))
    }

    /// An independent copy in fresh storage
    pub fn clone_value(&self) -> Result<Self> {
        Ok(Self::new(self.require_handle()?.persist()?))
    }

    /// Overwrite the storage with `bits`, zero extended or truncated to the
    /// type's size.
    pub fn update_bits(&mut self, bits: &ApInt) -> Result<()> {
        let size = self.ty.byte_size() as usize;
        let bytes = bits.to_bytes(size, self.byte_order()?);
        self.require_handle()?.set_data(&bytes)?;
        self.refresh_type();
        Ok(())
    }

    /// Overwrite the storage with the object representation of `other`,
    /// which must have the same size.
    pub fn update_from(&mut self, other: &Self) -> Result<()> {
        let size = self.ty.byte_size();
        if other.ty.byte_size() != size {
            bail!(
                TypeMismatch,
                "cannot update a value of type '{}' from a value of type '{}'",
                self.ty,
                other.ty
            );
        }
        let data = other.data()?;
        self.require_handle()?.set_data(&data)?;
        self.refresh_type();
        Ok(())
    }

    fn refresh_type(&mut self) {
        if let Some(handle) = &self.handle {
            self.ty = Type::new(handle.ty());
        }
    }

    /// Named data member of a record
    pub fn member(&self, name: &str) -> Option<Self> {
        self.handle.as_ref()?.member(name).map(Self::new)
    }

    /// Element of an array
    pub fn child_at_index(&self, index: u64) -> Option<Self> {
        self.handle.as_ref()?.child_at_index(index).map(Self::new)
    }

    /// Short rendering of scalar values, used by the command line tool and
    /// in log messages.
    pub fn summary(&self) -> Result<String> {
        let ty = &self.ty;
        if ty.is_bool() {
            return Ok(self.get_bool()?.to_string());
        }
        if ty.is_float() {
            return Ok(self.get_float()?.to_string());
        }
        if matches!(ty.basic_type(), BasicType::Char | BasicType::SignedChar | BasicType::UnsignedChar)
        {
            let value = self.get_integer()?;
            let byte = value.value().bits() as u8;
            return Ok(if byte.is_ascii_graphic() || byte == b' ' {
                format!("{} '{}'", value.to_i128(), byte as char)
            } else {
                value.to_i128().to_string()
            });
        }
        if ty.is_integer() || ty.is_enum() {
            let value = self.get_integer()?;
            return Ok(if value.is_unsigned() {
                value.to_u128().to_string()
            } else {
                value.to_i128().to_string()
            });
        }
        if ty.is_pointer() || ty.is_nullptr() {
            return Ok(format!("{:#018x}", self.get_u64()?));
        }
        self.require_handle()?;
        Ok("{...}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::memory::MemoryTarget, ErrorKind};

    #[test]
    fn test_typed_readers() {
        let target = MemoryTarget::new();
        let short = target.ty(BasicType::Short);
        let value = target.variable("s", &short, &(-2i16).to_le_bytes());
        assert_eq!(value.get_integer().unwrap().to_i128(), -2);
        assert_eq!(value.get_i64().unwrap(), -2);
        assert_eq!(value.get_u64().unwrap(), u64::MAX - 1);
        assert!(value.get_bool().unwrap());
        assert_eq!(value.get_float().unwrap_err().kind(), ErrorKind::TypeMismatch);

        let flag = target.variable("b", &target.ty(BasicType::Bool), &[1]);
        let flag_int = flag.get_integer().unwrap();
        assert_eq!(flag_int.width(), 1);
        assert!(flag_int.is_unsigned());
    }

    #[test]
    fn test_invalid_value() {
        let value = Value::invalid();
        assert!(!value.is_valid());
        assert!(!value.ty().is_valid());
        assert_eq!(value.get_integer().unwrap_err().kind(), ErrorKind::BackendFailure);
    }

    #[test]
    fn test_address_of_then_dereference() {
        let target = MemoryTarget::new();
        let int = target.ty(BasicType::Int);
        let value = target.variable("x", &int, &1234i32.to_le_bytes());

        let pointer = value.address_of().unwrap();
        assert!(pointer.ty().is_pointer());
        assert_eq!(pointer.get_u64().unwrap(), value.load_address().unwrap());

        let back = pointer.dereference().unwrap();
        assert_eq!(back.ty(), value.ty());
        assert_eq!(back.data().unwrap(), value.data().unwrap());
    }

    #[test]
    fn test_rvalue_has_no_address() {
        let target = MemoryTarget::new();
        let int = target.ty(BasicType::Int);
        let value = target.variable("x", &int, &7i32.to_le_bytes()).clone_value().unwrap();
        assert!(!value.is_lvalue());
        assert_eq!(value.address_of().unwrap_err().kind(), ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_dereference_errors() {
        let target = MemoryTarget::new();
        let int = target.ty(BasicType::Int);
        let null = target.variable("p", &target.pointer_to(&int), &0u64.to_le_bytes());
        assert_eq!(null.dereference().unwrap_err().kind(), ErrorKind::InvalidOperation);

        let plain = target.variable("x", &int, &0i32.to_le_bytes());
        assert_eq!(plain.dereference().unwrap_err().kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_clone_then_update_keeps_original() {
        let target = MemoryTarget::new();
        let int = target.ty(BasicType::Int);
        let original = target.variable("x", &int, &5i32.to_le_bytes());

        let mut copy = original.clone_value().unwrap();
        copy.update_bits(&ApInt::new(32, 99)).unwrap();

        assert_eq!(copy.get_i64().unwrap(), 99);
        assert_eq!(original.get_i64().unwrap(), 5);
    }

    #[test]
    fn test_update_from_rejects_size_mismatch() {
        let target = MemoryTarget::new();
        let mut int = target.variable("x", &target.ty(BasicType::Int), &5i32.to_le_bytes());
        let long = target.variable("y", &target.ty(BasicType::Long), &6i64.to_le_bytes());
        assert_eq!(int.update_from(&long).unwrap_err().kind(), ErrorKind::TypeMismatch);

        let other = target.variable("z", &target.ty(BasicType::Int), &8i32.to_le_bytes());
        int.update_from(&other).unwrap();
        assert_eq!(int.get_i64().unwrap(), 8);
    }

    #[test]
    fn test_summary() {
        let target = MemoryTarget::new();
        let c = target.variable("c", &target.ty(BasicType::Char), b"A");
        assert_eq!(c.summary().unwrap(), "65 'A'");
        let d = target.variable("d", &target.ty(BasicType::Double), &2.5f64.to_le_bytes());
        assert_eq!(d.summary().unwrap(), "2.5");
        let p = target.variable("p", &target.pointer_to(&target.ty(BasicType::Int)), &[0; 8]);
        assert_eq!(p.summary().unwrap(), "0x0000000000000000");
    }
}
