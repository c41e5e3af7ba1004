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


//! Fixed-width arbitrary-precision integers.
//!
//! [`ApInt`] is a bag of `width` bits (1..=128) with two's-complement
//! arithmetic that wraps at the width, the representation every integral
//! C++ value is reduced to before it is cast or written back to the backend.
//! [`ApSInt`] attaches a signedness, which decides how the bits extend and
//! compare.

use std::cmp::Ordering;

use crate::backend::ByteOrder;

/// A fixed-width two's-complement integer of up to 128 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ApInt {
    width: u32,
    bits: u128,
}

impl ApInt {
    /// Widest supported integer
    pub const MAX_WIDTH: u32 = 128;

    /// Create an integer of `width` bits, keeping only the low `width` bits of `bits`
    pub fn new(width: u32, bits: u128) -> Self {
        debug_assert!((1..=Self::MAX_WIDTH).contains(&width), "invalid integer width {width}");
        let width = width.clamp(1, Self::MAX_WIDTH);
        Self { width, bits: bits & Self::mask(width) }
    }

    /// Zero of the given width
    pub fn zero(width: u32) -> Self {
        Self::new(width, 0)
    }

    /// Sign-extend `value` into `width` bits (truncating if narrower)
    pub fn from_i128(width: u32, value: i128) -> Self {
        Self::new(width, value as u128)
    }

    /// Bitmask of the low `width` bits
    pub fn mask(width: u32) -> u128 {
        if width >= Self::MAX_WIDTH {
            u128::MAX
        } else {
            (1u128 << width) - 1
        }
    }

    /// Width in bits
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The bits, zero-extended to 128
    pub fn bits(&self) -> u128 {
        self.bits
    }

    /// The bits interpreted as signed, sign-extended to 128
    pub fn as_signed(&self) -> i128 {
        let shift = Self::MAX_WIDTH - self.width;
        ((self.bits << shift) as i128) >> shift
    }

    /// Whether the top bit is set
    pub fn sign_bit(&self) -> bool {
        (self.bits >> (self.width - 1)) & 1 == 1
    }

    /// Whether all bits are clear
    pub fn is_zero(&self) -> bool {
        self.bits == 0
    }

    /// Zero-extend or truncate to `width`
    pub fn zext_or_trunc(&self, width: u32) -> Self {
        Self::new(width, self.bits)
    }

    /// Sign-extend or truncate to `width`
    pub fn sext_or_trunc(&self, width: u32) -> Self {
        Self::new(width, self.as_signed() as u128)
    }

    /// Wrapping addition
    pub fn wrapping_add(&self, rhs: &Self) -> Self {
        Self::new(self.width, self.bits.wrapping_add(rhs.bits))
    }

    /// Wrapping subtraction
    pub fn wrapping_sub(&self, rhs: &Self) -> Self {
        Self::new(self.width, self.bits.wrapping_sub(rhs.bits))
    }

    /// Wrapping multiplication
    pub fn wrapping_mul(&self, rhs: &Self) -> Self {
        Self::new(self.width, self.bits.wrapping_mul(rhs.bits))
    }

    /// Two's-complement negation
    pub fn wrapping_neg(&self) -> Self {
        Self::new(self.width, self.bits.wrapping_neg())
    }

    /// Bitwise complement
    pub fn bit_not(&self) -> Self {
        Self::new(self.width, !self.bits)
    }

    /// Bitwise and
    pub fn bit_and(&self, rhs: &Self) -> Self {
        Self::new(self.width, self.bits & rhs.bits)
    }

    /// Bitwise or
    pub fn bit_or(&self, rhs: &Self) -> Self {
        Self::new(self.width, self.bits | rhs.bits)
    }

    /// Bitwise exclusive or
    pub fn bit_xor(&self, rhs: &Self) -> Self {
        Self::new(self.width, self.bits ^ rhs.bits)
    }

    /// Left shift; shifting by the width or more yields zero
    pub fn shl(&self, amount: u32) -> Self {
        if amount >= self.width {
            Self::zero(self.width)
        } else {
            Self::new(self.width, self.bits << amount)
        }
    }

    /// Logical right shift; shifting by the width or more yields zero
    pub fn lshr(&self, amount: u32) -> Self {
        if amount >= self.width {
            Self::zero(self.width)
        } else {
            Self::new(self.width, self.bits >> amount)
        }
    }

    /// Arithmetic right shift; shifting by the width or more fills with the sign bit
    pub fn ashr(&self, amount: u32) -> Self {
        let amount = amount.min(self.width - 1);
        Self::from_i128(self.width, self.as_signed() >> amount)
    }

    /// Unsigned division, `None` on division by zero
    pub fn udiv(&self, rhs: &Self) -> Option<Self> {
        self.bits.checked_div(rhs.bits).map(|q| Self::new(self.width, q))
    }

    /// Unsigned remainder, `None` on division by zero
    pub fn urem(&self, rhs: &Self) -> Option<Self> {
        self.bits.checked_rem(rhs.bits).map(|r| Self::new(self.width, r))
    }

    /// Signed division truncating toward zero, `None` on division by zero.
    /// `MIN / -1` wraps to `MIN`.
    pub fn sdiv(&self, rhs: &Self) -> Option<Self> {
        if rhs.is_zero() {
            return None;
        }
        Some(Self::from_i128(self.width, self.as_signed().wrapping_div(rhs.as_signed())))
    }

    /// Signed remainder with the sign of the dividend, `None` on division by zero
    pub fn srem(&self, rhs: &Self) -> Option<Self> {
        if rhs.is_zero() {
            return None;
        }
        Some(Self::from_i128(self.width, self.as_signed().wrapping_rem(rhs.as_signed())))
    }

    /// Unsigned comparison
    pub fn ucmp(&self, rhs: &Self) -> Ordering {
        self.bits.cmp(&rhs.bits)
    }

    /// Signed comparison
    pub fn scmp(&self, rhs: &Self) -> Ordering {
        self.as_signed().cmp(&rhs.as_signed())
    }

    /// Object representation in `len` bytes (zero padded or truncated)
    pub fn to_bytes(&self, len: usize, order: ByteOrder) -> Vec<u8> {
        let le = self.bits.to_le_bytes();
        let mut bytes: Vec<u8> = (0..len).map(|i| le.get(i).copied().unwrap_or(0)).collect();
        if order == ByteOrder::Big {
            bytes.reverse();
        }
        bytes
    }

    /// Read an integer of `width` bits from its object representation.
    /// Bytes beyond 16 are ignored.
    pub fn from_bytes(bytes: &[u8], width: u32, order: ByteOrder) -> Self {
        let mut le: Vec<u8> = bytes.to_vec();
        if order == ByteOrder::Big {
            le.reverse();
        }
        let mut buf = [0u8; 16];
        for (dst, src) in buf.iter_mut().zip(le.iter()) {
            *dst = *src;
        }
        Self::new(width, u128::from_le_bytes(buf))
    }
}

/// An [`ApInt`] with a signedness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ApSInt {
    value: ApInt,
    unsigned: bool,
}

impl ApSInt {
    /// Attach a signedness to an integer
    pub fn new(value: ApInt, unsigned: bool) -> Self {
        Self { value, unsigned }
    }

    /// Signed integer of `width` bits holding `value`
    pub fn from_i128(width: u32, value: i128) -> Self {
        Self::new(ApInt::from_i128(width, value), false)
    }

    /// Unsigned integer of `width` bits holding `value`
    pub fn from_u128(width: u32, value: u128) -> Self {
        Self::new(ApInt::new(width, value), true)
    }

    /// The raw bits
    pub fn value(&self) -> &ApInt {
        &self.value
    }

    /// Width in bits
    pub fn width(&self) -> u32 {
        self.value.width()
    }

    /// Whether the value is unsigned
    pub fn is_unsigned(&self) -> bool {
        self.unsigned
    }

    /// Whether the value is signed
    pub fn is_signed(&self) -> bool {
        !self.unsigned
    }

    /// Whether the value is negative (always false for unsigned values)
    pub fn is_negative(&self) -> bool {
        !self.unsigned && self.value.sign_bit()
    }

    /// Whether the value is zero
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Extend (by the value's own signedness) or truncate to `width` bits
    pub fn extend(&self, width: u32) -> ApInt {
        if self.unsigned {
            self.value.zext_or_trunc(width)
        } else {
            self.value.sext_or_trunc(width)
        }
    }

    /// The value as `i128`; unsigned values above `i128::MAX` wrap
    pub fn to_i128(&self) -> i128 {
        if self.unsigned {
            self.value.bits() as i128
        } else {
            self.value.as_signed()
        }
    }

    /// The value as `u128`; negative values wrap
    pub fn to_u128(&self) -> u128 {
        if self.unsigned {
            self.value.bits()
        } else {
            self.value.as_signed() as u128
        }
    }

    /// Nearest `f64`
    pub fn to_f64(&self) -> f64 {
        if self.unsigned {
            self.value.bits() as f64
        } else {
            self.value.as_signed() as f64
        }
    }

    /// Nearest `f32`, rounded directly from the integer
    pub fn to_f32(&self) -> f32 {
        if self.unsigned {
            self.value.bits() as f32
        } else {
            self.value.as_signed() as f32
        }
    }

    /// Mathematical comparison, honouring each operand's signedness
    pub fn cmp_value(&self, rhs: &Self) -> Ordering {
        match (self.is_negative(), rhs.is_negative()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (true, true) => self.value.as_signed().cmp(&rhs.value.as_signed()),
            (false, false) => self.to_u128().cmp(&rhs.to_u128()),
        }
    }
}
