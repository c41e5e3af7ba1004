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

//! Binary floating point values with an explicit format.
//!
//! [`ApFloat`] carries the format of the C++ type it came from so that every
//! arithmetic result and conversion is rounded to what the debuggee would
//! have computed. Values are kept unpacked as sign, exponent and a 64-bit
//! significand, and each operation rounds its exact result to nearest-even
//! in the value's format. `long double` therefore keeps the full 64-bit
//! precision and exponent range of the x87 80-bit format.

use std::{cmp::Ordering, fmt};

use crate::{
    apint::{ApInt, ApSInt},
    backend::{BasicType, ByteOrder},
};

/// Storage format of a floating point type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatSemantics {
    /// IEEE-754 binary32
    Single,
    /// IEEE-754 binary64
    Double,
    /// x87 80-bit extended precision
    X87DoubleExtended,
}

impl FloatSemantics {
    /// Format used by a fundamental float type of the given size
    pub fn for_basic_type(basic: BasicType, byte_size: u64) -> Option<Self> {
        match basic {
            BasicType::Float => Some(Self::Single),
            BasicType::Double => Some(Self::Double),
            BasicType::LongDouble if byte_size == 8 => Some(Self::Double),
            BasicType::LongDouble if byte_size >= 10 => Some(Self::X87DoubleExtended),
            _ => None,
        }
    }

    /// Number of meaningful bytes in the object representation
    pub fn encoded_len(self) -> usize {
        match self {
            Self::Single => 4,
            Self::Double => 8,
            Self::X87DoubleExtended => 10,
        }
    }

    /// Significand bits, counting the leading one
    pub fn precision(self) -> u32 {
        match self {
            Self::Single => 24,
            Self::Double => 53,
            Self::X87DoubleExtended => 64,
        }
    }

    /// Exponent of the smallest normal value
    pub fn min_exponent(self) -> i32 {
        match self {
            Self::Single => -126,
            Self::Double => -1022,
            Self::X87DoubleExtended => -16382,
        }
    }

    /// Exponent of the largest finite value, also the exponent bias
    pub fn max_exponent(self) -> i32 {
        match self {
            Self::Single => 127,
            Self::Double => 1023,
            Self::X87DoubleExtended => 16383,
        }
    }

    fn exponent_bits(self) -> u32 {
        match self {
            Self::Single => 8,
            Self::Double => 11,
            Self::X87DoubleExtended => 15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Category {
    Zero,
    Normal,
    Infinity,
    NaN,
}

/// `(-1)^negative * significand * 2^(exponent - 63)`. The top bit of
/// `significand` is set for normal values, including values that are
/// subnormal in their format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Unpacked {
    category: Category,
    negative: bool,
    exponent: i32,
    significand: u64,
}

impl Unpacked {
    const NAN: Self = Self { category: Category::NaN, negative: false, exponent: 0, significand: 0 };

    fn zero(negative: bool) -> Self {
        Self { category: Category::Zero, negative, exponent: 0, significand: 0 }
    }

    fn infinity(negative: bool) -> Self {
        Self { category: Category::Infinity, negative, exponent: 0, significand: 0 }
    }

    /// Exact value of `mantissa * 2^scale`
    fn normalize(negative: bool, mantissa: u64, scale: i32) -> Self {
        if mantissa == 0 {
            return Self::zero(negative);
        }
        let shift = mantissa.leading_zeros() as i32;
        Self {
            category: Category::Normal,
            negative,
            exponent: scale + 63 - shift,
            significand: mantissa << shift,
        }
    }

    /// Round `magnitude * 2^scale` to nearest-even in `semantics`. `sticky`
    /// marks a non-zero remainder below the lowest bit of `magnitude`.
    fn round(negative: bool, magnitude: u128, scale: i32, sticky: bool, semantics: FloatSemantics) -> Self {
        if magnitude == 0 {
            return Self::zero(negative);
        }
        let bits = 128 - magnitude.leading_zeros() as i32;
        let exponent = scale + bits - 1;
        let mut keep = semantics.precision() as i32;
        if exponent < semantics.min_exponent() {
            keep -= semantics.min_exponent() - exponent;
        }

        let shift = bits - keep;
        let (kept, scale) = if shift > 0 {
            (shift_right_even(magnitude, sticky, shift as u32), scale + shift)
        } else {
            (magnitude, scale)
        };
        if kept == 0 {
            return Self::zero(negative);
        }

        let bits = 128 - kept.leading_zeros() as i32;
        let exponent = scale + bits - 1;
        if exponent > semantics.max_exponent() {
            return Self::infinity(negative);
        }
        // At most 64 significant bits remain; a carry out of rounding only adds a zero.
        let significand = ((kept << (128 - bits)) >> 64) as u64;
        Self { category: Category::Normal, negative, exponent, significand }
    }

    fn rounded(self, semantics: FloatSemantics) -> Self {
        match self.category {
            Category::Normal => Self::round(
                self.negative,
                self.significand as u128,
                self.exponent - 63,
                false,
                semantics,
            ),
            _ => self,
        }
    }

    fn is_nan(self) -> bool {
        self.category == Category::NaN
    }

    fn cmp_magnitude(self, other: Self) -> Ordering {
        self.category
            .cmp(&other.category)
            .then_with(|| (self.exponent, self.significand).cmp(&(other.exponent, other.significand)))
    }
}

/// `magnitude >> shift`, rounded to nearest-even
fn shift_right_even(magnitude: u128, sticky: bool, shift: u32) -> u128 {
    if shift > 128 {
        return 0;
    }
    let kept = if shift == 128 { 0 } else { magnitude >> shift };
    let half = (magnitude >> (shift - 1)) & 1 == 1;
    let below_half = magnitude & ((1u128 << (shift - 1)) - 1) != 0 || sticky;
    if half && (below_half || kept & 1 == 1) {
        kept + 1
    } else {
        kept
    }
}

fn add_values(a: Unpacked, b: Unpacked, semantics: FloatSemantics) -> Unpacked {
    use Category::*;
    match (a.category, b.category) {
        (NaN, _) | (_, NaN) => Unpacked::NAN,
        (Infinity, Infinity) if a.negative != b.negative => Unpacked::NAN,
        (Infinity, _) => a,
        (_, Infinity) => b,
        (Zero, Zero) => Unpacked::zero(a.negative && b.negative),
        (Zero, _) => b.rounded(semantics),
        (_, Zero) => a.rounded(semantics),
        (Normal, Normal) => {
            let (big, small) = if a.cmp_magnitude(b) == Ordering::Less { (b, a) } else { (a, b) };
            let distance = (big.exponent - small.exponent) as u32;
            // 62 spare low bits keep every bit of the smaller operand that can matter.
            let big_magnitude = (big.significand as u128) << 62;
            let small_full = (small.significand as u128) << 62;
            let (small_magnitude, sticky) = if distance >= 126 {
                (0, true)
            } else {
                (small_full >> distance, small_full & ((1u128 << distance) - 1) != 0)
            };
            let magnitude = if big.negative == small.negative {
                big_magnitude + small_magnitude
            } else if sticky {
                big_magnitude - small_magnitude - 1
            } else {
                big_magnitude - small_magnitude
            };
            if magnitude == 0 {
                return Unpacked::zero(false);
            }
            Unpacked::round(big.negative, magnitude, big.exponent - 63 - 62, sticky, semantics)
        }
    }
}

fn mul_values(a: Unpacked, b: Unpacked, semantics: FloatSemantics) -> Unpacked {
    use Category::*;
    let negative = a.negative != b.negative;
    match (a.category, b.category) {
        (NaN, _) | (_, NaN) => Unpacked::NAN,
        (Infinity, Zero) | (Zero, Infinity) => Unpacked::NAN,
        (Infinity, _) | (_, Infinity) => Unpacked::infinity(negative),
        (Zero, _) | (_, Zero) => Unpacked::zero(negative),
        (Normal, Normal) => Unpacked::round(
            negative,
            a.significand as u128 * b.significand as u128,
            a.exponent - 63 + b.exponent - 63,
            false,
            semantics,
        ),
    }
}

fn div_values(a: Unpacked, b: Unpacked, semantics: FloatSemantics) -> Unpacked {
    use Category::*;
    let negative = a.negative != b.negative;
    match (a.category, b.category) {
        (NaN, _) | (_, NaN) => Unpacked::NAN,
        (Infinity, Infinity) | (Zero, Zero) => Unpacked::NAN,
        (Infinity, _) | (_, Zero) => Unpacked::infinity(negative),
        (Zero, _) | (_, Infinity) => Unpacked::zero(negative),
        (Normal, Normal) => {
            let divisor = b.significand as u128;
            let numerator = (a.significand as u128) << 64;
            let (quotient, remainder) = (numerator / divisor, numerator % divisor);
            // Two more quotient bits so at least 66 are available for rounding.
            let guard = (remainder << 2) / divisor;
            let rest = (remainder << 2) % divisor;
            Unpacked::round(
                negative,
                (quotient << 2) | guard,
                a.exponent - b.exponent - 66,
                rest != 0,
                semantics,
            )
        }
    }
}

fn encode(value: Unpacked, semantics: FloatSemantics) -> u128 {
    if semantics == FloatSemantics::X87DoubleExtended {
        return encode_x87(value);
    }
    let precision = semantics.precision();
    let exponent_bits = semantics.exponent_bits();
    let all_ones = (1u128 << exponent_bits) - 1;
    let fraction_mask = (1u128 << (precision - 1)) - 1;
    let (biased, fraction) = match value.category {
        Category::Zero => (0, 0),
        Category::Infinity => (all_ones, 0),
        Category::NaN => (all_ones, 1u128 << (precision - 2)),
        Category::Normal if value.exponent < semantics.min_exponent() => {
            let shift = 64 - precision + (semantics.min_exponent() - value.exponent) as u32;
            (0, value.significand.checked_shr(shift).unwrap_or(0) as u128)
        }
        Category::Normal => (
            (value.exponent + semantics.max_exponent()) as u128,
            (value.significand >> (64 - precision)) as u128 & fraction_mask,
        ),
    };
    let sign = (value.negative as u128) << (precision - 1 + exponent_bits);
    sign | (biased << (precision - 1)) | fraction
}

fn decode(bits: u128, semantics: FloatSemantics) -> Unpacked {
    if semantics == FloatSemantics::X87DoubleExtended {
        return decode_x87(bits);
    }
    let precision = semantics.precision();
    let exponent_bits = semantics.exponent_bits();
    let all_ones = (1u128 << exponent_bits) - 1;
    let negative = (bits >> (precision - 1 + exponent_bits)) & 1 == 1;
    let biased = (bits >> (precision - 1)) & all_ones;
    let fraction = (bits & ((1u128 << (precision - 1)) - 1)) as u64;
    let fraction_scale = precision as i32 - 1;

    if biased == all_ones {
        if fraction == 0 {
            Unpacked::infinity(negative)
        } else {
            Unpacked { negative, ..Unpacked::NAN }
        }
    } else if biased == 0 {
        Unpacked::normalize(negative, fraction, semantics.min_exponent() - fraction_scale)
    } else {
        Unpacked::normalize(
            negative,
            fraction | (1 << (precision - 1)),
            biased as i32 - semantics.max_exponent() - fraction_scale,
        )
    }
}

const X87_BIAS: i32 = 16383;
const X87_MIN_EXPONENT: i32 = 1 - X87_BIAS;

/// 80-bit pattern: explicit-integer-bit mantissa in the low 64 bits,
/// sign and biased exponent above it
fn encode_x87(value: Unpacked) -> u128 {
    let (exponent, mantissa): (u16, u64) = match value.category {
        Category::Zero => (0, 0),
        Category::Infinity => (0x7fff, 0x8000_0000_0000_0000),
        Category::NaN => (0x7fff, 0xc000_0000_0000_0000),
        Category::Normal if value.exponent < X87_MIN_EXPONENT => {
            let shift = (X87_MIN_EXPONENT - value.exponent) as u32;
            (0, value.significand.checked_shr(shift).unwrap_or(0))
        }
        Category::Normal => ((value.exponent + X87_BIAS) as u16, value.significand),
    };
    let sign: u16 = if value.negative { 0x8000 } else { 0 };
    (((sign | exponent) as u128) << 64) | mantissa as u128
}

fn decode_x87(bits: u128) -> Unpacked {
    let mantissa = bits as u64;
    let sign_exp = (bits >> 64) as u16;
    let negative = sign_exp & 0x8000 != 0;
    let exponent = (sign_exp & 0x7fff) as i32;

    match exponent {
        0x7fff if mantissa << 1 == 0 => Unpacked::infinity(negative),
        0x7fff => Unpacked { negative, ..Unpacked::NAN },
        0 => Unpacked::normalize(negative, mantissa, X87_MIN_EXPONENT - 63),
        _ => Unpacked::normalize(negative, mantissa, exponent - X87_BIAS - 63),
    }
}

/// A floating point value rounded to its format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApFloat {
    semantics: FloatSemantics,
    value: Unpacked,
}

impl ApFloat {
    /// Round `value` to `semantics`
    pub fn new(semantics: FloatSemantics, value: f64) -> Self {
        Self::from_f64(value).convert(semantics)
    }

    /// A `float` value
    pub fn from_f32(value: f32) -> Self {
        let semantics = FloatSemantics::Single;
        Self { semantics, value: decode(value.to_bits() as u128, semantics) }
    }

    /// A `double` value
    pub fn from_f64(value: f64) -> Self {
        let semantics = FloatSemantics::Double;
        Self { semantics, value: decode(value.to_bits() as u128, semantics) }
    }

    /// Nearest representable value of an integer
    pub fn from_integer(value: &ApSInt, semantics: FloatSemantics) -> Self {
        let (negative, magnitude) = if value.is_unsigned() {
            (false, value.to_u128())
        } else {
            let signed = value.to_i128();
            (signed < 0, signed.unsigned_abs())
        };
        Self { semantics, value: Unpacked::round(negative, magnitude, 0, false, semantics) }
    }

    /// The storage format
    pub fn semantics(&self) -> FloatSemantics {
        self.semantics
    }

    /// Nearest `f64`
    pub fn to_f64(&self) -> f64 {
        let double = self.convert(FloatSemantics::Double);
        f64::from_bits(encode(double.value, FloatSemantics::Double) as u64)
    }

    /// Whether the value is positive or negative zero
    pub fn is_zero(&self) -> bool {
        self.value.category == Category::Zero
    }

    /// Whether the value is a NaN
    pub fn is_nan(&self) -> bool {
        self.value.is_nan()
    }

    /// Round to another format
    pub fn convert(&self, semantics: FloatSemantics) -> Self {
        Self { semantics, value: self.value.rounded(semantics) }
    }

    /// Truncate toward zero into an integer of `width` bits.
    ///
    /// Returns `None` when the truncated value is not representable
    /// (including NaN and infinities); no wrapping ever happens.
    pub fn to_integer(&self, width: u32, unsigned: bool) -> Option<ApSInt> {
        let value = self.value;
        let magnitude = match value.category {
            Category::NaN | Category::Infinity => return None,
            Category::Zero => 0,
            Category::Normal if value.exponent < 0 => 0,
            Category::Normal if value.exponent >= 128 => return None,
            Category::Normal if value.exponent >= 63 => {
                (value.significand as u128) << (value.exponent - 63)
            }
            Category::Normal => (value.significand >> (63 - value.exponent)) as u128,
        };

        if unsigned {
            if (value.negative && magnitude != 0) || (width < 128 && magnitude >> width != 0) {
                return None;
            }
            return Some(ApSInt::new(ApInt::new(width, magnitude), true));
        }

        let limit = 1u128 << (width - 1);
        let signed = if value.negative {
            if magnitude > limit {
                return None;
            }
            (magnitude as i128).wrapping_neg()
        } else {
            if magnitude >= limit {
                return None;
            }
            magnitude as i128
        };
        Some(ApSInt::new(ApInt::from_i128(width, signed), false))
    }

    /// The value as an integer when it has no fractional part and fits `i128`
    fn integral_value(&self) -> Option<i128> {
        let value = self.value;
        if value.category != Category::Normal || !(0..=126).contains(&value.exponent) {
            return None;
        }
        if value.exponent < 63 && value.significand << (value.exponent + 1) != 0 {
            return None;
        }
        self.to_integer(128, false).map(|integer| integer.to_i128())
    }

    /// Negation
    pub fn neg(&self) -> Self {
        Self { semantics: self.semantics, value: Unpacked { negative: !self.value.negative, ..self.value } }
    }

    /// Addition rounded to the format of `self`
    pub fn add(&self, rhs: &Self) -> Self {
        Self { semantics: self.semantics, value: add_values(self.value, rhs.value, self.semantics) }
    }

    /// Subtraction rounded to the format of `self`
    pub fn sub(&self, rhs: &Self) -> Self {
        self.add(&rhs.neg())
    }

    /// Multiplication rounded to the format of `self`
    pub fn mul(&self, rhs: &Self) -> Self {
        Self { semantics: self.semantics, value: mul_values(self.value, rhs.value, self.semantics) }
    }

    /// Division rounded to the format of `self` (IEEE semantics for zero divisors)
    pub fn div(&self, rhs: &Self) -> Self {
        Self { semantics: self.semantics, value: div_values(self.value, rhs.value, self.semantics) }
    }

    /// IEEE comparison, `None` when either side is NaN
    pub fn compare(&self, rhs: &Self) -> Option<Ordering> {
        let (a, b) = (self.value, rhs.value);
        if a.is_nan() || b.is_nan() {
            return None;
        }
        if a.category == Category::Zero && b.category == Category::Zero {
            return Some(Ordering::Equal);
        }
        Some(match (a.negative, b.negative) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (true, true) => a.cmp_magnitude(b).reverse(),
            (false, false) => a.cmp_magnitude(b),
        })
    }

    /// Object representation in `len` bytes (zero padded)
    pub fn to_bytes(&self, len: usize, order: ByteOrder) -> Vec<u8> {
        let encoded = encode(self.value, self.semantics).to_le_bytes();
        let mut bytes = encoded[..self.semantics.encoded_len()].to_vec();
        bytes.resize(len, 0);
        if order == ByteOrder::Big {
            bytes.reverse();
        }
        bytes
    }

    /// Decode an object representation
    pub fn from_bytes(bytes: &[u8], semantics: FloatSemantics, order: ByteOrder) -> Self {
        let mut le = bytes.to_vec();
        if order == ByteOrder::Big {
            le.reverse();
        }
        let mut raw = [0u8; 16];
        for (slot, byte) in raw.iter_mut().zip(le.iter().take(semantics.encoded_len())) {
            *slot = *byte;
        }
        Self { semantics, value: decode(u128::from_le_bytes(raw), semantics) }
    }
}

impl fmt::Display for ApFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.semantics {
            FloatSemantics::Single => write!(f, "{}", self.to_f64() as f32),
            FloatSemantics::Double => write!(f, "{}", self.to_f64()),
            FloatSemantics::X87DoubleExtended => match self.integral_value() {
                Some(integer) => write!(f, "{integer}"),
                None => write!(f, "{}", self.to_f64()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const X87: FloatSemantics = FloatSemantics::X87DoubleExtended;

    fn x87_bytes(value: &ApFloat) -> Vec<u8> {
        value.to_bytes(10, ByteOrder::Little)
    }

    #[test]
    fn test_single_rounding() {
        let v = ApFloat::new(FloatSemantics::Single, 0.1);
        assert_eq!(v.to_f64(), 0.1f32 as f64);
        assert_ne!(v.to_f64(), 0.1);
        assert_eq!(ApFloat::from_f32(0.1), v);
    }

    #[test]
    fn test_to_integer_boundaries() {
        assert_eq!(ApFloat::from_f64(127.0).to_integer(8, false).unwrap().to_i128(), 127);
        assert_eq!(ApFloat::from_f64(127.9).to_integer(8, false).unwrap().to_i128(), 127);
        assert_eq!(ApFloat::from_f64(-128.0).to_integer(8, false).unwrap().to_i128(), -128);
        assert!(ApFloat::from_f64(128.0).to_integer(8, false).is_none());
        assert!(ApFloat::from_f64(-129.0).to_integer(8, false).is_none());

        assert_eq!(ApFloat::from_f64(255.0).to_integer(8, true).unwrap().to_u128(), 255);
        assert!(ApFloat::from_f64(256.0).to_integer(8, true).is_none());
        assert_eq!(ApFloat::from_f64(-0.5).to_integer(8, true).unwrap().to_u128(), 0);
        assert!(ApFloat::from_f64(-1.0).to_integer(8, true).is_none());

        assert!(ApFloat::from_f64(f64::NAN).to_integer(32, false).is_none());
        assert!(ApFloat::from_f64(f64::INFINITY).to_integer(64, true).is_none());
    }

    #[test]
    fn test_from_integer() {
        let big = ApSInt::from_u128(64, u64::MAX as u128);
        assert_eq!(ApFloat::from_integer(&big, FloatSemantics::Double).to_f64(), 18446744073709551616.0);
        let minus = ApSInt::from_i128(32, -3);
        assert_eq!(ApFloat::from_integer(&minus, FloatSemantics::Single).to_f64(), -3.0);
        // 2^24 + 1 is a tie between 2^24 and 2^24 + 2; the even one wins
        let tie = ApSInt::from_i128(32, (1 << 24) + 1);
        assert_eq!(ApFloat::from_integer(&tie, FloatSemantics::Single).to_f64(), 16777216.0);
    }

    #[test]
    fn test_x87_holds_every_64_bit_integer() {
        for value in [(1i128 << 53) + 1, i64::MAX as i128, i64::MIN as i128, -((1i128 << 63) - 3)] {
            let float = ApFloat::from_integer(&ApSInt::from_i128(64, value), X87);
            assert_eq!(float.to_integer(64, false).unwrap().to_i128(), value, "{value}");
            assert_eq!(float.to_string(), value.to_string());
        }
        let max = ApFloat::from_integer(&ApSInt::from_u128(64, u64::MAX as u128), X87);
        assert_eq!(max.to_integer(64, true).unwrap().to_u128(), u64::MAX as u128);
        assert!(max.to_integer(64, false).is_none());

        // double rounds 2^53 + 1 away; x87 does not
        let odd = ApSInt::from_i128(64, (1 << 53) + 1);
        assert_eq!(ApFloat::from_integer(&odd, FloatSemantics::Double).to_f64(), 9007199254740992.0);
        assert_eq!(
            ApFloat::from_integer(&odd, X87).convert(FloatSemantics::Double).to_f64(),
            9007199254740992.0
        );
    }

    #[test]
    fn test_x87_range_boundaries() {
        let two_63 = ApFloat::from_integer(&ApSInt::from_u128(128, 1 << 63), X87);
        assert!(two_63.to_integer(64, false).is_none());
        assert_eq!(two_63.neg().to_integer(64, false).unwrap().to_i128(), i64::MIN as i128);
        assert_eq!(two_63.to_integer(64, true).unwrap().to_u128(), 1 << 63);

        let two_64 = ApFloat::from_integer(&ApSInt::from_u128(128, 1 << 64), X87);
        assert!(two_64.to_integer(64, true).is_none());
        assert_eq!(two_64.to_integer(128, true).unwrap().to_u128(), 1 << 64);

        // 2^64 + 1 needs 65 bits and rounds to 2^64
        let wide = ApFloat::from_integer(&ApSInt::from_u128(128, (1 << 64) + 1), X87);
        assert_eq!(wide, two_64);
    }

    #[test]
    fn test_x87_arithmetic_keeps_64_bits() {
        let int = |value: i128| ApFloat::from_integer(&ApSInt::from_i128(64, value), X87);

        let square = int((1 << 31) + 1).mul(&int((1 << 31) + 1));
        assert_eq!(square.to_integer(64, false).unwrap().to_i128(), 4_611_686_022_722_355_201);

        let sum = int((1 << 62) + 1).add(&int(2));
        assert_eq!(sum.to_integer(64, false).unwrap().to_i128(), (1 << 62) + 3);
        let difference = int(i64::MAX as i128).sub(&int(i64::MAX as i128 - 1));
        assert_eq!(difference.to_integer(64, false).unwrap().to_i128(), 1);

        let third = int(1).div(&int(3));
        assert_eq!(x87_bytes(&third), [0xab, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xfd, 0x3f]);
        assert_eq!(third.to_f64(), 1.0 / 3.0);
    }

    #[test]
    fn test_double_and_single_arithmetic() {
        let (a, b) = (ApFloat::from_f64(0.1), ApFloat::from_f64(0.2));
        assert_eq!(a.add(&b).to_f64(), 0.1 + 0.2);
        assert_eq!(a.sub(&b).to_f64(), 0.1 - 0.2);
        assert_eq!(a.mul(&b).to_f64(), 0.1 * 0.2);
        assert_eq!(a.div(&b).to_f64(), 0.1 / 0.2);
        assert_eq!(ApFloat::from_f64(1.0).div(&ApFloat::from_f64(3.0)).to_f64(), 1.0 / 3.0);

        let (x, y) = (ApFloat::from_f32(0.1), ApFloat::from_f32(0.7));
        assert_eq!(x.add(&y).to_f64(), (0.1f32 + 0.7f32) as f64);
        assert_eq!(x.div(&y).to_f64(), (0.1f32 / 0.7f32) as f64);

        let tiny = ApFloat::from_f64(f64::MIN_POSITIVE);
        assert_eq!(tiny.mul(&ApFloat::from_f64(0.25)).to_f64(), f64::MIN_POSITIVE * 0.25);
        let smallest = ApFloat::from_f64(f64::from_bits(1));
        assert_eq!(smallest.div(&ApFloat::from_f64(2.0)).to_f64(), 0.0);

        let max = ApFloat::from_f64(f64::MAX);
        assert_eq!(max.add(&max).to_f64(), f64::INFINITY);
        let wide = max.convert(X87).add(&max);
        assert!(wide.to_integer(128, false).is_none() && !wide.is_nan());
        assert_eq!(wide.to_f64(), f64::INFINITY);

        let inf = ApFloat::from_f64(f64::INFINITY);
        assert!(inf.sub(&inf).is_nan());
        assert!(ApFloat::from_f64(0.0).div(&ApFloat::from_f64(0.0)).is_nan());
        assert_eq!(ApFloat::from_f64(-1.0).div(&ApFloat::from_f64(0.0)).to_f64(), f64::NEG_INFINITY);
        assert!(a.sub(&a).is_zero());
    }

    #[test]
    fn test_compare() {
        let value = |v: f64| ApFloat::from_f64(v);
        assert_eq!(value(0.0).compare(&value(-0.0)), Some(Ordering::Equal));
        assert_eq!(value(-2.0).compare(&value(-1.0)), Some(Ordering::Less));
        assert_eq!(value(3.0).compare(&value(-4.0)), Some(Ordering::Greater));
        assert_eq!(value(1.5).compare(&value(1.25)), Some(Ordering::Greater));
        assert_eq!(value(f64::INFINITY).compare(&value(f64::MAX)), Some(Ordering::Greater));
        assert_eq!(value(f64::NAN).compare(&value(1.0)), None);

        let odd = ApFloat::from_integer(&ApSInt::from_i128(64, (1 << 53) + 1), X87);
        assert_eq!(odd.compare(&value(9007199254740992.0)), Some(Ordering::Greater));
    }

    #[test]
    fn test_x87_encoding() {
        for value in [1.0, -2.5, 1e300, -1e-300, f64::MIN_POSITIVE / 8.0, 0.0, f64::INFINITY] {
            let encoded = x87_bytes(&ApFloat::new(X87, value));
            assert_eq!(ApFloat::from_bytes(&encoded, X87, ByteOrder::Little).to_f64(), value, "{value}");
        }
        // 1.0 = explicit integer bit set, biased exponent 16383
        assert_eq!(x87_bytes(&ApFloat::new(X87, 1.0)), [0, 0, 0, 0, 0, 0, 0, 0x80, 0xff, 0x3f]);
        assert!(ApFloat::new(X87, f64::NAN).is_nan());

        // every 80-bit pattern below survives decode and encode unchanged
        let patterns: [[u8; 10]; 4] = [
            [0x01, 0, 0, 0, 0, 0, 0, 0x80, 0xff, 0x3f],
            [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe, 0xff],
            [0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 0, 0, 0x80, 0xff, 0xff],
        ];
        for pattern in patterns {
            let value = ApFloat::from_bytes(&pattern, X87, ByteOrder::Little);
            assert_eq!(x87_bytes(&value), pattern);
        }
    }

    #[test]
    fn test_bytes_round_trip() {
        let v = ApFloat::from_f64(3.25);
        let bytes = v.to_bytes(8, ByteOrder::Big);
        assert_eq!(ApFloat::from_bytes(&bytes, FloatSemantics::Double, ByteOrder::Big), v);

        let ld = ApFloat::new(X87, -7.5);
        let bytes = ld.to_bytes(16, ByteOrder::Little);
        assert_eq!(bytes.len(), 16);
        assert_eq!(ApFloat::from_bytes(&bytes, X87, ByteOrder::Little), ld);

        let subnormal = ApFloat::from_f32(f32::from_bits(3));
        let bytes = subnormal.to_bytes(4, ByteOrder::Little);
        assert_eq!(bytes, [3, 0, 0, 0]);
        assert_eq!(ApFloat::from_bytes(&bytes, FloatSemantics::Single, ByteOrder::Little), subnormal);
    }
}
