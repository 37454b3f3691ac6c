//! A fixed-length bit vector used for every register value and scan payload
//! in this crate.

use std::fmt;

use bitvec::prelude::*;

use crate::error::{Result, ScanModelError};

/// An immutable, fixed-length sequence of bits, most-significant bit first.
///
/// Every register, key code and scan payload in this crate is carried as a
/// `BitVector` rather than a raw integer, so that length mismatches (the
/// most common wiring mistake when two registers disagree on width) are
/// caught at the API boundary instead of silently truncating a value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BitVector {
    bits: BitVec<u8, Msb0>,
}

impl BitVector {
    /// Builds a `len`-bit vector of all zeros.
    pub fn zeros(len: usize) -> Self {
        BitVector {
            bits: BitVec::repeat(false, len),
        }
    }

    /// Builds a `len`-bit vector from the low `len` bits of `value`.
    pub fn from_u64(value: u64, len: usize) -> Self {
        let mut bits = BitVec::repeat(false, len);
        for i in 0..len.min(64) {
            let bit = (value >> i) & 1 == 1;
            bits.set(len - 1 - i, bit);
        }
        BitVector { bits }
    }

    /// Parses a hex string (optionally prefixed with `0x`) into a `len`-bit
    /// vector, left-padding with zeros.
    ///
    /// This is the wire representation a [`crate::driver::JtagController`]
    /// trades in for `scan_ir`/`scan_dr`.
    pub fn from_hex(hex: &str, len: usize) -> Result<Self> {
        let trimmed = hex.strip_prefix("0x").unwrap_or(hex);
        let value = u128::from_str_radix(trimmed, 16)
            .map_err(|e| ScanModelError::Other(anyhow::anyhow!("invalid hex '{hex}': {e}")))?;
        Self::from_u128(value, len)
    }

    /// Parses a string of `0`/`1` characters into a bit vector; the string's
    /// length becomes the vector's length.
    pub fn from_bin(bin: &str) -> Result<Self> {
        let mut bits = BitVec::<u8, Msb0>::with_capacity(bin.len());
        for c in bin.chars() {
            match c {
                '0' => bits.push(false),
                '1' => bits.push(true),
                other => {
                    return Err(ScanModelError::Other(anyhow::anyhow!(
                        "invalid binary digit '{other}' in '{bin}'"
                    )))
                }
            }
        }
        Ok(BitVector { bits })
    }

    fn from_u128(value: u128, len: usize) -> Result<Self> {
        if len > 128 {
            return Err(ScanModelError::Other(anyhow::anyhow!(
                "from_u128 supports at most 128 bits, got {len}"
            )));
        }
        let mut bits = BitVec::repeat(false, len);
        for i in 0..len {
            let bit = (value >> i) & 1 == 1;
            bits.set(len - 1 - i, bit);
        }
        Ok(BitVector { bits })
    }

    /// Number of bits this vector declares. Two vectors with different
    /// lengths are never equal even if their numeric value coincides.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// True when this vector declares zero bits.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Renders this vector as a `0x`-prefixed hex string, the format used on
    /// the `scan_ir`/`scan_dr` driver boundary.
    pub fn to_hex(&self) -> String {
        let nibbles = self.len().div_ceil(4);
        let value = self.to_u128_lossy();
        format!("0x{value:0width$x}", width = nibbles)
    }

    /// Renders this vector as a string of `0`/`1` characters, MSB first.
    pub fn to_bin(&self) -> String {
        self.bits.iter().map(|b| if *b { '1' } else { '0' }).collect()
    }

    /// Concatenates `parts` in order, most-significant part first, into a
    /// single vector whose length is the sum of the parts' lengths.
    pub fn concat(parts: &[BitVector]) -> Self {
        let mut bits = BitVec::<u8, Msb0>::with_capacity(parts.iter().map(|p| p.len()).sum());
        for part in parts {
            bits.extend_from_bitslice(&part.bits);
        }
        BitVector { bits }
    }

    /// Returns the `len`-bit slice starting at bit `start` (0 is the
    /// most-significant bit), preserving bit order.
    pub fn slice(&self, start: usize, len: usize) -> Result<Self> {
        if start + len > self.len() {
            return Err(ScanModelError::Other(anyhow::anyhow!(
                "slice [{start}, {end}) out of range for {actual}-bit vector",
                end = start + len,
                actual = self.len()
            )));
        }
        Ok(BitVector {
            bits: self.bits[start..start + len].to_bitvec(),
        })
    }

    /// Lossily reinterprets this vector as an unsigned integer, truncating
    /// anything past the low 128 bits. Used as a selector-map lookup key,
    /// where scan codes are always small.
    pub fn to_u128_lossy(&self) -> u128 {
        let mut value: u128 = 0;
        for bit in self.bits.iter().take(128) {
            value = (value << 1) | (*bit as u128);
        }
        value
    }

    /// Same as [`Self::to_u128_lossy`] but truncated to `u64`, convenient for
    /// driver adapters that only need small values.
    pub fn to_u64_lossy(&self) -> u64 {
        self.to_u128_lossy() as u64
    }
}

impl fmt::Debug for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitVector({}, {} bits)", self.to_hex(), self.len())
    }
}

impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn zeros_has_requested_length() {
        let v = BitVector::zeros(12);
        assert_eq!(v.len(), 12);
        assert_eq!(v.to_bin(), "000000000000");
    }

    #[test]
    fn from_u64_round_trips_through_hex() {
        let v = BitVector::from_u64(0xAB, 8);
        assert_eq!(v.to_hex(), "0xab");
        assert_eq!(v.to_bin(), "10101011");
    }

    #[test]
    fn from_hex_pads_to_declared_length() {
        let v = BitVector::from_hex("0x5", 8).unwrap();
        assert_eq!(v.to_bin(), "00000101");
    }

    #[test]
    fn concat_preserves_order_and_length() {
        let a = BitVector::from_u64(0b10, 2);
        let b = BitVector::from_u64(0b011, 3);
        let c = BitVector::concat(&[a, b]);
        assert_eq!(c.len(), 5);
        assert_eq!(c.to_bin(), "10011");
    }

    #[test]
    fn slice_extracts_subrange() {
        let v = BitVector::from_bin("11001010").unwrap();
        let s = v.slice(2, 4).unwrap();
        assert_eq!(s.to_bin(), "0010");
    }

    #[test]
    fn slice_out_of_range_errors() {
        let v = BitVector::zeros(4);
        assert!(v.slice(2, 4).is_err());
    }

    #[test]
    fn equal_value_different_length_is_not_equal() {
        let a = BitVector::from_u64(0, 4);
        let b = BitVector::from_u64(0, 8);
        assert_ne!(a, b);
    }
}
