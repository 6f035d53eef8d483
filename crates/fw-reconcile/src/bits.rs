//! 32-bit fault mask codec.
//!
//! Status fields arrive from the time-series store as floats. A field is
//! only meaningful as an unsigned 32-bit mask, so narrowing happens once, at
//! the boundary, in [`Bitmask::from_sample`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of one fault condition inside a 32-bit status field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BitPosition(u8);

impl BitPosition {
    pub const MAX: u8 = 31;

    /// `None` when `pos` does not fit a 32-bit field.
    pub fn new(pos: u32) -> Option<Self> {
        if pos <= Self::MAX as u32 {
            Some(Self(pos as u8))
        } else {
            None
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn mask(self) -> u32 {
        1u32 << self.0
    }
}

impl TryFrom<u32> for BitPosition {
    type Error = String;

    fn try_from(v: u32) -> Result<Self, Self::Error> {
        BitPosition::new(v).ok_or_else(|| format!("bit position {v} out of range 0..=31"))
    }
}

impl TryFrom<i64> for BitPosition {
    type Error = String;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        u32::try_from(v)
            .ok()
            .and_then(BitPosition::new)
            .ok_or_else(|| format!("bit position {v} out of range 0..=31"))
    }
}

impl From<BitPosition> for u32 {
    fn from(b: BitPosition) -> u32 {
        b.0 as u32
    }
}

impl fmt::Display for BitPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of a status field as a 32-bit mask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Bitmask(u32);

impl Bitmask {
    pub const EMPTY: Bitmask = Bitmask(0);

    pub fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    /// Narrow a sampled float to a mask, truncating toward zero.
    ///
    /// Returns `None` for NaN, infinities, negative values and anything
    /// above `u32::MAX` once truncated: those cannot come from a 32-bit
    /// status word.
    pub fn from_sample(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let t = value.trunc();
        if t < 0.0 || t > u32::MAX as f64 {
            return None;
        }
        Some(Self(t as u32))
    }

    pub fn is_set(self, bit: BitPosition) -> bool {
        self.0 & bit.mask() != 0
    }

    pub fn active_bits(self) -> Vec<BitPosition> {
        decode_active_bits(self.0)
    }
}

/// Ascending positions of the bits set in `value`.
pub fn decode_active_bits(value: u32) -> Vec<BitPosition> {
    (0..=BitPosition::MAX)
        .filter(|i| (value >> i) & 1 == 1)
        .map(BitPosition)
        .collect()
}
