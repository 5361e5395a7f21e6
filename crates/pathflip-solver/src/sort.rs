//! Fixed-width integer sorts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A fixed-width machine integer type, e.g. `int` = 32 bits signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntType {
    pub bits: u8,
    pub signed: bool,
}

impl IntType {
    pub const INT: IntType = IntType { bits: 32, signed: true };
    pub const UINT: IntType = IntType { bits: 32, signed: false };
    pub const CHAR: IntType = IntType { bits: 8, signed: true };
    pub const LONG: IntType = IntType { bits: 64, signed: true };
    pub const BOOL: IntType = IntType { bits: 1, signed: false };

    pub fn new(bits: u8, signed: bool) -> Self {
        Self { bits, signed }
    }

    /// Width clamped to the supported range `1..=64`.
    fn width(&self) -> u32 {
        u32::from(self.bits.clamp(1, 64))
    }

    fn modulus(&self) -> i128 {
        1i128 << self.width()
    }

    /// Smallest representable value.
    pub fn min_value(&self) -> i128 {
        if self.signed {
            -(self.modulus() / 2)
        } else {
            0
        }
    }

    /// Largest representable value.
    pub fn max_value(&self) -> i128 {
        if self.signed {
            self.modulus() / 2 - 1
        } else {
            self.modulus() - 1
        }
    }

    pub fn contains(&self, value: i128) -> bool {
        value >= self.min_value() && value <= self.max_value()
    }

    /// Wrap an arbitrary integer into this type's range (two's complement).
    pub fn wrap(&self, value: i128) -> i128 {
        let m = self.modulus();
        let v = value.rem_euclid(m);
        if self.signed && v >= m / 2 {
            v - m
        } else {
            v
        }
    }

    /// Bit-vector encoding of a value, as a solver reports it in a model.
    pub fn encode(&self, value: i128) -> u128 {
        self.wrap(value).rem_euclid(self.modulus()) as u128
    }

    /// Interpret a bit-vector encoding in this type's range.
    pub fn decode(&self, raw: u128) -> i128 {
        let masked = raw & (self.modulus() as u128 - 1);
        self.wrap(masked as i128)
    }
}

impl Default for IntType {
    fn default() -> Self {
        IntType::INT
    }
}

impl fmt::Display for IntType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", if self.signed { "i" } else { "u" }, self.bits)
    }
}
