//! Q23.8 fixed-point document coordinates.
//!
//! The painter does all coordinate math in 8-fractional-bit integers so that
//! dab spacing rounds deterministically; floating point only appears where a
//! real square root is needed. Floor and ceil are mask operations.

use std::ops::{Add, Neg, Sub};

pub const Q8_BITS: i32 = 8;
pub const Q8_ONE: i32 = 1 << Q8_BITS;
pub const Q8_HALF: i32 = Q8_ONE >> 1;
pub const Q8_MASK: i32 = Q8_ONE - 1;

/// A signed Q23.8 fixed-point value (256 units per pixel).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct Q8(pub i32);

impl Q8 {
    pub const ZERO: Q8 = Q8(0);
    pub const ONE: Q8 = Q8(Q8_ONE);

    /// Quantize a float document coordinate (truncating toward zero).
    pub fn from_f32(v: f32) -> Self {
        Q8((v * Q8_ONE as f32) as i32)
    }

    /// Whole pixels to Q8.
    pub const fn from_px(px: i32) -> Self {
        Q8(px << Q8_BITS)
    }

    pub fn to_f32(self) -> f32 {
        self.0 as f32 * (1.0 / Q8_ONE as f32)
    }

    /// Round down to a whole-pixel boundary, staying in Q8.
    pub const fn floor(self) -> Self {
        Q8(self.0 & !Q8_MASK)
    }

    /// Round up to a whole-pixel boundary, staying in Q8.
    pub const fn ceil(self) -> Self {
        Q8((self.0 | Q8_MASK) + 1)
    }

    /// Round down to integer pixels.
    pub const fn ifloor(self) -> i32 {
        self.0 >> Q8_BITS
    }

    /// Round up to integer pixels.
    pub const fn iceil(self) -> i32 {
        (self.0 + Q8_MASK) >> Q8_BITS
    }
}

impl Add for Q8 {
    type Output = Q8;
    fn add(self, rhs: Q8) -> Q8 {
        Q8(self.0 + rhs.0)
    }
}

impl Sub for Q8 {
    type Output = Q8;
    fn sub(self, rhs: Q8) -> Q8 {
        Q8(self.0 - rhs.0)
    }
}

impl Neg for Q8 {
    type Output = Q8;
    fn neg(self) -> Q8 {
        Q8(-self.0)
    }
}
