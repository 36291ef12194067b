//! RGBA color types and the fixed-point channel multiplies shared by the
//! blend kernels. All arithmetic is exact integer math; the `>> 8` forms are
//! chosen so that multiplying by a 255 alpha is idempotent.

/// 8-bit-per-channel RGBA color. Straight or premultiplied depending on
/// context; callers must not mix the two within one blend operation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// 16-bit-per-channel RGBA color, used as the working precision for dab
/// accumulation and as the value type read from a [`crate::blend::BlendSource`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Rgba16 {
    pub r: u16,
    pub g: u16,
    pub b: u16,
    pub a: u16,
}

pub const BLACK: Rgba8 = Rgba8 { r: 0, g: 0, b: 0, a: 255 };
pub const WHITE: Rgba8 = Rgba8 { r: 255, g: 255, b: 255, a: 255 };
pub const GREY: Rgba8 = Rgba8 { r: 128, g: 128, b: 128, a: 255 };
pub const TRANSPARENT: Rgba8 = Rgba8 { r: 0, g: 0, b: 0, a: 0 };

impl Rgba8 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Convert straight-alpha color to premultiplied, per channel
    /// `c' = ((a+1)*c) >> 8`.
    pub fn premultiply(self) -> Self {
        Self {
            r: mul8(self.a, self.r),
            g: mul8(self.a, self.g),
            b: mul8(self.a, self.b),
            a: self.a,
        }
    }

    /// Widen each channel to 16 bits by shifting into the high byte.
    pub fn widen(self) -> Rgba16 {
        Rgba16 {
            r: (self.r as u16) << 8,
            g: (self.g as u16) << 8,
            b: (self.b as u16) << 8,
            a: (self.a as u16) << 8,
        }
    }
}

impl Rgba16 {
    pub const fn new(r: u16, g: u16, b: u16, a: u16) -> Self {
        Self { r, g, b, a }
    }
}

/// `((a+1)*b) >> 8` for a, b in [0,255]. Idempotent when a == 255.
#[inline]
pub(crate) fn mul8(a: u8, b: u8) -> u8 {
    (((a as u32 + 1) * b as u32) >> 8) as u8
}

/// `(a*b) >> 8` for a in [0,256] (already biased) and b in [0,255].
#[inline]
pub(crate) fn mul8_a1(a: u32, b: u8) -> u8 {
    ((a * b as u32) >> 8) as u8
}

/// `(a*b) >> 16` for a in [0,65536] (already biased) and b in [0,65535].
#[inline]
pub(crate) fn mul16_a1(a: u32, b: u16) -> u16 {
    ((a * b as u32) >> 16) as u16
}
