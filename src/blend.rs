//! Fixed-point premultiplied-alpha blend primitives.
//!
//! Two families of operations live here:
//!
//! - kernels that pull 16-bit pixels from an abstract [`BlendSource`] and
//!   combine them into an 8-bit destination span (used when flushing the
//!   painter's high-precision accumulation buffer into document tiles), and
//! - direct span operations ([`SpanOp`]) between two 8-bit RGBA spans.
//!
//! All math is exact integer fixed-point; the inner loops never allocate and
//! never touch floating point. Both sides of a "normal" blend are assumed
//! premultiplied unless the operation says otherwise.

use crate::color::{Rgba8, Rgba16, mul8_a1, mul16_a1};

/// Blend modes accepted by [`crate::surface::Surface::blend_source`] and by
/// the tile grid's blend-image path.
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    /// Write source over destination, discarding destination content.
    Copy,
    /// Premultiplied over: `dst' = src + dst*(1 - src.a)`.
    Normal,
    /// Saturating add.
    Add,
    /// Clamping subtract.
    Subtract,
}

/// An abstract per-scanline pixel source delivering 16-bit RGBA.
///
/// `begin` positions the source on a sub-rect (x, y are non-negative and the
/// rect is within the source bounds after the caller's clipping); `next_row`
/// advances one scanline; `read1` returns the next pixel in the current row.
pub trait BlendSource {
    fn begin(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn next_row(&mut self);
    fn read1(&mut self) -> Rgba16;
    fn width(&self) -> i32;
    fn height(&self) -> i32;
}

// Pre-multiplied 16-bit channel A (with 16-bit alpha a) over 8-bit channel B.
// bits: tr8(A:16 + tr8((1-a):16 * B:8):16):8
#[inline]
fn over_16p8(a_ch: u16, b_ch: u8, alpha: u16) -> u8 {
    let om = 65536u32 - alpha as u32;
    ((a_ch as u32 + ((om * b_ch as u32) >> 8)) >> 8) as u8
}

#[inline]
fn add_16p8(b_ch: u8, a_ch: u16) -> u8 {
    let t = b_ch as u32 + (a_ch >> 8) as u32;
    if t <= 255 { t as u8 } else { 255 }
}

#[inline]
fn sub_16p8(b_ch: u8, a_ch: u16) -> u8 {
    let t = b_ch as i32 - (a_ch >> 8) as i32;
    if t >= 0 { t as u8 } else { 0 }
}

/// Blend one span of RGBA8 pixels from a 16-bit source.
///
/// `dst` holds `len * 4` bytes; the source must already be positioned on the
/// matching scanline.
pub fn blend_span_rgba8(mode: BlendMode, dst: &mut [u8], len: usize, src: &mut dyn BlendSource) {
    debug_assert!(dst.len() >= len * 4);
    for px in dst[..len * 4].chunks_exact_mut(4) {
        let c = src.read1();
        match mode {
            BlendMode::Copy => {
                px[0] = (c.r >> 8) as u8;
                px[1] = (c.g >> 8) as u8;
                px[2] = (c.b >> 8) as u8;
                px[3] = (c.a >> 8) as u8;
            }
            BlendMode::Normal => {
                px[0] = over_16p8(c.r, px[0], c.a);
                px[1] = over_16p8(c.g, px[1], c.a);
                px[2] = over_16p8(c.b, px[2], c.a);
                px[3] = over_16p8(c.a, px[3], c.a);
            }
            BlendMode::Add => {
                px[0] = add_16p8(px[0], c.r);
                px[1] = add_16p8(px[1], c.g);
                px[2] = add_16p8(px[2], c.b);
                px[3] = add_16p8(px[3], c.a);
            }
            BlendMode::Subtract => {
                px[0] = sub_16p8(px[0], c.r);
                px[1] = sub_16p8(px[1], c.g);
                px[2] = sub_16p8(px[2], c.b);
                px[3] = sub_16p8(px[3], c.a);
            }
        }
    }
}

/// Direct span-to-span operations on RGBA8 pixel runs.
///
/// `Copy`, `Add` and `OverPre` ignore the blend alpha; the `*Alpha` variants
/// modulate by it. `Over` takes a straight-alpha source; everything else
/// assumes premultiplied pixels on both sides.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SpanOp {
    Copy,
    Add,
    AddAlpha,
    Over,
    OverPre,
    OverPreAlpha,
}

impl SpanOp {
    /// Apply this operation over one span. Both slices hold `len * 4` bytes.
    pub fn apply(self, dst: &mut [u8], src: &[u8], len: usize, alpha: u8) {
        let n = len * 4;
        debug_assert!(dst.len() >= n && src.len() >= n);
        let dst = &mut dst[..n];
        let src = &src[..n];
        match self {
            SpanOp::Copy => dst.copy_from_slice(src),
            SpanOp::Add => {
                for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                    for i in 0..4 {
                        let t = d[i] as u32 + s[i] as u32;
                        d[i] = if t <= 255 { t as u8 } else { 255 };
                    }
                }
            }
            SpanOp::AddAlpha => {
                for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                    for i in 0..4 {
                        let t = d[i] as u32 + ((s[i] as u32 * alpha as u32) >> 8);
                        d[i] = if t <= 255 { t as u8 } else { 255 };
                    }
                }
            }
            SpanOp::Over => {
                // Straight-alpha source: premultiply on the fly with the
                // biased multiply so alpha 0 and 255 are exact.
                for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                    let a1 = s[3] as u32 + 1;
                    let om = 256 - s[3] as u32;
                    for i in 0..3 {
                        d[i] = mul8_a1(a1, s[i]).wrapping_add(mul8_a1(om, d[i]));
                    }
                    d[3] = s[3].wrapping_add(mul8_a1(om, d[3]));
                }
            }
            SpanOp::OverPre => {
                for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                    let om = 256 - s[3] as u32;
                    for i in 0..4 {
                        d[i] = s[i].wrapping_add(mul8_a1(om, d[i]));
                    }
                }
            }
            SpanOp::OverPreAlpha => {
                // Source is premultiplied: scale source pixels by the blend
                // alpha alone, destination by one minus blend alpha times
                // source alpha.
                let a1 = alpha as u32 + 1; // map 0..255 -> 1..256
                for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                    let ia = 256 - mul8_a1(a1, s[3]) as u32;
                    for i in 0..4 {
                        d[i] = mul8_a1(a1, s[i]).wrapping_add(mul8_a1(ia, d[i]));
                    }
                }
            }
        }
    }
}

// Solid-color span fills.

/// Fill a span of RGBA8 pixels with a color (copy).
pub fn span_col_copy_rgba8(dst: &mut [u8], len: usize, col: Rgba8) {
    for px in dst[..len * 4].chunks_exact_mut(4) {
        px[0] = col.r;
        px[1] = col.g;
        px[2] = col.b;
        px[3] = col.a;
    }
}

/// Blend a straight-alpha color over a span of premultiplied RGBA8 pixels.
pub fn span_col_over_rgba8(dst: &mut [u8], len: usize, col: Rgba8) {
    let col = col.premultiply();
    let om = 256 - col.a as u32;
    for px in dst[..len * 4].chunks_exact_mut(4) {
        px[0] = col.r.wrapping_add(mul8_a1(om, px[0]));
        px[1] = col.g.wrapping_add(mul8_a1(om, px[1]));
        px[2] = col.b.wrapping_add(mul8_a1(om, px[2]));
        px[3] = col.a.wrapping_add(mul8_a1(om, px[3]));
    }
}

/// Fill a span of RGBA16 pixels with a color (copy).
pub fn span_col_copy_rgba16(dst: &mut [u8], len: usize, col: Rgba16) {
    for px in dst[..len * 8].chunks_exact_mut(8) {
        write_px16(px, col);
    }
}

/// Blend a premultiplied color over a span of premultiplied RGBA16 pixels.
pub fn span_col_over_rgba16(dst: &mut [u8], len: usize, col: Rgba16) {
    let om = 65536u32 - col.a as u32;
    for px in dst[..len * 8].chunks_exact_mut(8) {
        let d = read_px16(px);
        write_px16(
            px,
            Rgba16 {
                r: col.r.wrapping_add(mul16_a1(om, d.r)),
                g: col.g.wrapping_add(mul16_a1(om, d.g)),
                b: col.b.wrapping_add(mul16_a1(om, d.b)),
                a: col.a.wrapping_add(mul16_a1(om, d.a)),
            },
        );
    }
}

#[inline]
pub(crate) fn read_px16(px: &[u8]) -> Rgba16 {
    Rgba16 {
        r: u16::from_ne_bytes([px[0], px[1]]),
        g: u16::from_ne_bytes([px[2], px[3]]),
        b: u16::from_ne_bytes([px[4], px[5]]),
        a: u16::from_ne_bytes([px[6], px[7]]),
    }
}

#[inline]
pub(crate) fn write_px16(px: &mut [u8], c: Rgba16) {
    px[0..2].copy_from_slice(&c.r.to_ne_bytes());
    px[2..4].copy_from_slice(&c.g.to_ne_bytes());
    px[4..6].copy_from_slice(&c.b.to_ne_bytes());
    px[6..8].copy_from_slice(&c.a.to_ne_bytes());
}

#[inline]
pub(crate) fn premul_working_color(col: Rgba8, alpha: i32) -> Rgba16 {
    // Straight color in [0,255] times (alpha+1) gives premultiplied 16-bit
    // working color; the alpha channel lands in [0,65280].
    let a1 = (alpha + 1) as u32;
    Rgba16 {
        r: (col.r as u32 * a1) as u16,
        g: (col.g as u32 * a1) as u16,
        b: (col.b as u32 * a1) as u16,
        a: (255 * a1) as u16,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstSource(Rgba16);

    impl BlendSource for ConstSource {
        fn begin(&mut self, _x: i32, _y: i32, _w: i32, _h: i32) {}
        fn next_row(&mut self) {}
        fn read1(&mut self) -> Rgba16 {
            self.0
        }
        fn width(&self) -> i32 {
            i32::MAX
        }
        fn height(&self) -> i32 {
            i32::MAX
        }
    }

    fn one_px(dst: [u8; 4], mode: BlendMode, src: Rgba16) -> [u8; 4] {
        let mut d = dst;
        blend_span_rgba8(mode, &mut d, 1, &mut ConstSource(src));
        d
    }

    #[test]
    fn normal_with_opaque_source_replaces_dst() {
        // src.a = 255 << 8 is the idempotent boundary: result is exactly the
        // truncated source, with no rounding drift from the destination.
        let src = Rgba8::new(200, 100, 50, 255).widen();
        for dst in [[0, 0, 0, 0], [255, 255, 255, 255], [1, 2, 3, 4]] {
            assert_eq!(one_px(dst, BlendMode::Normal, src), [200, 100, 50, 255]);
        }
    }

    #[test]
    fn normal_with_transparent_source_keeps_dst() {
        let src = Rgba16::default();
        let dst = [10, 20, 30, 40];
        assert_eq!(one_px(dst, BlendMode::Normal, src), dst);
    }

    #[test]
    fn normal_matches_reference_formula() {
        // Independent recomputation of the documented fixed-point over.
        let src = Rgba16::new(30000, 200, 12345, 40000);
        let dst = [17u8, 170, 250, 128];
        let got = one_px(dst, BlendMode::Normal, src);
        let s = [src.r, src.g, src.b, src.a];
        for i in 0..4 {
            let om = 65536u64 - src.a as u64;
            let want = ((s[i] as u64 + ((om * dst[i] as u64) >> 8)) >> 8) as u8;
            assert_eq!(got[i], want);
        }
    }

    #[test]
    fn add_saturates_at_channel_max() {
        let src = Rgba16::new(65280, 256, 0, 65280);
        let got = one_px([200, 1, 5, 250], BlendMode::Add, src);
        assert_eq!(got, [255, 2, 5, 255]);
    }

    #[test]
    fn subtract_clamps_at_zero() {
        let src = Rgba16::new(65280, 256, 0, 512);
        let got = one_px([200, 0, 5, 1], BlendMode::Subtract, src);
        assert_eq!(got, [0, 0, 5, 0]);
    }

    #[test]
    fn copy_truncates_high_bytes() {
        let src = Rgba16::new(65280, 511, 256, 255);
        let got = one_px([9, 9, 9, 9], BlendMode::Copy, src);
        assert_eq!(got, [255, 1, 1, 0]);
    }

    #[test]
    fn span_over_pre_opaque_source_wins() {
        let mut dst = [7u8, 7, 7, 7];
        let src = [100u8, 150, 200, 255];
        SpanOp::OverPre.apply(&mut dst, &src, 1, 255);
        assert_eq!(dst, src);
    }

    #[test]
    fn span_over_pre_transparent_source_is_noop() {
        let mut dst = [7u8, 8, 9, 10];
        SpanOp::OverPre.apply(&mut dst, &[0, 0, 0, 0], 1, 255);
        assert_eq!(dst, [7, 8, 9, 10]);
    }

    #[test]
    fn span_add_alpha_modulates_source() {
        let mut dst = [0u8, 0, 0, 0];
        // alpha 127 -> (200*127)>>8 = 99.
        SpanOp::AddAlpha.apply(&mut dst, &[200, 200, 200, 200], 1, 127);
        assert_eq!(dst, [99, 99, 99, 99]);
    }

    #[test]
    fn span_over_pre_alpha_full_alpha_equals_over_pre() {
        let src = [60u8, 70, 80, 90];
        let mut a = [10u8, 20, 30, 40];
        let mut b = a;
        SpanOp::OverPre.apply(&mut a, &src, 1, 255);
        SpanOp::OverPreAlpha.apply(&mut b, &src, 1, 255);
        // The two formulas differ by at most one rounding step per channel.
        for i in 0..4 {
            assert!((a[i] as i32 - b[i] as i32).abs() <= 1);
        }
    }

    #[test]
    fn col_over_rgba16_accumulates_toward_opaque() {
        let col = premul_working_color(Rgba8::new(255, 0, 0, 255), 128);
        let mut px = [0u8; 8];
        span_col_over_rgba16(&mut px, 1, col);
        let first = read_px16(&px);
        span_col_over_rgba16(&mut px, 1, col);
        let second = read_px16(&px);
        assert!(second.a > first.a);
        assert!(second.r > first.r);
        assert!(second.a <= 65535);
    }

    #[test]
    fn working_color_full_alpha_is_full_scale() {
        let c = premul_working_color(Rgba8::new(255, 128, 0, 255), 255);
        assert_eq!((c.r, c.g, c.b, c.a), (65280, 32768, 0, 65280));
    }
}
