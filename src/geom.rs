//! Integer points and rects shared by the surface, tile grid and painter.

/// An integer point or size pair.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct IPair {
    pub x: i32,
    pub y: i32,
}

impl IPair {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A half-open integer rect: `[left,right) x [top,bottom)`.
///
/// The painter's dirty-rect accumulator uses the inverted sentinel
/// (`left = top = i32::MAX`, `right = bottom = 0`) to mean "empty".
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct IRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl IRect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    /// The inverted accumulator sentinel.
    pub const fn inverted() -> Self {
        Self { left: i32::MAX, top: i32::MAX, right: 0, bottom: 0 }
    }

    pub const fn width(&self) -> i32 {
        self.right - self.left
    }

    pub const fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub const fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// Grow to include another rect's extent.
    pub fn include(&mut self, left: i32, top: i32, right: i32, bottom: i32) {
        if left < self.left {
            self.left = left;
        }
        if top < self.top {
            self.top = top;
        }
        if right > self.right {
            self.right = right;
        }
        if bottom > self.bottom {
            self.bottom = bottom;
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }
}

impl Default for IRect {
    fn default() -> Self {
        Self::new(0, 0, 0, 0)
    }
}
