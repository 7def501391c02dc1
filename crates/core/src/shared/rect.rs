use serde::{Deserialize, Serialize};

/// Axis-aligned face rectangle in frame pixel coordinates.
///
/// Edges follow the half-open convention: `right` and `bottom` are one
/// past the last covered pixel, so `width = right - left`.
/// Serializes as `[left, top, right, bottom]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Area in pixels; widened so large frames cannot overflow.
    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    /// Overlapping rectangle, or `None` when the two do not overlap.
    ///
    /// Touching edges do not count as overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let inter = Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        (inter.width() > 0 && inter.height() > 0).then_some(inter)
    }

    /// Clips the rectangle to a `width x height` frame.
    pub fn clamp_to(&self, width: u32, height: u32) -> Rect {
        let (w, h) = (width as i32, height as i32);
        Rect::new(
            self.left.clamp(0, w),
            self.top.clamp(0, h),
            self.right.clamp(0, w),
            self.bottom.clamp(0, h),
        )
    }
}

impl From<[i32; 4]> for Rect {
    fn from([left, top, right, bottom]: [i32; 4]) -> Self {
        Rect::new(left, top, right, bottom)
    }
}

impl From<Rect> for [i32; 4] {
    fn from(r: Rect) -> Self {
        [r.left, r.top, r.right, r.bottom]
    }
}
