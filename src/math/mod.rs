use binrw::binrw;
use cgmath::Vector2;
use serde::{Deserialize, Serialize};

/// Little-endian `[f32; 2]` on disk, `cgmath::Vector2` in memory.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
#[brw(little)]
pub struct LwVector2(
    #[br(map = |raw: [f32; 2]| Vector2::new(raw[0], raw[1]))]
    #[bw(map = |v: &Vector2<f32>| [v.x, v.y])]
    pub Vector2<f32>,
);

impl Default for LwVector2 {
    fn default() -> Self {
        Self(Vector2::new(0.0, 0.0))
    }
}

/// Integer rectangle in grid coordinates.
///
/// Half-open: covers `x..x + width` and `y..y + height`. An edit region,
/// an undo area and a GPU sub-image are all expressed with this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanning `[x0, x1) × [y0, y1)`.
    pub fn from_bounds(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self::new(x0, y0, (x1 - x0).max(0), (y1 - y0).max(0))
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Number of cells covered.
    pub fn area(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.width as usize * self.height as usize
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn expanded(&self, amount: i32) -> Self {
        Self::new(
            self.x - amount,
            self.y - amount,
            self.width + amount * 2,
            self.height + amount * 2,
        )
    }

    pub fn intersect(&self, other: &Rect) -> Self {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        Self::from_bounds(x0, y0, x1, y1)
    }

    pub fn union(&self, other: &Rect) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Self::from_bounds(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    /// Cells in row-major order (y outer, x inner).
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> {
        let Rect {
            x,
            y,
            width,
            height,
        } = *self;
        let (width, height) = (width.max(0), height.max(0));
        (y..y + height).flat_map(move |j| (x..x + width).map(move |i| (i, j)))
    }
}

/// World-space rectangle used by area queries. Negative extents (a drag
/// that went up or left) are normalized on construction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectF {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RectF {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        let (x, width) = if width < 0.0 { (x + width, -width) } else { (x, width) };
        let (y, height) = if height < 0.0 { (y + height, -height) } else { (y, height) };
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_clips_to_bounds() {
        let bounds = Rect::new(0, 0, 4, 4);
        let r = Rect::new(-2, 1, 3, 10).intersect(&bounds);
        assert_eq!(r, Rect::new(0, 1, 1, 3));
    }

    #[test]
    fn disjoint_intersection_is_empty() {
        let r = Rect::new(0, 0, 2, 2).intersect(&Rect::new(5, 5, 1, 1));
        assert!(r.is_empty());
        assert_eq!(r.area(), 0);
        assert_eq!(r.cells().count(), 0);
    }

    #[test]
    fn cells_are_row_major() {
        let cells: Vec<_> = Rect::new(1, 2, 2, 2).cells().collect();
        assert_eq!(cells, vec![(1, 2), (2, 2), (1, 3), (2, 3)]);
    }

    #[test]
    fn expanded_grows_both_sides() {
        assert_eq!(Rect::new(3, 3, 1, 1).expanded(2), Rect::new(1, 1, 5, 5));
    }

    #[test]
    fn union_ignores_empty() {
        let a = Rect::new(1, 1, 2, 2);
        assert_eq!(Rect::default().union(&a), a);
        assert_eq!(a.union(&Rect::new(4, 0, 1, 1)), Rect::new(1, 0, 4, 3));
    }

    #[test]
    fn rectf_normalizes_negative_drag() {
        let r = RectF::new(5.0, 5.0, -2.0, -3.0);
        assert_eq!((r.x, r.y, r.width, r.height), (3.0, 2.0, 2.0, 3.0));
        assert!(r.contains(4.0, 4.0));
        assert!(!r.contains(6.0, 4.0));
    }
}
