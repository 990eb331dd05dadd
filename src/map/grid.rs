use super::corner::Corner;
use crate::error::{Result, TerrainError};
use crate::math::Rect;

/// Corner lattice, row-major `y * width + x`.
///
/// Quad `(x, y)` is bounded by corners `(x, y)`, `(x + 1, y)`, `(x, y + 1)`
/// and `(x + 1, y + 1)`; its `cliff` flag lives on the bottom-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    width: i32,
    height: i32,
    corners: Vec<Corner>,
}

impl Grid {
    pub fn new(width: u32, height: u32, fill: Corner) -> Self {
        debug_assert!(width > 0 && height > 0, "grid must be at least 1x1");
        let mut grid = Self {
            width: width as i32,
            height: height as i32,
            corners: vec![fill; width as usize * height as usize],
        };
        grid.refresh_cliff_flags();
        grid
    }

    pub fn from_corners(width: u32, height: u32, corners: Vec<Corner>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(TerrainError::format("grid dimensions must be non-zero"));
        }
        if corners.len() != width as usize * height as usize {
            return Err(TerrainError::format(format!(
                "{} corners do not fill a {}x{} grid",
                corners.len(),
                width,
                height
            )));
        }
        let mut grid = Self {
            width: width as i32,
            height: height as i32,
            corners,
        };
        grid.refresh_cliff_flags();
        Ok(grid)
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// All corners.
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    /// All quads; empty for a one-corner-wide grid.
    pub fn quad_bounds(&self) -> Rect {
        Rect::new(0, 0, self.width - 1, self.height - 1)
    }

    pub fn corners(&self) -> &[Corner] {
        &self.corners
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    pub fn quad_in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width - 1 && y < self.height - 1
    }

    pub(crate) fn index(&self, x: i32, y: i32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn corner(&self, x: i32, y: i32) -> Option<&Corner> {
        if self.in_bounds(x, y) {
            Some(&self.corners[self.index(x, y)])
        } else {
            None
        }
    }

    pub fn corner_mut(&mut self, x: i32, y: i32) -> Option<&mut Corner> {
        if self.in_bounds(x, y) {
            let index = self.index(x, y);
            Some(&mut self.corners[index])
        } else {
            None
        }
    }

    /// Corner by position; the caller guarantees it is in bounds.
    pub fn at(&self, x: i32, y: i32) -> &Corner {
        &self.corners[self.index(x, y)]
    }

    pub(crate) fn at_mut(&mut self, x: i32, y: i32) -> &mut Corner {
        let index = self.index(x, y);
        &mut self.corners[index]
    }

    /// The quad's corners as `[bottom_left, bottom_right, top_left, top_right]`.
    pub fn quad(&self, x: i32, y: i32) -> Option<[Corner; 4]> {
        if !self.quad_in_bounds(x, y) {
            return None;
        }
        Some([
            *self.at(x, y),
            *self.at(x + 1, y),
            *self.at(x, y + 1),
            *self.at(x + 1, y + 1),
        ])
    }

    pub fn quad_min_layer(&self, x: i32, y: i32) -> Option<u8> {
        self.quad(x, y)
            .map(|q| q.iter().map(|c| c.layer_height).min().unwrap_or(0))
    }

    /// A quad whose four corners are authored ramps but do not form a
    /// level diagonal; the mouth of a ramp.
    pub fn is_corner_ramp_entrance(&self, x: i32, y: i32) -> bool {
        let Some([bottom_left, bottom_right, top_left, top_right]) = self.quad(x, y) else {
            return false;
        };
        bottom_left.ramp
            && bottom_right.ramp
            && top_left.ramp
            && top_right.ramp
            && !(bottom_left.layer_height == top_right.layer_height
                && top_left.layer_height == bottom_right.layer_height)
    }

    // ========================================================================
    // Derived cliff flag
    // ========================================================================

    pub fn refresh_cliff_flags(&mut self) {
        self.refresh_cliff_flags_in(self.bounds());
    }

    /// Recomputes `cliff` for every quad anchored inside `area`. Corners on
    /// the last row or column never anchor a quad and are cleared.
    pub fn refresh_cliff_flags_in(&mut self, area: Rect) {
        for (x, y) in area.intersect(&self.bounds()).cells() {
            let cliff = match self.quad(x, y) {
                Some([bl, br, tl, tr]) => {
                    bl.layer_height != br.layer_height
                        || bl.layer_height != tl.layer_height
                        || bl.layer_height != tr.layer_height
                }
                None => false,
            };
            self.at_mut(x, y).cliff = cliff;
        }
    }

    /// Refreshes every quad that has a corner inside `area`.
    pub fn refresh_cliff_flags_around(&mut self, area: Rect) {
        let touching = Rect::new(area.x - 1, area.y - 1, area.width + 1, area.height + 1);
        self.refresh_cliff_flags_in(touching);
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Copies `area` (clipped) out in row-major order.
    pub fn snapshot(&self, area: Rect) -> Vec<Corner> {
        area.intersect(&self.bounds())
            .cells()
            .map(|(x, y)| *self.at(x, y))
            .collect()
    }

    /// Writes a slice produced by [`Grid::snapshot`] back over `area` and
    /// re-derives `cliff` for every quad touching it.
    pub fn restore(&mut self, area: Rect, corners: &[Corner]) {
        let area = area.intersect(&self.bounds());
        debug_assert_eq!(area.area(), corners.len());
        for ((x, y), corner) in area.cells().zip(corners) {
            *self.at_mut(x, y) = *corner;
        }
        self.refresh_cliff_flags_around(area);
    }

    /// Reallocates the lattice, filling every corner with a copy of the old
    /// corner `(0, 0)`. Zero dimensions are a caller error.
    pub fn resize(&mut self, width: u32, height: u32) {
        debug_assert!(width > 0 && height > 0, "resize to an empty grid");
        let template = Corner {
            cliff: false,
            ramp_active: false,
            ..self.corners[0]
        };
        *self = Grid::new(width.max(1), height.max(1), template);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layered(width: u32, height: u32, layers: &[u8]) -> Grid {
        let corners = layers
            .iter()
            .map(|&layer_height| Corner {
                layer_height,
                ..Default::default()
            })
            .collect();
        Grid::from_corners(width, height, corners).unwrap()
    }

    #[test]
    fn cliff_flag_marks_uneven_quads() {
        // row-major, y = 0 first
        let grid = layered(3, 2, &[0, 0, 1, 0, 0, 0]);
        assert!(!grid.at(0, 0).cliff);
        assert!(grid.at(1, 0).cliff);
        // last column and row never anchor a quad
        assert!(!grid.at(2, 0).cliff);
        assert!(!grid.at(0, 1).cliff);
    }

    #[test]
    fn quad_reads_are_bounds_checked() {
        let grid = layered(2, 2, &[0, 0, 0, 0]);
        assert!(grid.quad(0, 0).is_some());
        assert!(grid.quad(1, 0).is_none());
        assert!(grid.quad(-1, 0).is_none());
        assert!(!grid.is_corner_ramp_entrance(5, 5));
        assert!(grid.corner(2, 0).is_none());
    }

    #[test]
    fn ramp_entrance_requires_all_ramps_and_a_slope() {
        let mut grid = layered(2, 2, &[0, 0, 1, 1]);
        for y in 0..2 {
            for x in 0..2 {
                grid.at_mut(x, y).ramp = true;
            }
        }
        assert!(grid.is_corner_ramp_entrance(0, 0));
        grid.at_mut(0, 1).layer_height = 0;
        grid.at_mut(1, 1).layer_height = 0;
        assert!(!grid.is_corner_ramp_entrance(0, 0));
    }

    #[test]
    fn restore_rederives_neighbouring_cliffs() {
        let mut grid = layered(3, 3, &[0; 9]);
        let area = Rect::new(1, 1, 1, 1);
        let mut raised = grid.snapshot(area);
        raised[0].layer_height = 2;
        grid.restore(area, &raised);
        assert!(grid.at(0, 0).cliff);
        assert!(grid.at(1, 0).cliff);
        assert!(grid.at(0, 1).cliff);
        assert!(grid.at(1, 1).cliff);
    }

    #[test]
    fn snapshot_is_clipped_row_major() {
        let grid = layered(2, 2, &[0, 1, 2, 3]);
        let slice = grid.snapshot(Rect::new(-1, 0, 5, 5));
        let layers: Vec<u8> = slice.iter().map(|c| c.layer_height).collect();
        assert_eq!(layers, vec![0, 1, 2, 3]);
    }

    #[test]
    fn resize_fills_with_origin_corner() {
        let mut grid = layered(2, 2, &[3, 0, 0, 0]);
        grid.at_mut(0, 0).ground_texture = 4;
        grid.resize(4, 3);
        assert_eq!(grid.width(), 4);
        assert_eq!(grid.height(), 3);
        assert!(grid
            .corners()
            .iter()
            .all(|c| c.layer_height == 3 && c.ground_texture == 4 && !c.cliff));
    }
}
