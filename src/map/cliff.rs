//! Cliff and ramp mesh synthesis.
//!
//! Placements are derived from the corner lattice only. A region update
//! throws away every placement anchored in the region and rebuilds it, so
//! calling it twice over unchanged corners yields the same set.

use std::collections::HashMap;

use tracing::debug;

use super::catalog::TerrainCatalog;
use super::corner::Corner;
use super::grid::Grid;
use crate::assets::{AssetStore, MeshHandle};
use crate::math::Rect;

/// Corner edits reach placements up to this many quads away, through the
/// three-corner ramp windows and `ramp_active` written by neighbors.
pub const PLACEMENT_HALO: i32 = 3;
/// `ramp_active` is cleared over this halo before the rebuild.
pub const RAMP_STATE_HALO: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlacementKind {
    Cliff,
    Ramp,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CliffPlacement {
    pub x: i32,
    pub y: i32,
    pub kind: PlacementKind,
    /// Four letters plus variation, e.g. `AABA0` or `LLAA0`.
    pub identifier: String,
    pub mesh: MeshHandle,
}

#[derive(Debug, Default)]
pub struct CliffSynthesizer {
    placements: Vec<CliffPlacement>,
    meshes: HashMap<String, MeshHandle>,
}

fn ramp_letter(corner: &Corner, base: u8) -> Option<char> {
    let offset = corner.layer_height as i32 - base as i32;
    let code = if corner.ramp {
        b'L' as i32 - 4 * offset
    } else {
        b'A' as i32 + offset
    };
    u8::try_from(code).ok().map(char::from)
}

/// Ramp identifier from four corners in asset-name order.
fn ramp_identifier(corners: [&Corner; 4], base: u8) -> Option<String> {
    corners.iter().map(|c| ramp_letter(c, base)).collect()
}

impl CliffSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted by position.
    pub fn placements(&self) -> &[CliffPlacement] {
        &self.placements
    }

    pub fn loaded_meshes(&self) -> usize {
        self.meshes.len()
    }

    pub fn clear(&mut self) {
        self.placements.clear();
    }

    fn mesh_for(&mut self, path: &str, assets: &mut dyn AssetStore) -> Option<MeshHandle> {
        if let Some(handle) = self.meshes.get(path) {
            return Some(*handle);
        }
        if !assets.file_exists(path) {
            debug!(path, "no mesh authored for identifier");
            return None;
        }
        match assets.load_mesh(path) {
            Ok(handle) => {
                self.meshes.insert(path.to_string(), handle);
                Some(handle)
            }
            Err(err) => {
                debug!(path, %err, "cliff mesh failed to load");
                None
            }
        }
    }

    /// Rebuilds placements for the corner region `area`. Returns the quad
    /// region that was recomputed; existence masks over it are stale.
    pub fn update(
        &mut self,
        grid: &mut Grid,
        area: Rect,
        catalog: &TerrainCatalog,
        assets: &mut dyn AssetStore,
    ) -> Rect {
        let quads = grid.quad_bounds();
        let rebuild = area.expanded(PLACEMENT_HALO).intersect(&quads);
        let ramp_state = area.expanded(RAMP_STATE_HALO).intersect(&grid.bounds());

        self.placements.retain(|p| !rebuild.contains(p.x, p.y));
        for (x, y) in ramp_state.cells() {
            grid.at_mut(x, y).ramp_active = false;
        }

        let before = self.placements.len();
        for i in rebuild.x..rebuild.right() {
            for j in rebuild.y..rebuild.bottom() {
                if self.try_vertical_ramp(grid, i, j, assets)
                    || self.try_horizontal_ramp(grid, i, j, assets)
                {
                    continue;
                }
                self.try_cliff(grid, i, j, catalog, assets);
            }
        }
        self.placements.sort();

        debug!(
            ?rebuild,
            added = self.placements.len().saturating_sub(before),
            total = self.placements.len(),
            "cliff placements rebuilt"
        );
        rebuild
    }

    /// Ramp running along y over the 2x3 window starting at quad `(i, j)`.
    fn try_vertical_ramp(&mut self, grid: &mut Grid, i: i32, j: i32, assets: &mut dyn AssetStore) -> bool {
        if j >= grid.height() - 2 {
            return false;
        }
        let Some([bottom_left, bottom_right, top_left, top_right]) = grid.quad(i, j) else {
            return false;
        };
        let top_top_left = *grid.at(i, j + 2);
        let top_top_right = *grid.at(i + 1, j + 2);

        let left = bottom_left.layer_height.min(top_top_left.layer_height);
        let right = bottom_right.layer_height.min(top_top_right.layer_height);
        if top_left.layer_height != left || top_right.layer_height != right {
            return false;
        }
        let partitioned = bottom_left.ramp == top_left.ramp
            && bottom_left.ramp == top_top_left.ramp
            && bottom_right.ramp == top_right.ramp
            && bottom_right.ramp == top_top_right.ramp
            && bottom_left.ramp != bottom_right.ramp;
        if !partitioned {
            return false;
        }

        let base = left.min(right);
        let Some(identifier) = ramp_identifier(
            [&top_top_left, &top_top_right, &bottom_right, &bottom_left],
            base,
        ) else {
            return false;
        };
        if !self.place_ramp(i, j, &identifier, assets) {
            return false;
        }
        grid.at_mut(i, j).ramp_active = true;
        grid.at_mut(i, j + 1).ramp_active = true;
        true
    }

    /// Ramp running along x over the 3x2 window starting at quad `(i, j)`.
    fn try_horizontal_ramp(&mut self, grid: &mut Grid, i: i32, j: i32, assets: &mut dyn AssetStore) -> bool {
        if i >= grid.width() - 2 {
            return false;
        }
        let Some([bottom_left, bottom_right, top_left, top_right]) = grid.quad(i, j) else {
            return false;
        };
        let bottom_right_right = *grid.at(i + 2, j);
        let top_right_right = *grid.at(i + 2, j + 1);

        let bottom = bottom_left.layer_height.min(bottom_right_right.layer_height);
        let top = top_left.layer_height.min(top_right_right.layer_height);
        if bottom_right.layer_height != bottom || top_right.layer_height != top {
            return false;
        }
        let partitioned = bottom_left.ramp == bottom_right.ramp
            && bottom_left.ramp == bottom_right_right.ramp
            && top_left.ramp == top_right.ramp
            && top_left.ramp == top_right_right.ramp
            && bottom_left.ramp != top_left.ramp;
        if !partitioned {
            return false;
        }

        let base = bottom.min(top);
        let Some(identifier) = ramp_identifier(
            [&top_left, &top_right_right, &bottom_right_right, &bottom_left],
            base,
        ) else {
            return false;
        };
        if !self.place_ramp(i, j, &identifier, assets) {
            return false;
        }
        grid.at_mut(i, j).ramp_active = true;
        grid.at_mut(i + 1, j).ramp_active = true;
        true
    }

    fn place_ramp(&mut self, x: i32, y: i32, identifier: &str, assets: &mut dyn AssetStore) -> bool {
        let path = format!("doodads/terrain/clifftrans/clifftrans{identifier}0.mdx");
        let Some(mesh) = self.mesh_for(&path, assets) else {
            return false;
        };
        self.placements.push(CliffPlacement {
            x,
            y,
            kind: PlacementKind::Ramp,
            identifier: format!("{identifier}0"),
            mesh,
        });
        true
    }

    fn try_cliff(
        &mut self,
        grid: &Grid,
        i: i32,
        j: i32,
        catalog: &TerrainCatalog,
        assets: &mut dyn AssetStore,
    ) {
        let Some([bottom_left, bottom_right, top_left, top_right]) = grid.quad(i, j) else {
            return;
        };
        if !bottom_left.cliff || bottom_left.ramp_active || grid.is_corner_ramp_entrance(i, j) {
            return;
        }

        let base = bottom_left
            .layer_height
            .min(bottom_right.layer_height)
            .min(top_left.layer_height)
            .min(top_right.layer_height);
        let identifier: String = [top_left, top_right, bottom_right, bottom_left]
            .iter()
            .map(|c| char::from(b'A' + (c.layer_height - base)))
            .collect();
        if identifier == "AAAA" {
            return;
        }

        let Some(highest) = catalog.cliff_variations(&identifier) else {
            debug!(identifier = %identifier, x = i, y = j, "cliff identifier missing from variation table");
            return;
        };
        let variation = bottom_left.cliff_variation.min(highest);
        let path = format!("Doodads/Terrain/Cliffs/Cliffs{identifier}{variation}.mdx");
        let Some(mesh) = self.mesh_for(&path, assets) else {
            return;
        };
        self.placements.push(CliffPlacement {
            x: i,
            y: j,
            kind: PlacementKind::Cliff,
            identifier: format!("{identifier}{variation}"),
            mesh,
        });
    }
}
