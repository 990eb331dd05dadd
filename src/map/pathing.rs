//! Doodad footprints on the pathing lattice.
//!
//! Pathing cells are a quarter of a grid unit. Footprints are stamped
//! centered on the doodad and turned in quarter steps; an angle of 270
//! degrees leaves the texture as authored.

use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;

use cgmath::Vector2;
use tracing::warn;

use super::catalog::TerrainCatalog;
use super::doodad_brush::quarter_turn;
use crate::assets::{AssetStore, PathingTexture};

pub const CELLS_PER_UNIT: i32 = 4;

/// Quarter turns a footprint is rotated by for a doodad facing `angle`.
fn footprint_turns(angle: f32) -> u32 {
    ((quarter_turn(angle + FRAC_PI_2) / FRAC_PI_2).round() as u32) % 4
}

/// Flagged cells of `texture` placed at `position`, in pathing cells.
pub fn footprint_cells(
    texture: &PathingTexture,
    position: Vector2<f32>,
    angle: f32,
) -> impl Iterator<Item = ((i32, i32), u8)> + '_ {
    let turns = footprint_turns(angle);
    let (w, h) = (texture.width as i32, texture.height as i32);
    let (turned_w, turned_h) = if turns % 2 == 1 { (h, w) } else { (w, h) };
    let origin_x = (position.x * CELLS_PER_UNIT as f32).round() as i32 - turned_w / 2;
    let origin_y = (position.y * CELLS_PER_UNIT as f32).round() as i32 - turned_h / 2;

    (0..h).flat_map(move |j| (0..w).map(move |i| (i, j))).filter_map(move |(i, j)| {
        let flags = texture.at(i as u32, j as u32);
        if flags == 0 {
            return None;
        }
        let (x, y) = match turns {
            1 => (h - 1 - j, i),
            2 => (w - 1 - i, h - 1 - j),
            3 => (j, w - 1 - i),
            _ => (i, j),
        };
        Some(((origin_x + x, origin_y + y), flags))
    })
}

/// Sparse pathing flags over a map `width × height` cells in size.
#[derive(Debug, Clone, Default)]
pub struct PathingMap {
    width: i32,
    height: i32,
    cells: HashMap<(i32, i32), u8>,
}

impl PathingMap {
    /// Covers a terrain of `corner_width × corner_height` corners.
    pub fn for_terrain(corner_width: i32, corner_height: i32) -> Self {
        Self {
            width: (corner_width - 1).max(0) * CELLS_PER_UNIT,
            height: (corner_height - 1).max(0) * CELLS_PER_UNIT,
            cells: HashMap::new(),
        }
    }

    pub fn flags_at(&self, x: i32, y: i32) -> u8 {
        self.cells.get(&(x, y)).copied().unwrap_or(0)
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    pub fn blit(&mut self, texture: &PathingTexture, position: Vector2<f32>, angle: f32) {
        for ((x, y), flags) in footprint_cells(texture, position, angle) {
            if self.in_bounds(x, y) {
                *self.cells.entry((x, y)).or_default() |= flags;
            }
        }
    }

    /// No footprint cell leaves the map or lands on a cell carrying any of
    /// `mask`.
    pub fn is_area_free(&self, texture: &PathingTexture, position: Vector2<f32>, angle: f32, mask: u8) -> bool {
        footprint_cells(texture, position, angle)
            .all(|((x, y), _)| self.in_bounds(x, y) && self.flags_at(x, y) & mask == 0)
    }
}

/// Pathing textures per doodad type, loaded once.
#[derive(Debug, Clone, Default)]
pub struct FootprintCache {
    textures: HashMap<String, Option<PathingTexture>>,
    /// Largest half extent of any cached footprint, grid units.
    reach: f32,
}

impl FootprintCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the type's pathing texture in the catalog and loads it.
    /// Types without one, or whose texture is missing, have no footprint.
    pub fn load<A: AssetStore + ?Sized>(
        &mut self,
        id: &str,
        catalog: &TerrainCatalog,
        assets: &mut A,
    ) -> Option<&PathingTexture> {
        if !self.textures.contains_key(id) {
            let texture = catalog
                .doodad_limits(id)
                .pathing_texture
                .filter(|path| assets.file_exists(path))
                .and_then(|path| match assets.load_pathing_texture(&path) {
                    Ok(texture) => Some(texture),
                    Err(err) => {
                        warn!(id, %err, "pathing texture unreadable, placing without footprint");
                        None
                    }
                });
            self.insert(id, texture);
        }
        self.get(id)
    }

    pub fn insert(&mut self, id: &str, texture: Option<PathingTexture>) {
        if let Some(texture) = &texture {
            let half = texture.width.max(texture.height) as f32 / CELLS_PER_UNIT as f32 / 2.0;
            self.reach = self.reach.max(half);
        }
        self.textures.insert(id.to_string(), texture);
    }

    pub fn get(&self, id: &str) -> Option<&PathingTexture> {
        self.textures.get(id).and_then(Option::as_ref)
    }

    pub fn reach(&self) -> f32 {
        self.reach
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{MemoryAssets, UNBUILDABLE, UNWALKABLE};
    use crate::map::catalog::DoodadLimits;
    use std::f32::consts::PI;

    /// 2×1 footprint: left cell unwalkable, right cell unbuildable.
    fn bar() -> PathingTexture {
        PathingTexture {
            width: 2,
            height: 1,
            cells: vec![UNWALKABLE, UNBUILDABLE],
        }
    }

    fn cells(angle: f32) -> Vec<((i32, i32), u8)> {
        let mut cells: Vec<_> = footprint_cells(&bar(), Vector2::new(2.0, 2.0), angle).collect();
        cells.sort();
        cells
    }

    #[test]
    fn default_facing_keeps_texture_layout() {
        assert_eq!(cells(1.5 * PI), vec![((7, 8), UNWALKABLE), ((8, 8), UNBUILDABLE)]);
    }

    #[test]
    fn quarter_turn_swaps_extents() {
        // facing east is one quarter turn from the authored layout
        assert_eq!(cells(0.0), vec![((8, 7), UNWALKABLE), ((8, 8), UNBUILDABLE)]);
        assert_eq!(cells(PI / 2.0), vec![((7, 8), UNBUILDABLE), ((8, 8), UNWALKABLE)]);
    }

    #[test]
    fn overlap_and_edges_block_placement() {
        let mut map = PathingMap::for_terrain(5, 5);
        let texture = bar();
        assert!(map.is_area_free(&texture, Vector2::new(2.0, 2.0), 1.5 * PI, UNWALKABLE));
        map.blit(&texture, Vector2::new(2.0, 2.0), 1.5 * PI);
        assert_eq!(map.flags_at(7, 8), UNWALKABLE);

        assert!(!map.is_area_free(&texture, Vector2::new(2.0, 2.0), 1.5 * PI, UNWALKABLE));
        // only the unbuildable cell overlaps, and the mask ignores it
        assert!(map.is_area_free(&texture, Vector2::new(2.25, 2.0), 1.5 * PI, UNWALKABLE));
        assert!(!map.is_area_free(&texture, Vector2::new(2.25, 2.0), 1.5 * PI, UNBUILDABLE));
        assert!(!map.is_area_free(&texture, Vector2::new(0.0, 0.0), 1.5 * PI, UNWALKABLE));
    }

    #[test]
    fn cache_loads_once_and_tracks_reach() {
        let mut catalog = TerrainCatalog::new();
        catalog.set_doodad_limits(
            "LTrc",
            DoodadLimits {
                pathing_texture: Some("PathTextures/4x4Default.tga".to_string()),
                ..Default::default()
            },
        );
        catalog.set_doodad_limits(
            "LTgh",
            DoodadLimits {
                pathing_texture: Some("PathTextures/Missing.tga".to_string()),
                ..Default::default()
            },
        );
        let mut assets = MemoryAssets::new();
        assets.insert_pathing_texture(
            "PathTextures/4x4Default.tga",
            PathingTexture {
                width: 4,
                height: 4,
                cells: vec![UNWALKABLE; 16],
            },
        );

        let mut cache = FootprintCache::new();
        assert_eq!(cache.load("LTrc", &catalog, &mut assets).map(|t| t.width), Some(4));
        assert!(cache.load("LTgh", &catalog, &mut assets).is_none());
        assert!(cache.load("none", &catalog, &mut assets).is_none());
        assert_eq!(cache.reach(), 0.5);
    }
}
