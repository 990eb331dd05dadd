//! Per-quad ground texture descriptors consumed by the terrain shader.
//!
//! Each quad gets four `u16` slots. The low 5 bits select a ground texture
//! (tileset index, blight last); the upper bits carry the sub-tile variation
//! for the base layer or a 4-bit corner mask for each blended layer.

use std::collections::BTreeSet;

use tracing::warn;

use super::catalog::TerrainCatalog;
use super::grid::Grid;
use super::w3e::TextureCode;
use crate::assets::{AssetStore, GroundTextureInfo};

pub type TextureDescriptor = [u16; 4];

/// Texture slot the shader renders as black and fully transparent.
pub const EMPTY_TEXTURE_SLOT: u16 = 17;

const MASK_BOTTOM_RIGHT: u16 = 0b0001;
const MASK_BOTTOM_LEFT: u16 = 0b0010;
const MASK_TOP_RIGHT: u16 = 0b0100;
const MASK_TOP_LEFT: u16 = 0b1000;

#[derive(Debug, Clone, Default)]
pub struct TextureCompositor {
    /// Tileset textures followed by the blight texture.
    ground_textures: Vec<GroundTextureInfo>,
    cliff_to_ground: Vec<u16>,
}

impl TextureCompositor {
    /// `tile_textures` in tileset order; blight is appended after them.
    pub fn new(
        tile_textures: Vec<GroundTextureInfo>,
        blight: GroundTextureInfo,
        cliff_to_ground: Vec<u16>,
    ) -> Self {
        let mut ground_textures = tile_textures;
        ground_textures.push(blight);
        Self {
            ground_textures,
            cliff_to_ground,
        }
    }

    /// Resolves every tileset and cliffset code through the catalog. Missing
    /// textures fall back to a plain grey, non-extended entry.
    pub fn load(
        tileset: u8,
        tileset_ids: &[TextureCode],
        cliffset_ids: &[TextureCode],
        catalog: &TerrainCatalog,
        assets: &mut dyn AssetStore,
        suffix: &str,
    ) -> Self {
        let mut load = |code: &str, path: Option<String>| match path {
            Some(path) => {
                let full = format!("{path}{suffix}");
                assets.load_ground_texture(&full).unwrap_or_else(|err| {
                    warn!(code, path = %full, %err, "ground texture unavailable");
                    GroundTextureInfo::default()
                })
            }
            None => {
                warn!(code, "ground tile missing from catalog");
                GroundTextureInfo::default()
            }
        };

        let tile_textures = tileset_ids
            .iter()
            .map(|id| load(&id.as_string(), catalog.ground_tile(id).map(|t| t.path())))
            .collect();
        let blight = load("blight", catalog.blight_texture(tileset).map(str::to_string));

        let cliff_to_ground = cliffset_ids
            .iter()
            .map(|id| {
                catalog
                    .cliff_type(id)
                    .and_then(|cliff| tileset_ids.iter().position(|t| *t == cliff.ground_tile))
                    .unwrap_or(0) as u16
            })
            .collect();

        Self::new(tile_textures, blight, cliff_to_ground)
    }

    pub fn blight_texture(&self) -> u16 {
        self.ground_textures.len().saturating_sub(1) as u16
    }

    pub fn ground_texture(&self, index: u16) -> GroundTextureInfo {
        self.ground_textures
            .get(index as usize)
            .copied()
            .unwrap_or_default()
    }

    pub fn texture_count(&self) -> usize {
        self.ground_textures.len()
    }

    /// Texture the corner renders with once nearby cliffs, ramps and blight
    /// are taken into account.
    pub fn real_tile_texture(&self, grid: &Grid, x: i32, y: i32) -> u16 {
        'search: for i in -1..=0 {
            for j in -1..=0 {
                let (cx, cy) = (x + i, y + j);
                let Some(corner) = grid.corner(cx, cy) else {
                    continue;
                };
                if corner.cliff {
                    if let Some(quad) = grid.quad(cx, cy) {
                        let fully_ramped = quad.iter().all(|c| c.ramp && !c.ramp_active);
                        if fully_ramped {
                            break 'search;
                        }
                    }
                }
                if corner.ramp_active || corner.cliff {
                    // 15 is the "use tileset default" marker
                    let texture = if corner.cliff_texture == 15 {
                        1
                    } else {
                        corner.cliff_texture
                    };
                    if let Some(ground) = self.cliff_to_ground.get(texture as usize) {
                        return *ground;
                    }
                }
            }
        }

        let corner = grid.at(x, y);
        if corner.blight {
            self.blight_texture()
        } else {
            corner.ground_texture as u16
        }
    }

    /// Sub-tile within a texture atlas.
    pub fn tile_variation(&self, texture: u16, variation: u8) -> u16 {
        let extended = self.ground_texture(texture).extended;
        match (extended, variation) {
            (true, 0..=15) => 16 + variation as u16,
            (true, 16) => 15,
            (true, _) => 0,
            (false, 0) => 0,
            (false, _) => 15,
        }
    }

    pub fn texture_descriptor(&self, grid: &Grid, x: i32, y: i32) -> TextureDescriptor {
        let bottom_left = self.real_tile_texture(grid, x, y);
        let bottom_right = self.real_tile_texture(grid, x + 1, y);
        let top_left = self.real_tile_texture(grid, x, y + 1);
        let top_right = self.real_tile_texture(grid, x + 1, y + 1);

        let unique: BTreeSet<u16> = [bottom_left, bottom_right, top_left, top_right].into();
        let mut textures = unique.into_iter();
        let mut descriptor = [EMPTY_TEXTURE_SLOT; 4];

        if let Some(base) = textures.next() {
            let variation = self.tile_variation(base, grid.at(x, y).ground_variation);
            descriptor[0] = base + (variation << 5);
        }
        for (slot, texture) in descriptor.iter_mut().skip(1).zip(textures) {
            let mut mask = 0;
            if bottom_right == texture {
                mask |= MASK_BOTTOM_RIGHT;
            }
            if bottom_left == texture {
                mask |= MASK_BOTTOM_LEFT;
            }
            if top_right == texture {
                mask |= MASK_TOP_RIGHT;
            }
            if top_left == texture {
                mask |= MASK_TOP_LEFT;
            }
            *slot = texture + (mask << 5);
        }
        descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::corner::Corner;

    fn plain(extended: bool) -> GroundTextureInfo {
        GroundTextureInfo {
            extended,
            ..Default::default()
        }
    }

    fn compositor() -> TextureCompositor {
        TextureCompositor::new(vec![plain(false), plain(true), plain(false)], plain(false), vec![2, 1])
    }

    fn textured(width: u32, height: u32, textures: &[u8]) -> Grid {
        let corners = textures
            .iter()
            .map(|&ground_texture| Corner {
                ground_texture,
                ..Default::default()
            })
            .collect();
        Grid::from_corners(width, height, corners).unwrap()
    }

    #[test]
    fn variation_tables() {
        let c = compositor();
        assert_eq!(c.tile_variation(0, 0), 0);
        assert_eq!(c.tile_variation(0, 3), 15);
        assert_eq!(c.tile_variation(1, 0), 16);
        assert_eq!(c.tile_variation(1, 15), 31);
        assert_eq!(c.tile_variation(1, 16), 15);
        assert_eq!(c.tile_variation(1, 17), 0);
    }

    #[test]
    fn uniform_quad_has_single_layer() {
        let c = compositor();
        let grid = textured(2, 2, &[1, 1, 1, 1]);
        assert_eq!(c.texture_descriptor(&grid, 0, 0), [1 + (16 << 5), 17, 17, 17]);
    }

    #[test]
    fn blend_layers_carry_corner_masks() {
        let c = compositor();
        // bottom row: 0, 2; top row: 2, 0
        let grid = textured(2, 2, &[0, 2, 2, 0]);
        let descriptor = c.texture_descriptor(&grid, 0, 0);
        assert_eq!(descriptor[0], 0);
        // texture 2 sits on bottom-right and top-left
        assert_eq!(descriptor[1], 2 + ((MASK_BOTTOM_RIGHT | MASK_TOP_LEFT) << 5));
        assert_eq!(descriptor[2], EMPTY_TEXTURE_SLOT);
    }

    #[test]
    fn blight_overrides_ground() {
        let c = compositor();
        let mut grid = textured(2, 2, &[0; 4]);
        grid.at_mut(1, 1).blight = true;
        assert_eq!(c.real_tile_texture(&grid, 1, 1), c.blight_texture());
        assert_eq!(c.blight_texture(), 3);
    }

    #[test]
    fn cliff_neighbour_uses_cliff_ground_tile() {
        let c = compositor();
        let mut grid = textured(2, 2, &[0; 4]);
        grid.at_mut(1, 1).layer_height = 1;
        grid.at_mut(0, 0).cliff_texture = 15;
        grid.refresh_cliff_flags();
        // cliff texture 15 reads as cliff 1, whose ground tile is 1
        assert_eq!(c.real_tile_texture(&grid, 1, 1), 1);
        assert_eq!(c.real_tile_texture(&grid, 0, 0), 1);
    }

    #[test]
    fn fully_ramped_cliff_keeps_ground() {
        let c = compositor();
        let mut grid = textured(2, 2, &[0; 4]);
        for y in 0..2 {
            for x in 0..2 {
                grid.at_mut(x, y).ramp = true;
            }
        }
        grid.at_mut(1, 1).layer_height = 1;
        grid.refresh_cliff_flags();
        assert_eq!(c.real_tile_texture(&grid, 1, 1), 0);
    }
}
