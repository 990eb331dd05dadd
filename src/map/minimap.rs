//! Minimap preview: one pixel per corner with tile, cliff and water colors.
//! Doodads and units are not drawn.

use std::path::Path;

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};

use super::terrain::Terrain;

const CLIFF_COLOR: [f32; 4] = [128.0, 128.0, 128.0, 255.0];
/// Water deeper than this gets the dark tint.
const DEEP_WATER: f32 = 0.5;

fn tint(color: [f32; 4], scale: f32, add: [f32; 4]) -> [f32; 4] {
    [
        color[0] * scale + add[0],
        color[1] * scale + add[1],
        color[2] * scale + add[2],
        color[3] * scale + add[3],
    ]
}

/// Builds the minimap with north up: grid row `y` lands on image row
/// `height - 1 - y`.
pub fn minimap_image(terrain: &Terrain) -> RgbaImage {
    let grid = terrain.grid();
    let compositor = terrain.compositor();
    let (w, h) = (grid.width(), grid.height());
    let mut img = RgbaImage::new(w as u32, h as u32);

    for y in 0..h {
        for x in 0..w {
            let corner = grid.at(x, y);
            let cliff_near = [(0, 0), (-1, 0), (0, -1), (-1, -1)]
                .iter()
                .any(|(dx, dy)| grid.corner(x + dx, y + dy).is_some_and(|c| c.cliff));

            let mut color = if cliff_near {
                CLIFF_COLOR
            } else {
                let texture = compositor.real_tile_texture(grid, x, y);
                compositor.ground_texture(texture).minimap_color.map(f32::from)
            };

            let water = corner.final_water_height(terrain.water_offset());
            let ground = corner.final_ground_height();
            if corner.water && water > ground {
                color = if water - ground > DEEP_WATER {
                    tint(color, 0.5625, [0.0, 0.0, 80.0, 112.0])
                } else {
                    tint(color, 0.75, [0.0, 0.0, 48.0, 64.0])
                };
            }

            // float to u8 casts saturate
            let pixel = Rgba(color.map(|c| c as u8));
            img.put_pixel(x as u32, (h - 1 - y) as u32, pixel);
        }
    }
    img
}

pub fn write_minimap_png(terrain: &Terrain, path: &Path) -> Result<()> {
    minimap_image(terrain)
        .save(path)
        .with_context(|| format!("Failed to write minimap PNG: {}", path.display()))
}
