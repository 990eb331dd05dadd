//! The terrain aggregate: grid, synthesized cliffs, texture descriptors and
//! GPU mirrors kept consistent with each other.
//!
//! Every mutation goes through [`Terrain::edit_corners`] or
//! [`Terrain::apply_corners`], which recompute only the touched region plus
//! the halo implied by the edit kind.

use std::path::Path;

use anyhow::Context;
use cgmath::{Vector2, Vector3};
use tracing::{debug, info};

use super::catalog::TerrainCatalog;
use super::cliff::{CliffPlacement, CliffSynthesizer};
use super::corner::Corner;
use super::gpu::{GpuBackend, GpuProjection, GpuResources, TerrainMirrors};
use super::ground_texture::TextureCompositor;
use super::grid::Grid;
use super::w3e::{parse_w3e, write_w3e, TextureCode, W3eFile};
use crate::assets::{AssetStore, CollisionSink};
use crate::config::settings::EditorSettings;
use crate::error::{Result, TerrainError};
use crate::math::Rect;
use crate::undo::TerrainEditKind;

/// Archive path of the terrain file.
pub const TERRAIN_FILE: &str = "war3map.w3e";

/// Collaborators an edit needs besides the terrain itself.
pub struct EditContext<'a> {
    pub catalog: &'a TerrainCatalog,
    pub settings: &'a EditorSettings,
    pub assets: &'a mut dyn AssetStore,
    pub backend: &'a mut dyn GpuBackend,
}

#[derive(Debug)]
pub struct Terrain {
    tileset: u8,
    tileset_ids: Vec<TextureCode>,
    cliffset_ids: Vec<TextureCode>,
    offset: Vector2<f32>,
    water_offset: f32,
    grid: Grid,
    cliffs: CliffSynthesizer,
    compositor: TextureCompositor,
    gpu: GpuProjection,
}

impl Terrain {
    /// Builds every derived structure from a decoded file and uploads the
    /// mirrors in full.
    pub fn create(file: W3eFile, ctx: &mut EditContext<'_>) -> Result<Self> {
        let W3eFile {
            tileset,
            tileset_ids,
            cliffset_ids,
            width,
            height,
            offset,
            corners,
        } = file;

        let mut grid = Grid::from_corners(width, height, corners)?;
        let compositor = TextureCompositor::load(
            tileset,
            &tileset_ids,
            &cliffset_ids,
            ctx.catalog,
            &mut *ctx.assets,
            ctx.settings.texture_suffix(),
        );
        let mut cliffs = CliffSynthesizer::new();
        let bounds = grid.bounds();
        cliffs.update(&mut grid, bounds, ctx.catalog, &mut *ctx.assets);
        let gpu = GpuProjection::create(&grid, &compositor, &mut *ctx.backend)?;

        info!(
            width,
            height,
            tileset = %char::from(tileset),
            cliffs = cliffs.placements().len(),
            "terrain loaded"
        );

        Ok(Self {
            tileset,
            tileset_ids,
            cliffset_ids,
            offset,
            water_offset: ctx.catalog.water_offset(tileset),
            grid,
            cliffs,
            compositor,
            gpu,
        })
    }

    /// Reads [`TERRAIN_FILE`] from the asset store.
    pub fn load(ctx: &mut EditContext<'_>) -> Result<Self> {
        let bytes = ctx.assets.read_file(TERRAIN_FILE)?;
        let file = parse_w3e(&bytes)?;
        Self::create(file, ctx)
    }

    pub fn load_from_path(path: &Path, ctx: &mut EditContext<'_>) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read terrain file: {}", path.display()))?;
        let file = parse_w3e(&bytes)
            .with_context(|| format!("Failed to parse terrain file: {}", path.display()))?;
        Self::create(file, ctx).with_context(|| format!("Failed to build terrain: {}", path.display()))
    }

    pub fn to_w3e(&self) -> W3eFile {
        W3eFile {
            tileset: self.tileset,
            tileset_ids: self.tileset_ids.clone(),
            cliffset_ids: self.cliffset_ids.clone(),
            width: self.grid.width() as u32,
            height: self.grid.height() as u32,
            offset: self.offset,
            corners: self.grid.corners().to_vec(),
        }
    }

    pub fn save(&self, assets: &mut dyn AssetStore) -> Result<()> {
        let bytes = write_w3e(&self.to_w3e())?;
        assets.write_file(TERRAIN_FILE, &bytes)?;
        info!(bytes = bytes.len(), "terrain saved");
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn width(&self) -> i32 {
        self.grid.width()
    }

    pub fn height(&self) -> i32 {
        self.grid.height()
    }

    pub fn tileset(&self) -> u8 {
        self.tileset
    }

    pub fn tileset_ids(&self) -> &[TextureCode] {
        &self.tileset_ids
    }

    pub fn cliffset_ids(&self) -> &[TextureCode] {
        &self.cliffset_ids
    }

    pub fn offset(&self) -> Vector2<f32> {
        self.offset
    }

    pub fn water_offset(&self) -> f32 {
        self.water_offset
    }

    pub fn cliff_placements(&self) -> &[CliffPlacement] {
        self.cliffs.placements()
    }

    pub fn compositor(&self) -> &TextureCompositor {
        &self.compositor
    }

    pub fn mirrors(&self) -> &TerrainMirrors {
        self.gpu.mirrors()
    }

    pub fn gpu_resources(&self) -> Option<&GpuResources> {
        self.gpu.resources()
    }

    // ========================================================================
    // Editing
    // ========================================================================

    /// Runs `edit` on every corner of `area` (clipped), then recomputes the
    /// region for `kind`. Returns the clipped area, empty if nothing was
    /// touched.
    pub fn edit_corners(
        &mut self,
        area: Rect,
        kind: TerrainEditKind,
        ctx: &mut EditContext<'_>,
        mut edit: impl FnMut(i32, i32, &mut Corner),
    ) -> Rect {
        let area = area.intersect(&self.grid.bounds());
        if area.is_empty() {
            return area;
        }
        for (x, y) in area.cells() {
            edit(x, y, self.grid.at_mut(x, y));
        }
        self.grid.refresh_cliff_flags_around(area);
        self.recompute(area, kind, ctx);
        area
    }

    /// Writes a snapshot slice back and recomputes for `kind`.
    pub fn apply_corners(&mut self, area: Rect, kind: TerrainEditKind, corners: &[Corner], ctx: &mut EditContext<'_>) {
        self.grid.restore(area, corners);
        self.recompute(area, kind, ctx);
    }

    /// Re-derives exactly what `kind` can have invalidated over `area`.
    pub fn recompute(&mut self, area: Rect, kind: TerrainEditKind, ctx: &mut EditContext<'_>) {
        let backend = &mut *ctx.backend;
        match kind {
            TerrainEditKind::Height => {
                self.gpu.update_ground_heights(&self.grid, area, backend);
            }
            TerrainEditKind::Texture => {
                self.gpu
                    .update_ground_textures(&self.grid, &self.compositor, area, backend);
            }
            TerrainEditKind::Cliff => {
                self.gpu.update_ground_heights(&self.grid, area, backend);
                let rebuilt = self
                    .cliffs
                    .update(&mut self.grid, area, ctx.catalog, &mut *ctx.assets);
                self.gpu.update_ground_exists(&self.grid, rebuilt, backend);
                self.gpu
                    .update_ground_textures(&self.grid, &self.compositor, rebuilt, backend);
                self.gpu.update_water(&self.grid, area, backend);
            }
        }
        debug!(?area, ?kind, "terrain region recomputed");
    }

    /// Reallocates the grid at the new size, every corner a copy of the old
    /// corner `(0, 0)`. The GPU set for the new size is created before the
    /// old one is released; on failure the terrain is unchanged.
    pub fn resize(&mut self, width: u32, height: u32, ctx: &mut EditContext<'_>) -> Result<()> {
        debug_assert!(width > 0 && height > 0, "resize to an empty grid");
        let mut grid = self.grid.clone();
        grid.resize(width, height);
        self.gpu.replace(&grid, &self.compositor, &mut *ctx.backend)?;

        self.grid = grid;
        let bounds = self.grid.bounds();
        self.cliffs.clear();
        self.cliffs
            .update(&mut self.grid, bounds, ctx.catalog, &mut *ctx.assets);
        info!(width, height, "terrain resized");
        Ok(())
    }

    /// Switches to a new set of ground tiles. `old_to_new[i]` is the new
    /// index of old tile `i`; the blight slot follows the new tiles.
    pub fn change_tileset(
        &mut self,
        tileset_ids: Vec<TextureCode>,
        old_to_new: &[u8],
        ctx: &mut EditContext<'_>,
    ) -> Result<()> {
        let mut table = old_to_new.to_vec();
        table.push(tileset_ids.len() as u8);
        if let Some(corner) = self
            .grid
            .corners()
            .iter()
            .find(|c| c.ground_texture as usize >= table.len())
        {
            return Err(TerrainError::Config(format!(
                "tileset remap has no entry for ground texture {}",
                corner.ground_texture
            )));
        }

        for (x, y) in self.grid.bounds().cells() {
            let corner = self.grid.at_mut(x, y);
            corner.ground_texture = table[corner.ground_texture as usize];
        }
        self.compositor = TextureCompositor::load(
            self.tileset,
            &tileset_ids,
            &self.cliffset_ids,
            ctx.catalog,
            &mut *ctx.assets,
            ctx.settings.texture_suffix(),
        );
        self.tileset_ids = tileset_ids;
        self.gpu.update_ground_textures(
            &self.grid,
            &self.compositor,
            self.grid.quad_bounds(),
            &mut *ctx.backend,
        );
        info!(tiles = self.tileset_ids.len(), "tileset changed");
        Ok(())
    }

    /// Hands the GPU set back to the backend.
    pub fn release(self, backend: &mut dyn GpuBackend) {
        self.gpu.release(backend);
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Bilinear sample of the rendered ground height at a grid position.
    pub fn interpolated_height(&self, x: f32, y: f32) -> f32 {
        let max_x = (self.width() as f32 - 1.01).max(0.0);
        let max_y = (self.height() as f32 - 1.01).max(0.0);
        let x = x.clamp(0.0, max_x);
        let y = y.clamp(0.0, max_y);

        let (x0, y0) = (x.floor() as i32, y.floor() as i32);
        let x1 = (x0 + 1).min(self.width() - 1);
        let y1 = (y0 + 1).min(self.height() - 1);
        let (fx, fy) = (x - x0 as f32, y - y0 as f32);

        let h = |cx, cy| self.grid.at(cx, cy).final_ground_height();
        let bottom = h(x0, y0) * (1.0 - fx) + h(x1, y0) * fx;
        let top = h(x0, y1) * (1.0 - fx) + h(x1, y1) * fx;
        bottom * (1.0 - fy) + top * fy
    }

    /// World position of the heightfield center.
    pub fn collision_origin(&self) -> Vector3<f32> {
        Vector3::new(
            self.width() as f32 / 2.0 - 0.5,
            self.height() as f32 / 2.0 - 0.5,
            0.0,
        )
    }

    pub fn register_collision(&self, sink: &mut dyn CollisionSink) {
        sink.register_heightfield(
            self.width() as u32,
            self.height() as u32,
            &self.mirrors().ground_corner_heights,
            self.collision_origin(),
        );
    }
}
