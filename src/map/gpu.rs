//! Renderer-facing mirrors of the terrain and the seam to the GPU.
//!
//! Mirrors are flat row-major arrays. After the initial full upload every
//! edit re-derives only the touched sub-rectangle and pushes just that
//! rectangle through [`GpuBackend::upload`].

use std::collections::BTreeSet;

use bytemuck::Pod;
use tracing::debug;

use super::ground_texture::{TextureCompositor, TextureDescriptor};
use super::grid::Grid;
use crate::error::{Result, TerrainError};
use crate::math::Rect;

/// Raised onto corners at the mouth of a ramp so the slope meets the mesh.
const RAMP_LIP: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GpuLayer {
    GroundHeight,
    GroundCornerHeight,
    /// One texel per quad.
    GroundTexture,
    GroundExists,
    WaterHeight,
    WaterExists,
}

/// A set of terrain textures sized for one grid, released exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct GpuResources {
    pub id: u64,
    pub width: u32,
    pub height: u32,
}

pub trait GpuBackend {
    /// Creates storage for a `width × height` corner grid.
    fn allocate(&mut self, width: u32, height: u32) -> Result<GpuResources>;
    /// Replaces `region` of `layer`; `bytes` holds exactly that region,
    /// tightly packed row-major.
    fn upload(&mut self, resources: &GpuResources, layer: GpuLayer, region: Rect, bytes: &[u8]);
    fn release(&mut self, resources: GpuResources);
}

// ============================================================================
// Headless backend
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub resources: u64,
    pub layer: GpuLayer,
    pub region: Rect,
    pub bytes: usize,
}

/// Backend without a device. Records every call; used by the CLI and tests.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: u64,
    live: BTreeSet<u64>,
    released: Vec<u64>,
    uploads: Vec<UploadRecord>,
    fail_allocations: bool,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploads(&self) -> &[UploadRecord] {
        &self.uploads
    }

    pub fn clear_uploads(&mut self) {
        self.uploads.clear();
    }

    pub fn live_resources(&self) -> Vec<u64> {
        self.live.iter().copied().collect()
    }

    pub fn released(&self) -> &[u64] {
        &self.released
    }

    /// Makes subsequent allocations fail, simulating an exhausted device.
    pub fn set_fail_allocations(&mut self, fail: bool) {
        self.fail_allocations = fail;
    }
}

impl GpuBackend for HeadlessBackend {
    fn allocate(&mut self, width: u32, height: u32) -> Result<GpuResources> {
        if self.fail_allocations {
            return Err(TerrainError::Gpu("allocation refused".into()));
        }
        self.next_id += 1;
        self.live.insert(self.next_id);
        Ok(GpuResources {
            id: self.next_id,
            width,
            height,
        })
    }

    fn upload(&mut self, resources: &GpuResources, layer: GpuLayer, region: Rect, bytes: &[u8]) {
        debug_assert!(self.live.contains(&resources.id), "upload to released resources");
        self.uploads.push(UploadRecord {
            resources: resources.id,
            layer,
            region,
            bytes: bytes.len(),
        });
    }

    fn release(&mut self, resources: GpuResources) {
        self.live.remove(&resources.id);
        self.released.push(resources.id);
    }
}

// ============================================================================
// Mirrors
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TerrainMirrors {
    width: i32,
    height: i32,
    pub ground_heights: Vec<f32>,
    /// Final height including layer and ramp lip.
    pub ground_corner_heights: Vec<f32>,
    /// `(width - 1) × (height - 1)`.
    pub ground_texture_list: Vec<TextureDescriptor>,
    pub ground_exists: Vec<u8>,
    pub water_heights: Vec<f32>,
    pub water_exists: Vec<u8>,
}

impl TerrainMirrors {
    fn sized(width: i32, height: i32) -> Self {
        let corners = (width * height) as usize;
        let quads = ((width - 1).max(0) * (height - 1).max(0)) as usize;
        Self {
            width,
            height,
            ground_heights: vec![0.0; corners],
            ground_corner_heights: vec![0.0; corners],
            ground_texture_list: vec![[0; 4]; quads],
            ground_exists: vec![0; corners],
            water_heights: vec![0.0; corners],
            water_exists: vec![0; corners],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn corner_index(&self, x: i32, y: i32) -> usize {
        (y * self.width + x) as usize
    }

    pub fn quad_index(&self, x: i32, y: i32) -> usize {
        (y * (self.width - 1) + x) as usize
    }
}

fn corner_height(grid: &Grid, x: i32, y: i32) -> f32 {
    let corner = grid.at(x, y);
    let mut lip = 0.0;
    'search: for x_offset in -1..=0 {
        for y_offset in -1..=0 {
            let (qx, qy) = (x + x_offset, y + y_offset);
            let Some(base) = grid.quad_min_layer(qx, qy) else {
                continue;
            };
            if corner.layer_height != base {
                continue;
            }
            if grid.is_corner_ramp_entrance(qx, qy) {
                lip = RAMP_LIP;
                break 'search;
            }
        }
    }
    corner.final_ground_height() + lip
}

fn corner_exists(grid: &Grid, x: i32, y: i32) -> bool {
    let corner = grid.at(x, y);
    !((corner.cliff || corner.ramp_active) && !grid.is_corner_ramp_entrance(x, y))
}

/// Copies `region` out of a row-major array with `stride` columns.
fn gather<T: Pod>(data: &[T], stride: i32, region: Rect) -> Vec<T> {
    region
        .cells()
        .map(|(x, y)| data[(y * stride + x) as usize])
        .collect()
}

// ============================================================================
// Projection
// ============================================================================

#[derive(Debug)]
pub struct GpuProjection {
    mirrors: TerrainMirrors,
    resources: Option<GpuResources>,
}

impl GpuProjection {
    /// Allocates resources, derives every mirror and uploads them in full.
    pub fn create(grid: &Grid, compositor: &TextureCompositor, backend: &mut dyn GpuBackend) -> Result<Self> {
        let resources = backend.allocate(grid.width() as u32, grid.height() as u32)?;
        let mut projection = Self {
            mirrors: TerrainMirrors::sized(grid.width(), grid.height()),
            resources: Some(resources),
        };
        let corners = grid.bounds();
        projection.derive_heights(grid, corners);
        projection.derive_textures(grid, compositor, grid.quad_bounds());
        projection.derive_exists(grid, corners);
        projection.derive_water(grid, corners);
        projection.upload_all(backend);
        debug!(width = grid.width(), height = grid.height(), "terrain mirrors uploaded");
        Ok(projection)
    }

    /// Builds a projection for `grid` on fresh resources and only then
    /// releases the current ones. On failure the current set stays live.
    pub fn replace(
        &mut self,
        grid: &Grid,
        compositor: &TextureCompositor,
        backend: &mut dyn GpuBackend,
    ) -> Result<()> {
        let fresh = Self::create(grid, compositor, backend)?;
        let old = std::mem::replace(self, fresh);
        old.release(backend);
        Ok(())
    }

    pub fn release(mut self, backend: &mut dyn GpuBackend) {
        if let Some(resources) = self.resources.take() {
            backend.release(resources);
        }
    }

    pub fn mirrors(&self) -> &TerrainMirrors {
        &self.mirrors
    }

    pub fn resources(&self) -> Option<&GpuResources> {
        self.resources.as_ref()
    }

    fn push<T: Pod>(&self, backend: &mut dyn GpuBackend, layer: GpuLayer, data: &[T], stride: i32, region: Rect) {
        let Some(resources) = &self.resources else {
            return;
        };
        if region.is_empty() {
            return;
        }
        let packed = gather(data, stride, region);
        backend.upload(resources, layer, region, bytemuck::cast_slice(&packed));
    }

    fn upload_all(&self, backend: &mut dyn GpuBackend) {
        let m = &self.mirrors;
        let corners = Rect::new(0, 0, m.width, m.height);
        let quads = Rect::new(0, 0, m.width - 1, m.height - 1);
        self.push(backend, GpuLayer::GroundHeight, &m.ground_heights, m.width, corners);
        self.push(backend, GpuLayer::GroundCornerHeight, &m.ground_corner_heights, m.width, corners);
        self.push(backend, GpuLayer::GroundTexture, &m.ground_texture_list, m.width - 1, quads);
        self.push(backend, GpuLayer::GroundExists, &m.ground_exists, m.width, corners);
        self.push(backend, GpuLayer::WaterHeight, &m.water_heights, m.width, corners);
        self.push(backend, GpuLayer::WaterExists, &m.water_exists, m.width, corners);
    }

    fn derive_heights(&mut self, grid: &Grid, region: Rect) {
        for (x, y) in region.cells() {
            let index = self.mirrors.corner_index(x, y);
            self.mirrors.ground_heights[index] = grid.at(x, y).height;
            self.mirrors.ground_corner_heights[index] = corner_height(grid, x, y);
        }
    }

    fn derive_textures(&mut self, grid: &Grid, compositor: &TextureCompositor, region: Rect) {
        for (x, y) in region.cells() {
            let index = self.mirrors.quad_index(x, y);
            self.mirrors.ground_texture_list[index] = compositor.texture_descriptor(grid, x, y);
        }
    }

    fn derive_exists(&mut self, grid: &Grid, region: Rect) {
        for (x, y) in region.cells() {
            let index = self.mirrors.corner_index(x, y);
            self.mirrors.ground_exists[index] = corner_exists(grid, x, y) as u8;
        }
    }

    fn derive_water(&mut self, grid: &Grid, region: Rect) {
        for (x, y) in region.cells() {
            let index = self.mirrors.corner_index(x, y);
            let corner = grid.at(x, y);
            self.mirrors.water_heights[index] = corner.water_height;
            self.mirrors.water_exists[index] = corner.water as u8;
        }
    }

    // ========================================================================
    // Region updates
    // ========================================================================

    /// Corner heights depend on the quads around each corner.
    pub fn update_ground_heights(&mut self, grid: &Grid, area: Rect, backend: &mut dyn GpuBackend) -> Rect {
        let region = area.expanded(1).intersect(&grid.bounds());
        self.derive_heights(grid, region);
        let m = &self.mirrors;
        self.push(backend, GpuLayer::GroundHeight, &m.ground_heights, m.width, region);
        self.push(backend, GpuLayer::GroundCornerHeight, &m.ground_corner_heights, m.width, region);
        region
    }

    /// A quad's descriptor depends on its four corners and on cliffs one
    /// quad further out.
    pub fn update_ground_textures(
        &mut self,
        grid: &Grid,
        compositor: &TextureCompositor,
        area: Rect,
        backend: &mut dyn GpuBackend,
    ) -> Rect {
        let region = area.expanded(1).intersect(&grid.quad_bounds());
        self.derive_textures(grid, compositor, region);
        let m = &self.mirrors;
        self.push(backend, GpuLayer::GroundTexture, &m.ground_texture_list, m.width - 1, region);
        region
    }

    pub fn update_ground_exists(&mut self, grid: &Grid, area: Rect, backend: &mut dyn GpuBackend) -> Rect {
        let region = area.expanded(1).intersect(&grid.bounds());
        self.derive_exists(grid, region);
        let m = &self.mirrors;
        self.push(backend, GpuLayer::GroundExists, &m.ground_exists, m.width, region);
        region
    }

    pub fn update_water(&mut self, grid: &Grid, area: Rect, backend: &mut dyn GpuBackend) -> Rect {
        let region = area.intersect(&grid.bounds());
        self.derive_water(grid, region);
        let m = &self.mirrors;
        self.push(backend, GpuLayer::WaterHeight, &m.water_heights, m.width, region);
        self.push(backend, GpuLayer::WaterExists, &m.water_exists, m.width, region);
        region
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::GroundTextureInfo;
    use crate::map::corner::Corner;

    fn compositor() -> TextureCompositor {
        TextureCompositor::new(vec![GroundTextureInfo::default()], GroundTextureInfo::default(), vec![0])
    }

    fn flat(width: u32, height: u32) -> Grid {
        Grid::new(
            width,
            height,
            Corner {
                layer_height: 2,
                ..Default::default()
            },
        )
    }

    #[test]
    fn create_uploads_every_layer_once() {
        let mut backend = HeadlessBackend::new();
        let grid = flat(4, 3);
        let projection = GpuProjection::create(&grid, &compositor(), &mut backend).unwrap();
        assert_eq!(backend.uploads().len(), 6);
        let texture = backend
            .uploads()
            .iter()
            .find(|u| u.layer == GpuLayer::GroundTexture)
            .unwrap();
        assert_eq!(texture.region, Rect::new(0, 0, 3, 2));
        assert_eq!(texture.bytes, 3 * 2 * 8);
        assert_eq!(projection.mirrors().ground_texture_list.len(), 6);
        assert!(projection.mirrors().ground_exists.iter().all(|&e| e == 1));
    }

    #[test]
    fn region_update_uploads_only_the_halo() {
        let mut backend = HeadlessBackend::new();
        let mut grid = flat(8, 8);
        let mut projection = GpuProjection::create(&grid, &compositor(), &mut backend).unwrap();
        backend.clear_uploads();

        grid.at_mut(4, 4).height = 1.0;
        let region = projection.update_ground_heights(&grid, Rect::new(4, 4, 1, 1), &mut backend);
        assert_eq!(region, Rect::new(3, 3, 3, 3));
        assert_eq!(backend.uploads().len(), 2);
        assert!(backend.uploads().iter().all(|u| u.region == region && u.bytes == 9 * 4));
        let index = projection.mirrors().corner_index(4, 4);
        assert_eq!(projection.mirrors().ground_heights[index], 1.0);
        assert_eq!(projection.mirrors().ground_corner_heights[index], 1.0);
    }

    #[test]
    fn ramp_entrance_lifts_low_corners() {
        let mut backend = HeadlessBackend::new();
        let mut grid = flat(2, 2);
        for y in 0..2 {
            for x in 0..2 {
                grid.at_mut(x, y).ramp = true;
            }
        }
        grid.at_mut(1, 1).layer_height = 3;
        grid.refresh_cliff_flags();
        let projection = GpuProjection::create(&grid, &compositor(), &mut backend).unwrap();
        let m = projection.mirrors();
        assert_eq!(m.ground_corner_heights[m.corner_index(0, 0)], 0.5);
        assert_eq!(m.ground_corner_heights[m.corner_index(1, 1)], 1.0);
        // the entrance quad itself stays walkable
        assert_eq!(m.ground_exists[m.corner_index(0, 0)], 1);
    }

    #[test]
    fn replace_keeps_old_resources_on_failure() {
        let mut backend = HeadlessBackend::new();
        let grid = flat(3, 3);
        let mut projection = GpuProjection::create(&grid, &compositor(), &mut backend).unwrap();
        let first = projection.resources().unwrap().id;

        backend.set_fail_allocations(true);
        assert!(projection.replace(&flat(5, 5), &compositor(), &mut backend).is_err());
        assert_eq!(backend.live_resources(), vec![first]);
        assert_eq!(projection.mirrors().width(), 3);

        backend.set_fail_allocations(false);
        projection.replace(&flat(5, 5), &compositor(), &mut backend).unwrap();
        assert_eq!(backend.released(), &[first]);
        assert_eq!(backend.live_resources().len(), 1);
        assert_eq!(projection.mirrors().width(), 5);
    }
}
