//! Collaborator seams the terrain core consumes: an asset store that can
//! answer "does this file exist", hand out mesh and ground texture handles
//! and persist bytes, plus a sink for the static collision surface.
//!
//! Model parsing is not done here; a store only reports the metadata the
//! terrain needs. Pathing textures are the one image read in full, since
//! doodad placement checks their cells.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use cgmath::Vector3;
use tracing::{debug, warn};

use crate::error::{Result, TerrainError};

/// Opaque handle to a loaded cliff/ramp mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u32);

/// What the compositor and minimap need to know about a ground texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundTextureInfo {
    /// Texture atlas is twice as wide as it is tall and carries the 16
    /// extra variation tiles.
    pub extended: bool,
    pub minimap_color: [u8; 4],
}

impl Default for GroundTextureInfo {
    fn default() -> Self {
        Self {
            extended: false,
            minimap_color: [128, 128, 128, 255],
        }
    }
}

/// Pathing cell flags, as painted into pathing textures.
pub const UNWALKABLE: u8 = 0b0010;
pub const UNFLYABLE: u8 = 0b0100;
pub const UNBUILDABLE: u8 = 0b1000;

/// Footprint of a doodad type, one cell per pathing cell (a quarter of a
/// grid unit). `cells` is row-major with row 0 at the lowest y.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathingTexture {
    pub width: u32,
    pub height: u32,
    pub cells: Vec<u8>,
}

impl PathingTexture {
    /// Red marks unwalkable, green unflyable and blue unbuildable. Channels
    /// are thresholded at 250 since authored textures are not always clean.
    pub fn from_rgba(image: &image::RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let mut cells = Vec::with_capacity(width as usize * height as usize);
        for row in (0..height).rev() {
            for x in 0..width {
                let [r, g, b, _] = image.get_pixel(x, row).0;
                let mut flags = 0;
                if r > 250 {
                    flags |= UNWALKABLE;
                }
                if g > 250 {
                    flags |= UNFLYABLE;
                }
                if b > 250 {
                    flags |= UNBUILDABLE;
                }
                cells.push(flags);
            }
        }
        Self { width, height, cells }
    }

    pub fn at(&self, x: u32, y: u32) -> u8 {
        self.cells[(y * self.width + x) as usize]
    }

    /// Every cell carries the same flags.
    pub fn homogeneous(&self) -> bool {
        self.cells.windows(2).all(|pair| pair[0] == pair[1])
    }

    pub fn is_square(&self) -> bool {
        self.width == self.height
    }
}

pub trait AssetStore {
    fn file_exists(&self, path: &str) -> bool;
    fn read_file(&self, path: &str) -> Result<Vec<u8>>;
    fn write_file(&mut self, path: &str, bytes: &[u8]) -> Result<()>;
    fn load_mesh(&mut self, path: &str) -> Result<MeshHandle>;
    fn load_ground_texture(&mut self, path: &str) -> Result<GroundTextureInfo>;
    fn load_pathing_texture(&mut self, path: &str) -> Result<PathingTexture>;
}

/// Receives the heightfield used for picking and unit collision.
pub trait CollisionSink {
    /// Replaces any previously registered surface. `heights` is row-major
    /// `width × height`, `origin` the world position of its center.
    fn register_heightfield(&mut self, width: u32, height: u32, heights: &[f32], origin: Vector3<f32>);
}

/// Archive paths use either separator and are case-insensitive.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").to_ascii_lowercase()
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryAssets {
    files: HashMap<String, Vec<u8>>,
    ground_textures: HashMap<String, GroundTextureInfo>,
    meshes: HashMap<String, MeshHandle>,
    pathing_textures: HashMap<String, PathingTexture>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_file(&mut self, path: &str, bytes: impl Into<Vec<u8>>) {
        self.files.insert(normalize_path(path), bytes.into());
    }

    pub fn insert_ground_texture(&mut self, path: &str, info: GroundTextureInfo) {
        let key = normalize_path(path);
        self.files.entry(key.clone()).or_default();
        self.ground_textures.insert(key, info);
    }

    pub fn insert_pathing_texture(&mut self, path: &str, texture: PathingTexture) {
        let key = normalize_path(path);
        self.files.entry(key.clone()).or_default();
        self.pathing_textures.insert(key, texture);
    }

    pub fn loaded_mesh_count(&self) -> usize {
        self.meshes.len()
    }
}

impl AssetStore for MemoryAssets {
    fn file_exists(&self, path: &str) -> bool {
        self.files.contains_key(&normalize_path(path))
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.files
            .get(&normalize_path(path))
            .cloned()
            .ok_or_else(|| TerrainError::asset(path, "not found"))
    }

    fn write_file(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        self.files.insert(normalize_path(path), bytes.to_vec());
        Ok(())
    }

    fn load_mesh(&mut self, path: &str) -> Result<MeshHandle> {
        let key = normalize_path(path);
        if !self.files.contains_key(&key) {
            return Err(TerrainError::asset(path, "mesh not found"));
        }
        let next = MeshHandle(self.meshes.len() as u32);
        Ok(*self.meshes.entry(key).or_insert(next))
    }

    fn load_ground_texture(&mut self, path: &str) -> Result<GroundTextureInfo> {
        let key = normalize_path(path);
        if let Some(info) = self.ground_textures.get(&key) {
            return Ok(*info);
        }
        if self.files.contains_key(&key) {
            return Ok(GroundTextureInfo::default());
        }
        Err(TerrainError::asset(path, "ground texture not found"))
    }

    fn load_pathing_texture(&mut self, path: &str) -> Result<PathingTexture> {
        self.pathing_textures
            .get(&normalize_path(path))
            .cloned()
            .ok_or_else(|| TerrainError::asset(path, "pathing texture not found"))
    }
}

// ============================================================================
// Directory store
// ============================================================================

/// Asset store backed by an unpacked data directory.
#[derive(Debug)]
pub struct DirectoryAssets {
    root: PathBuf,
    meshes: HashMap<String, MeshHandle>,
}

impl DirectoryAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            meshes: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves an archive path, trying the authored casing first and the
    /// lowercased form second.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let authored = self.root.join(path.replace('\\', "/"));
        if authored.exists() {
            return Some(authored);
        }
        let lowered = self.root.join(normalize_path(path));
        lowered.exists().then_some(lowered)
    }
}

/// Approximates a minimap color by averaging the first tile of the atlas.
fn ground_texture_info_from_image(path: &Path) -> Option<GroundTextureInfo> {
    let image = image::open(path).ok()?.to_rgba8();
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return None;
    }
    let tile = (height / 4).max(1);
    let mut sum = [0u64; 4];
    let mut count = 0u64;
    for y in 0..tile.min(height) {
        for x in 0..tile.min(width) {
            let p = image.get_pixel(x, y).0;
            for c in 0..4 {
                sum[c] += p[c] as u64;
            }
            count += 1;
        }
    }
    let avg = |c: usize| (sum[c] / count.max(1)) as u8;
    Some(GroundTextureInfo {
        extended: width == height * 2,
        minimap_color: [avg(0), avg(1), avg(2), 255],
    })
}

impl AssetStore for DirectoryAssets {
    fn file_exists(&self, path: &str) -> bool {
        self.resolve(path).is_some()
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let resolved = self
            .resolve(path)
            .ok_or_else(|| TerrainError::asset(path, "not found"))?;
        Ok(std::fs::read(resolved)?)
    }

    fn write_file(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        let target = self.root.join(path.replace('\\', "/"));
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, bytes)?;
        debug!(path = %target.display(), bytes = bytes.len(), "wrote map file");
        Ok(())
    }

    fn load_mesh(&mut self, path: &str) -> Result<MeshHandle> {
        if self.resolve(path).is_none() {
            return Err(TerrainError::asset(path, "mesh not found"));
        }
        let next = MeshHandle(self.meshes.len() as u32);
        Ok(*self.meshes.entry(normalize_path(path)).or_insert(next))
    }

    fn load_ground_texture(&mut self, path: &str) -> Result<GroundTextureInfo> {
        let resolved = self
            .resolve(path)
            .or_else(|| {
                let png = Path::new(path).with_extension("png");
                self.resolve(&png.to_string_lossy())
            })
            .ok_or_else(|| TerrainError::asset(path, "ground texture not found"))?;

        match ground_texture_info_from_image(&resolved) {
            Some(info) => Ok(info),
            None => {
                warn!(path = %resolved.display(), "ground texture format not decodable, using defaults");
                Ok(GroundTextureInfo::default())
            }
        }
    }

    fn load_pathing_texture(&mut self, path: &str) -> Result<PathingTexture> {
        let resolved = self
            .resolve(path)
            .ok_or_else(|| TerrainError::asset(path, "pathing texture not found"))?;
        let image = image::open(&resolved)
            .map_err(|err| TerrainError::asset(path, err.to_string()))?
            .to_rgba8();
        debug!(path = %resolved.display(), width = image.width(), height = image.height(), "loaded pathing texture");
        Ok(PathingTexture::from_rgba(&image))
    }
}
