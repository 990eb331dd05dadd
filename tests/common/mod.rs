// Common test utilities and builders
#![allow(dead_code)]

use w3x_terrain_lib::assets::{GroundTextureInfo, MemoryAssets};
use w3x_terrain_lib::config::EditorSettings;
use w3x_terrain_lib::map::catalog::TerrainCatalog;
use w3x_terrain_lib::map::corner::Corner;
use w3x_terrain_lib::map::gpu::HeadlessBackend;
use w3x_terrain_lib::map::terrain::EditContext;
use w3x_terrain_lib::map::w3e::{TextureCode, W3eFile};
use w3x_terrain_lib::map::Map;

pub const DIRT: [u8; 4] = [120, 90, 60, 255];
pub const GRASS: [u8; 4] = [40, 120, 20, 255];

/// Every four-letter identifier over `A..=C` except `AAAA`.
pub fn cliff_identifiers() -> Vec<String> {
    let letters = ['A', 'B', 'C'];
    let mut ids = Vec::new();
    for a in letters {
        for b in letters {
            for c in letters {
                for d in letters {
                    let id: String = [a, b, c, d].iter().collect();
                    if id != "AAAA" {
                        ids.push(id);
                    }
                }
            }
        }
    }
    ids
}

/// Lordaeron dirt and grass, one cliff type on dirt, two variations for
/// every cliff identifier up to two layers tall.
pub fn catalog() -> TerrainCatalog {
    let mut catalog = TerrainCatalog::new();
    catalog.add_ground_tile(TextureCode::new("Ldrt"), "TerrainArt/LordaeronSummer", "Lords_Dirt");
    catalog.add_ground_tile(TextureCode::new("Lgrs"), "TerrainArt/LordaeronSummer", "Lords_Grass");
    catalog.add_cliff_type(TextureCode::new("CLdi"), TextureCode::new("Ldrt"));
    catalog.set_blight_texture(b'L', "TerrainArt/Blight/Lords_Blight");
    catalog.set_water_offset(b'L', -0.7);
    for id in cliff_identifiers() {
        catalog.set_cliff_variations(&id, 1);
    }
    catalog
}

/// Ground textures plus a mesh for every cliff the catalog lists.
pub fn assets() -> MemoryAssets {
    let mut assets = MemoryAssets::new();
    assets.insert_ground_texture(
        "TerrainArt/LordaeronSummer/Lords_Dirt.dds",
        GroundTextureInfo {
            extended: true,
            minimap_color: DIRT,
        },
    );
    assets.insert_ground_texture(
        "TerrainArt/LordaeronSummer/Lords_Grass.dds",
        GroundTextureInfo {
            extended: false,
            minimap_color: GRASS,
        },
    );
    assets.insert_ground_texture("TerrainArt/Blight/Lords_Blight.dds", GroundTextureInfo::default());
    for id in cliff_identifiers() {
        for variation in 0..=1 {
            assets.insert_file(&format!("Doodads/Terrain/Cliffs/Cliffs{id}{variation}.mdx"), b"MDLX".to_vec());
        }
    }
    assets
}

pub fn tiles() -> Vec<TextureCode> {
    vec![TextureCode::new("Ldrt"), TextureCode::new("Lgrs")]
}

/// Flat map at layer 2 with one cliff type.
pub fn flat_file(width: u32, height: u32) -> W3eFile {
    let mut file = W3eFile::blank(b'L', tiles(), width, height);
    file.cliffset_ids = vec![TextureCode::new("CLdi")];
    file
}

/// `layers` is row-major, bottom row first.
pub fn layered_file(width: u32, height: u32, layers: &[u8]) -> W3eFile {
    assert_eq!(layers.len(), (width * height) as usize);
    let mut file = flat_file(width, height);
    for (corner, layer) in file.corners.iter_mut().zip(layers) {
        corner.layer_height = *layer;
    }
    file
}

/// Deterministic pseudo-random layers in `0..=2`.
pub fn noisy_layers(width: u32, height: u32, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    (0..width * height)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            ((state >> 16) % 3) as u8
        })
        .collect()
}

pub fn open_map(file: W3eFile) -> Map<MemoryAssets, HeadlessBackend> {
    open_map_with(file, EditorSettings::default())
}

pub fn open_map_with(file: W3eFile, settings: EditorSettings) -> Map<MemoryAssets, HeadlessBackend> {
    Map::create(file, assets(), catalog(), settings, HeadlessBackend::new()).expect("map should open")
}

/// Bundles the collaborators a bare `Terrain` needs.
pub struct Harness {
    pub catalog: TerrainCatalog,
    pub settings: EditorSettings,
    pub assets: MemoryAssets,
    pub backend: HeadlessBackend,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            catalog: catalog(),
            settings: EditorSettings::default(),
            assets: assets(),
            backend: HeadlessBackend::new(),
        }
    }

    pub fn ctx(&mut self) -> EditContext<'_> {
        EditContext {
            catalog: &self.catalog,
            settings: &self.settings,
            assets: &mut self.assets,
            backend: &mut self.backend,
        }
    }
}

/// Whether every quad's `cliff` flag matches its corner layers.
pub fn cliff_flags_consistent(corners: &[Corner], width: usize, height: usize) -> bool {
    for y in 0..height - 1 {
        for x in 0..width - 1 {
            let at = |x: usize, y: usize| corners[y * width + x].layer_height;
            let layers = [at(x, y), at(x + 1, y), at(x, y + 1), at(x + 1, y + 1)];
            let uneven = layers.iter().any(|l| *l != layers[0]);
            if corners[y * width + x].cliff != uneven {
                return false;
            }
        }
    }
    true
}
