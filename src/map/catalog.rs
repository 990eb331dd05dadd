//! Tileset and cliffset metadata normally pulled from the game's terrain
//! tables, plus the per-doodad limits the doodad brush enforces.

use std::collections::HashMap;

use tracing::debug;

use super::w3e::TextureCode;
use crate::config::Ini;

#[derive(Debug, Clone, PartialEq)]
pub struct GroundTile {
    pub dir: String,
    pub file: String,
}

impl GroundTile {
    /// Archive path of the ground texture without extension.
    pub fn path(&self) -> String {
        format!("{}/{}", self.dir, self.file)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CliffType {
    /// Ground tile painted on and next to the cliff.
    pub ground_tile: TextureCode,
    pub texture_dir: String,
    pub texture_file: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoodadLimits {
    pub min_scale: f32,
    pub max_scale: f32,
    /// Scale a fresh placement starts at.
    pub default_scale: f32,
    /// Degrees; `None` when the type rotates freely.
    pub fixed_rotation: Option<f32>,
    /// Destructibles scale uniformly.
    pub destructible: bool,
    /// Number of model variations, numbered from 0.
    pub variations: u32,
    pub pathing_texture: Option<String>,
}

impl Default for DoodadLimits {
    fn default() -> Self {
        Self {
            min_scale: 0.0,
            max_scale: f32::MAX,
            default_scale: 1.0,
            fixed_rotation: None,
            destructible: false,
            variations: 1,
            pathing_texture: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TerrainCatalog {
    ground_tiles: HashMap<TextureCode, GroundTile>,
    cliff_types: HashMap<TextureCode, CliffType>,
    /// Highest authored variation per 4-letter cliff identifier.
    cliff_variations: HashMap<String, u8>,
    blight_textures: HashMap<u8, String>,
    water_offsets: HashMap<u8, f32>,
    doodads: HashMap<String, DoodadLimits>,
}

impl TerrainCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a combined terrain table:
    ///
    /// ```text
    /// [Ldrt]            ground tile, keyed by code
    /// dir=TerrainArt\LordaeronSummer
    /// file=Lords_Dirt
    /// [CLdi]            cliff type
    /// groundtile=Ldrt
    /// texdir=ReplaceableTextures\Cliff
    /// texfile=Cliff0
    /// [CliffVariations]
    /// AAAB=1
    /// [TileSets]
    /// L=Lordaeron Summer,TerrainArt\Blight\Lords_Blight
    /// [LSha]            water row for tileset L
    /// height=-0.7
    /// ```
    pub fn from_ini(ini: &Ini) -> Self {
        let mut catalog = Self::new();

        for (name, section) in ini.sections() {
            if name.len() != 4 {
                continue;
            }
            let code = TextureCode::new(name);
            let first = |key: &str| {
                section
                    .get(key)
                    .and_then(|v| v.first())
                    .cloned()
                    .unwrap_or_default()
            };

            if section.contains_key("dir") {
                catalog.add_ground_tile(code, first("dir"), first("file"));
            } else if section.contains_key("groundtile") {
                catalog.cliff_types.insert(
                    code,
                    CliffType {
                        ground_tile: TextureCode::new(&first("groundtile")),
                        texture_dir: first("texdir"),
                        texture_file: first("texfile"),
                    },
                );
            } else if let Some(tileset) = name.strip_suffix("Sha") {
                if let (Some(&tileset), Some(height)) =
                    (tileset.as_bytes().first(), ini.data_as::<f32>(name, "height", 0))
                {
                    catalog.water_offsets.insert(tileset, height);
                }
            }
        }

        if let Some(variations) = ini.section("CliffVariations") {
            for key in variations.keys() {
                if let Some(count) = ini.data_as::<u8>("CliffVariations", key, 0) {
                    catalog.cliff_variations.insert(key.clone(), count);
                }
            }
        }

        if let Some(tilesets) = ini.section("TileSets") {
            for key in tilesets.keys() {
                let (Some(&tileset), Some(blight)) =
                    (key.as_bytes().first(), ini.data("TileSets", key, 1))
                else {
                    continue;
                };
                catalog.blight_textures.insert(tileset, blight.to_string());
            }
        }

        debug!(
            ground_tiles = catalog.ground_tiles.len(),
            cliff_types = catalog.cliff_types.len(),
            cliff_variations = catalog.cliff_variations.len(),
            "terrain catalog loaded"
        );
        catalog
    }

    /// Reads a doodad or destructible table keyed by type id.
    pub fn add_doodads_from_ini(&mut self, ini: &Ini, destructible: bool) {
        for (id, _) in ini.sections() {
            let fixed = ini.data_as::<f32>(id, "fixedRot", 0).unwrap_or(-1.0);
            // "_" is the table's empty value
            let pathing_texture = ini
                .data(id, "pathTex", 0)
                .filter(|path| !path.is_empty() && *path != "_")
                .map(str::to_string);
            self.doodads.insert(
                id.clone(),
                DoodadLimits {
                    min_scale: ini.data_as(id, "minScale", 0).unwrap_or(0.0),
                    max_scale: ini.data_as(id, "maxScale", 0).unwrap_or(f32::MAX),
                    default_scale: ini.data_as(id, "defScale", 0).unwrap_or(1.0),
                    fixed_rotation: (fixed >= 0.0).then_some(fixed),
                    destructible,
                    variations: ini.data_as(id, "numVar", 0).unwrap_or(1),
                    pathing_texture,
                },
            );
        }
    }

    pub fn add_ground_tile(&mut self, code: TextureCode, dir: impl Into<String>, file: impl Into<String>) {
        self.ground_tiles.insert(
            code,
            GroundTile {
                dir: dir.into(),
                file: file.into(),
            },
        );
    }

    pub fn add_cliff_type(&mut self, code: TextureCode, ground_tile: TextureCode) {
        self.cliff_types.insert(
            code,
            CliffType {
                ground_tile,
                texture_dir: String::new(),
                texture_file: String::new(),
            },
        );
    }

    pub fn set_cliff_variations(&mut self, identifier: &str, highest: u8) {
        self.cliff_variations.insert(identifier.to_string(), highest);
    }

    pub fn set_blight_texture(&mut self, tileset: u8, path: impl Into<String>) {
        self.blight_textures.insert(tileset, path.into());
    }

    pub fn set_water_offset(&mut self, tileset: u8, offset: f32) {
        self.water_offsets.insert(tileset, offset);
    }

    pub fn set_doodad_limits(&mut self, id: &str, limits: DoodadLimits) {
        self.doodads.insert(id.to_string(), limits);
    }

    pub fn ground_tile(&self, code: &TextureCode) -> Option<&GroundTile> {
        self.ground_tiles.get(code)
    }

    pub fn cliff_type(&self, code: &TextureCode) -> Option<&CliffType> {
        self.cliff_types.get(code)
    }

    pub fn cliff_variations(&self, identifier: &str) -> Option<u8> {
        self.cliff_variations.get(identifier).copied()
    }

    pub fn blight_texture(&self, tileset: u8) -> Option<&str> {
        self.blight_textures.get(&tileset).map(String::as_str)
    }

    pub fn water_offset(&self, tileset: u8) -> f32 {
        self.water_offsets.get(&tileset).copied().unwrap_or(0.0)
    }

    pub fn doodad_limits(&self, id: &str) -> DoodadLimits {
        self.doodads.get(id).cloned().unwrap_or_default()
    }
}
