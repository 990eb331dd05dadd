use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Editor options persisted between sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorSettings {
    /// Number of undo groups kept before the oldest is dropped.
    pub undo_limit: usize,
    /// Root directory of the unpacked game data.
    pub asset_root: Option<PathBuf>,
    /// Prefer `_diffuse.dds` ground textures over the classic ones.
    pub hd_textures: bool,
    /// Keep the z of moved doodads instead of seating them on the ground.
    pub lock_doodad_z: bool,
    /// Where `terrain-cli` writes the minimap preview.
    pub minimap_path: Option<PathBuf>,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            undo_limit: 100,
            asset_root: None,
            hd_textures: false,
            lock_doodad_z: false,
            minimap_path: None,
        }
    }
}

impl EditorSettings {
    /// Reads settings from `path`, falling back to defaults when the file
    /// does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write settings: {}", path.display()))
    }

    /// Suffix appended to ground texture paths.
    pub fn texture_suffix(&self) -> &'static str {
        if self.hd_textures {
            "_diffuse.dds"
        } else {
            ".dds"
        }
    }
}
