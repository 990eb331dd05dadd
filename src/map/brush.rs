//! Terrain brushes. Each apply edits the corners under a boolean mask and
//! recomputes the touched region once. A stroke is the undo group the
//! applies between press and release are recorded into.

use super::corner::Corner;
use super::terrain::{EditContext, Terrain};
use crate::error::{Result, TerrainError};
use crate::math::Rect;
use crate::undo::{TerrainEditKind, UndoEngine};

/// Cliff layers are stored in four bits.
const MAX_LAYER: u8 = 15;

/// Largest brush edge in corners.
pub const MAX_BRUSH_SIZE: u32 = 1024;

/// Square footprint in corners; `mask` is row-major, `size × size`.
/// Sizes are clamped to `1..=MAX_BRUSH_SIZE`.
#[derive(Debug, Clone, PartialEq)]
pub struct BrushShape {
    size: i32,
    mask: Vec<bool>,
}

impl BrushShape {
    pub fn square(size: u32) -> Self {
        let size = size.clamp(1, MAX_BRUSH_SIZE) as usize;
        Self {
            size: size as i32,
            mask: vec![true; size * size],
        }
    }

    pub fn circle(size: u32) -> Self {
        let size = size.clamp(1, MAX_BRUSH_SIZE) as i32;
        let radius = size as f32 / 2.0;
        let mask = Rect::new(0, 0, size, size)
            .cells()
            .map(|(x, y)| {
                let dx = x as f32 + 0.5 - radius;
                let dy = y as f32 + 0.5 - radius;
                dx * dx + dy * dy <= radius * radius
            })
            .collect();
        Self { size, mask }
    }

    pub fn from_mask(size: u32, mask: Vec<bool>) -> Result<Self> {
        if size == 0 || size > MAX_BRUSH_SIZE || mask.len() != size as usize * size as usize {
            return Err(TerrainError::Config(format!(
                "brush mask of {} cells does not fit size {size}",
                mask.len()
            )));
        }
        Ok(Self {
            size: size as i32,
            mask,
        })
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    /// Corner rectangle covered with the brush centered on `(x, y)`.
    pub fn area_at(&self, x: i32, y: i32) -> Rect {
        Rect::new(x - self.size / 2, y - self.size / 2, self.size, self.size)
    }

    /// Whether the mask covers `(dx, dy)`, relative to the area origin.
    pub fn contains(&self, dx: i32, dy: i32) -> bool {
        dx >= 0
            && dy >= 0
            && dx < self.size
            && dy < self.size
            && self.mask[(dy * self.size + dx) as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TerrainBrushOp {
    RaiseHeight(f32),
    LowerHeight(f32),
    PaintTexture { texture: u8, blight: bool },
    SetLayer(u8),
    RaiseLayer,
    LowerLayer,
    SetRamp(bool),
    SetWater { enabled: bool, height: f32 },
}

impl TerrainBrushOp {
    /// The recompute this operation needs.
    pub fn kind(&self) -> TerrainEditKind {
        match self {
            Self::RaiseHeight(_) | Self::LowerHeight(_) => TerrainEditKind::Height,
            Self::PaintTexture { .. } => TerrainEditKind::Texture,
            // water shares the full recompute
            Self::SetLayer(_) | Self::RaiseLayer | Self::LowerLayer | Self::SetRamp(_) | Self::SetWater { .. } => {
                TerrainEditKind::Cliff
            }
        }
    }

    fn apply(&self, corner: &mut Corner) {
        match *self {
            Self::RaiseHeight(amount) => corner.height += amount,
            Self::LowerHeight(amount) => corner.height -= amount,
            Self::PaintTexture { texture, blight } => {
                corner.ground_texture = texture;
                corner.blight = blight;
            }
            Self::SetLayer(layer) => corner.layer_height = layer.min(MAX_LAYER),
            Self::RaiseLayer => corner.layer_height = (corner.layer_height + 1).min(MAX_LAYER),
            Self::LowerLayer => corner.layer_height = corner.layer_height.saturating_sub(1),
            Self::SetRamp(ramp) => corner.ramp = ramp,
            Self::SetWater { enabled, height } => {
                corner.water = enabled;
                corner.water_height = height;
            }
        }
    }
}

/// Edits every masked corner, recomputes and records the change into the
/// open undo group. The caller opens the group with
/// [`UndoEngine::begin_group`]. Returns the clipped area, empty when the
/// brush is off the map.
pub fn apply_brush(
    terrain: &mut Terrain,
    undo: &mut UndoEngine,
    shape: &BrushShape,
    center: (i32, i32),
    op: TerrainBrushOp,
    ctx: &mut EditContext<'_>,
) -> Rect {
    let origin = shape.area_at(center.0, center.1);
    let kind = op.kind();
    let area = terrain.edit_corners(origin, kind, ctx, |x, y, corner| {
        if shape.contains(x - origin.x, y - origin.y) {
            op.apply(corner);
        }
    });
    undo.add_terrain_action(terrain.grid(), area, kind);
    area
}
