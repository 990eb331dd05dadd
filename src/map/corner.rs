use binrw::binrw;

/// Height values are stored as `raw = value * 512 + 8192`.
pub(crate) const HEIGHT_SCALE: f32 = 512.0;
pub(crate) const HEIGHT_BIAS: f32 = 8192.0;

const WATER_MASK: u16 = 0x3FFF;
const MAP_EDGE_BIT: u16 = 0x4000;

const TEXTURE_MASK: u8 = 0b0000_1111;
const RAMP_BIT: u8 = 0b0001_0000;
const BLIGHT_BIT: u8 = 0b0010_0000;
const WATER_BIT: u8 = 0b0100_0000;
const BOUNDARY_BIT: u8 = 0b1000_0000;

const GROUND_VARIATION_MASK: u8 = 0b0001_1111;
const CLIFF_VARIATION_SHIFT: u8 = 5;

const LAYER_MASK: u8 = 0b0000_1111;
const CLIFF_TEXTURE_SHIFT: u8 = 4;

/// One lattice point of the terrain.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Corner {
    pub height: f32,
    pub water_height: f32,
    pub water: bool,
    pub map_edge: bool,

    pub ground_texture: u8,
    pub ground_variation: u8,
    pub cliff_variation: u8,
    pub cliff_texture: u8,
    pub layer_height: u8,

    /// Authored ramp flag.
    pub ramp: bool,
    pub blight: bool,
    pub boundary: bool,

    /// Derived: the quad this corner anchors has non-uniform layer heights.
    pub cliff: bool,
    /// Derived: this corner is currently covered by a synthesized ramp.
    pub ramp_active: bool,
}

impl Corner {
    /// Elevation including the cliff layer, as rendered.
    pub fn final_ground_height(&self) -> f32 {
        self.height + self.layer_height as f32 - 2.0
    }

    pub fn final_water_height(&self, water_offset: f32) -> f32 {
        self.water_height + water_offset
    }

    pub fn from_record(record: &CornerRecord) -> Self {
        let water_raw = record.water_and_edge & WATER_MASK;
        Self {
            height: (record.height as f32 - HEIGHT_BIAS) / HEIGHT_SCALE,
            water_height: (water_raw as f32 - HEIGHT_BIAS) / HEIGHT_SCALE,
            map_edge: record.water_and_edge & MAP_EDGE_BIT != 0,

            ground_texture: record.texture_and_flags & TEXTURE_MASK,
            ramp: record.texture_and_flags & RAMP_BIT != 0,
            blight: record.texture_and_flags & BLIGHT_BIT != 0,
            water: record.texture_and_flags & WATER_BIT != 0,
            boundary: record.texture_and_flags & BOUNDARY_BIT != 0,

            ground_variation: record.variation & GROUND_VARIATION_MASK,
            cliff_variation: record.variation >> CLIFF_VARIATION_SHIFT,

            cliff_texture: record.misc >> CLIFF_TEXTURE_SHIFT,
            layer_height: record.misc & LAYER_MASK,

            cliff: false,
            ramp_active: false,
        }
    }

    pub fn to_record(&self) -> CornerRecord {
        let mut water_and_edge = quantize_height(self.water_height) & WATER_MASK;
        if self.map_edge {
            water_and_edge |= MAP_EDGE_BIT;
        }

        let mut texture_and_flags = self.ground_texture & TEXTURE_MASK;
        if self.ramp {
            texture_and_flags |= RAMP_BIT;
        }
        if self.blight {
            texture_and_flags |= BLIGHT_BIT;
        }
        if self.water {
            texture_and_flags |= WATER_BIT;
        }
        if self.boundary {
            texture_and_flags |= BOUNDARY_BIT;
        }

        CornerRecord {
            height: quantize_height(self.height),
            water_and_edge,
            texture_and_flags,
            variation: (self.ground_variation & GROUND_VARIATION_MASK)
                | (self.cliff_variation << CLIFF_VARIATION_SHIFT),
            misc: (self.cliff_texture << CLIFF_TEXTURE_SHIFT) | (self.layer_height & LAYER_MASK),
        }
    }
}

fn quantize_height(value: f32) -> u16 {
    (value * HEIGHT_SCALE + HEIGHT_BIAS)
        .round()
        .clamp(0.0, u16::MAX as f32) as u16
}

/// On-disk corner layout, 7 bytes.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CornerRecord {
    pub height: u16,
    pub water_and_edge: u16,
    pub texture_and_flags: u8,
    pub variation: u8,
    pub misc: u8,
}
