//! `war3map.w3e`: tileset header followed by the corner lattice.

use std::fmt;
use std::io::Cursor;

use binrw::{binrw, BinRead, BinWrite, VecArgs};
use cgmath::Vector2;
use tracing::{debug, warn};

use super::corner::{Corner, CornerRecord};
use crate::error::{Result, TerrainError};
use crate::math::LwVector2;

// ============================================================================
// Format constants
// ============================================================================

pub const W3E_MAGIC: &[u8; 4] = b"W3E!";
pub const WRITE_VERSION: u32 = 8;
const NEWEST_KNOWN_VERSION: u32 = 11;
const CORNER_RECORD_SIZE: usize = 7;

/// Four ASCII characters naming a ground or cliff texture, e.g. `Ldrt`.
#[binrw]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct TextureCode(pub [u8; 4]);

impl TextureCode {
    pub fn new(code: &str) -> Self {
        let mut raw = [b' '; 4];
        for (dst, src) in raw.iter_mut().zip(code.bytes()) {
            *dst = src;
        }
        Self(raw)
    }

    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl fmt::Debug for TextureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextureCode({:?})", self.as_string())
    }
}

impl fmt::Display for TextureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

/// Everything before the corner records.
#[binrw]
#[brw(little, magic = b"W3E!")]
#[derive(Debug, Clone, PartialEq)]
pub struct W3eHeader {
    pub version: u32,
    pub tileset: u8,
    pub custom_tileset: u32,

    #[br(temp)]
    #[bw(calc = tileset_ids.len() as u32)]
    tile_count: u32,
    #[br(count = tile_count)]
    pub tileset_ids: Vec<TextureCode>,

    #[br(temp)]
    #[bw(calc = cliffset_ids.len() as u32)]
    cliff_count: u32,
    #[br(count = cliff_count)]
    pub cliffset_ids: Vec<TextureCode>,

    pub width: u32,
    pub height: u32,
    pub offset: LwVector2,
}

/// Decoded terrain file. Corners are row-major, `y * width + x`.
#[derive(Debug, Clone, PartialEq)]
pub struct W3eFile {
    pub tileset: u8,
    pub tileset_ids: Vec<TextureCode>,
    pub cliffset_ids: Vec<TextureCode>,
    pub width: u32,
    pub height: u32,
    pub offset: Vector2<f32>,
    pub corners: Vec<Corner>,
}

impl W3eFile {
    /// Flat map of the given size, every corner at height 0 and layer 2.
    pub fn blank(tileset: u8, tileset_ids: Vec<TextureCode>, width: u32, height: u32) -> Self {
        let corner = Corner {
            layer_height: 2,
            water_height: -1.0,
            ..Default::default()
        };
        Self {
            tileset,
            tileset_ids,
            cliffset_ids: Vec::new(),
            width,
            height,
            offset: Vector2::new(
                -(width.saturating_sub(1) as f32) * 64.0,
                -(height.saturating_sub(1) as f32) * 64.0,
            ),
            corners: vec![corner; width as usize * height as usize],
        }
    }
}

/// Field errors arrive wrapped in backtrace frames; classify by root cause.
fn map_read_error(err: binrw::Error) -> TerrainError {
    if matches!(err.root_cause(), binrw::Error::BadMagic { .. }) {
        return TerrainError::format("signature is not W3E!");
    }
    if err.is_eof() {
        return TerrainError::format("terrain file is truncated");
    }
    TerrainError::Binary(err)
}

// ============================================================================
// Read / write
// ============================================================================

pub fn parse_w3e(data: &[u8]) -> Result<W3eFile> {
    let mut cursor = Cursor::new(data);
    let header = W3eHeader::read(&mut cursor).map_err(map_read_error)?;

    if header.version > NEWEST_KNOWN_VERSION {
        warn!(version = header.version, "unexpected w3e version, reading anyway");
    }
    if header.width == 0 || header.height == 0 {
        return Err(TerrainError::format(format!(
            "terrain dimensions {}x{} are empty",
            header.width, header.height
        )));
    }

    let count = (header.width as usize)
        .checked_mul(header.height as usize)
        .ok_or_else(|| TerrainError::format("map dimensions overflow"))?;
    let needed = count
        .checked_mul(CORNER_RECORD_SIZE)
        .ok_or_else(|| TerrainError::format("map dimensions overflow"))?;
    let remaining = data.len().saturating_sub(cursor.position() as usize);
    if remaining < needed {
        return Err(TerrainError::format(format!(
            "expected {} corner records, only {} bytes left",
            count, remaining
        )));
    }

    let records: Vec<CornerRecord> = BinRead::read_options(
        &mut cursor,
        binrw::Endian::Little,
        VecArgs {
            count,
            inner: (),
        },
    )
    .map_err(map_read_error)?;

    debug!(
        width = header.width,
        height = header.height,
        tiles = header.tileset_ids.len(),
        cliffs = header.cliffset_ids.len(),
        "parsed w3e"
    );

    Ok(W3eFile {
        tileset: header.tileset,
        tileset_ids: header.tileset_ids,
        cliffset_ids: header.cliffset_ids,
        width: header.width,
        height: header.height,
        offset: header.offset.0,
        corners: records.iter().map(Corner::from_record).collect(),
    })
}

/// Always writes version 8 with the custom-tileset flag set.
pub fn write_w3e(file: &W3eFile) -> Result<Vec<u8>> {
    let header = W3eHeader {
        version: WRITE_VERSION,
        tileset: file.tileset,
        custom_tileset: 1,
        tileset_ids: file.tileset_ids.clone(),
        cliffset_ids: file.cliffset_ids.clone(),
        width: file.width,
        height: file.height,
        offset: LwVector2(file.offset),
    };

    let mut writer = Cursor::new(Vec::with_capacity(
        64 + file.corners.len() * CORNER_RECORD_SIZE,
    ));
    header.write(&mut writer)?;
    for corner in &file.corners {
        corner.to_record().write_le(&mut writer)?;
    }
    Ok(writer.into_inner())
}
