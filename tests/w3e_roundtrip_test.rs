//! Terrain file read/write through the public map API.

#[path = "common/mod.rs"]
mod common;

use tempfile::TempDir;

use w3x_terrain_lib::assets::{AssetStore, DirectoryAssets};
use w3x_terrain_lib::error::TerrainError;
use w3x_terrain_lib::map::gpu::HeadlessBackend;
use w3x_terrain_lib::map::terrain::{Terrain, TERRAIN_FILE};
use w3x_terrain_lib::map::w3e::{parse_w3e, write_w3e, W3eFile};
use w3x_terrain_lib::map::Map;

fn varied_file() -> W3eFile {
    let mut file = common::layered_file(5, 4, &common::noisy_layers(5, 4, 7));
    for (i, corner) in file.corners.iter_mut().enumerate() {
        corner.height = (i % 3) as f32 * 0.25;
        corner.ground_texture = (i % 2) as u8;
        corner.ground_variation = (i % 17) as u8;
        corner.cliff_variation = (i % 4) as u8;
        corner.blight = i % 5 == 0;
        corner.water = i % 7 == 0;
        corner.water_height = 0.5;
        corner.map_edge = i < 5;
    }
    file.corners[6].ramp = true;
    file
}

#[test]
fn saving_an_unedited_map_is_byte_identical() {
    let source = write_w3e(&varied_file()).unwrap();
    let mut assets = common::assets();
    assets.insert_file(TERRAIN_FILE, source.clone());

    let mut map = Map::load(assets, common::catalog(), Default::default(), HeadlessBackend::new()).unwrap();
    map.save().unwrap();

    let saved = map.assets().read_file(TERRAIN_FILE).unwrap();
    assert_eq!(saved, source);
}

#[test]
fn derived_flags_do_not_reach_the_file() {
    let file = common::layered_file(3, 3, &[2, 2, 2, 2, 3, 2, 2, 2, 2]);
    let map = common::open_map(file.clone());
    assert!(map.terrain().grid().corners().iter().any(|c| c.cliff));

    let written = write_w3e(&map.terrain().to_w3e()).unwrap();
    assert_eq!(written, write_w3e(&file).unwrap());
}

#[test]
fn load_from_path_reads_a_map_directory() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(TERRAIN_FILE);
    std::fs::write(&path, write_w3e(&common::flat_file(4, 3)).unwrap()).unwrap();

    let mut harness = common::Harness::new();
    let terrain = Terrain::load_from_path(&path, &mut harness.ctx()).unwrap();
    assert_eq!((terrain.width(), terrain.height()), (4, 3));
    assert_eq!(terrain.tileset(), b'L');
    assert!((terrain.water_offset() + 0.7).abs() < 1e-6);
    terrain.release(&mut harness.backend);
    assert!(harness.backend.live_resources().is_empty());
}

#[test]
fn load_from_missing_path_names_the_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(TERRAIN_FILE);
    let mut harness = common::Harness::new();
    let err = Terrain::load_from_path(&path, &mut harness.ctx()).unwrap_err();
    assert!(format!("{err:#}").contains("war3map.w3e"));
}

#[test]
fn directory_store_persists_the_terrain() {
    let dir = TempDir::new().unwrap();
    let mut harness = common::Harness::new();
    let terrain = Terrain::create(varied_file(), &mut harness.ctx()).unwrap();

    let mut store = DirectoryAssets::new(dir.path());
    terrain.save(&mut store).unwrap();

    let on_disk = std::fs::read(dir.path().join(TERRAIN_FILE)).unwrap();
    let reparsed = parse_w3e(&on_disk).unwrap();
    assert_eq!(reparsed.width, 5);
    assert_eq!(reparsed.height, 4);
    assert_eq!(reparsed.tileset_ids, common::tiles());
    assert_eq!(on_disk, write_w3e(&terrain.to_w3e()).unwrap());
}

#[test]
fn bad_signature_is_a_format_error() {
    let mut bytes = write_w3e(&common::flat_file(2, 2)).unwrap();
    bytes[..4].copy_from_slice(b"W3X!");
    assert!(matches!(parse_w3e(&bytes), Err(TerrainError::Format(_))));
}

#[test]
fn truncated_records_are_a_format_error() {
    let bytes = write_w3e(&common::flat_file(3, 3)).unwrap();
    let cut = &bytes[..bytes.len() - 3];
    assert!(matches!(parse_w3e(cut), Err(TerrainError::Format(_))));

    let header_only = &bytes[..10];
    assert!(matches!(parse_w3e(header_only), Err(TerrainError::Format(_))));
}

#[test]
fn map_load_fails_without_terrain_file() {
    let result = Map::load(common::assets(), common::catalog(), Default::default(), HeadlessBackend::new());
    assert!(matches!(result, Err(TerrainError::Asset { .. })));
}
