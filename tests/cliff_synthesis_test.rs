//! Cliff placements derived from corner layers.

#[path = "common/mod.rs"]
mod common;

use w3x_terrain_lib::map::brush::{BrushShape, TerrainBrushOp};
use w3x_terrain_lib::map::cliff::PlacementKind;
use w3x_terrain_lib::map::ground_texture::EMPTY_TEXTURE_SLOT;
use w3x_terrain_lib::map::terrain::Terrain;
use w3x_terrain_lib::math::Rect;
use w3x_terrain_lib::undo::TerrainEditKind;

fn identifiers(terrain: &Terrain) -> Vec<&str> {
    terrain
        .cliff_placements()
        .iter()
        .map(|p| p.identifier.as_str())
        .collect()
}

#[test]
fn flat_map_has_no_cliffs_and_plain_descriptors() {
    let map = common::open_map(common::flat_file(4, 4));
    let terrain = map.terrain();

    assert!(terrain.cliff_placements().is_empty());
    assert!(terrain.grid().corners().iter().all(|c| !c.cliff && !c.ramp_active));
    assert_eq!(terrain.mirrors().ground_texture_list.len(), 9);
    // dirt is extended, variation 0 maps to sub-tile 16
    for descriptor in &terrain.mirrors().ground_texture_list {
        assert_eq!(
            *descriptor,
            [16 << 5, EMPTY_TEXTURE_SLOT, EMPTY_TEXTURE_SLOT, EMPTY_TEXTURE_SLOT]
        );
    }
    assert!(terrain.mirrors().ground_exists.iter().all(|e| *e == 1));
}

#[test]
fn identifier_reads_top_left_first() {
    // bottom-left lower than the rest
    let map = common::open_map(common::layered_file(2, 2, &[0, 1, 1, 1]));
    assert_eq!(identifiers(map.terrain()), vec!["BBBA0"]);

    // only top-left raised
    let map = common::open_map(common::layered_file(2, 2, &[0, 0, 1, 0]));
    assert_eq!(identifiers(map.terrain()), vec!["BAAA0"]);
}

#[test]
fn variation_is_clamped_to_the_highest_authored() {
    let mut file = common::layered_file(2, 2, &[0, 1, 1, 1]);
    file.corners[0].cliff_variation = 5;
    let map = common::open_map(file);
    assert_eq!(identifiers(map.terrain()), vec!["BBBA1"]);
    assert_eq!(map.terrain().cliff_placements()[0].kind, PlacementKind::Cliff);
}

#[test]
fn uniform_quads_are_never_placed() {
    let mut catalog = common::catalog();
    catalog.set_cliff_variations("AAAA", 0);
    let mut assets = common::assets();
    assets.insert_file("Doodads/Terrain/Cliffs/CliffsAAAA0.mdx", b"MDLX".to_vec());

    let map = w3x_terrain_lib::map::Map::create(
        common::flat_file(3, 3),
        assets,
        catalog,
        Default::default(),
        w3x_terrain_lib::map::gpu::HeadlessBackend::new(),
    )
    .unwrap();
    assert!(map.terrain().cliff_placements().is_empty());
}

#[test]
fn raised_plateau_places_ring() {
    let layers = [
        2, 2, 2, 2, //
        2, 3, 3, 2, //
        2, 2, 2, 2, //
    ];
    let map = common::open_map(common::layered_file(4, 3, &layers));
    insta::assert_debug_snapshot!(identifiers(map.terrain()), @r###"
    [
        "ABAA0",
        "AABA0",
        "BBAA0",
        "AABB0",
        "BAAA0",
        "AAAB0",
    ]
    "###);

    let anchors: Vec<(i32, i32)> = map
        .terrain()
        .cliff_placements()
        .iter()
        .map(|p| (p.x, p.y))
        .collect();
    assert_eq!(anchors, vec![(0, 0), (0, 1), (1, 0), (1, 1), (2, 0), (2, 1)]);
}

#[test]
fn every_placement_sits_on_a_cliff_quad() {
    for seed in 0..6 {
        let (width, height) = (9, 7);
        let map = common::open_map(common::layered_file(width, height, &common::noisy_layers(width, height, seed)));
        let terrain = map.terrain();
        let grid = terrain.grid();

        assert!(common::cliff_flags_consistent(grid.corners(), width as usize, height as usize));
        for placement in terrain.cliff_placements() {
            assert!(grid.quad_in_bounds(placement.x, placement.y));
            if placement.kind == PlacementKind::Cliff {
                assert!(grid.at(placement.x, placement.y).cliff, "seed {seed} at {placement:?}");
                assert!(!placement.identifier.starts_with("AAAA"));
            }
        }
        let cliff_quads = grid.corners().iter().filter(|c| c.cliff).count();
        assert_eq!(terrain.cliff_placements().len(), cliff_quads, "seed {seed}");
    }
}

#[test]
fn recompute_over_unchanged_corners_is_idempotent() {
    let (width, height) = (8, 8);
    let mut harness = common::Harness::new();
    let file = common::layered_file(width, height, &common::noisy_layers(width, height, 3));
    let mut terrain = Terrain::create(file, &mut harness.ctx()).unwrap();
    let placements = terrain.cliff_placements().to_vec();
    let grid = terrain.grid().clone();
    let mirrors = terrain.mirrors().clone();

    let bounds = terrain.grid().bounds();
    terrain.recompute(Rect::new(2, 2, 3, 3), TerrainEditKind::Cliff, &mut harness.ctx());
    terrain.recompute(bounds, TerrainEditKind::Cliff, &mut harness.ctx());

    assert_eq!(terrain.cliff_placements(), placements.as_slice());
    assert_eq!(terrain.grid(), &grid);
    assert_eq!(terrain.mirrors(), &mirrors);
}

#[test]
fn local_edit_matches_full_rebuild() {
    let (width, height) = (10, 10);
    let layers = common::noisy_layers(width, height, 11);
    let mut map = common::open_map(common::layered_file(width, height, &layers));

    map.apply_brush(&BrushShape::square(3), (4, 5), TerrainBrushOp::RaiseLayer);
    map.apply_brush(&BrushShape::circle(4), (7, 2), TerrainBrushOp::SetLayer(0));

    // mesh handles depend on load order, so compare by name
    let rebuilt = common::open_map(map.terrain().to_w3e());
    let named = |terrain: &Terrain| {
        terrain
            .cliff_placements()
            .iter()
            .map(|p| (p.x, p.y, p.kind, p.identifier.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(named(map.terrain()), named(rebuilt.terrain()));
    assert_eq!(map.terrain().grid(), rebuilt.terrain().grid());
    assert_eq!(
        map.terrain().mirrors().ground_texture_list,
        rebuilt.terrain().mirrors().ground_texture_list
    );
    assert_eq!(map.terrain().mirrors().ground_exists, rebuilt.terrain().mirrors().ground_exists);
}

#[test]
fn cliff_quads_hide_ground() {
    let map = common::open_map(common::layered_file(3, 3, &[2, 2, 2, 2, 3, 2, 2, 2, 2]));
    let mirrors = map.terrain().mirrors();
    let index = |x: i32, y: i32| mirrors.corner_index(x, y);
    // every quad touches the raised center
    assert_eq!(mirrors.ground_exists[index(0, 0)], 0);
    assert_eq!(mirrors.ground_exists[index(1, 1)], 0);
}
