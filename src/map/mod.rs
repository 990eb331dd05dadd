pub mod brush;
pub mod catalog;
pub mod cliff;
pub mod corner;
pub mod doodad_brush;
pub mod gpu;
pub mod grid;
pub mod ground_texture;
pub mod minimap;
pub mod objects;
pub mod pathing;
pub mod terrain;
pub mod w3e;

use image::RgbaImage;
use tracing::info;

use crate::assets::{AssetStore, CollisionSink};
use crate::config::settings::EditorSettings;
use crate::error::Result;
use crate::math::{Rect, RectF};
use crate::undo::{TerrainEditKind, UndoEngine, UndoTarget};
use brush::{BrushShape, TerrainBrushOp};
use catalog::TerrainCatalog;
use corner::Corner;
use doodad_brush::{DoodadBrush, DoodadScene};
use gpu::GpuBackend;
use objects::{ObjectLayer, ObjectStore, PlacedObject};
use pathing::FootprintCache;
use terrain::{EditContext, Terrain};
use w3e::{TextureCode, W3eFile};

/// An open map: terrain, placed objects, undo history and the
/// collaborators they are edited through. Passed explicitly; there is no
/// global map.
pub struct Map<A: AssetStore, B: GpuBackend> {
    catalog: TerrainCatalog,
    settings: EditorSettings,
    assets: A,
    backend: B,
    collision: Option<Box<dyn CollisionSink>>,
    terrain: Terrain,
    units: ObjectStore,
    doodads: ObjectStore,
    undo: UndoEngine,
    /// A terrain stroke is open; applies join its undo group.
    stroke_open: bool,
    doodad_brush: DoodadBrush,
    footprints: FootprintCache,
}

/// Corner edits move the surface up to one cell past the edited corners.
fn influence(area: Rect) -> RectF {
    RectF::new(
        (area.x - 1) as f32,
        (area.y - 1) as f32,
        (area.width + 1) as f32,
        (area.height + 1) as f32,
    )
}

fn seat_objects(terrain: &Terrain, units: &mut ObjectStore, doodads: &mut ObjectStore, area: Rect, lock_z: bool) {
    let world = influence(area);
    let height_at = |x, y| terrain.interpolated_height(x, y);
    units.snap_to_terrain(world, height_at);
    if !lock_z {
        doodads.snap_to_terrain(world, height_at);
    }
}

fn register_collision(terrain: &Terrain, collision: &mut Option<Box<dyn CollisionSink>>) {
    if let Some(sink) = collision {
        terrain.register_collision(&mut **sink);
    }
}

impl<A: AssetStore, B: GpuBackend> Map<A, B> {
    /// Reads `war3map.w3e` from `assets` and builds the terrain.
    pub fn load(mut assets: A, catalog: TerrainCatalog, settings: EditorSettings, mut backend: B) -> Result<Self> {
        let terrain = Terrain::load(&mut EditContext {
            catalog: &catalog,
            settings: &settings,
            assets: &mut assets,
            backend: &mut backend,
        })?;
        Ok(Self::assemble(assets, catalog, settings, backend, terrain))
    }

    /// Opens a map from an already decoded terrain file.
    pub fn create(
        file: W3eFile,
        mut assets: A,
        catalog: TerrainCatalog,
        settings: EditorSettings,
        mut backend: B,
    ) -> Result<Self> {
        let terrain = Terrain::create(
            file,
            &mut EditContext {
                catalog: &catalog,
                settings: &settings,
                assets: &mut assets,
                backend: &mut backend,
            },
        )?;
        Ok(Self::assemble(assets, catalog, settings, backend, terrain))
    }

    fn assemble(assets: A, catalog: TerrainCatalog, settings: EditorSettings, backend: B, terrain: Terrain) -> Self {
        Self {
            undo: UndoEngine::new(settings.undo_limit),
            stroke_open: false,
            catalog,
            settings,
            assets,
            backend,
            collision: None,
            terrain,
            units: ObjectStore::new(),
            doodads: ObjectStore::new(),
            doodad_brush: DoodadBrush::new(),
            footprints: FootprintCache::new(),
        }
    }

    pub fn save(&mut self) -> Result<()> {
        self.terrain.save(&mut self.assets)
    }

    /// Releases the GPU set and hands the collaborators back.
    pub fn close(mut self) -> (A, B) {
        self.terrain.release(&mut self.backend);
        info!("map closed");
        (self.assets, self.backend)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    pub fn catalog(&self) -> &TerrainCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn assets(&self) -> &A {
        &self.assets
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn undo_engine(&self) -> &UndoEngine {
        &self.undo
    }

    pub fn objects(&self, layer: ObjectLayer) -> &ObjectStore {
        match layer {
            ObjectLayer::Units => &self.units,
            ObjectLayer::Doodads => &self.doodads,
        }
    }

    /// Adds a unit or doodad without recording undo, as when reading the
    /// placement files of a map.
    pub fn add_object(&mut self, layer: ObjectLayer, object: PlacedObject) -> objects::ObjectHandle {
        match layer {
            ObjectLayer::Units => self.units.add(object),
            ObjectLayer::Doodads => {
                self.footprints.load(&object.id, &self.catalog, &mut self.assets);
                self.doodads.add(object)
            }
        }
    }

    /// Selects the doodad type the brush places, loading its footprint.
    pub fn select_doodad(&mut self, id: &str) {
        let footprint = self.footprints.load(id, &self.catalog, &mut self.assets).cloned();
        self.doodad_brush.set_doodad(id, &self.catalog, footprint);
    }

    pub fn footprints(&self) -> &FootprintCache {
        &self.footprints
    }

    pub fn doodad_brush(&self) -> &DoodadBrush {
        &self.doodad_brush
    }

    /// The doodad brush together with the state its operations edit.
    pub fn doodad_edit(&mut self) -> (&mut DoodadBrush, DoodadScene<'_>) {
        (
            &mut self.doodad_brush,
            DoodadScene {
                doodads: &mut self.doodads,
                undo: &mut self.undo,
                terrain: &self.terrain,
                catalog: &self.catalog,
                footprints: &self.footprints,
                lock_z: self.settings.lock_doodad_z,
            },
        )
    }

    /// Installs the collision sink and registers the current surface.
    pub fn set_collision_sink(&mut self, sink: Box<dyn CollisionSink>) {
        self.collision = Some(sink);
        register_collision(&self.terrain, &mut self.collision);
    }

    pub fn minimap_image(&self) -> RgbaImage {
        minimap::minimap_image(&self.terrain)
    }

    // ========================================================================
    // Terrain edits
    // ========================================================================

    /// Opens a terrain stroke: every [`Map::apply_brush`] until
    /// [`Map::end_stroke`] is undone as one step.
    pub fn begin_stroke(&mut self) {
        self.undo.begin_group(self.terrain.grid());
        self.stroke_open = true;
    }

    pub fn end_stroke(&mut self) {
        self.stroke_open = false;
    }

    pub fn stroke_open(&self) -> bool {
        self.stroke_open
    }

    /// Applies the brush centered on corner `center`. Outside a stroke the
    /// apply is its own undo step.
    pub fn apply_brush(&mut self, shape: &BrushShape, center: (i32, i32), op: TerrainBrushOp) -> Rect {
        if !self.stroke_open {
            self.undo.begin_group(self.terrain.grid());
        }
        let area = brush::apply_brush(
            &mut self.terrain,
            &mut self.undo,
            shape,
            center,
            op,
            &mut EditContext {
                catalog: &self.catalog,
                settings: &self.settings,
                assets: &mut self.assets,
                backend: &mut self.backend,
            },
        );
        if area.is_empty() {
            return area;
        }
        if op.kind() != TerrainEditKind::Texture {
            register_collision(&self.terrain, &mut self.collision);
            seat_objects(
                &self.terrain,
                &mut self.units,
                &mut self.doodads,
                area,
                self.settings.lock_doodad_z,
            );
        }
        area
    }

    /// Grows or shrinks the map. Undo history does not survive a resize.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.terrain.resize(
            width,
            height,
            &mut EditContext {
                catalog: &self.catalog,
                settings: &self.settings,
                assets: &mut self.assets,
                backend: &mut self.backend,
            },
        )?;
        self.undo.clear();
        self.stroke_open = false;
        register_collision(&self.terrain, &mut self.collision);
        Ok(())
    }

    /// See [`Terrain::change_tileset`]. Clears undo history.
    pub fn change_tileset(&mut self, tileset_ids: Vec<TextureCode>, old_to_new: &[u8]) -> Result<()> {
        self.terrain.change_tileset(
            tileset_ids,
            old_to_new,
            &mut EditContext {
                catalog: &self.catalog,
                settings: &self.settings,
                assets: &mut self.assets,
                backend: &mut self.backend,
            },
        )?;
        self.undo.clear();
        self.stroke_open = false;
        Ok(())
    }

    // ========================================================================
    // Undo
    // ========================================================================

    fn undo_target(&mut self) -> (&mut UndoEngine, MapUndoTarget<'_>) {
        (
            &mut self.undo,
            MapUndoTarget {
                terrain: &mut self.terrain,
                units: &mut self.units,
                doodads: &mut self.doodads,
                collision: &mut self.collision,
                lock_z: self.settings.lock_doodad_z,
                ctx: EditContext {
                    catalog: &self.catalog,
                    settings: &self.settings,
                    assets: &mut self.assets,
                    backend: &mut self.backend,
                },
            },
        )
    }

    /// Undoing or redoing closes any open stroke.
    pub fn undo(&mut self) -> bool {
        self.stroke_open = false;
        let (engine, mut target) = self.undo_target();
        engine.undo(&mut target)
    }

    pub fn redo(&mut self) -> bool {
        self.stroke_open = false;
        let (engine, mut target) = self.undo_target();
        engine.redo(&mut target)
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }
}

/// Replays undo actions onto the parts of a [`Map`] they touch.
struct MapUndoTarget<'a> {
    terrain: &'a mut Terrain,
    units: &'a mut ObjectStore,
    doodads: &'a mut ObjectStore,
    collision: &'a mut Option<Box<dyn CollisionSink>>,
    lock_z: bool,
    ctx: EditContext<'a>,
}

impl MapUndoTarget<'_> {
    fn store(&mut self, layer: ObjectLayer) -> &mut ObjectStore {
        match layer {
            ObjectLayer::Units => &mut *self.units,
            ObjectLayer::Doodads => &mut *self.doodads,
        }
    }
}

impl UndoTarget for MapUndoTarget<'_> {
    fn restore_terrain(&mut self, area: Rect, kind: TerrainEditKind, corners: &[Corner]) {
        self.terrain.apply_corners(area, kind, corners, &mut self.ctx);
        if kind != TerrainEditKind::Texture {
            register_collision(self.terrain, self.collision);
            seat_objects(self.terrain, self.units, self.doodads, area, self.lock_z);
        }
    }

    fn insert_objects(&mut self, layer: ObjectLayer, objects: &[PlacedObject]) {
        let store = self.store(layer);
        for object in objects {
            store.add(object.clone());
        }
    }

    fn remove_objects(&mut self, layer: ObjectLayer, objects: &[PlacedObject]) {
        let store = self.store(layer);
        for object in objects {
            if let Some(handle) = store.find_by_creation(object.creation_number) {
                store.remove(handle);
            }
        }
    }

    fn replace_objects(&mut self, layer: ObjectLayer, objects: &[PlacedObject]) {
        let store = self.store(layer);
        for object in objects {
            if let Some(handle) = store.find_by_creation(object.creation_number) {
                store.update(handle, |placed| *placed = object.clone());
            }
        }
    }
}
