//! Doodad placement, selection, clipboard and transform operations.
//!
//! The selection holds creation numbers so it survives delete and undo.
//! Every operation that changes placed doodads records exactly one undo
//! group; a placement stroke collects all of its doodads into one.

use std::collections::BTreeSet;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, TAU};

use cgmath::{Vector2, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::catalog::{DoodadLimits, TerrainCatalog};
use super::objects::{ObjectHandle, ObjectLayer, ObjectStore, PlacedObject};
use super::pathing::{FootprintCache, PathingMap};
use super::terrain::Terrain;
use crate::assets::{PathingTexture, UNBUILDABLE, UNFLYABLE, UNWALKABLE};
use crate::math::RectF;
use crate::undo::{UndoAction, UndoEngine};

/// Everything a doodad operation reads or writes.
pub struct DoodadScene<'a> {
    pub doodads: &'a mut ObjectStore,
    pub undo: &'a mut UndoEngine,
    pub terrain: &'a Terrain,
    pub catalog: &'a TerrainCatalog,
    /// Footprints of the doodad types on the map.
    pub footprints: &'a FootprintCache,
    /// Keep z when moving instead of seating on the ground.
    pub lock_z: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    Replace,
    Add,
    Remove,
}

/// Which properties are rerolled after each placement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Randomize {
    pub variation: bool,
    pub rotation: bool,
    pub scale: bool,
}

/// The doodad type the brush places and the properties of the next copy.
#[derive(Debug, Clone, PartialEq)]
struct Stamp {
    id: String,
    variation: u32,
    /// Radians.
    rotation: f32,
    scale: f32,
    min_scale: f32,
    max_scale: f32,
    fixed_rotation: bool,
    footprint: Option<PathingTexture>,
}

#[derive(Debug, Clone)]
struct DragState {
    last: Vector2<f32>,
    before: Vec<PlacedObject>,
}

/// Centers on the half-cell pathing lattice, which sits a quarter cell off
/// the corner grid.
fn snap_to_pathing(value: f32) -> f32 {
    (value * 2.0 + 0.5).round() / 2.0 - 0.25
}

/// Nearest quarter turn, counting from east.
pub fn quarter_turn(angle: f32) -> f32 {
    let turns = ((angle.rem_euclid(TAU) + FRAC_PI_4) / FRAC_PI_2) as i32 % 4;
    turns as f32 * FRAC_PI_2
}

/// Angle an object may take when asked to face `target`. Fixed-rotation
/// types keep their angle; pathing footprints only turn in quarter steps.
pub fn acceptable_angle(limits: &DoodadLimits, pathing: bool, current: f32, target: f32) -> f32 {
    if limits.fixed_rotation.is_some() {
        current
    } else if pathing {
        quarter_turn(target)
    } else {
        target.rem_euclid(TAU)
    }
}

#[derive(Debug)]
pub struct DoodadBrush {
    selection: BTreeSet<u32>,
    clipboard: Vec<PlacedObject>,
    clipboard_free_placement: bool,
    clipboard_center: Vector2<f32>,
    drag: Option<DragState>,
    stamp: Option<Stamp>,
    possible_variations: BTreeSet<u32>,
    randomize: Randomize,
    rng: StdRng,
    /// Doodads placed by the open stroke.
    stroke: Option<Vec<PlacedObject>>,
}

impl Default for DoodadBrush {
    fn default() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl DoodadBrush {
    pub fn new() -> Self {
        Self::default()
    }

    /// A brush drawing its random choices from `rng`.
    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            selection: BTreeSet::new(),
            clipboard: Vec::new(),
            clipboard_free_placement: true,
            clipboard_center: Vector2::new(0.0, 0.0),
            drag: None,
            stamp: None,
            possible_variations: BTreeSet::new(),
            randomize: Randomize::default(),
            rng,
            stroke: None,
        }
    }

    pub fn set_rng(&mut self, rng: StdRng) {
        self.rng = rng;
    }

    // ========================================================================
    // Doodad type
    // ========================================================================

    /// Selects the type to place. Scale, rotation and the variation set
    /// come from the catalog; a footprint pins placement to the pathing
    /// lattice.
    pub fn set_doodad(&mut self, id: &str, catalog: &TerrainCatalog, footprint: Option<PathingTexture>) {
        let limits = catalog.doodad_limits(id);
        self.stamp = Some(Stamp {
            id: id.to_string(),
            variation: 0,
            rotation: limits.fixed_rotation.unwrap_or(270.0).to_radians(),
            scale: if limits.destructible { 1.0 } else { limits.default_scale },
            min_scale: limits.min_scale,
            max_scale: limits.max_scale,
            fixed_rotation: limits.fixed_rotation.is_some(),
            footprint,
        });
        self.possible_variations = (0..limits.variations).collect();
        self.set_random_variation();
        debug!(id, variations = limits.variations, "doodad type selected");
    }

    pub fn doodad_id(&self) -> Option<&str> {
        self.stamp.as_ref().map(|s| s.id.as_str())
    }

    pub fn variation(&self) -> Option<u32> {
        self.stamp.as_ref().map(|s| s.variation)
    }

    pub fn rotation(&self) -> Option<f32> {
        self.stamp.as_ref().map(|s| s.rotation)
    }

    pub fn scale(&self) -> Option<f32> {
        self.stamp.as_ref().map(|s| s.scale)
    }

    /// Ignored for fixed-rotation types.
    pub fn set_rotation(&mut self, angle: f32) {
        if let Some(stamp) = self.stamp.as_mut().filter(|s| !s.fixed_rotation) {
            stamp.rotation = angle.rem_euclid(TAU);
        }
    }

    /// Clamped to the type's scale range.
    pub fn set_scale(&mut self, scale: f32) {
        if let Some(stamp) = self.stamp.as_mut() {
            stamp.scale = scale.clamp(stamp.min_scale, stamp.max_scale.max(stamp.min_scale));
        }
    }

    pub fn randomize(&self) -> Randomize {
        self.randomize
    }

    pub fn set_randomize(&mut self, randomize: Randomize) {
        self.randomize = randomize;
    }

    pub fn possible_variations(&self) -> &BTreeSet<u32> {
        &self.possible_variations
    }

    pub fn add_variation(&mut self, variation: u32) {
        self.possible_variations.insert(variation);
    }

    /// Removes a variation from the set. If it was the one about to be
    /// placed, another is drawn.
    pub fn erase_variation(&mut self, variation: u32) {
        self.possible_variations.remove(&variation);
        if self.variation() == Some(variation) {
            self.set_random_variation();
        }
    }

    /// A variation drawn from the set, 0 when the set is empty.
    pub fn random_variation(&mut self) -> u32 {
        if self.possible_variations.is_empty() {
            return 0;
        }
        let index = self.rng.gen_range(0..self.possible_variations.len());
        self.possible_variations.iter().nth(index).copied().unwrap_or(0)
    }

    pub fn set_random_variation(&mut self) {
        let variation = self.random_variation();
        if let Some(stamp) = self.stamp.as_mut() {
            stamp.variation = variation;
        }
    }

    /// Rolls a new facing. Footprints that are not square and uniform only
    /// turn in quarter steps; fixed-rotation types keep theirs.
    pub fn set_random_rotation(&mut self) {
        let target = self.rng.gen_range(0.0..TAU);
        let Some(stamp) = self.stamp.as_mut().filter(|s| !s.fixed_rotation) else {
            return;
        };
        stamp.rotation = match &stamp.footprint {
            Some(texture) if !(texture.is_square() && texture.homogeneous()) => quarter_turn(target),
            _ => target,
        };
    }

    pub fn set_random_scale(&mut self) {
        let Some(stamp) = self.stamp.as_mut() else {
            return;
        };
        if stamp.max_scale.is_finite() && stamp.max_scale > stamp.min_scale {
            stamp.scale = self.rng.gen_range(stamp.min_scale..=stamp.max_scale);
        }
    }

    // ========================================================================
    // Placement
    // ========================================================================

    /// Where a doodad lands for a pointer at `mouse`. Types with a
    /// footprint snap so their cells line up with the half-unit lattice.
    pub fn placement_position(&self, mouse: Vector2<f32>) -> Vector2<f32> {
        let Some(texture) = self.stamp.as_ref().and_then(|s| s.footprint.as_ref()) else {
            return mouse;
        };
        let snap = |value: f32, cells: u32| {
            let half = cells as f32 * 0.125;
            ((value - half) * 2.0).round() / 2.0 + half
        };
        Vector2::new(snap(mouse.x, texture.width), snap(mouse.y, texture.height))
    }

    /// Whether the selected type fits at `mouse` without overlapping the
    /// footprint of another pathing doodad or leaving the map.
    pub fn can_place(&self, scene: &DoodadScene<'_>, mouse: Vector2<f32>) -> bool {
        let Some(stamp) = self.stamp.as_ref() else {
            return false;
        };
        let Some(texture) = stamp.footprint.as_ref() else {
            return true;
        };
        let at = self.placement_position(mouse);
        let reach = texture.width.max(texture.height) as f32 / 8.0 + scene.footprints.reach();
        let window = RectF::new(at.x - reach, at.y - reach, reach * 2.0, reach * 2.0);

        let mut pathing = PathingMap::for_terrain(scene.terrain.width(), scene.terrain.height());
        for handle in scene.doodads.query_area(window) {
            let Some(object) = scene.doodads.get(handle).filter(|o| o.pathing) else {
                continue;
            };
            if let Some(footprint) = scene.footprints.get(&object.id) {
                pathing.blit(footprint, object.position.truncate(), object.angle);
            }
        }
        pathing.is_area_free(texture, at, stamp.rotation, UNWALKABLE | UNFLYABLE | UNBUILDABLE)
    }

    /// Opens a placement stroke; [`DoodadBrush::end_stroke`] records every
    /// doodad placed since as one undo step.
    pub fn begin_stroke(&mut self) {
        self.stroke = Some(Vec::new());
    }

    /// Places the selected type at `mouse` if it fits, then rerolls the
    /// randomized properties. Outside a stroke the placement is its own
    /// undo step.
    pub fn apply(&mut self, scene: &mut DoodadScene<'_>, mouse: Vector2<f32>) -> Option<ObjectHandle> {
        if !self.can_place(scene, mouse) {
            return None;
        }
        let stamp = self.stamp.as_ref()?;
        let at = self.placement_position(mouse);
        let z = scene.terrain.interpolated_height(at.x, at.y);
        let mut object = PlacedObject::new(stamp.id.clone(), Vector3::new(at.x, at.y, z));
        object.variation = stamp.variation;
        object.angle = stamp.rotation;
        object.scale = Vector3::new(stamp.scale, stamp.scale, stamp.scale);
        object.pathing = stamp.footprint.is_some();

        let handle = scene.doodads.add(object);
        let placed: Vec<PlacedObject> = scene.doodads.get(handle).cloned().into_iter().collect();
        match self.stroke.as_mut() {
            Some(pending) => pending.extend(placed),
            None => {
                scene.undo.begin_object_group();
                scene.undo.add_action(UndoAction::ObjectAdd {
                    layer: ObjectLayer::Doodads,
                    objects: placed,
                });
            }
        }

        if self.randomize.rotation {
            self.set_random_rotation();
        }
        if self.randomize.variation {
            self.set_random_variation();
        }
        if self.randomize.scale {
            self.set_random_scale();
        }
        Some(handle)
    }

    /// Closes the stroke. Returns how many doodads it placed.
    pub fn end_stroke(&mut self, scene: &mut DoodadScene<'_>) -> usize {
        let Some(placed) = self.stroke.take() else {
            return 0;
        };
        let count = placed.len();
        if count > 0 {
            scene.undo.begin_object_group();
            scene.undo.add_action(UndoAction::ObjectAdd {
                layer: ObjectLayer::Doodads,
                objects: placed,
            });
            debug!(count, "doodad stroke recorded");
        }
        count
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Creation numbers of the selected doodads.
    pub fn selection(&self) -> &BTreeSet<u32> {
        &self.selection
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn select(&mut self, creation_number: u32) {
        self.selection.insert(creation_number);
    }

    /// Selects the doodad under `point`. With `toggle` the pick is added to
    /// or removed from the selection instead of replacing it.
    pub fn select_at(&mut self, doodads: &ObjectStore, point: Vector2<f32>, toggle: bool) -> Option<u32> {
        let creation = doodads.pick(point).and_then(|h| doodads.get(h))?.creation_number;
        if toggle {
            if !self.selection.remove(&creation) {
                self.selection.insert(creation);
            }
        } else {
            self.selection = BTreeSet::from([creation]);
        }
        Some(creation)
    }

    pub fn select_area(&mut self, doodads: &ObjectStore, area: RectF, mode: SelectionMode) {
        let found = doodads
            .query_area(area)
            .into_iter()
            .filter_map(|h| doodads.get(h))
            .map(|o| o.creation_number);
        match mode {
            SelectionMode::Replace => self.selection = found.collect(),
            SelectionMode::Add => self.selection.extend(found),
            SelectionMode::Remove => {
                for creation in found {
                    self.selection.remove(&creation);
                }
            }
        }
    }

    fn selected_handles(&self, doodads: &ObjectStore) -> Vec<ObjectHandle> {
        self.selection
            .iter()
            .filter_map(|c| doodads.find_by_creation(*c))
            .collect()
    }

    fn selected_objects(&self, doodads: &ObjectStore) -> Vec<PlacedObject> {
        self.selected_handles(doodads)
            .into_iter()
            .filter_map(|h| doodads.get(h).cloned())
            .collect()
    }

    // ========================================================================
    // Add / delete / clipboard
    // ========================================================================

    /// Places a single doodad, seated on the ground unless z is locked.
    pub fn place(&mut self, scene: &mut DoodadScene<'_>, mut object: PlacedObject) -> ObjectHandle {
        if !scene.lock_z {
            object.position.z = scene
                .terrain
                .interpolated_height(object.position.x, object.position.y);
        }
        let handle = scene.doodads.add(object);
        let placed: Vec<PlacedObject> = scene.doodads.get(handle).cloned().into_iter().collect();
        scene.undo.begin_object_group();
        scene.undo.add_action(UndoAction::ObjectAdd {
            layer: ObjectLayer::Doodads,
            objects: placed,
        });
        handle
    }

    pub fn delete_selection(&mut self, scene: &mut DoodadScene<'_>) -> usize {
        let handles = self.selected_handles(scene.doodads);
        if handles.is_empty() {
            return 0;
        }
        let removed: Vec<PlacedObject> = handles
            .into_iter()
            .filter_map(|h| scene.doodads.remove(h))
            .collect();
        let count = removed.len();
        scene.undo.begin_object_group();
        scene.undo.add_action(UndoAction::ObjectDelete {
            layer: ObjectLayer::Doodads,
            objects: removed,
        });
        self.selection.clear();
        debug!(count, "doodads deleted");
        count
    }

    /// Copies the selection. The clipboard is pasted relative to the
    /// average position; any pathing object pins the paste to the pathing
    /// lattice.
    pub fn copy_selection(&mut self, doodads: &ObjectStore) {
        self.clipboard = self.selected_objects(doodads);
        self.clipboard_free_placement = self.clipboard.iter().all(|o| !o.pathing);
        let count = self.clipboard.len().max(1) as f32;
        let sum = self
            .clipboard
            .iter()
            .fold(Vector2::new(0.0, 0.0), |acc, o| acc + o.position.truncate());
        self.clipboard_center = sum / count;
    }

    pub fn cut_selection(&mut self, scene: &mut DoodadScene<'_>) -> usize {
        self.copy_selection(scene.doodads);
        self.delete_selection(scene)
    }

    pub fn clipboard(&self) -> &[PlacedObject] {
        &self.clipboard
    }

    /// Pastes at `mouse`. Every pasted doodad gets a new creation number.
    pub fn place_clipboard(&mut self, scene: &mut DoodadScene<'_>, mouse: Vector2<f32>) -> Vec<ObjectHandle> {
        if self.clipboard.is_empty() {
            return Vec::new();
        }
        let center = self.clipboard_center;
        let mut handles = Vec::with_capacity(self.clipboard.len());
        let mut added = Vec::with_capacity(self.clipboard.len());

        for source in &self.clipboard {
            let mut object = source.clone();
            object.creation_number = 0;
            let (x, y) = if self.clipboard_free_placement {
                (
                    mouse.x + source.position.x - center.x,
                    mouse.y + source.position.y - center.y,
                )
            } else {
                (
                    snap_to_pathing(mouse.x) + source.position.x - snap_to_pathing(center.x),
                    snap_to_pathing(mouse.y) + source.position.y - snap_to_pathing(center.y),
                )
            };
            let z = if scene.lock_z {
                source.position.z
            } else {
                scene.terrain.interpolated_height(x, y)
            };
            object.position = Vector3::new(x, y, z);

            let handle = scene.doodads.add(object);
            added.extend(scene.doodads.get(handle).cloned());
            handles.push(handle);
        }

        scene.undo.begin_object_group();
        scene.undo.add_action(UndoAction::ObjectAdd {
            layer: ObjectLayer::Doodads,
            objects: added,
        });
        handles
    }

    // ========================================================================
    // Transforms
    // ========================================================================

    /// Starts dragging the selection from `start`.
    pub fn begin_drag(&mut self, doodads: &ObjectStore, start: Vector2<f32>) -> bool {
        let before = self.selected_objects(doodads);
        if before.is_empty() {
            return false;
        }
        self.drag = Some(DragState { last: start, before });
        true
    }

    /// Moves the dragged selection to follow `mouse`. Selections containing a
    /// pathing object move in half-cell steps.
    pub fn drag_to(&mut self, scene: &mut DoodadScene<'_>, mouse: Vector2<f32>) {
        let handles = self.selected_handles(scene.doodads);
        let Some(drag) = self.drag.as_mut() else {
            return;
        };
        let free = handles
            .iter()
            .filter_map(|h| scene.doodads.get(*h))
            .all(|o| !o.pathing);

        let offset = if free {
            mouse - drag.last
        } else {
            let snapped = Vector2::new(snap_to_pathing(mouse.x), snap_to_pathing(mouse.y));
            let previous = Vector2::new(snap_to_pathing(drag.last.x), snap_to_pathing(drag.last.y));
            snapped - previous
        };
        if !free && offset.x == 0.0 && offset.y == 0.0 {
            return;
        }
        drag.last = mouse;

        let terrain = scene.terrain;
        let lock_z = scene.lock_z;
        for handle in handles {
            scene.doodads.update(handle, |object| {
                object.position.x += offset.x;
                object.position.y += offset.y;
                if !lock_z {
                    object.position.z = terrain.interpolated_height(object.position.x, object.position.y);
                }
            });
        }
    }

    /// Ends the drag and records it as one undo group.
    pub fn end_drag(&mut self, scene: &mut DoodadScene<'_>) {
        let Some(drag) = self.drag.take() else {
            return;
        };
        let after = self.selected_objects(scene.doodads);
        if after == drag.before {
            return;
        }
        scene.undo.begin_object_group();
        scene.undo.add_action(UndoAction::ObjectState {
            layer: ObjectLayer::Doodads,
            before: drag.before,
            after,
        });
    }

    pub fn move_selection(&mut self, scene: &mut DoodadScene<'_>, from: Vector2<f32>, to: Vector2<f32>) {
        if self.begin_drag(scene.doodads, from) {
            self.drag_to(scene, to);
            self.end_drag(scene);
        }
    }

    /// Applies `change` to every selected doodad inside one undo group.
    fn transform_selection(
        &self,
        scene: &mut DoodadScene<'_>,
        mut change: impl FnMut(&mut PlacedObject, &Terrain, &TerrainCatalog),
    ) {
        let handles = self.selected_handles(scene.doodads);
        if handles.is_empty() {
            return;
        }
        let before = self.selected_objects(scene.doodads);
        let (terrain, catalog) = (scene.terrain, scene.catalog);
        for handle in handles {
            scene.doodads.update(handle, |object| change(object, terrain, catalog));
        }
        let after = self.selected_objects(scene.doodads);
        scene.undo.begin_object_group();
        scene.undo.add_action(UndoAction::ObjectState {
            layer: ObjectLayer::Doodads,
            before,
            after,
        });
    }

    pub fn set_selection_angle(&mut self, scene: &mut DoodadScene<'_>, angle: f32) {
        self.transform_selection(scene, |object, _, catalog| {
            let limits = catalog.doodad_limits(&object.id);
            object.angle = acceptable_angle(&limits, object.pathing, object.angle, angle);
        });
    }

    pub fn set_selection_absolute_height(&mut self, scene: &mut DoodadScene<'_>, height: f32) {
        self.transform_selection(scene, |object, _, _| object.position.z = height);
    }

    /// Places each selected doodad `height` above the ground under it.
    pub fn set_selection_relative_height(&mut self, scene: &mut DoodadScene<'_>, height: f32) {
        self.transform_selection(scene, |object, terrain, _| {
            object.position.z = terrain.interpolated_height(object.position.x, object.position.y) + height;
        });
    }

    /// Sets one scale axis (0 = x, 1 = y, 2 = z), clamped to the type's
    /// limits. Destructibles scale uniformly.
    pub fn set_selection_scale_component(&mut self, scene: &mut DoodadScene<'_>, component: usize, scale: f32) {
        self.transform_selection(scene, |object, _, catalog| {
            let limits = catalog.doodad_limits(&object.id);
            let scale = scale.clamp(limits.min_scale, limits.max_scale.max(limits.min_scale));
            if limits.destructible {
                object.scale = Vector3::new(scale, scale, scale);
            } else {
                match component {
                    0 => object.scale.x = scale,
                    1 => object.scale.y = scale,
                    _ => object.scale.z = scale,
                }
            }
        });
    }
}
