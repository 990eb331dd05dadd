//! Linear undo history made of groups; one user gesture is one group.
//!
//! Terrain actions store before/after corner slices for a rectangle. The
//! "before" slice comes from a full-grid snapshot taken when the group was
//! opened, so an edit can record its area after the fact.

use tracing::debug;

use crate::map::corner::Corner;
use crate::map::grid::Grid;
use crate::map::objects::{ObjectLayer, PlacedObject};
use crate::math::Rect;

/// Which derived data has to be rebuilt after corners are restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerrainEditKind {
    /// Heights only.
    Height,
    /// Texture descriptors only.
    Texture,
    /// Heights, cliff placements, textures, existence and water.
    Cliff,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UndoAction {
    Terrain {
        area: Rect,
        kind: TerrainEditKind,
        before: Vec<Corner>,
        after: Vec<Corner>,
    },
    ObjectAdd {
        layer: ObjectLayer,
        objects: Vec<PlacedObject>,
    },
    ObjectDelete {
        layer: ObjectLayer,
        objects: Vec<PlacedObject>,
    },
    ObjectState {
        layer: ObjectLayer,
        before: Vec<PlacedObject>,
        after: Vec<PlacedObject>,
    },
}

/// Receiver of replayed actions. Implementations restore the data and run
/// the recompute matching the edit kind.
pub trait UndoTarget {
    fn restore_terrain(&mut self, area: Rect, kind: TerrainEditKind, corners: &[Corner]);
    fn insert_objects(&mut self, layer: ObjectLayer, objects: &[PlacedObject]);
    /// Removes by creation number.
    fn remove_objects(&mut self, layer: ObjectLayer, objects: &[PlacedObject]);
    /// Overwrites by creation number.
    fn replace_objects(&mut self, layer: ObjectLayer, objects: &[PlacedObject]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Undo,
    Redo,
}

fn replay(action: &UndoAction, direction: Direction, target: &mut dyn UndoTarget) {
    use Direction::{Redo, Undo};
    match (action, direction) {
        (UndoAction::Terrain { area, kind, before, .. }, Undo) => target.restore_terrain(*area, *kind, before),
        (UndoAction::Terrain { area, kind, after, .. }, Redo) => target.restore_terrain(*area, *kind, after),
        (UndoAction::ObjectAdd { layer, objects }, Undo) => target.remove_objects(*layer, objects),
        (UndoAction::ObjectAdd { layer, objects }, Redo) => target.insert_objects(*layer, objects),
        (UndoAction::ObjectDelete { layer, objects }, Undo) => target.insert_objects(*layer, objects),
        (UndoAction::ObjectDelete { layer, objects }, Redo) => target.remove_objects(*layer, objects),
        (UndoAction::ObjectState { layer, before, .. }, Undo) => target.replace_objects(*layer, before),
        (UndoAction::ObjectState { layer, after, .. }, Redo) => target.replace_objects(*layer, after),
    }
}

#[derive(Debug)]
pub struct UndoEngine {
    groups: Vec<Vec<UndoAction>>,
    /// Number of groups currently applied; groups past it are redo history.
    applied: usize,
    limit: usize,
    /// Grid as it was when the open group began.
    reference: Option<Grid>,
}

impl Default for UndoEngine {
    fn default() -> Self {
        Self::new(100)
    }
}

impl UndoEngine {
    pub fn new(limit: usize) -> Self {
        Self {
            groups: Vec::new(),
            applied: 0,
            limit: limit.max(1),
            reference: None,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Opens a group that will hold terrain actions.
    pub fn begin_group(&mut self, grid: &Grid) {
        self.open_group();
        self.reference = Some(grid.clone());
    }

    /// Opens a group for object actions only; no snapshot is taken.
    pub fn begin_object_group(&mut self) {
        self.open_group();
        self.reference = None;
    }

    fn open_group(&mut self) {
        self.groups.truncate(self.applied);
        if self.groups.last().is_some_and(Vec::is_empty) {
            self.groups.pop();
        }
        self.groups.push(Vec::new());
        if self.groups.len() > self.limit {
            self.groups.remove(0);
        }
        self.applied = self.groups.len();
    }

    /// Records `area` of the live grid against the group snapshot.
    pub fn add_terrain_action(&mut self, grid: &Grid, area: Rect, kind: TerrainEditKind) {
        let area = area.intersect(&grid.bounds());
        if area.is_empty() {
            return;
        }
        let Some(reference) = &self.reference else {
            debug!("terrain action recorded without an open terrain group");
            return;
        };
        if reference.width() != grid.width() || reference.height() != grid.height() {
            debug!("grid was resized inside an undo group, dropping action");
            return;
        }
        let action = UndoAction::Terrain {
            area,
            kind,
            before: reference.snapshot(area),
            after: grid.snapshot(area),
        };
        self.add_action(action);
    }

    pub fn add_action(&mut self, action: UndoAction) {
        if self.applied == 0 || self.applied < self.groups.len() {
            self.open_group();
        }
        if let Some(group) = self.groups.last_mut() {
            group.push(action);
        }
    }

    fn drop_empty_tail(&mut self) {
        while self.applied > 0 && self.groups[self.applied - 1].is_empty() {
            self.groups.remove(self.applied - 1);
            self.applied -= 1;
        }
    }

    pub fn can_undo(&self) -> bool {
        self.groups[..self.applied].iter().any(|g| !g.is_empty())
    }

    pub fn can_redo(&self) -> bool {
        self.applied < self.groups.len()
    }

    /// Reverts the newest applied group, actions in reverse order.
    pub fn undo(&mut self, target: &mut dyn UndoTarget) -> bool {
        self.drop_empty_tail();
        if self.applied == 0 {
            return false;
        }
        self.applied -= 1;
        for action in self.groups[self.applied].iter().rev() {
            replay(action, Direction::Undo, target);
        }
        self.reference = None;
        true
    }

    pub fn redo(&mut self, target: &mut dyn UndoTarget) -> bool {
        if self.applied >= self.groups.len() {
            return false;
        }
        for action in &self.groups[self.applied] {
            replay(action, Direction::Redo, target);
        }
        self.applied += 1;
        self.reference = None;
        true
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.applied = 0;
        self.reference = None;
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}
