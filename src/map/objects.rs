//! Placed units and doodads.
//!
//! Objects live in an arena addressed by generational handles; a coarse
//! bucket grid over world x/y answers area queries. Positions are in corner
//! units, the same space as the terrain grid.

use std::collections::HashMap;

use cgmath::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::math::RectF;

const BUCKET_SIZE: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectLayer {
    Units,
    Doodads,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedObject {
    /// Four-character type id, e.g. `hfoo` or `LTlt`.
    pub id: String,
    pub variation: u32,
    pub position: Vector3<f32>,
    /// Radians.
    pub angle: f32,
    pub scale: Vector3<f32>,
    pub player: i32,
    /// Stable identity across delete and undo; 0 means "assign on insert".
    pub creation_number: u32,
    pub state: u8,
    /// Has a pathing footprint, which forces half-cell placement.
    pub pathing: bool,
    /// Bounds radius of the current animation sequence, world units.
    pub sequence_radius: f32,
    /// Bounds radius of the whole model, world units.
    pub model_radius: f32,
}

impl PlacedObject {
    pub fn new(id: impl Into<String>, position: Vector3<f32>) -> Self {
        Self {
            id: id.into(),
            variation: 0,
            position,
            angle: 0.0,
            scale: Vector3::new(1.0, 1.0, 1.0),
            player: 0,
            creation_number: 0,
            state: 2,
            pathing: false,
            sequence_radius: 0.0,
            model_radius: 0.0,
        }
    }

    /// Radius of the selection circle in grid units. Sequence extents are
    /// sometimes degenerate; below 0.1 the model extent is used instead.
    /// This is a heuristic, not an exact hit shape.
    pub fn selection_radius(&self) -> f32 {
        let radius = self.sequence_radius / 128.0;
        if radius < 0.1 {
            self.model_radius / 128.0
        } else {
            radius
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    object: Option<PlacedObject>,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
    buckets: HashMap<(i32, i32), Vec<ObjectHandle>>,
    next_creation_number: u32,
    len: usize,
}

fn bucket_of(x: f32, y: f32) -> (i32, i32) {
    ((x / BUCKET_SIZE).floor() as i32, (y / BUCKET_SIZE).floor() as i32)
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn add(&mut self, mut object: PlacedObject) -> ObjectHandle {
        if object.creation_number == 0 {
            self.next_creation_number += 1;
            object.creation_number = self.next_creation_number;
        } else {
            self.next_creation_number = self.next_creation_number.max(object.creation_number);
        }

        let bucket = bucket_of(object.position.x, object.position.y);
        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.object = Some(object);
                ObjectHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    object: Some(object),
                });
                ObjectHandle {
                    index: self.slots.len() as u32 - 1,
                    generation: 0,
                }
            }
        };
        self.buckets.entry(bucket).or_default().push(handle);
        self.len += 1;
        handle
    }

    pub fn remove(&mut self, handle: ObjectHandle) -> Option<PlacedObject> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let object = slot.object.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.unbucket(handle, bucket_of(object.position.x, object.position.y));
        self.len -= 1;
        Some(object)
    }

    pub fn get(&self, handle: ObjectHandle) -> Option<&PlacedObject> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.object.as_ref()
    }

    /// Mutates an object in place and keeps the spatial index in step.
    pub fn update<R>(&mut self, handle: ObjectHandle, f: impl FnOnce(&mut PlacedObject) -> R) -> Option<R> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let object = slot.object.as_mut()?;
        let before = bucket_of(object.position.x, object.position.y);
        let result = f(object);
        let after = bucket_of(object.position.x, object.position.y);
        if before != after {
            self.unbucket(handle, before);
            self.buckets.entry(after).or_default().push(handle);
        }
        Some(result)
    }

    fn unbucket(&mut self, handle: ObjectHandle, bucket: (i32, i32)) {
        if let Some(list) = self.buckets.get_mut(&bucket) {
            list.retain(|h| *h != handle);
            if list.is_empty() {
                self.buckets.remove(&bucket);
            }
        }
    }

    pub fn find_by_creation(&self, creation_number: u32) -> Option<ObjectHandle> {
        self.iter()
            .find(|(_, o)| o.creation_number == creation_number)
            .map(|(h, _)| h)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectHandle, &PlacedObject)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.object.as_ref().map(|object| {
                (
                    ObjectHandle {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    object,
                )
            })
        })
    }

    /// Objects whose position lies inside `area`, in handle order.
    pub fn query_area(&self, area: RectF) -> Vec<ObjectHandle> {
        let (x0, y0) = bucket_of(area.x, area.y);
        let (x1, y1) = bucket_of(area.x + area.width, area.y + area.height);
        let mut found = Vec::new();
        for bx in x0..=x1 {
            for by in y0..=y1 {
                let Some(list) = self.buckets.get(&(bx, by)) else {
                    continue;
                };
                for handle in list {
                    if let Some(object) = self.get(*handle) {
                        if area.contains(object.position.x, object.position.y) {
                            found.push(*handle);
                        }
                    }
                }
            }
        }
        found.sort();
        found
    }

    /// Closest object whose selection circle covers `point`.
    pub fn pick(&self, point: Vector2<f32>) -> Option<ObjectHandle> {
        const REACH: f32 = 8.0;
        let area = RectF::new(point.x - REACH, point.y - REACH, REACH * 2.0, REACH * 2.0);
        self.query_area(area)
            .into_iter()
            .filter_map(|h| {
                let object = self.get(h)?;
                let dx = object.position.x - point.x;
                let dy = object.position.y - point.y;
                let distance = (dx * dx + dy * dy).sqrt();
                (distance <= object.selection_radius()).then_some((h, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(h, _)| h)
    }

    /// Re-seats every object inside `area` on the surface given by `height_at`.
    pub fn snap_to_terrain(&mut self, area: RectF, height_at: impl Fn(f32, f32) -> f32) -> usize {
        let handles = self.query_area(area);
        for handle in &handles {
            self.update(*handle, |object| {
                object.position.z = height_at(object.position.x, object.position.y);
            });
        }
        handles.len()
    }
}
