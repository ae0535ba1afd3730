//! Pose playback state and the per-frame evaluator.
//!
//! A [`Pose`] binds a shared, immutable [`Data`] to a mutable playback state:
//! selected entity, selected animation, current time, and an elapsed-time
//! accumulator. [`Pose::update`] only accumulates; the actual work happens in
//! [`Pose::strike`], which resolves the current time into world-space bone
//! and object arrays. Strikes are memoized through a dirty flag, so any
//! number of reads between updates costs one evaluation.
//!
//! Output arrays are pooled and keyed by position within the active mainline
//! keyframe; slot identity is only meaningful within a single strike.

use std::sync::Arc;

use crate::data::{
    find_keyframe, Animation, Data, LoopMode, ObjInfoKind, ObjectType, Timeline,
    TimelineKeyframe, TimelineObject,
};
use crate::error::PoseError;
use crate::math::{lerp, Space, Vector};

/// Single-step modulo wrap of `num` into `[min, max)`.
///
/// `num == max` wraps to `min`. Underflow from below by an exact period
/// multiple lands on `max` (preserved behavior of the reference runtime).
/// A degenerate range (`max <= min`) collapses to `min`.
pub fn wrap(num: f32, min: f32, max: f32) -> f32 {
    let span = max - min;
    if span <= 0.0 {
        return min;
    }
    if num < min {
        max - ((min - num) % span)
    } else if num >= max {
        min + ((num - max) % span)
    } else {
        num
    }
}

fn wrap_time(anim: &Animation, time: f32) -> f32 {
    match anim.loop_mode {
        LoopMode::Once => time.clamp(anim.min_time, anim.max_time),
        _ => wrap(time, anim.min_time, anim.max_time),
    }
}

/// One bone of the current frame. `parent` indexes this same array and is
/// always an earlier slot in well-formed data.
#[derive(Clone, Copy, Debug)]
pub struct PoseBone {
    pub timeline: usize,
    pub parent: Option<usize>,
    pub local: Space,
    pub world: Space,
}

/// One object of the current frame, with its type-specific attributes.
#[derive(Debug)]
pub struct PoseObject {
    pub timeline: usize,
    /// Index into the bone array of the same strike.
    pub parent: Option<usize>,
    pub local: Space,
    pub world: Space,
    pub kind: PoseObjectKind,
}

#[derive(Debug)]
pub enum PoseObjectKind {
    Sprite {
        folder: usize,
        file: usize,
        pivot: Vector,
        alpha: f32,
        z_index: i32,
    },
    Bone,
    Box {
        pivot: Vector,
    },
    Point,
    Sound {
        folder: usize,
        file: usize,
        trigger: bool,
        volume: f32,
        panning: f32,
    },
    /// Nested sub-entity; the pose is owned by this slot and reused across
    /// strikes while the slot keeps its entity type.
    Entity {
        pose: Box<Pose>,
    },
    Variable,
}

#[derive(Debug)]
pub struct Pose {
    data: Arc<Data>,
    entity: Option<usize>,
    anim: Option<usize>,
    time: f32,
    elapsed: f32,
    dirty: bool,
    mainline_key: usize,
    /// Current-frame bones, valid after a successful strike.
    pub bones: Vec<PoseBone>,
    /// Current-frame objects, valid after a successful strike.
    pub objects: Vec<PoseObject>,
}

impl Pose {
    pub fn new(data: Arc<Data>) -> Self {
        Self {
            data,
            entity: None,
            anim: None,
            time: 0.0,
            elapsed: 0.0,
            dirty: false,
            mainline_key: 0,
            bones: Vec::new(),
            objects: Vec::new(),
        }
    }

    pub fn data(&self) -> &Arc<Data> {
        &self.data
    }

    pub fn entity_index(&self) -> Option<usize> {
        self.entity
    }

    pub fn anim_index(&self) -> Option<usize> {
        self.anim
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    /// Index of the mainline keyframe resolved by the last strike.
    pub fn mainline_key_index(&self) -> usize {
        self.mainline_key
    }

    fn current_entity(&self) -> Option<&crate::data::Entity> {
        self.entity.and_then(|i| self.data.entities.get(i))
    }

    fn current_anim(&self) -> Option<&Animation> {
        let entity = self.current_entity()?;
        self.anim.and_then(|i| entity.animations.get(i))
    }

    pub fn entity_name(&self) -> Option<&str> {
        self.current_entity().map(|e| e.name.as_str())
    }

    pub fn anim_name(&self) -> Option<&str> {
        self.current_anim().map(|a| a.name.as_str())
    }

    pub fn anim_length(&self) -> Option<f32> {
        self.current_anim().map(|a| a.length)
    }

    pub fn num_anims(&self) -> usize {
        self.current_entity().map_or(0, |e| e.animations.len())
    }

    /// Select an entity by name. Resets the animation to the entity's first,
    /// rewinds time, and drops all pooled output state: bone/object identity
    /// is not preserved across entity changes.
    pub fn set_entity(&mut self, name: &str) -> Result<(), PoseError> {
        let index = self
            .data
            .entity_index(name)
            .ok_or_else(|| PoseError::UnknownEntity(name.to_string()))?;
        self.set_entity_index(index)
    }

    pub fn set_entity_index(&mut self, index: usize) -> Result<(), PoseError> {
        let entity = self
            .data
            .entities
            .get(index)
            .ok_or(PoseError::EntityOutOfRange(index))?;
        let first_anim = if entity.animations.is_empty() {
            None
        } else {
            Some(0)
        };
        self.entity = Some(index);
        self.anim = first_anim;
        self.time = 0.0;
        self.elapsed = 0.0;
        self.dirty = true;
        self.bones.clear();
        self.objects.clear();
        Ok(())
    }

    /// Select an animation of the current entity by name. The current time
    /// is carried over, wrapped into the new animation's range.
    pub fn set_anim(&mut self, name: &str) -> Result<(), PoseError> {
        let entity = self.current_entity().ok_or(PoseError::NoEntity)?;
        let index = entity
            .animation_index(name)
            .ok_or_else(|| PoseError::UnknownAnimation(name.to_string()))?;
        self.set_anim_index(index)
    }

    pub fn set_anim_index(&mut self, index: usize) -> Result<(), PoseError> {
        let entity = self.current_entity().ok_or(PoseError::NoEntity)?;
        let anim = entity
            .animations
            .get(index)
            .ok_or(PoseError::AnimationOutOfRange(index))?;
        let wrapped = wrap_time(anim, self.time);
        self.anim = Some(index);
        self.time = wrapped;
        self.elapsed = 0.0;
        self.dirty = true;
        Ok(())
    }

    pub fn set_next_anim(&mut self) -> Result<(), PoseError> {
        let count = self.num_anims();
        if count > 1 {
            if let Some(current) = self.anim {
                self.set_anim_index((current + 1) % count)?;
            }
        }
        Ok(())
    }

    pub fn set_prev_anim(&mut self) -> Result<(), PoseError> {
        let count = self.num_anims();
        if count > 1 {
            if let Some(current) = self.anim {
                self.set_anim_index((current + count - 1) % count)?;
            }
        }
        Ok(())
    }

    /// Jump to an absolute time. Marks the pose dirty only when the wrapped
    /// time actually changes.
    pub fn set_time(&mut self, time: f32) {
        let wrapped = match self.current_anim() {
            Some(anim) => wrap_time(anim, time),
            None => time,
        };
        if self.time != wrapped {
            self.time = wrapped;
            self.elapsed = 0.0;
            self.dirty = true;
        }
    }

    /// Advance playback. Cheap: only accumulates elapsed time; evaluation is
    /// deferred to the next [`Pose::strike`].
    pub fn update(&mut self, elapsed_time: f32) {
        self.elapsed += elapsed_time;
        self.dirty = true;
    }

    /// Resolve the current time into world-space bone/object arrays.
    /// Memoized: a clean pose returns immediately.
    pub fn strike(&mut self) -> Result<(), PoseError> {
        let mut visiting = Vec::new();
        self.strike_guarded(&mut visiting)
    }

    fn strike_guarded(&mut self, visiting: &mut Vec<usize>) -> Result<(), PoseError> {
        if !self.dirty {
            return Ok(());
        }
        let (entity_index, anim_index) = match (self.entity, self.anim) {
            (Some(e), Some(a)) => (e, a),
            _ => {
                // Nothing selected; keep whatever frame is already present.
                self.dirty = false;
                return Ok(());
            }
        };
        if visiting.contains(&entity_index) {
            return Err(PoseError::EntityCycle(entity_index));
        }
        visiting.push(entity_index);
        let result = self.strike_inner(entity_index, anim_index, visiting);
        visiting.pop();
        if result.is_ok() {
            self.dirty = false;
        }
        result
    }

    fn strike_inner(
        &mut self,
        entity_index: usize,
        anim_index: usize,
        visiting: &mut Vec<usize>,
    ) -> Result<(), PoseError> {
        let data = Arc::clone(&self.data);
        let entity = data
            .entities
            .get(entity_index)
            .ok_or(PoseError::EntityOutOfRange(entity_index))?;
        let anim = entity
            .animations
            .get(anim_index)
            .ok_or(PoseError::AnimationOutOfRange(anim_index))?;
        if anim.loop_mode == LoopMode::PingPong {
            return Err(PoseError::UnsupportedLoopMode);
        }

        self.time = wrap_time(anim, self.time + self.elapsed);
        self.elapsed = 0.0;
        let time = self.time;

        let mainline_index = find_keyframe(&anim.mainline.keys, time)
            .ok_or(PoseError::NoMainlineKeyframe(time))?;
        self.mainline_key = mainline_index;
        let mainline_key = &anim.mainline.keys[mainline_index];

        // Bones: tween each referenced timeline key pair into its slot, in
        // ref (= id) order, then truncate to this keyframe's bone count.
        self.bones.truncate(mainline_key.bone_refs.len());
        for (slot, bone_ref) in mainline_key.bone_refs.iter().enumerate() {
            let pair = resolve_pair(anim, bone_ref.timeline, bone_ref.key, time)?;
            let (a, b) = match (&pair.key1.payload, &pair.key2.payload) {
                (TimelineObject::Bone(a), TimelineObject::Bone(b)) => (a, b),
                _ => {
                    return Err(PoseError::PayloadMismatch {
                        timeline: bone_ref.timeline,
                        expected: ObjectType::Bone.as_str(),
                    })
                }
            };
            let local = Space::tween(&a.space, &b.space, pair.pct, pair.key1.spin);
            // The ref's parent is authoritative, not the timeline payload.
            let bone = PoseBone {
                timeline: bone_ref.timeline,
                parent: bone_ref.parent,
                local,
                world: local,
            };
            if slot < self.bones.len() {
                self.bones[slot] = bone;
            } else {
                self.bones.push(bone);
            }
        }

        // World pass in array order; parents always occupy earlier slots in
        // well-formed data, anything else degrades to the local space.
        for index in 0..self.bones.len() {
            let world = match self.bones[index].parent {
                Some(p) if p < index => {
                    Space::combine(&self.bones[p].world, &self.bones[index].local)
                }
                _ => self.bones[index].local,
            };
            self.bones[index].world = world;
        }

        // Objects: same straddle/tween walk with per-type payload dispatch.
        self.objects.truncate(mainline_key.object_refs.len());
        for (slot, object_ref) in mainline_key.object_refs.iter().enumerate() {
            let pair = resolve_pair(anim, object_ref.timeline, object_ref.key, time)?;
            let pct = pair.pct;
            let spin = pair.key1.spin;

            let (local, kind) = match (&pair.key1.payload, &pair.key2.payload) {
                (TimelineObject::Sprite(a), TimelineObject::Sprite(b)) => (
                    Space::tween(&a.space, &b.space, pct, spin),
                    PoseObjectKind::Sprite {
                        folder: a.folder,
                        file: a.file,
                        pivot: Vector::new(
                            lerp(a.pivot.x, b.pivot.x, pct),
                            lerp(a.pivot.y, b.pivot.y, pct),
                        ),
                        alpha: lerp(a.alpha, b.alpha, pct),
                        z_index: object_ref.z_index,
                    },
                ),
                (TimelineObject::Bone(a), TimelineObject::Bone(b)) => (
                    Space::tween(&a.space, &b.space, pct, spin),
                    PoseObjectKind::Bone,
                ),
                (TimelineObject::Box(a), TimelineObject::Box(b)) => (
                    Space::tween(&a.space, &b.space, pct, spin),
                    PoseObjectKind::Box {
                        pivot: Vector::new(
                            lerp(a.pivot.x, b.pivot.x, pct),
                            lerp(a.pivot.y, b.pivot.y, pct),
                        ),
                    },
                ),
                (TimelineObject::Point(a), TimelineObject::Point(b)) => (
                    Space::tween(&a.space, &b.space, pct, spin),
                    PoseObjectKind::Point,
                ),
                (TimelineObject::Sound(a), TimelineObject::Sound(b)) => (
                    Space::identity(),
                    PoseObjectKind::Sound {
                        folder: a.folder,
                        file: a.file,
                        trigger: a.trigger,
                        volume: lerp(a.volume, b.volume, pct),
                        panning: lerp(a.panning, b.panning, pct),
                    },
                ),
                (TimelineObject::Entity(a), TimelineObject::Entity(b)) => {
                    let local = Space::tween(&a.space, &b.space, pct, spin);
                    let sub_t = lerp(a.t, b.t, pct);
                    let mut sub_pose = take_sub_pose(&mut self.objects, slot)
                        .unwrap_or_else(|| Box::new(Pose::new(Arc::clone(&data))));
                    sub_pose.drive_as_sub(a.entity, a.animation, sub_t, visiting)?;
                    (local, PoseObjectKind::Entity { pose: sub_pose })
                }
                (TimelineObject::Variable, TimelineObject::Variable) => {
                    (Space::identity(), PoseObjectKind::Variable)
                }
                _ => {
                    return Err(PoseError::PayloadMismatch {
                        timeline: object_ref.timeline,
                        expected: pair.timeline.object_type.as_str(),
                    })
                }
            };

            let mut world = match object_ref.parent {
                Some(p) if p < self.bones.len() => {
                    Space::combine(&self.bones[p].world, &local)
                }
                _ => local,
            };

            // Type-specific pivot offset in the object's own axes.
            match &kind {
                PoseObjectKind::Sprite { folder, file, pivot, .. } => {
                    let file = data.file(*folder, *file).ok_or(PoseError::FileNotFound {
                        folder: *folder,
                        file: *file,
                    })?;
                    world.translate(
                        (0.5 - pivot.x) * file.width,
                        (0.5 - pivot.y) * file.height,
                    );
                }
                PoseObjectKind::Box { pivot } => {
                    let name = &pair.timeline.name;
                    let (width, height) = entity
                        .obj_info(name)
                        .and_then(obj_info_dimensions)
                        .ok_or_else(|| PoseError::MissingObjInfo(name.clone()))?;
                    world.translate((0.5 - pivot.x) * width, (0.5 - pivot.y) * height);
                }
                _ => {}
            }

            let object = PoseObject {
                timeline: object_ref.timeline,
                parent: object_ref.parent,
                local,
                world,
                kind,
            };
            if slot < self.objects.len() {
                self.objects[slot] = object;
            } else {
                self.objects.push(object);
            }
        }

        Ok(())
    }

    /// Drive this pose as the nested sub-pose of an entity object: adopt the
    /// resolved entity/animation selection, convert the normalized fraction
    /// into an absolute sub-time, and strike recursively.
    fn drive_as_sub(
        &mut self,
        entity: usize,
        animation: usize,
        t: f32,
        visiting: &mut Vec<usize>,
    ) -> Result<(), PoseError> {
        let mut selection_changed = false;
        if self.entity != Some(entity) {
            self.set_entity_index(entity)?;
            selection_changed = true;
        }
        if self.anim != Some(animation) {
            self.set_anim_index(animation)?;
            selection_changed = true;
        }
        let length = self.anim_length().unwrap_or(0.0);
        let sub_time = t * length;
        if selection_changed {
            self.set_time(sub_time);
        } else {
            self.update(sub_time - self.time);
        }
        self.strike_guarded(visiting)
    }
}

fn obj_info_dimensions(info: &crate::data::ObjInfo) -> Option<(f32, f32)> {
    match info.kind {
        ObjInfoKind::Bone { width, height } | ObjInfoKind::Box { width, height } => {
            Some((width, height))
        }
        ObjInfoKind::Sprite { .. } => None,
    }
}

/// Pull the nested pose out of an object slot about to be overwritten so it
/// can be reused instead of rebuilt.
fn take_sub_pose(objects: &mut [PoseObject], slot: usize) -> Option<Box<Pose>> {
    let object = objects.get_mut(slot)?;
    if matches!(object.kind, PoseObjectKind::Entity { .. }) {
        if let PoseObjectKind::Entity { pose } =
            std::mem::replace(&mut object.kind, PoseObjectKind::Point)
        {
            return Some(pose);
        }
    }
    None
}

struct KeyPair<'a> {
    timeline: &'a Timeline,
    key1: &'a TimelineKeyframe,
    key2: &'a TimelineKeyframe,
    pct: f32,
}

/// Locate the keyframe pair straddling `time` and the eased fraction between
/// them. The next index wraps to 0; when the wrapped key sits earlier on the
/// time axis its effective time becomes the animation length, which lets a
/// looped timeline tween back toward its first key. Keyframes sharing a time
/// short-circuit to fraction 0.
fn resolve_pair<'a>(
    anim: &'a Animation,
    timeline_index: usize,
    key_index: usize,
    time: f32,
) -> Result<KeyPair<'a>, PoseError> {
    let timeline = anim
        .timelines
        .get(timeline_index)
        .ok_or(PoseError::TimelineOutOfRange(timeline_index))?;
    let key1 = timeline
        .keys
        .get(key_index)
        .ok_or(PoseError::KeyframeOutOfRange {
            timeline: timeline_index,
            key: key_index,
        })?;
    let key2 = &timeline.keys[(key_index + 1) % timeline.keys.len()];

    let time1 = key1.time;
    let mut time2 = key2.time;
    if time2 < time1 {
        time2 = anim.length;
    }
    let mut pct = 0.0;
    if time2 > time1 {
        pct = (time - time1) / (time2 - time1);
        pct = key1.curve.evaluate(pct);
    }

    Ok(KeyPair {
        timeline,
        key1,
        key2,
        pct,
    })
}
