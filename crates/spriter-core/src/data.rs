//! Typed animation data model.
//!
//! [`Data`] is the immutable result of loading a Spriter document: folders of
//! files, entities, their animations, and the mainline/timeline keyframe
//! structure the pose evaluator walks every frame. Construction goes through
//! [`crate::document`]; after that nothing here is mutated, so a `Data` can
//! be shared (`Arc`) across any number of poses.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::curve::Curve;
use crate::math::{Space, Vector};

/// One image file: pixel dimensions plus the authored default pivot that
/// sprite keyframes without an explicit pivot inherit at load time.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct File {
    pub id: i32,
    pub name: String,
    pub width: f32,
    pub height: f32,
    pub pivot: Vector,
}

/// Ordered file collection, index-addressed by sprite/sound keyframes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Folder {
    pub id: i32,
    pub files: Vec<File>,
}

/// Declared variable value, typed int/float/string.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum VarValue {
    Int(i32),
    Float(f32),
    Str(String),
}

/// Variable definition on an entity or obj_info: name, authored default and
/// the current value (initialized to the default at load).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VarDef {
    pub name: String,
    pub default: VarValue,
    pub value: VarValue,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FrameRef {
    pub folder: usize,
    pub file: usize,
}

/// Entity-level named metadata for a bone, box, or sprite slot. Looked up by
/// object (timeline) name at strike time; never stored per keyframe.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ObjInfo {
    pub name: String,
    pub kind: ObjInfoKind,
    pub var_defs: Vec<VarDef>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ObjInfoKind {
    Sprite { frames: Vec<FrameRef> },
    Bone { width: f32, height: f32 },
    Box { width: f32, height: f32 },
}

/// Looping behavior of an animation. `PingPong` is declared by the format
/// but carries no evaluation rule; striking such an animation fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopMode {
    Once,
    Loop,
    PingPong,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub id: i32,
    pub name: String,
    pub var_defs: Vec<VarDef>,
    /// Keyed by object name (= timeline name).
    pub obj_infos: HashMap<String, ObjInfo>,
    /// Declaration order preserved; name lookup is a linear scan.
    pub animations: Vec<Animation>,
}

impl Entity {
    pub fn animation(&self, name: &str) -> Option<&Animation> {
        self.animations.iter().find(|a| a.name == name)
    }

    pub fn animation_index(&self, name: &str) -> Option<usize> {
        self.animations.iter().position(|a| a.name == name)
    }

    pub fn animation_names(&self) -> impl Iterator<Item = &str> {
        self.animations.iter().map(|a| a.name.as_str())
    }

    pub fn obj_info(&self, name: &str) -> Option<&ObjInfo> {
        self.obj_infos.get(name)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Animation {
    pub id: i32,
    pub name: String,
    /// Duration in the document's time unit (typically milliseconds).
    pub length: f32,
    pub loop_mode: LoopMode,
    /// Authored loop re-entry offset; retained but not consumed by strike.
    pub loop_to: Option<f32>,
    pub mainline: Mainline,
    pub timelines: Vec<Timeline>,
    pub min_time: f32,
    pub max_time: f32,
}

/// The master sequence of keyframes holding *references* into timelines,
/// not transforms.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Mainline {
    pub keys: Vec<MainlineKeyframe>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MainlineKeyframe {
    pub id: i32,
    pub time: f32,
    pub curve: Curve,
    /// Sorted ascending by id at load; array order is evaluation order.
    pub bone_refs: Vec<BoneRef>,
    /// Sorted ascending by id at load.
    pub object_refs: Vec<ObjectRef>,
}

/// Pointer to a bone timeline keyframe plus the authoritative parent slot.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct BoneRef {
    pub id: i32,
    pub parent: Option<usize>,
    pub timeline: usize,
    pub key: usize,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct ObjectRef {
    pub id: i32,
    pub parent: Option<usize>,
    pub timeline: usize,
    pub key: usize,
    pub z_index: i32,
}

/// Closed set of timeline payload types. An unknown tag in the source
/// document is a load error, never a silent default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Sprite,
    Bone,
    Box,
    Point,
    Sound,
    Entity,
    Variable,
}

impl ObjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectType::Sprite => "sprite",
            ObjectType::Bone => "bone",
            ObjectType::Box => "box",
            ObjectType::Point => "point",
            ObjectType::Sound => "sound",
            ObjectType::Entity => "entity",
            ObjectType::Variable => "variable",
        }
    }
}

/// One animated bone or object: its own time-ordered keyframes with payloads
/// homogeneous in `object_type` (enforced at load).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Timeline {
    pub id: i32,
    pub name: String,
    pub object_type: ObjectType,
    /// Index of the obj_info slot this timeline animates, when authored.
    pub obj: Option<usize>,
    pub keys: Vec<TimelineKeyframe>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TimelineKeyframe {
    pub id: i32,
    pub time: f32,
    /// Rotation direction across the interval to the next key:
    /// +1 increasing, −1 decreasing, 0 none (snap).
    pub spin: i32,
    pub curve: Curve,
    pub payload: TimelineObject,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TimelineObject {
    Sprite(SpriteObject),
    Bone(BoneObject),
    Box(BoxObject),
    Point(PointObject),
    Sound(SoundObject),
    Entity(EntityObject),
    /// Carries identity only; variables have no tweenable payload.
    Variable,
}

impl TimelineObject {
    pub fn type_name(&self) -> &'static str {
        match self {
            TimelineObject::Sprite(_) => "sprite",
            TimelineObject::Bone(_) => "bone",
            TimelineObject::Box(_) => "box",
            TimelineObject::Point(_) => "point",
            TimelineObject::Sound(_) => "sound",
            TimelineObject::Entity(_) => "entity",
            TimelineObject::Variable => "variable",
        }
    }

    pub fn matches(&self, tag: ObjectType) -> bool {
        matches!(
            (self, tag),
            (TimelineObject::Sprite(_), ObjectType::Sprite)
                | (TimelineObject::Bone(_), ObjectType::Bone)
                | (TimelineObject::Box(_), ObjectType::Box)
                | (TimelineObject::Point(_), ObjectType::Point)
                | (TimelineObject::Sound(_), ObjectType::Sound)
                | (TimelineObject::Entity(_), ObjectType::Entity)
                | (TimelineObject::Variable, ObjectType::Variable)
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SpriteObject {
    pub space: Space,
    pub folder: usize,
    pub file: usize,
    pub pivot: Vector,
    /// True when the source omitted the pivot; the loader back-fills the
    /// referenced file's pivot after folders are known.
    pub default_pivot: bool,
    pub alpha: f32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct BoneObject {
    pub space: Space,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct BoxObject {
    pub space: Space,
    pub pivot: Vector,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct PointObject {
    pub space: Space,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SoundObject {
    pub folder: usize,
    pub file: usize,
    pub trigger: bool,
    pub volume: f32,
    pub panning: f32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct EntityObject {
    pub space: Space,
    pub entity: usize,
    pub animation: usize,
    /// Normalized sub-animation time fraction in [0, 1].
    pub t: f32,
}

/// Root of a loaded document.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Data {
    pub folders: Vec<Folder>,
    pub entities: Vec<Entity>,
}

impl Data {
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn entity_index(&self, name: &str) -> Option<usize> {
        self.entities.iter().position(|e| e.name == name)
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(|e| e.name.as_str())
    }

    pub fn file(&self, folder: usize, file: usize) -> Option<&File> {
        self.folders.get(folder).and_then(|f| f.files.get(file))
    }
}

/// Anything with a position on a time axis; lets the keyframe index serve
/// both mainline and timeline sequences.
pub trait Keyed {
    fn time(&self) -> f32;
}

impl Keyed for MainlineKeyframe {
    fn time(&self) -> f32 {
        self.time
    }
}

impl Keyed for TimelineKeyframe {
    fn time(&self) -> f32 {
        self.time
    }
}

/// Binary search for the last keyframe whose time is ≤ `time`. `None` when
/// `time` precedes the first keyframe; callers pass times already wrapped
/// into the animation's range, which makes that unreachable in normal use.
pub fn find_keyframe<K: Keyed>(keys: &[K], time: f32) -> Option<usize> {
    if keys.is_empty() {
        return None;
    }
    if time < keys[0].time() {
        return None;
    }
    let last = keys.len() - 1;
    if time >= keys[last].time() {
        return Some(last);
    }
    let mut lo = 0usize;
    let mut hi = last;
    let mut current = hi >> 1;
    loop {
        if keys[current + 1].time() <= time {
            lo = current + 1;
        } else {
            hi = current;
        }
        if lo == hi {
            return Some(lo);
        }
        current = (lo + hi) >> 1;
    }
}
