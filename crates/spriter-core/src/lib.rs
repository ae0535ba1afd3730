//! Spriter animation runtime core (renderer-agnostic).
//!
//! This crate owns the data model, the document loader, and the per-frame
//! pose evaluation for Spriter-format 2D skeletal/sprite animation. Format
//! parsing into a generic tree (XML→JSON), resource loading, and drawing are
//! external concerns: callers hand the loader an already-parsed
//! `serde_json::Value` and read world-space bone/object arrays back from a
//! [`Pose`] after each strike.
//!
//! Typical flow:
//! ```no_run
//! use std::sync::Arc;
//! use spriter_core::{parse_document_json, Pose};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let text = "{}";
//! let data = Arc::new(parse_document_json(text)?);
//! let mut pose = Pose::new(data);
//! pose.set_entity("hero")?;
//! pose.set_anim("walk")?;
//! pose.update(16.0);
//! pose.strike()?;
//! for bone in &pose.bones {
//!     let _ = bone.world;
//! }
//! # Ok(())
//! # }
//! ```

pub mod curve;
pub mod data;
pub mod document;
pub mod error;
pub mod math;
pub mod pose;

// Re-exports for consumers (renderers, importers)
pub use curve::{Curve, CurveKind};
pub use data::{
    find_keyframe, Animation, BoneObject, BoneRef, BoxObject, Data, Entity, EntityObject, File,
    Folder, FrameRef, Keyed, LoopMode, Mainline, MainlineKeyframe, ObjInfo, ObjInfoKind,
    ObjectRef, ObjectType, PointObject, SoundObject, SpriteObject, Timeline, TimelineKeyframe,
    TimelineObject, VarDef, VarValue,
};
pub use document::parse_document_json;
pub use error::{LoadError, PoseError};
pub use math::{Space, Vector};
pub use pose::{wrap, Pose, PoseBone, PoseObject, PoseObjectKind};
