//! Error types for loading and evaluation.

use thiserror::Error;

/// Structural errors raised while normalizing a generic document tree into
/// [`Data`](crate::data::Data). Any of these aborts the whole load.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("document root is not an object")]
    NotAnObject,
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("malformed value for '{field}': {found}")]
    Malformed { field: &'static str, found: String },
    #[error("unknown timeline object type '{0}'")]
    UnknownObjectType(String),
    #[error("unknown curve type '{0}'")]
    UnknownCurveType(String),
    #[error("unknown obj_info type '{0}'")]
    UnknownObjInfoType(String),
    #[error("unknown variable type '{0}'")]
    UnknownVarType(String),
    #[error("unknown looping mode '{0}'")]
    UnknownLoopMode(String),
    #[error("folder {folder} file {file} does not resolve")]
    FileNotFound { folder: usize, file: usize },
    #[error("timeline '{timeline}' is typed {expected} but key {key} carries a {found} payload")]
    PayloadMismatch {
        timeline: String,
        expected: &'static str,
        found: &'static str,
        key: usize,
    },
    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reference errors raised while striking a pose. These indicate corrupt
/// animation data (an upstream producer defect), not a runtime condition,
/// so there is no clamping or partial recovery.
#[derive(Debug, Error)]
pub enum PoseError {
    #[error("no entity selected")]
    NoEntity,
    #[error("no entity named '{0}'")]
    UnknownEntity(String),
    #[error("entity index {0} out of range")]
    EntityOutOfRange(usize),
    #[error("no animation named '{0}'")]
    UnknownAnimation(String),
    #[error("animation index {0} out of range")]
    AnimationOutOfRange(usize),
    #[error("timeline index {0} out of range")]
    TimelineOutOfRange(usize),
    #[error("keyframe index {key} out of range for timeline {timeline}")]
    KeyframeOutOfRange { timeline: usize, key: usize },
    #[error("no mainline keyframe covers time {0}")]
    NoMainlineKeyframe(f32),
    #[error("timeline {timeline} payload does not match its {expected} type tag")]
    PayloadMismatch {
        timeline: usize,
        expected: &'static str,
    },
    #[error("folder {folder} file {file} does not resolve")]
    FileNotFound { folder: usize, file: usize },
    #[error("no obj_info named '{0}' on the current entity")]
    MissingObjInfo(String),
    #[error("loop mode ping_pong has no evaluation rule")]
    UnsupportedLoopMode,
    #[error("entity {0} references itself through nested entity objects")]
    EntityCycle(usize),
}
