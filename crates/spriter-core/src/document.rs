//! Document loader.
//!
//! Normalizes an already-parsed generic attribute/child tree
//! (`serde_json::Value`) into the typed [`Data`] model. The tree usually
//! comes from the format's native JSON flavor or from an XML→JSON converter;
//! both are accepted: attribute keys may be plain (`"time"`) or `@`-prefixed
//! (`"@time"`), numeric fields may arrive as numbers or text, booleans as
//! native booleans or the literals `"true"`/`"false"`, and fields that should
//! be sequences but were collapsed to a single element by the upstream parser
//! are re-expanded into one-element sequences.
//!
//! Loading is two-phase: folders/files first, then entities, then one fixup
//! pass that back-fills default pivots from the referenced files and verifies
//! every folder/file index resolves. Any structural problem aborts the whole
//! load with a [`LoadError`].

use serde_json::Value as Json;

use crate::curve::{Curve, CurveKind};
use crate::data::{
    Animation, BoneObject, BoneRef, BoxObject, Data, Entity, EntityObject, File, Folder, FrameRef,
    LoopMode, Mainline, MainlineKeyframe, ObjInfo, ObjInfoKind, ObjectRef, ObjectType,
    PointObject, SoundObject, SpriteObject, Timeline, TimelineKeyframe, TimelineObject, VarDef,
    VarValue,
};
use crate::error::LoadError;
use crate::math::{wrap_angle, Space, Vector};

/// Parse a document from JSON text and load it. A root wrapped in a
/// `spriter_data` namespace (as XML converters produce) is unwrapped first.
pub fn parse_document_json(text: &str) -> Result<Data, LoadError> {
    let json: Json = serde_json::from_str(text)?;
    let root = json.get("spriter_data").unwrap_or(&json);
    Data::from_tree(root)
}

impl Data {
    /// Load a document from a generic parsed tree.
    pub fn from_tree(root: &Json) -> Result<Data, LoadError> {
        if !root.is_object() {
            return Err(LoadError::NotAnObject);
        }

        let folders = elements(root, "folder")
            .into_iter()
            .enumerate()
            .map(|(idx, node)| load_folder(node, idx))
            .collect::<Result<Vec<_>, _>>()?;

        let mut entities = elements(root, "entity")
            .into_iter()
            .enumerate()
            .map(|(idx, node)| load_entity(node, idx))
            .collect::<Result<Vec<_>, _>>()?;

        // Folders must be complete before pivots can be inherited.
        resolve_file_refs(&folders, &mut entities)?;

        log::debug!(
            "loaded document: {} folders, {} entities",
            folders.len(),
            entities.len()
        );

        Ok(Data { folders, entities })
    }
}

// ----- coercion helpers (pure; the tree is the only input) -----

fn attr<'a>(node: &'a Json, key: &str) -> Option<&'a Json> {
    let obj = node.as_object()?;
    obj.get(key)
        .or_else(|| {
            obj.iter()
                .find(|(k, _)| k.strip_prefix('@') == Some(key))
                .map(|(_, v)| v)
        })
        .filter(|v| !v.is_null())
}

fn malformed(field: &'static str, v: &Json) -> LoadError {
    LoadError::Malformed {
        field,
        found: v.to_string(),
    }
}

fn json_f32(v: &Json) -> Option<f32> {
    match v {
        Json::Number(n) => n.as_f64().map(|f| f as f32),
        Json::String(s) => s.trim().parse::<f32>().ok(),
        _ => None,
    }
}

fn json_i32(v: &Json) -> Option<i32> {
    match v {
        Json::Number(n) => n.as_i64().map(|i| i as i32),
        Json::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    }
}

fn to_float(node: &Json, key: &'static str, def: f32) -> Result<f32, LoadError> {
    match attr(node, key) {
        None => Ok(def),
        Some(v) => json_f32(v).ok_or_else(|| malformed(key, v)),
    }
}

fn to_int(node: &Json, key: &'static str, def: i32) -> Result<i32, LoadError> {
    match attr(node, key) {
        None => Ok(def),
        Some(v) => json_i32(v).ok_or_else(|| malformed(key, v)),
    }
}

fn to_index(node: &Json, key: &'static str, def: usize) -> Result<usize, LoadError> {
    match attr(node, key) {
        None => Ok(def),
        Some(v) => json_i32(v)
            .filter(|i| *i >= 0)
            .map(|i| i as usize)
            .ok_or_else(|| malformed(key, v)),
    }
}

/// Parent references use −1 for "no parent".
fn to_parent(node: &Json, key: &'static str) -> Result<Option<usize>, LoadError> {
    let raw = to_int(node, key, -1)?;
    Ok(if raw < 0 { None } else { Some(raw as usize) })
}

fn to_bool(node: &Json, key: &'static str, def: bool) -> Result<bool, LoadError> {
    match attr(node, key) {
        None => Ok(def),
        Some(Json::Bool(b)) => Ok(*b),
        Some(Json::String(s)) if s == "true" => Ok(true),
        Some(Json::String(s)) if s == "false" => Ok(false),
        Some(v) => Err(malformed(key, v)),
    }
}

fn to_string(node: &Json, key: &'static str, def: &str) -> Result<String, LoadError> {
    match attr(node, key) {
        None => Ok(def.to_string()),
        Some(Json::String(s)) => Ok(s.clone()),
        Some(v) => Err(malformed(key, v)),
    }
}

/// Child sequence access with singleton-collapse repair: a missing field is
/// an empty sequence, an array is itself, anything else is a one-element
/// sequence.
fn elements<'a>(node: &'a Json, key: &str) -> Vec<&'a Json> {
    match attr(node, key) {
        None => Vec::new(),
        Some(Json::Array(items)) => items.iter().collect(),
        Some(single) => vec![single],
    }
}

// ----- node loaders -----

fn load_file(node: &Json, idx: usize) -> Result<File, LoadError> {
    Ok(File {
        id: to_int(node, "id", idx as i32)?,
        name: to_string(node, "name", "")?,
        width: to_float(node, "width", 0.0)?,
        height: to_float(node, "height", 0.0)?,
        pivot: Vector::new(
            to_float(node, "pivot_x", 0.0)?,
            to_float(node, "pivot_y", 1.0)?,
        ),
    })
}

fn load_folder(node: &Json, idx: usize) -> Result<Folder, LoadError> {
    Ok(Folder {
        id: to_int(node, "id", idx as i32)?,
        files: elements(node, "file")
            .into_iter()
            .enumerate()
            .map(|(i, n)| load_file(n, i))
            .collect::<Result<Vec<_>, _>>()?,
    })
}

fn load_var_def(node: &Json) -> Result<VarDef, LoadError> {
    let name = attr(node, "name")
        .and_then(Json::as_str)
        .ok_or(LoadError::MissingField("var_def name"))?
        .to_string();
    let kind = to_string(node, "type", "string")?;
    let default = match kind.as_str() {
        "int" => VarValue::Int(to_int(node, "default", 0)?),
        "float" => VarValue::Float(to_float(node, "default", 0.0)?),
        "string" => VarValue::Str(to_string(node, "default", "")?),
        other => return Err(LoadError::UnknownVarType(other.to_string())),
    };
    Ok(VarDef {
        name,
        value: default.clone(),
        default,
    })
}

fn load_frame_ref(node: &Json) -> Result<FrameRef, LoadError> {
    Ok(FrameRef {
        folder: to_index(node, "folder", 0)?,
        file: to_index(node, "file", 0)?,
    })
}

fn load_obj_info(node: &Json) -> Result<ObjInfo, LoadError> {
    let name = to_string(node, "name", "")?;
    let kind = match to_string(node, "type", "sprite")?.as_str() {
        "sprite" => ObjInfoKind::Sprite {
            frames: elements(node, "frames")
                .into_iter()
                .map(load_frame_ref)
                .collect::<Result<Vec<_>, _>>()?,
        },
        "bone" => ObjInfoKind::Bone {
            width: to_float(node, "w", 0.0)?,
            height: to_float(node, "h", 0.0)?,
        },
        "box" => ObjInfoKind::Box {
            width: to_float(node, "w", 0.0)?,
            height: to_float(node, "h", 0.0)?,
        },
        other => return Err(LoadError::UnknownObjInfoType(other.to_string())),
    };
    Ok(ObjInfo {
        name,
        kind,
        var_defs: elements(node, "var_defs")
            .into_iter()
            .map(load_var_def)
            .collect::<Result<Vec<_>, _>>()?,
    })
}

fn load_curve(node: &Json) -> Result<Curve, LoadError> {
    let kind = match to_string(node, "curve_type", "linear")?.as_str() {
        "instant" => CurveKind::Instant,
        "linear" => CurveKind::Linear,
        "quadratic" => CurveKind::Quadratic,
        "cubic" => CurveKind::Cubic,
        "quartic" => CurveKind::Quartic,
        "quintic" => CurveKind::Quintic,
        "bezier" => CurveKind::Bezier,
        other => return Err(LoadError::UnknownCurveType(other.to_string())),
    };
    Ok(Curve::new(
        kind,
        to_float(node, "c1", 0.0)?,
        to_float(node, "c2", 0.0)?,
        to_float(node, "c3", 0.0)?,
        to_float(node, "c4", 0.0)?,
    ))
}

/// Local transform attributes shared by every spatial payload. Angles are
/// authored in degrees; the model keeps radians.
fn load_space(node: &Json) -> Result<Space, LoadError> {
    Ok(Space {
        position: Vector::new(to_float(node, "x", 0.0)?, to_float(node, "y", 0.0)?),
        rotation: wrap_angle(to_float(node, "angle", 0.0)?.to_radians()),
        scale: Vector::new(
            to_float(node, "scale_x", 1.0)?,
            to_float(node, "scale_y", 1.0)?,
        ),
    })
}

fn load_bone_ref(node: &Json) -> Result<BoneRef, LoadError> {
    Ok(BoneRef {
        id: to_int(node, "id", 0)?,
        parent: to_parent(node, "parent")?,
        timeline: to_index(node, "timeline", 0)?,
        key: to_index(node, "key", 0)?,
    })
}

fn load_object_ref(node: &Json) -> Result<ObjectRef, LoadError> {
    Ok(ObjectRef {
        id: to_int(node, "id", 0)?,
        parent: to_parent(node, "parent")?,
        timeline: to_index(node, "timeline", 0)?,
        key: to_index(node, "key", 0)?,
        z_index: to_int(node, "z_index", 0)?,
    })
}

fn load_mainline_key(node: &Json) -> Result<MainlineKeyframe, LoadError> {
    let mut bone_refs = elements(node, "bone_ref")
        .into_iter()
        .map(load_bone_ref)
        .collect::<Result<Vec<_>, _>>()?;
    bone_refs.sort_by_key(|r| r.id);

    let mut object_refs = elements(node, "object_ref")
        .into_iter()
        .map(load_object_ref)
        .collect::<Result<Vec<_>, _>>()?;
    object_refs.sort_by_key(|r| r.id);

    Ok(MainlineKeyframe {
        id: to_int(node, "id", 0)?,
        time: to_float(node, "time", 0.0)?,
        curve: load_curve(node)?,
        bone_refs,
        object_refs,
    })
}

fn load_sprite(node: &Json) -> Result<SpriteObject, LoadError> {
    let default_pivot = attr(node, "pivot_x").is_none() && attr(node, "pivot_y").is_none();
    Ok(SpriteObject {
        space: load_space(node)?,
        folder: to_index(node, "folder", 0)?,
        file: to_index(node, "file", 0)?,
        pivot: Vector::new(
            to_float(node, "pivot_x", 0.0)?,
            to_float(node, "pivot_y", 1.0)?,
        ),
        default_pivot,
        alpha: to_float(node, "a", 1.0)?,
    })
}

fn load_timeline_payload(
    node: &Json,
    object_type: ObjectType,
    timeline_name: &str,
    key_idx: usize,
) -> Result<TimelineObject, LoadError> {
    // Bone timelines keep their payload under "bone", everything else under
    // "object". An empty element collapsed to a bare scalar by the upstream
    // converter reads as an all-defaults attribute set.
    let (child_key, other_key) = if object_type == ObjectType::Bone {
        ("bone", "object")
    } else {
        ("object", "bone")
    };
    if attr(node, child_key).is_none() && attr(node, other_key).is_some() {
        return Err(LoadError::PayloadMismatch {
            timeline: timeline_name.to_string(),
            expected: object_type.as_str(),
            found: other_key,
            key: key_idx,
        });
    }
    let empty = Json::Null;
    let payload = attr(node, child_key).unwrap_or(&empty);

    Ok(match object_type {
        ObjectType::Sprite => TimelineObject::Sprite(load_sprite(payload)?),
        ObjectType::Bone => TimelineObject::Bone(BoneObject {
            space: load_space(payload)?,
        }),
        ObjectType::Box => TimelineObject::Box(BoxObject {
            space: load_space(payload)?,
            pivot: Vector::new(
                to_float(payload, "pivot_x", 0.0)?,
                to_float(payload, "pivot_y", 1.0)?,
            ),
        }),
        ObjectType::Point => TimelineObject::Point(PointObject {
            space: load_space(payload)?,
        }),
        ObjectType::Sound => TimelineObject::Sound(SoundObject {
            folder: to_index(payload, "folder", 0)?,
            file: to_index(payload, "file", 0)?,
            trigger: to_bool(payload, "trigger", true)?,
            volume: to_float(payload, "volume", 1.0)?,
            panning: to_float(payload, "panning", 0.0)?,
        }),
        ObjectType::Entity => TimelineObject::Entity(EntityObject {
            space: load_space(payload)?,
            entity: to_index(payload, "entity", 0)?,
            animation: to_index(payload, "animation", 0)?,
            t: to_float(payload, "t", 0.0)?,
        }),
        ObjectType::Variable => TimelineObject::Variable,
    })
}

fn load_timeline_key(
    node: &Json,
    object_type: ObjectType,
    timeline_name: &str,
    key_idx: usize,
) -> Result<TimelineKeyframe, LoadError> {
    Ok(TimelineKeyframe {
        id: to_int(node, "id", key_idx as i32)?,
        time: to_float(node, "time", 0.0)?,
        spin: to_int(node, "spin", 1)?,
        curve: load_curve(node)?,
        payload: load_timeline_payload(node, object_type, timeline_name, key_idx)?,
    })
}

fn load_timeline(node: &Json) -> Result<Timeline, LoadError> {
    let name = to_string(node, "name", "")?;
    let object_type = match to_string(node, "object_type", "sprite")?.as_str() {
        "sprite" => ObjectType::Sprite,
        "bone" => ObjectType::Bone,
        "box" => ObjectType::Box,
        "point" => ObjectType::Point,
        "sound" => ObjectType::Sound,
        "entity" => ObjectType::Entity,
        "variable" => ObjectType::Variable,
        other => return Err(LoadError::UnknownObjectType(other.to_string())),
    };
    let obj = match attr(node, "obj") {
        None => None,
        Some(_) => Some(to_index(node, "obj", 0)?),
    };

    let mut keys = elements(node, "key")
        .into_iter()
        .enumerate()
        .map(|(i, n)| load_timeline_key(n, object_type, &name, i))
        .collect::<Result<Vec<_>, _>>()?;
    keys.sort_by(|a, b| a.time.total_cmp(&b.time));

    Ok(Timeline {
        id: to_int(node, "id", 0)?,
        name,
        object_type,
        obj,
        keys,
    })
}

fn load_loop_mode(node: &Json) -> Result<LoopMode, LoadError> {
    match attr(node, "looping") {
        None => Ok(LoopMode::Loop),
        Some(Json::Bool(true)) => Ok(LoopMode::Loop),
        Some(Json::Bool(false)) => Ok(LoopMode::Once),
        Some(Json::String(s)) => match s.as_str() {
            "true" => Ok(LoopMode::Loop),
            "false" => Ok(LoopMode::Once),
            "ping_pong" => Ok(LoopMode::PingPong),
            other => Err(LoadError::UnknownLoopMode(other.to_string())),
        },
        Some(v) => Err(malformed("looping", v)),
    }
}

fn load_animation(node: &Json, idx: usize) -> Result<Animation, LoadError> {
    let length = to_float(node, "length", 0.0)?;

    let mainline_node = attr(node, "mainline").ok_or(LoadError::MissingField("mainline"))?;
    let mut keys = elements(mainline_node, "key")
        .into_iter()
        .map(load_mainline_key)
        .collect::<Result<Vec<_>, _>>()?;
    keys.sort_by(|a, b| a.time.total_cmp(&b.time));

    let timelines = elements(node, "timeline")
        .into_iter()
        .map(load_timeline)
        .collect::<Result<Vec<_>, _>>()?;

    let loop_to = match attr(node, "loop_to") {
        None => None,
        Some(_) => Some(to_float(node, "loop_to", 0.0)?),
    };

    Ok(Animation {
        id: to_int(node, "id", idx as i32)?,
        name: to_string(node, "name", "")?,
        length,
        loop_mode: load_loop_mode(node)?,
        loop_to,
        mainline: Mainline { keys },
        timelines,
        min_time: 0.0,
        max_time: length,
    })
}

fn load_entity(node: &Json, idx: usize) -> Result<Entity, LoadError> {
    let mut obj_infos = hashbrown::HashMap::new();
    for info_node in elements(node, "obj_info") {
        let info = load_obj_info(info_node)?;
        if let Some(prev) = obj_infos.insert(info.name.clone(), info) {
            log::warn!("duplicate obj_info '{}' replaced", prev.name);
        }
    }

    Ok(Entity {
        id: to_int(node, "id", idx as i32)?,
        name: to_string(node, "name", "")?,
        var_defs: elements(node, "var_defs")
            .into_iter()
            .map(load_var_def)
            .collect::<Result<Vec<_>, _>>()?,
        obj_infos,
        animations: elements(node, "animation")
            .into_iter()
            .enumerate()
            .map(|(i, n)| load_animation(n, i))
            .collect::<Result<Vec<_>, _>>()?,
    })
}

// ----- fixup pass -----

fn check_file(folders: &[Folder], folder: usize, file: usize) -> Result<(), LoadError> {
    folders
        .get(folder)
        .and_then(|f| f.files.get(file))
        .map(|_| ())
        .ok_or(LoadError::FileNotFound { folder, file })
}

/// Back-fill default pivots from the referenced files and verify every
/// folder/file index in payloads and obj_info frame lists resolves. Runs
/// after folder loading completes; sprite pivots depend on it.
fn resolve_file_refs(folders: &[Folder], entities: &mut [Entity]) -> Result<(), LoadError> {
    for entity in entities.iter_mut() {
        for info in entity.obj_infos.values() {
            if let ObjInfoKind::Sprite { frames } = &info.kind {
                for frame in frames {
                    check_file(folders, frame.folder, frame.file)?;
                }
            }
        }
        for animation in entity.animations.iter_mut() {
            for timeline in animation.timelines.iter_mut() {
                for key in timeline.keys.iter_mut() {
                    match &mut key.payload {
                        TimelineObject::Sprite(sprite) => {
                            let file = folders
                                .get(sprite.folder)
                                .and_then(|f| f.files.get(sprite.file))
                                .ok_or(LoadError::FileNotFound {
                                    folder: sprite.folder,
                                    file: sprite.file,
                                })?;
                            if sprite.default_pivot {
                                sprite.pivot = file.pivot;
                            }
                        }
                        TimelineObject::Sound(sound) => {
                            check_file(folders, sound.folder, sound.file)?;
                        }
                        _ => {}
                    }
                }
            }
        }
    }
    Ok(())
}
