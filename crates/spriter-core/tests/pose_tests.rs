use std::sync::Arc;

use serde_json::json;
use spriter_core::{Data, Pose, PoseError, PoseObjectKind};
use spriter_test_fixtures::documents;

const EPS: f32 = 1e-4;

fn approx(a: f32, b: f32) {
    assert!((a - b).abs() <= EPS, "left={a} right={b}");
}

fn load(tree: serde_json::Value) -> Arc<Data> {
    Arc::new(Data::from_tree(&tree).expect("fixture should load"))
}

fn hero() -> Arc<Data> {
    Arc::new(Data::from_tree(&documents::tree("hero").expect("fixture")).expect("load"))
}

/// One entity "E", one animation "A": a single bone timeline with the given
/// keys, each (time, angle_deg, spin, curve_type).
fn one_bone_data(length: f32, keys: &[(f32, f32, i32, &str)]) -> Arc<Data> {
    let timeline_keys: Vec<serde_json::Value> = keys
        .iter()
        .enumerate()
        .map(|(i, &(time, angle, spin, curve))| {
            json!({
                "id": i, "time": time, "spin": spin, "curve_type": curve,
                "bone": { "angle": angle }
            })
        })
        .collect();
    load(json!({
        "folder": [],
        "entity": [
            { "id": 0, "name": "E", "animation": [
                { "id": 0, "name": "A", "length": length,
                  "mainline": { "key": [
                      { "id": 0, "time": 0,
                        "bone_ref": [{ "id": 0, "timeline": 0, "key": 0 }] }
                  ]},
                  "timeline": [
                      { "id": 0, "name": "root", "object_type": "bone",
                        "key": timeline_keys }
                  ]}
            ]}
        ]
    }))
}

/// it should interpolate a linear bone rotation to 22.5° at a quarter of the way
#[test]
fn end_to_end_linear_rotation() {
    let data = one_bone_data(1000.0, &[(0.0, 0.0, 1, "linear"), (1000.0, 90.0, 1, "linear")]);
    let mut pose = Pose::new(data);
    pose.set_entity("E").unwrap();
    pose.set_anim("A").unwrap();
    pose.set_time(250.0);
    pose.strike().unwrap();

    assert_eq!(pose.bones.len(), 1);
    approx(pose.bones[0].world.rotation, 22.5f32.to_radians());
}

/// it should wrap setTime(length) to 0 on a looping animation
#[test]
fn looping_wrap_is_half_open() {
    let data = one_bone_data(1000.0, &[(0.0, 0.0, 1, "linear"), (1000.0, 90.0, 1, "linear")]);
    let mut pose = Pose::new(data);
    pose.set_entity("E").unwrap();
    pose.set_time(1000.0);
    assert_eq!(pose.time(), 0.0);
    pose.set_time(1250.0);
    assert_eq!(pose.time(), 250.0);
    pose.set_time(-250.0);
    assert_eq!(pose.time(), 750.0);
}

/// it should accumulate elapsed time across updates and strike once with the sum
#[test]
fn lazy_update_accumulates() {
    let data = one_bone_data(1000.0, &[(0.0, 0.0, 1, "linear"), (1000.0, 90.0, 1, "linear")]);
    let mut pose = Pose::new(data);
    pose.set_entity("E").unwrap();
    pose.update(16.0);
    pose.update(16.0);
    pose.strike().unwrap();
    assert_eq!(pose.time(), 32.0);
    approx(pose.bones[0].world.rotation, (90.0 * 32.0 / 1000.0f32).to_radians());

    // a clean pose strikes for free and nothing moves
    pose.strike().unwrap();
    assert_eq!(pose.time(), 32.0);
}

/// it should hold the first key's value across an instant curve interval
#[test]
fn instant_curve_snaps() {
    let data = one_bone_data(1000.0, &[(0.0, 0.0, 1, "instant"), (1000.0, 90.0, 1, "linear")]);
    let mut pose = Pose::new(data);
    pose.set_entity("E").unwrap();
    pose.set_time(900.0);
    pose.strike().unwrap();
    approx(pose.bones[0].world.rotation, 0.0);
}

/// it should obey spin 0 by snapping rotation to the left key
#[test]
fn spin_zero_does_not_rotate() {
    let data = one_bone_data(1000.0, &[(0.0, 45.0, 0, "linear"), (1000.0, 170.0, 1, "linear")]);
    let mut pose = Pose::new(data);
    pose.set_entity("E").unwrap();
    pose.set_time(500.0);
    pose.strike().unwrap();
    approx(pose.bones[0].world.rotation, 45f32.to_radians());
}

/// it should keep a single-keyframe timeline constant at any time
#[test]
fn single_keyframe_is_constant() {
    let data = one_bone_data(1000.0, &[(0.0, 30.0, 1, "linear")]);
    let mut pose = Pose::new(data);
    pose.set_entity("E").unwrap();
    for t in [0.0, 250.0, 999.0] {
        pose.set_time(t);
        pose.strike().unwrap();
        approx(pose.bones[0].world.rotation, 30f32.to_radians());
    }
}

/// it should wrap a looped timeline's last interval toward its first key
#[test]
fn looped_timeline_wraps_to_first_key() {
    // keys at 0 and 500 in a 1000-long loop; at 750 the active pair is
    // (key1 at 500 -> key0 at effective time 1000), halfway back from 180° to 360°
    let data = load(json!({
        "folder": [],
        "entity": [
            { "id": 0, "name": "E", "animation": [
                { "id": 0, "name": "A", "length": 1000,
                  "mainline": { "key": [
                      { "id": 0, "time": 0,
                        "bone_ref": [{ "id": 0, "timeline": 0, "key": 0 }] },
                      { "id": 1, "time": 500,
                        "bone_ref": [{ "id": 0, "timeline": 0, "key": 1 }] }
                  ]},
                  "timeline": [
                      { "id": 0, "name": "root", "object_type": "bone", "key": [
                          { "id": 0, "time": 0, "spin": 1, "bone": { "angle": 0 } },
                          { "id": 1, "time": 500, "spin": 1, "bone": { "angle": 180 } }
                      ]}
                  ]}
            ]}
        ]
    }));
    let mut pose = Pose::new(data);
    pose.set_entity("E").unwrap();
    pose.set_time(750.0);
    pose.strike().unwrap();
    approx(
        pose.bones[0].world.rotation.rem_euclid(std::f32::consts::TAU),
        270f32.to_radians(),
    );
}

/// it should compose parent world transforms in slot order
#[test]
fn bone_hierarchy_composes() {
    let data = load(json!({
        "folder": [],
        "entity": [
            { "id": 0, "name": "E", "animation": [
                { "id": 0, "name": "A", "length": 1000,
                  "mainline": { "key": [
                      { "id": 0, "time": 0, "bone_ref": [
                          { "id": 0, "timeline": 0, "key": 0 },
                          { "id": 1, "timeline": 1, "key": 0, "parent": 0 }
                      ]}
                  ]},
                  "timeline": [
                      { "id": 0, "name": "root", "object_type": "bone", "key": [
                          { "id": 0, "time": 0, "bone": { "x": 10, "y": 0, "angle": 90 } }
                      ]},
                      { "id": 1, "name": "child", "object_type": "bone", "key": [
                          { "id": 0, "time": 0, "bone": { "x": 10, "y": 0, "angle": 0 } }
                      ]}
                  ]}
            ]}
        ]
    }));
    let mut pose = Pose::new(data);
    pose.set_entity("E").unwrap();
    pose.strike().unwrap();

    assert_eq!(pose.bones.len(), 2);
    let child = &pose.bones[1];
    assert_eq!(child.parent, Some(0));
    // child local (10, 0) rotated into the root's 90° frame, offset by (10, 0)
    approx(child.world.position.x, 10.0);
    approx(child.world.position.y, 10.0);
    approx(child.world.rotation, 90f32.to_radians());
}

/// it should truncate the output arrays to the active keyframe's ref counts
#[test]
fn output_truncates_per_mainline_key() {
    let data = load(json!({
        "folder": [],
        "entity": [
            { "id": 0, "name": "E", "animation": [
                { "id": 0, "name": "A", "length": 1000,
                  "mainline": { "key": [
                      { "id": 0, "time": 0, "bone_ref": [
                          { "id": 0, "timeline": 0, "key": 0 },
                          { "id": 1, "timeline": 1, "key": 0 }
                      ]},
                      { "id": 1, "time": 500, "bone_ref": [
                          { "id": 0, "timeline": 0, "key": 0 }
                      ]}
                  ]},
                  "timeline": [
                      { "id": 0, "name": "a", "object_type": "bone", "key": [
                          { "id": 0, "time": 0, "bone": {} }
                      ]},
                      { "id": 1, "name": "b", "object_type": "bone", "key": [
                          { "id": 0, "time": 0, "bone": {} }
                      ]}
                  ]}
            ]}
        ]
    }));
    let mut pose = Pose::new(data);
    pose.set_entity("E").unwrap();
    pose.set_time(100.0);
    pose.strike().unwrap();
    assert_eq!(pose.bones.len(), 2);

    pose.set_time(600.0);
    pose.strike().unwrap();
    assert_eq!(pose.bones.len(), 1);
}

/// it should offset sprite objects by their pivot against the file extents
#[test]
fn sprite_pivot_offset() {
    let data = load(json!({
        "folder": [
            { "id": 0, "file": [
                { "id": 0, "name": "p.png", "width": 64, "height": 128,
                  "pivot_x": 0, "pivot_y": 1 }
            ]}
        ],
        "entity": [
            { "id": 0, "name": "E", "animation": [
                { "id": 0, "name": "A", "length": 100,
                  "mainline": { "key": [
                      { "id": 0, "time": 0,
                        "object_ref": [{ "id": 0, "timeline": 0, "key": 0, "z_index": 3 }] }
                  ]},
                  "timeline": [
                      { "id": 0, "name": "part", "key": [
                          { "id": 0, "time": 0, "object": { "folder": 0, "file": 0 } }
                      ]}
                  ]}
            ]}
        ]
    }));
    let mut pose = Pose::new(data);
    pose.set_entity("E").unwrap();
    pose.strike().unwrap();

    let object = &pose.objects[0];
    // pivot (0, 1): offset = (0.5 - 0) * 64, (0.5 - 1) * 128
    approx(object.world.position.x, 32.0);
    approx(object.world.position.y, -64.0);
    match &object.kind {
        PoseObjectKind::Sprite { alpha, z_index, .. } => {
            approx(*alpha, 1.0);
            assert_eq!(*z_index, 3);
        }
        other => panic!("expected sprite output, got {other:?}"),
    }
}

/// it should offset box objects by the entity's obj_info dimensions
#[test]
fn box_pivot_offset_uses_obj_info() {
    let data = load(json!({
        "folder": [],
        "entity": [
            { "id": 0, "name": "E",
              "obj_info": [{ "name": "hit", "type": "box", "w": 40, "h": 80 }],
              "animation": [
                { "id": 0, "name": "A", "length": 100,
                  "mainline": { "key": [
                      { "id": 0, "time": 0,
                        "object_ref": [{ "id": 0, "timeline": 0, "key": 0 }] }
                  ]},
                  "timeline": [
                      { "id": 0, "name": "hit", "object_type": "box", "key": [
                          { "id": 0, "time": 0, "object": { "pivot_x": 0.5, "pivot_y": 0.5 } }
                      ]}
                  ]}
              ]}
        ]
    }));
    let mut pose = Pose::new(data);
    pose.set_entity("E").unwrap();
    pose.strike().unwrap();
    // centered pivot cancels the offset entirely
    approx(pose.objects[0].world.position.x, 0.0);
    approx(pose.objects[0].world.position.y, 0.0);

    // a missing obj_info is a hard evaluation error
    let broken = load(json!({
        "folder": [],
        "entity": [
            { "id": 0, "name": "E", "animation": [
                { "id": 0, "name": "A", "length": 100,
                  "mainline": { "key": [
                      { "id": 0, "time": 0,
                        "object_ref": [{ "id": 0, "timeline": 0, "key": 0 }] }
                  ]},
                  "timeline": [
                      { "id": 0, "name": "nameless", "object_type": "box", "key": [
                          { "id": 0, "time": 0, "object": {} }
                      ]}
                  ]}
            ]}
        ]
    }));
    let mut pose = Pose::new(broken);
    pose.set_entity("E").unwrap();
    assert!(matches!(pose.strike(), Err(PoseError::MissingObjInfo(_))));
}

/// it should tween sound volume/panning without giving the object a transform
#[test]
fn sound_objects_tween_volume() {
    let data = load(json!({
        "folder": [
            { "id": 0, "file": [{ "id": 0, "name": "s.ogg", "width": 0, "height": 0 }] }
        ],
        "entity": [
            { "id": 0, "name": "E", "animation": [
                { "id": 0, "name": "A", "length": 1000,
                  "mainline": { "key": [
                      { "id": 0, "time": 0,
                        "object_ref": [{ "id": 0, "timeline": 0, "key": 0 }] }
                  ]},
                  "timeline": [
                      { "id": 0, "name": "s", "object_type": "sound", "key": [
                          { "id": 0, "time": 0,
                            "object": { "folder": 0, "file": 0, "volume": 0.8, "panning": -1 } },
                          { "id": 1, "time": 500,
                            "object": { "folder": 0, "file": 0, "volume": 0.4, "panning": 1 } }
                      ]}
                  ]}
            ]}
        ]
    }));
    let mut pose = Pose::new(data);
    pose.set_entity("E").unwrap();
    pose.set_time(250.0);
    pose.strike().unwrap();

    match &pose.objects[0].kind {
        PoseObjectKind::Sound { volume, panning, trigger, .. } => {
            approx(*volume, 0.6);
            approx(*panning, 0.0);
            assert!(*trigger);
        }
        other => panic!("expected sound output, got {other:?}"),
    }
    approx(pose.objects[0].world.position.x, 0.0);
    approx(pose.objects[0].world.rotation, 0.0);
}

/// it should strike a nested entity object recursively with the mapped sub-time
#[test]
fn nested_entity_strikes_sub_pose() {
    let mut pose = Pose::new(hero());
    pose.set_entity("scene").unwrap();
    pose.set_anim("show").unwrap();
    pose.set_time(500.0);
    pose.strike().unwrap();

    assert_eq!(pose.objects.len(), 1);
    match &pose.objects[0].kind {
        PoseObjectKind::Entity { pose: sub } => {
            assert_eq!(sub.entity_name(), Some("hero"));
            assert_eq!(sub.anim_name(), Some("walk"));
            // t lerps 0 -> 1 over the first 1000ms, so sub-time is 500 of 1000
            approx(sub.time(), 500.0);
            // hero's root bone hits 90° at its 500ms key
            approx(
                sub.bones[0].world.rotation.rem_euclid(std::f32::consts::TAU),
                90f32.to_radians(),
            );
        }
        other => panic!("expected entity output, got {other:?}"),
    }

    // the sub-pose advances with the parent on the next strike
    pose.set_time(600.0);
    pose.strike().unwrap();
    match &pose.objects[0].kind {
        PoseObjectKind::Entity { pose: sub } => approx(sub.time(), 600.0),
        other => panic!("expected entity output, got {other:?}"),
    }
}

/// it should fail fast on an entity that nests itself
#[test]
fn self_referential_entity_is_a_cycle() {
    let data = load(json!({
        "folder": [],
        "entity": [
            { "id": 0, "name": "ouroboros", "animation": [
                { "id": 0, "name": "A", "length": 1000,
                  "mainline": { "key": [
                      { "id": 0, "time": 0,
                        "object_ref": [{ "id": 0, "timeline": 0, "key": 0 }] }
                  ]},
                  "timeline": [
                      { "id": 0, "name": "self", "object_type": "entity", "key": [
                          { "id": 0, "time": 0,
                            "object": { "entity": 0, "animation": 0, "t": 0 } }
                      ]}
                  ]}
            ]}
        ]
    }));
    let mut pose = Pose::new(data);
    pose.set_entity("ouroboros").unwrap();
    assert!(matches!(pose.strike(), Err(PoseError::EntityCycle(0))));
}

/// it should refuse to strike a ping_pong animation
#[test]
fn ping_pong_is_unsupported() {
    let data = load(json!({
        "folder": [],
        "entity": [
            { "id": 0, "name": "E", "animation": [
                { "id": 0, "name": "A", "length": 1000, "looping": "ping_pong",
                  "mainline": { "key": [
                      { "id": 0, "time": 0,
                        "bone_ref": [{ "id": 0, "timeline": 0, "key": 0 }] }
                  ]},
                  "timeline": [
                      { "id": 0, "name": "root", "object_type": "bone", "key": [
                          { "id": 0, "time": 0, "bone": {} }
                      ]}
                  ]}
            ]}
        ]
    }));
    let mut pose = Pose::new(data);
    pose.set_entity("E").unwrap();
    assert!(matches!(pose.strike(), Err(PoseError::UnsupportedLoopMode)));
}

/// it should clamp a non-looping animation instead of wrapping
#[test]
fn once_animation_clamps() {
    let mut pose = Pose::new(hero());
    pose.set_entity("hero").unwrap();
    pose.set_anim("idle").unwrap();
    pose.set_time(900.0);
    assert_eq!(pose.time(), 400.0);
    pose.update(1000.0);
    pose.strike().unwrap();
    assert_eq!(pose.time(), 400.0);
}

/// it should reset pooled state when the entity changes
#[test]
fn entity_change_clears_outputs() {
    let mut pose = Pose::new(hero());
    pose.set_entity("hero").unwrap();
    pose.strike().unwrap();
    assert!(!pose.bones.is_empty());

    pose.set_entity("scene").unwrap();
    assert!(pose.bones.is_empty());
    assert!(pose.objects.is_empty());
    assert_eq!(pose.anim_name(), Some("show"));
    assert_eq!(pose.time(), 0.0);
}

/// it should evaluate the hero fixture end to end with every object type
#[test]
fn hero_walk_full_frame() {
    let mut pose = Pose::new(hero());
    pose.set_entity("hero").unwrap();
    pose.set_anim("walk").unwrap();
    pose.set_time(250.0);
    pose.strike().unwrap();

    assert_eq!(pose.bones.len(), 2);
    // root halfway between 0° and 90°
    approx(pose.bones[0].world.rotation, 45f32.to_radians());
    // arm spins clockwise toward -45°
    approx(
        pose.bones[1].world.rotation,
        (45.0 - 22.5f32).to_radians(),
    );

    assert_eq!(pose.objects.len(), 4);
    assert!(matches!(pose.objects[0].kind, PoseObjectKind::Sprite { .. }));
    assert!(matches!(pose.objects[1].kind, PoseObjectKind::Box { .. }));
    assert!(matches!(pose.objects[2].kind, PoseObjectKind::Point));
    assert!(matches!(pose.objects[3].kind, PoseObjectKind::Sound { .. }));
}

/// it should do nothing on a strike with no selection
#[test]
fn strike_without_selection_is_empty() {
    let mut pose = Pose::new(hero());
    pose.strike().unwrap();
    assert!(pose.bones.is_empty());
    assert!(pose.objects.is_empty());
}

/// it should handle a zero-length animation without dividing by zero
#[test]
fn zero_length_animation() {
    let data = one_bone_data(0.0, &[(0.0, 15.0, 1, "linear")]);
    let mut pose = Pose::new(data);
    pose.set_entity("E").unwrap();
    pose.update(1234.0);
    pose.strike().unwrap();
    assert_eq!(pose.time(), 0.0);
    approx(pose.bones[0].world.rotation, 15f32.to_radians());
}

/// it should cycle animations with next/prev helpers
#[test]
fn anim_cycling() {
    let mut pose = Pose::new(hero());
    pose.set_entity("hero").unwrap();
    assert_eq!(pose.anim_name(), Some("walk"));
    pose.set_next_anim().unwrap();
    assert_eq!(pose.anim_name(), Some("idle"));
    pose.set_next_anim().unwrap();
    assert_eq!(pose.anim_name(), Some("walk"));
    pose.set_prev_anim().unwrap();
    assert_eq!(pose.anim_name(), Some("idle"));
}
