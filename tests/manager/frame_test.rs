//! Full frames: picking, event diffing, ordering and selectable dispatch

use std::sync::Arc;

use bevy::math::{Quat, Vec3};
use parking_lot::Mutex;
use xreal_cursor3d::cursor::CursorActivationListener;
use xreal_cursor3d::input::{KeyCode, KeyEvent};
use xreal_cursor3d::{
    Cursor, CursorEvent, CursorEventKind, CursorKind, CursorManager, CursorManagerConfig,
    DeviceIdentity, EventGroup, NodeId, ObjectState, SceneGraph, SelectableBehavior,
};

use crate::test_utils::*;

const FRAME_MS: u64 = 16;

/// Object cursor driven by the gaze device, sitting 2 units ahead
fn object_manager(object_size: f32, depth_ordering: bool) -> (CursorManager, tempfile::TempDir) {
    manager_with(
        vec![cursor_config("obj", CursorKind::Object, &[])],
        object_size,
        CursorManagerConfig {
            depth_ordering,
            cursor_scale: 4.0,
            ..Default::default()
        },
    )
}

fn summary(events: &[CursorEvent]) -> Vec<(CursorEventKind, NodeId)> {
    events.iter().map(|e| (e.kind, e.target)).collect()
}

fn node(manager: &CursorManager, name: &str) -> NodeId {
    manager
        .scene()
        .and_then(|s| s.find_by_name(name))
        .unwrap_or_else(|| panic!("node {} missing", name))
}

fn move_node(manager: &mut CursorManager, name: &str, position: Vec3) {
    let id = node(manager, name);
    manager
        .scene_mut()
        .expect("scene")
        .set_translation(id, position);
}

#[derive(Default)]
struct ActivationLog {
    entries: Mutex<Vec<(String, bool)>>,
}

impl CursorActivationListener for ActivationLog {
    fn on_activated(&self, cursor: &Cursor) {
        self.entries.lock().push((cursor.name().to_string(), true));
    }

    fn on_deactivated(&self, cursor: &Cursor) {
        self.entries.lock().push((cursor.name().to_string(), false));
    }
}

#[test]
fn test_volume_enter_exit_follows_hit_sets() {
    let (mut manager, _dir) = object_manager(0.3, false);
    let far = Vec3::new(10.0, 0.0, -2.0);
    let mut scene = SceneGraph::new();
    let a = box_at(&mut scene, "a", Vec3::new(0.0, 0.0, -2.0), 0.25);
    let b = box_at(&mut scene, "b", Vec3::new(0.3, 0.0, -2.0), 0.25);
    let c = box_at(&mut scene, "c", far, 0.25);
    manager.set_scene(Some(scene));

    // {A, B}
    let frame1 = manager.update_at(FRAME_MS);
    assert_eq!(
        summary(&frame1),
        vec![(CursorEventKind::Enter, a), (CursorEventKind::Enter, b)]
    );
    assert!(frame1.iter().all(|e| e.group == EventGroup::GroupDisabled));

    // {B, C}
    move_node(&mut manager, "a", Vec3::new(10.0, 5.0, -2.0));
    move_node(&mut manager, "c", Vec3::new(-0.3, 0.0, -2.0));
    let frame2 = manager.update_at(2 * FRAME_MS);
    assert_eq!(
        summary(&frame2),
        vec![(CursorEventKind::Exit, a), (CursorEventKind::Enter, c)]
    );

    // {}
    move_node(&mut manager, "b", far);
    move_node(&mut manager, "c", Vec3::new(-10.0, 0.0, -2.0));
    let frame3 = manager.update_at(3 * FRAME_MS);
    assert_eq!(
        summary(&frame3),
        vec![(CursorEventKind::Exit, b), (CursorEventKind::Exit, c)]
    );
    assert!(manager.update_at(4 * FRAME_MS).is_empty());
}

#[test]
fn test_depth_ordering_sorts_frame_events() {
    let (mut manager, _dir) = object_manager(20.0, true);
    let mut scene = SceneGraph::new();
    let near = box_at(&mut scene, "near", Vec3::new(0.0, 0.0, -1.0), 0.1);
    let far = box_at(&mut scene, "far", Vec3::new(0.0, 0.0, -5.0), 0.1);
    let middle = box_at(&mut scene, "middle", Vec3::new(0.0, 0.0, -3.0), 0.1);
    manager.set_scene(Some(scene));

    let events = manager.update_at(FRAME_MS);
    let order: Vec<_> = events.iter().map(|e| (e.target, e.group)).collect();
    assert_eq!(
        order,
        vec![
            (near, EventGroup::MultiStart),
            (middle, EventGroup::Multi),
            (far, EventGroup::MultiStop),
        ]
    );
}

#[test]
fn test_laser_selectable_tracks_hover() {
    let (mut manager, _dir) = manager(vec![laser("laser", &[])]);
    let mut scene = SceneGraph::new();
    let panel = box_at(&mut scene, "panel", Vec3::new(0.0, 0.0, -3.0), 0.5);
    manager.set_scene(Some(scene));
    manager
        .add_selectable(SelectableBehavior::simple(panel))
        .expect("selectable");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    manager.add_event_listener(Arc::new(move |event: &CursorEvent| {
        sink.lock().push(event.kind);
    }));

    manager.update_at(FRAME_MS);
    assert_eq!(manager.selectable(panel).expect("panel").state(), ObjectState::Colliding);
    manager.update_at(2 * FRAME_MS);

    let gaze = manager.find_device(&DeviceIdentity::gear_vr()).expect("gaze").sender();
    gaze.send_pose(Vec3::ZERO, Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));
    manager.update_at(3 * FRAME_MS);

    assert_eq!(manager.selectable(panel).expect("panel").state(), ObjectState::Default);
    assert_eq!(
        *seen.lock(),
        vec![
            CursorEventKind::Enter,
            CursorEventKind::Inside,
            CursorEventKind::Exit
        ]
    );
}

#[test]
fn test_object_cursor_drags_movable_selectable() {
    let (mut manager, _dir) = object_manager(0.3, false);
    let mut scene = SceneGraph::new();
    let crate_node = box_at(&mut scene, "crate", Vec3::new(0.0, 0.0, -2.0), 0.25);
    let root = scene.root();
    manager.set_scene(Some(scene));
    manager
        .add_selectable(SelectableBehavior::simple(crate_node).movable())
        .expect("selectable");

    let gaze = manager
        .find_device(&DeviceIdentity::gear_vr())
        .expect("gaze")
        .clone();
    let drag_root = gaze.controller().nodes().expect("attached").drag_root;
    let input = gaze.sender();

    manager.update_at(FRAME_MS);
    assert_eq!(
        manager.selectable(crate_node).expect("crate").state(),
        ObjectState::Colliding
    );

    input.send_key(KeyEvent::down(KeyCode::A, 2 * FRAME_MS));
    let events = manager.update_at(2 * FRAME_MS);
    assert_eq!(summary(&events), vec![(CursorEventKind::TouchStart, crate_node)]);
    assert_eq!(
        manager.selectable(crate_node).expect("crate").state(),
        ObjectState::Clicked
    );
    assert_eq!(gaze.controller().dragged(), Some(crate_node));

    // The reparent happens on the next frame's render jobs
    manager.update_at(3 * FRAME_MS);
    assert_eq!(manager.scene().expect("scene").parent(crate_node), Some(drag_root));
    let world = manager.scene().expect("scene").world_position(crate_node);
    assert!(world.distance(Vec3::new(0.0, 0.0, -2.0)) < 1e-4);

    input.send_key(KeyEvent::up(KeyCode::A, 4 * FRAME_MS));
    let events = manager.update_at(4 * FRAME_MS);
    assert_eq!(summary(&events), vec![(CursorEventKind::TouchEnd, crate_node)]);
    manager.update_at(5 * FRAME_MS);

    assert_eq!(manager.scene().expect("scene").parent(crate_node), Some(root));
    assert!(!gaze.controller().is_dragging());
    assert_eq!(
        manager.selectable(crate_node).expect("crate").state(),
        ObjectState::Colliding
    );
}

#[test]
fn test_disabling_cursor_mid_drag_drops_the_node() {
    let (mut manager, _dir) = object_manager(0.3, false);
    let mut scene = SceneGraph::new();
    let crate_node = box_at(&mut scene, "crate", Vec3::new(0.0, 0.0, -2.0), 0.25);
    let root = scene.root();
    manager.set_scene(Some(scene));
    manager
        .add_selectable(SelectableBehavior::simple(crate_node).movable())
        .expect("selectable");

    let gaze = manager
        .find_device(&DeviceIdentity::gear_vr())
        .expect("gaze")
        .clone();
    let input = gaze.sender();

    manager.update_at(FRAME_MS);
    input.send_key(KeyEvent::down(KeyCode::A, 2 * FRAME_MS));
    manager.update_at(2 * FRAME_MS);
    manager.update_at(3 * FRAME_MS);
    assert_ne!(manager.scene().expect("scene").parent(crate_node), Some(root));

    let id = cursor_id(&manager, "obj");
    manager.set_cursor_enabled(id, false).expect("disable");

    assert!(!gaze.controller().is_dragging());
    assert_eq!(manager.scene().expect("scene").parent(crate_node), Some(root));
    assert_eq!(
        manager.selectable(crate_node).expect("crate").state(),
        ObjectState::Default
    );

    // Releasing the key afterwards has nothing left to stop
    input.send_key(KeyEvent::up(KeyCode::A, 4 * FRAME_MS));
    manager.update_at(4 * FRAME_MS);
    assert_eq!(manager.scene().expect("scene").parent(crate_node), Some(root));
}

#[test]
fn test_second_drag_start_fails() {
    let (mut manager, _dir) = object_manager(0.3, false);
    let mut scene = SceneGraph::new();
    let first = box_at(&mut scene, "first", Vec3::new(5.0, 0.0, -5.0), 0.25);
    let second = box_at(&mut scene, "second", Vec3::new(-5.0, 0.0, -5.0), 0.25);
    manager.set_scene(Some(scene));

    let gaze = manager
        .find_device(&DeviceIdentity::gear_vr())
        .expect("gaze")
        .clone();
    assert!(gaze.controller().start_drag(first));
    assert!(!gaze.controller().start_drag(second));
    assert_eq!(gaze.controller().dragged(), Some(first));

    manager.update_at(FRAME_MS);
    let drag_root = gaze.controller().nodes().expect("attached").drag_root;
    let scene = manager.scene().expect("scene");
    assert_eq!(scene.parent(first), Some(drag_root));
    assert_eq!(scene.parent(second), Some(scene.root()));
}

#[test]
fn test_activation_listener_sees_replay_and_changes() {
    let (mut manager, _dir) = manager(vec![laser("laser", &[])]);
    let log = Arc::new(ActivationLog::default());
    manager.add_activation_listener(log.clone());
    assert_eq!(*log.entries.lock(), vec![("laser".to_string(), true)]);

    let id = cursor_id(&manager, "laser");
    manager.set_cursor_enabled(id, false).expect("disable");
    assert_eq!(log.entries.lock().last(), Some(&("laser".to_string(), false)));

    let listener: Arc<dyn CursorActivationListener> = log.clone();
    assert!(manager.remove_activation_listener(&listener));
    manager.set_cursor_enabled(id, true).expect("enable");
    assert_eq!(log.entries.lock().len(), 2);
}

#[test]
fn test_replacing_scene_drops_selectables() {
    let (mut manager, _dir) = manager(vec![laser("laser", &[])]);
    let mut scene = SceneGraph::new();
    let panel = box_at(&mut scene, "panel", Vec3::new(0.0, 0.0, -3.0), 0.5);
    manager.set_scene(Some(scene));
    manager
        .add_selectable(SelectableBehavior::simple(panel))
        .expect("selectable");

    let old = manager.set_scene(Some(SceneGraph::new())).expect("old scene");
    assert!(manager.selectable(panel).is_none());
    let laser = manager.find_cursor_by_name("laser").expect("laser");
    // the proxy now lives in the new scene
    assert!(laser.proxy(&old).is_none());
    assert!(manager.scene().is_some_and(|s| laser.proxy(s).is_some()));
}

#[test]
fn test_add_selectable_requires_scene() {
    let (mut manager, _dir) = manager(vec![laser("laser", &[])]);
    let mut scratch = SceneGraph::new();
    let node = scratch.add_node("orphan");
    assert_error_contains!(
        manager.add_selectable(SelectableBehavior::simple(node)),
        "no scene"
    );
}
