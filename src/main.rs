use anyhow::{Context, Result};
use bevy::math::{Quat, Vec2, Vec3};
use tracing::{info, Level};

use xreal_cursor3d::device::DeviceIdentity;
use xreal_cursor3d::input::{MotionAction, MotionButtons, MotionEvent};
use xreal_cursor3d::{CursorManager, CursorManagerConfig, SceneGraph, SelectableBehavior};

const FRAME_MS: u64 = 16;

fn build_scene() -> SceneGraph {
    let mut scene = SceneGraph::new();
    for (name, z) in [("panel", -3.0), ("crate", -6.0)] {
        let node = scene.add_node(name);
        scene.set_translation(node, Vec3::new(0.0, 0.0, z));
        scene.set_box_bounds(node, Vec3::splat(0.5));
        scene.set_collidable(node, true);
    }
    scene
}

fn step(manager: &mut CursorManager, now: &mut u64) {
    *now += FRAME_MS;
    for event in manager.update_at(*now) {
        info!(
            "🎯 cursor {} {:?} on {:?} ({:?})",
            event.cursor_id, event.kind, event.target, event.group
        );
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();
    info!("🥽 XREAL 3D cursor demo - starting up...");

    let mut manager = CursorManager::new(CursorManagerConfig {
        depth_ordering: true,
        ..Default::default()
    })
    .context("failed to start cursor manager")?;
    manager.set_scene(Some(build_scene()));

    let panel = manager
        .scene()
        .and_then(|s| s.find_by_name("panel"))
        .context("panel node missing")?;
    let behavior = SelectableBehavior::simple(panel).movable();
    manager.add_selectable(behavior)?;

    let gaze = manager
        .find_device(&DeviceIdentity::gear_vr())
        .context("gaze device missing")?
        .clone();
    let input = gaze.sender();
    input.send_pose(Vec3::ZERO, Quat::IDENTITY);

    let mut now = 0;
    for _ in 0..3 {
        step(&mut manager, &mut now);
    }

    // Tap on the gaze touchpad: press after the tap timeout, then release
    let down = MotionEvent::new(MotionAction::Down, Vec2::ZERO, MotionButtons::PRIMARY, now);
    input.send_motion(down);
    for _ in 0..6 {
        step(&mut manager, &mut now);
    }
    let up = MotionEvent::new(MotionAction::Up, Vec2::ZERO, MotionButtons::PRIMARY, now)
        .with_down_time(down.time_ms);
    input.send_motion(up);
    for _ in 0..2 {
        step(&mut manager, &mut now);
    }

    // Look away from everything
    input.send_pose(Vec3::ZERO, Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));
    step(&mut manager, &mut now);

    if let Some(selectable) = manager.selectable(panel) {
        info!("Panel ended in state {:?}", selectable.state());
    }
    manager.close();
    info!("✅ Demo finished after {} ms of simulated input", now);
    Ok(())
}
