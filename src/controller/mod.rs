//! Cursor controllers
//!
//! A [`CursorController`] turns queued hardware input into a pick ray, an
//! active flag and per-frame key and motion events. It also owns the three
//! scene nodes that carry a cursor around:
//!
//! ```text
//! pivot          follows the controller pose
//! └─ drag_root   placed along the pick direction, parent of dragged nodes
//!    └─ cursor_scale   scaled so the cursor keeps its apparent size
//!       └─ cursor node
//! ```

pub mod drag;
pub mod gaze;
pub mod gear;

use std::sync::atomic::{AtomicU32, Ordering};

use bevy::math::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

pub use drag::{Dragger, RenderQueue};
pub use gaze::GazeController;
pub use gear::{GearButtons, GearController, GearSample};

use crate::input::{
    InputMessage, InputQueue, InputSender, KeyAction, KeyEvent, MotionAction, MotionButtons,
    MotionEvent,
};
use crate::scene::{NodeId, PickHit, Ray, SceneGraph};

pub const DEFAULT_NEAR_DEPTH: f32 = 0.5;
pub const DEFAULT_FAR_DEPTH: f32 = 50.0;
pub const DEFAULT_CURSOR_DEPTH: f32 = 1.0;

static NEXT_CONTROLLER_ID: AtomicU32 = AtomicU32::new(0);

/// How the cursor is placed relative to the pick ray
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorControl {
    /// Leave the cursor where it is
    None,
    CursorConstantDepth,
    #[default]
    ProjectCursorOnSurface,
    OrientCursorWithSurfaceNormal,
    /// Constant depth, adjustable from the controller touchpad
    CursorDepthFromController,
}

/// Mutable input state shared by every controller strategy
#[derive(Debug, Clone)]
pub struct ControllerState {
    pub enabled: bool,
    pub near_depth: f32,
    pub far_depth: f32,
    pub cursor_depth: f32,
    pub cursor_control: CursorControl,
    pub touch_buttons: MotionButtons,
    pub active: bool,
    pub origin: Vec3,
    pub rotation: Quat,
    pub pick_dir: Vec3,
    pub key_events: Vec<KeyEvent>,
    pub motion_events: Vec<MotionEvent>,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            enabled: false,
            near_depth: DEFAULT_NEAR_DEPTH,
            far_depth: DEFAULT_FAR_DEPTH,
            cursor_depth: DEFAULT_CURSOR_DEPTH,
            cursor_control: CursorControl::default(),
            touch_buttons: MotionButtons::PRIMARY | MotionButtons::SECONDARY,
            active: false,
            origin: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            pick_dir: Vec3::NEG_Z,
            key_events: Vec::new(),
            motion_events: Vec::new(),
        }
    }
}

impl ControllerState {
    /// Depth is always stored as a distance
    pub fn set_cursor_depth(&mut self, depth: f32) {
        self.cursor_depth = depth.abs();
    }

    /// World-space direction of the pick ray
    pub fn direction(&self) -> Vec3 {
        self.rotation * self.pick_dir
    }

    fn handle_key(&mut self, event: KeyEvent) {
        self.active = event.action == KeyAction::Down;
        self.key_events.push(event);
    }

    fn handle_pointer(&mut self, event: MotionEvent) {
        match event.action {
            MotionAction::Down if event.buttons.intersects(self.touch_buttons) => {
                self.active = true
            }
            MotionAction::Up => self.active = false,
            _ => {}
        }
        self.motion_events.push(event);
    }
}

/// Controller family and its strategy state
#[derive(Debug, Clone)]
pub enum ControllerKind {
    Gaze(GazeController),
    Gear(GearController),
    Mouse,
    Gamepad,
    External,
}

impl ControllerKind {
    pub fn gaze() -> Self {
        Self::Gaze(GazeController::new())
    }

    pub fn gear() -> Self {
        Self::Gear(GearController::new())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Gaze(_) => "gaze",
            Self::Gear(_) => "gear",
            Self::Mouse => "mouse",
            Self::Gamepad => "gamepad",
            Self::External => "external",
        }
    }
}

/// What a controller produced during one update
#[derive(Debug, Clone)]
pub struct ControllerSample {
    pub ray: Ray,
    pub active: bool,
    pub previous_active: bool,
    pub key_events: Vec<KeyEvent>,
    pub motion_events: Vec<MotionEvent>,
}

impl ControllerSample {
    pub fn key_down(&self) -> bool {
        self.key_events.iter().any(KeyEvent::is_down)
    }
}

/// Scene nodes owned by an attached controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerNodes {
    pub scene_id: u64,
    pub pivot: NodeId,
    pub drag_root: NodeId,
    pub cursor_scale: NodeId,
}

#[derive(Debug)]
pub struct CursorController {
    id: u32,
    kind: ControllerKind,
    state: ControllerState,
    previous_active: bool,
    queue: InputQueue,
    nodes: Option<ControllerNodes>,
    cursor: Option<NodeId>,
    dragger: Dragger,
}

impl CursorController {
    pub fn new(kind: ControllerKind) -> Self {
        Self {
            id: NEXT_CONTROLLER_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            state: ControllerState::default(),
            previous_active: false,
            queue: InputQueue::default(),
            nodes: None,
            cursor: None,
            dragger: Dragger::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn kind(&self) -> &ControllerKind {
        &self.kind
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn sender(&self) -> InputSender {
        self.queue.sender()
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled
    }

    /// Disabling drops the active flag and anything still queued
    pub fn set_enabled(&mut self, enabled: bool) {
        self.state.enabled = enabled;
        if !enabled {
            self.state.active = false;
            self.previous_active = false;
            let dropped = self.queue.drain().len();
            if dropped > 0 {
                trace!("Controller {} dropped {} queued messages", self.id, dropped);
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    pub fn near_depth(&self) -> f32 {
        self.state.near_depth
    }

    pub fn set_near_depth(&mut self, depth: f32) {
        self.state.near_depth = depth;
    }

    pub fn far_depth(&self) -> f32 {
        self.state.far_depth
    }

    pub fn set_far_depth(&mut self, depth: f32) {
        self.state.far_depth = depth;
    }

    pub fn cursor_depth(&self) -> f32 {
        self.state.cursor_depth
    }

    pub fn set_cursor_depth(&mut self, depth: f32) {
        self.state.set_cursor_depth(depth);
    }

    pub fn cursor_control(&self) -> CursorControl {
        self.state.cursor_control
    }

    pub fn set_cursor_control(&mut self, control: CursorControl) {
        self.state.cursor_control = control;
    }

    pub fn touch_buttons(&self) -> MotionButtons {
        self.state.touch_buttons
    }

    pub fn set_touch_buttons(&mut self, buttons: MotionButtons) {
        self.state.touch_buttons = buttons;
    }

    pub fn origin(&self) -> Vec3 {
        self.state.origin
    }

    pub fn set_origin(&mut self, origin: Vec3) {
        self.state.origin = origin;
    }

    pub fn rotation(&self) -> Quat {
        self.state.rotation
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.state.rotation = rotation.normalize();
    }

    pub fn pick_dir(&self) -> Vec3 {
        self.state.pick_dir
    }

    /// Point the pick ray at `position`, given in controller space. Ignored
    /// while disabled.
    pub fn set_position(&mut self, position: Vec3) {
        if !self.state.enabled {
            return;
        }
        if let Some(dir) = position.try_normalize() {
            self.state.pick_dir = dir;
        }
    }

    pub fn ray(&self) -> Ray {
        Ray::new(self.state.origin, self.state.direction())
    }

    /// Drain queued input and run the controller strategy.
    ///
    /// Key and motion events from the previous poll are discarded first, so
    /// each event is reported exactly once.
    pub fn poll(&mut self, now_ms: u64) -> ControllerSample {
        self.state.key_events.clear();
        self.state.motion_events.clear();
        self.previous_active = self.state.active;

        let messages = self.queue.drain();
        if self.state.enabled {
            for message in messages {
                match message {
                    InputMessage::Pose { position, rotation } => {
                        self.state.origin = position;
                        self.state.rotation = rotation.normalize();
                    }
                    InputMessage::Gear(sample) => match &mut self.kind {
                        ControllerKind::Gear(gear) => gear.handle_sample(&sample, &mut self.state),
                        other => debug!("{} controller ignores gear samples", other.name()),
                    },
                    InputMessage::Motion(event) => match &mut self.kind {
                        ControllerKind::Gaze(gaze) => gaze.handle_motion(event, &mut self.state),
                        _ => self.state.handle_pointer(event),
                    },
                    InputMessage::Key(event) => self.state.handle_key(event),
                }
            }
            if let ControllerKind::Gaze(gaze) = &mut self.kind {
                gaze.tick(now_ms, &mut self.state);
            }
        }

        ControllerSample {
            ray: self.ray(),
            active: self.state.active,
            previous_active: self.previous_active,
            key_events: self.state.key_events.clone(),
            motion_events: self.state.motion_events.clone(),
        }
    }

    pub fn nodes(&self) -> Option<ControllerNodes> {
        self.nodes
    }

    fn live_nodes(&self, scene: &SceneGraph) -> Option<ControllerNodes> {
        self.nodes.filter(|nodes| nodes.scene_id == scene.id())
    }

    /// Create (or re-link) the controller nodes in `scene`
    pub fn attach(&mut self, scene: &mut SceneGraph, queue: &RenderQueue) -> ControllerNodes {
        if let Some(nodes) = self.live_nodes(scene) {
            if !scene.is_attached(nodes.pivot) {
                let root = scene.root();
                scene.set_parent(nodes.pivot, Some(root));
            }
            return nodes;
        }

        let pivot = scene.add_node(format!("CursorController_{}_Pivot", self.id));
        let drag_root = scene.add_child_node(pivot, format!("CursorController_{}_DragRoot", self.id));
        let cursor_scale =
            scene.add_child_node(drag_root, format!("CursorController_{}_CursorScale", self.id));
        let nodes = ControllerNodes {
            scene_id: scene.id(),
            pivot,
            drag_root,
            cursor_scale,
        };
        self.nodes = Some(nodes);
        self.cursor = None;
        self.dragger.set_target(queue.clone(), drag_root);
        self.apply_pose(scene);
        self.move_cursor(scene);
        debug!("Controller {} attached to scene {}", self.id, scene.id());
        nodes
    }

    /// Unlink the controller nodes, putting back anything being dragged
    pub fn detach(&mut self, scene: &mut SceneGraph) {
        if let Some(nodes) = self.live_nodes(scene) {
            self.dragger.release_now(scene);
            scene.set_parent(nodes.pivot, None);
        }
    }

    pub fn cursor(&self) -> Option<NodeId> {
        self.cursor
    }

    /// Carry `node` as this controller's cursor, replacing any previous one
    pub fn set_cursor(&mut self, scene: &mut SceneGraph, node: Option<NodeId>) {
        let Some(nodes) = self.live_nodes(scene) else {
            self.cursor = None;
            return;
        };
        if let Some(old) = self.cursor.take() {
            if Some(old) != node && scene.parent(old) == Some(nodes.cursor_scale) {
                scene.set_parent(old, None);
            }
        }
        if let Some(node) = node {
            scene.set_parent(node, Some(nodes.cursor_scale));
            scene.set_enabled(node, true);
            self.cursor = Some(node);
        }
        self.move_cursor(scene);
    }

    /// Copy the controller pose onto the pivot node
    pub fn apply_pose(&self, scene: &mut SceneGraph) {
        if let Some(nodes) = self.live_nodes(scene) {
            scene.set_translation(nodes.pivot, self.state.origin);
            scene.set_rotation(nodes.pivot, self.state.rotation);
        }
    }

    /// Place the cursor at the default depth along the pick direction
    pub fn move_cursor(&self, scene: &mut SceneGraph) {
        if let Some(nodes) = self.live_nodes(scene) {
            scene.set_rotation(nodes.drag_root, Quat::IDENTITY);
            scene.set_translation(nodes.drag_root, self.state.pick_dir * self.state.cursor_depth);
            scene.set_scale(nodes.cursor_scale, Vec3::ONE);
        }
    }

    /// Position the cursor for this frame's pick result
    pub fn place_cursor(&self, scene: &mut SceneGraph, hit: Option<&PickHit>) {
        let Some(nodes) = self.live_nodes(scene) else {
            return;
        };
        let state = &self.state;
        match state.cursor_control {
            CursorControl::None => {}
            CursorControl::CursorConstantDepth | CursorControl::CursorDepthFromController => {
                scene.set_translation(nodes.drag_root, state.pick_dir * state.cursor_depth);
            }
            CursorControl::ProjectCursorOnSurface
            | CursorControl::OrientCursorWithSurfaceNormal => {
                let Some(hit) = hit else {
                    self.move_cursor(scene);
                    return;
                };
                let depth = state.cursor_depth.max(f32::EPSILON);
                scene.set_scale(nodes.cursor_scale, Vec3::splat(hit.distance / depth));
                if state.cursor_control == CursorControl::OrientCursorWithSurfaceNormal {
                    let local_normal = (state.rotation.inverse() * hit.normal).normalize_or_zero();
                    if local_normal != Vec3::ZERO {
                        scene.set_rotation(
                            nodes.drag_root,
                            Quat::from_rotation_arc(Vec3::Z, local_normal),
                        );
                    }
                }
                if scene.is_descendant_of(hit.node, nodes.drag_root) {
                    return;
                }
                scene.set_translation(nodes.drag_root, state.pick_dir * hit.distance);
            }
        }
    }

    /// Begin dragging `node` with this controller
    pub fn start_drag(&self, node: NodeId) -> bool {
        self.dragger.start(node)
    }

    pub fn stop_drag(&self) -> bool {
        self.dragger.stop()
    }

    pub fn is_dragging(&self) -> bool {
        self.dragger.is_dragging()
    }

    pub fn dragged(&self) -> Option<NodeId> {
        self.dragger.dragged()
    }
}
