//! Logical cursors
//!
//! A [`Cursor`] is a persistent slot that can be bound to one input device at
//! a time. Each frame it samples its device controller, hit-tests the scene
//! and turns the result into [`CursorEvent`]s. Two kinds exist:
//!
//! - `Laser` follows the nearest hit along the controller ray
//! - `Object` tests its own volume against every collidable node

pub mod event;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bevy::math::bounding::Aabb3d;
use bevy::math::{Quat, Vec3, Vec3A};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use event::{order_events, CursorEvent, CursorEventKind, EventGroup};

use crate::controller::{ControllerSample, CursorControl, CursorController, RenderQueue};
use crate::device::binding::normalize_compatibility;
use crate::device::{DeviceIdentity, InputDevice, PriorityDeviceBinding};
use crate::error::{CursorError, CursorResult};
use crate::scene::{NodeId, PickHit, SceneGraph};
use crate::theme::{Action, CursorAsset, CursorContext, CursorTheme};

/// Scale values above this are rejected
pub const MAX_CURSOR_SCALE: f32 = 1000.0;
/// Near depth given to devices driving an object cursor, so the cursor can
/// be pulled right up to the controller
pub const OBJECT_CURSOR_NEAR_DEPTH: f32 = -1.0;

static NEXT_CURSOR_ID: AtomicU32 = AtomicU32::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorKind {
    Laser,
    Object,
}

/// Where the cursor starts when the settings were written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartPosition {
    #[default]
    Center,
    Left,
    Right,
    Other,
}

/// Receives every event a cursor produces
pub trait CursorEventListener: Send + Sync {
    fn on_event(&self, event: &CursorEvent);
}

impl<F> CursorEventListener for F
where
    F: Fn(&CursorEvent) + Send + Sync,
{
    fn on_event(&self, event: &CursorEvent) {
        self(event)
    }
}

/// Told when a cursor gains or loses its device
pub trait CursorActivationListener: Send + Sync {
    fn on_activated(&self, cursor: &Cursor);
    fn on_deactivated(&self, cursor: &Cursor);
}

#[derive(Debug, Clone, Default)]
struct LaserState {
    target: Option<NodeId>,
}

#[derive(Debug, Clone, Default)]
struct ObjectState {
    intersecting: Vec<NodeId>,
}

#[derive(Debug, Clone)]
enum CursorVariant {
    Laser(LaserState),
    Object(ObjectState),
}

impl CursorVariant {
    fn for_kind(kind: CursorKind) -> Self {
        match kind {
            CursorKind::Laser => Self::Laser(LaserState::default()),
            CursorKind::Object => Self::Object(ObjectState::default()),
        }
    }

    fn clear(&mut self) {
        match self {
            Self::Laser(state) => state.target = None,
            Self::Object(state) => state.intersecting.clear(),
        }
    }
}

pub struct Cursor {
    id: u32,
    name: String,
    kind: CursorKind,
    enabled: bool,
    start_position: StartPosition,
    depth: f32,
    compatibility: Vec<PriorityDeviceBinding>,
    device: Option<InputDevice>,
    saved_device: Option<DeviceIdentity>,
    saved_theme_id: Option<String>,
    theme: Option<Arc<CursorTheme>>,
    action: Option<Action>,
    busy_loading: bool,
    saved_action: Option<Action>,
    proxy: Option<(u64, NodeId)>,
    listeners: Vec<Arc<dyn CursorEventListener>>,
    /// Half extents of the current asset; held while hit-testing
    collision: Arc<Mutex<Vec3>>,
    context: Arc<CursorContext>,
    variant: CursorVariant,
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("enabled", &self.enabled)
            .field("device", &self.device.as_ref().map(InputDevice::identity))
            .field("theme", &self.theme.as_ref().map(|t| t.id().to_string()))
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

impl Cursor {
    pub fn new(name: impl Into<String>, kind: CursorKind, context: Arc<CursorContext>) -> Self {
        Self {
            id: NEXT_CURSOR_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            kind,
            enabled: true,
            start_position: StartPosition::default(),
            depth: 0.0,
            compatibility: normalize_compatibility(Vec::new()),
            device: None,
            saved_device: None,
            saved_theme_id: None,
            theme: None,
            action: None,
            busy_loading: false,
            saved_action: None,
            proxy: None,
            listeners: Vec::new(),
            collision: Arc::new(Mutex::new(Vec3::ZERO)),
            context,
            variant: CursorVariant::for_kind(kind),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CursorKind {
        self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Raw flag; the manager takes care of releasing or assigning devices
    pub(crate) fn set_enabled_flag(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Enabled, bound and the bound device is enabled
    pub fn is_active(&self) -> bool {
        self.enabled && self.device.as_ref().is_some_and(InputDevice::is_enabled)
    }

    pub fn start_position(&self) -> StartPosition {
        self.start_position
    }

    pub fn set_start_position(&mut self, position: StartPosition) {
        self.start_position = position;
    }

    pub fn cursor_depth(&self) -> f32 {
        self.depth
    }

    pub fn set_cursor_depth(&mut self, depth: f32) {
        self.depth = depth;
        if let Some(device) = &self.device {
            let mut controller = device.controller();
            controller.set_cursor_depth(depth);
            controller.set_position(Vec3::new(0.0, 0.0, -depth));
        }
    }

    /// Laser cursors sit at `scale`; object cursors at half of it
    pub fn set_scale(&mut self, scale: f32) {
        if scale > MAX_CURSOR_SCALE {
            return;
        }
        match self.kind {
            CursorKind::Laser => self.set_cursor_depth(scale),
            CursorKind::Object => {
                self.set_cursor_depth(scale / 2.0);
                if let Some(device) = &self.device {
                    device.set_near_depth(OBJECT_CURSOR_NEAR_DEPTH);
                }
            }
        }
    }

    /// Point the bound device at `position` if the cursor is active
    pub fn set_position(&self, position: Vec3) {
        if self.is_active() {
            if let Some(device) = &self.device {
                device.set_position(position);
            }
        }
    }

    pub fn compatibility(&self) -> &[PriorityDeviceBinding] {
        &self.compatibility
    }

    pub(crate) fn set_compatibility(&mut self, list: Vec<PriorityDeviceBinding>) {
        self.compatibility = normalize_compatibility(list);
    }

    /// Compatible device identities, best first
    pub fn compatible_devices(&self) -> Vec<DeviceIdentity> {
        self.compatibility.iter().map(|b| b.device.clone()).collect()
    }

    pub fn is_device_compatible(&self, device: &DeviceIdentity) -> bool {
        self.compatibility.iter().any(|b| b.device == *device)
    }

    pub fn device_priority(&self, device: &DeviceIdentity) -> Option<u32> {
        self.compatibility
            .iter()
            .find(|b| b.device == *device)
            .map(|b| b.priority)
    }

    pub fn current_device_priority(&self) -> Option<u32> {
        self.device
            .as_ref()
            .and_then(|d| self.device_priority(d.identity()))
    }

    /// Entry at position `rank` of the sorted compatibility list
    pub fn device_for_rank(&self, rank: usize) -> Option<&DeviceIdentity> {
        self.compatibility.get(rank).map(|b| &b.device)
    }

    pub fn device(&self) -> Option<&InputDevice> {
        self.device.as_ref()
    }

    pub fn saved_device(&self) -> Option<&DeviceIdentity> {
        self.saved_device.as_ref()
    }

    pub(crate) fn set_saved_device(&mut self, device: Option<DeviceIdentity>) {
        self.saved_device = device;
    }

    pub(crate) fn saved_theme_id(&self) -> Option<&str> {
        self.saved_theme_id.as_deref()
    }

    pub(crate) fn set_saved_theme_id(&mut self, id: Option<String>) {
        self.saved_theme_id = id;
    }

    pub fn theme(&self) -> Option<&Arc<CursorTheme>> {
        self.theme.as_ref()
    }

    /// Swap the theme, keeping the current action if the new theme has it
    pub fn set_theme(&mut self, theme: Arc<CursorTheme>) -> CursorResult<()> {
        if self.theme.as_ref().is_some_and(|t| Arc::ptr_eq(t, &theme)) {
            return Ok(());
        }
        if theme.kind() != self.kind {
            return Err(CursorError::ThemeMismatch {
                theme: theme.id().to_string(),
                theme_kind: theme.kind(),
                cursor_kind: self.kind,
            });
        }

        if let Some(old) = self.theme.take() {
            old.unload(self.id);
        }
        theme.load(self.id);
        self.theme = Some(Arc::clone(&theme));
        if let Some(action) = self.action.take() {
            let action = if theme.asset(action).is_some() {
                action
            } else {
                Action::Default
            };
            self.apply_asset(action, false);
        }
        debug!("Cursor {} now uses theme '{}'", self.id, theme.id());
        Ok(())
    }

    /// Action of the asset currently shown
    pub fn current_action(&self) -> Option<Action> {
        self.action
    }

    pub fn asset(&self) -> Option<&CursorAsset> {
        let action = self.action?;
        self.theme.as_ref()?.asset(action)
    }

    /// Switch to the asset for `action` unless it is already shown. While
    /// busy loading the request is remembered instead.
    pub fn check_and_set_asset(&mut self, action: Action) {
        let Some(theme) = &self.theme else {
            return;
        };
        if theme.asset(action).is_none() || self.action == Some(action) {
            return;
        }
        if self.busy_loading {
            self.saved_action = Some(action);
        } else {
            self.apply_asset(action, false);
        }
    }

    fn apply_asset(&mut self, action: Action, muted: bool) {
        let Some(asset) = self.theme.as_ref().and_then(|t| t.asset(action)) else {
            return;
        };
        asset.set(&self.context, muted);
        *self.collision.lock() = asset.half_extents();
        self.action = Some(action);
    }

    /// Show the LOADING asset until called again with `false`
    pub fn set_busy_loading(&mut self, loading: bool) {
        if loading && !self.busy_loading {
            self.saved_action = self.action;
            self.apply_asset(Action::Loading, false);
            self.busy_loading = true;
        } else if !loading && self.busy_loading {
            if let Some(saved) = self.saved_action.take() {
                self.apply_asset(saved, true);
            }
            self.busy_loading = false;
        }
    }

    pub fn is_busy_loading(&self) -> bool {
        self.busy_loading
    }

    pub fn add_listener(&mut self, listener: Arc<dyn CursorEventListener>) {
        self.listeners.push(listener);
    }

    pub fn remove_listener(&mut self, listener: &Arc<dyn CursorEventListener>) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| !Arc::ptr_eq(l, listener));
        before != self.listeners.len()
    }

    pub(crate) fn notify_listeners(&self, event: &CursorEvent) {
        for listener in &self.listeners {
            listener.on_event(event);
        }
    }

    /// Half extents used for volume hit tests
    pub fn collision_extents(&self) -> Vec3 {
        *self.collision.lock()
    }

    /// Proxy node carrying this cursor in `scene`
    pub fn proxy(&self, scene: &SceneGraph) -> Option<NodeId> {
        self.proxy
            .filter(|(scene_id, node)| *scene_id == scene.id() && scene.contains(*node))
            .map(|(_, node)| node)
    }

    fn ensure_proxy(&mut self, scene: &mut SceneGraph) -> NodeId {
        if let Some(node) = self.proxy(scene) {
            return node;
        }
        let node = scene.create_node(self.name.clone());
        self.proxy = Some((scene.id(), node));
        node
    }

    /// Bind `device` and show the default asset. When a scene is given the
    /// cursor is placed into it right away.
    pub(crate) fn bind_device(
        &mut self,
        device: InputDevice,
        scene: Option<(&mut SceneGraph, &RenderQueue)>,
    ) {
        info!(
            "✅ Cursor {} ({}) bound to {} [{}]",
            self.id,
            self.name,
            device.name(),
            device.identity()
        );
        self.device = Some(device.clone());
        self.apply_asset(Action::Default, false);
        device.set_enabled(true);
        {
            let mut controller = device.controller();
            controller.set_cursor_depth(self.depth);
            controller.set_position(Vec3::new(0.0, 0.0, -self.depth));
            if self.kind == CursorKind::Object {
                controller.set_near_depth(OBJECT_CURSOR_NEAR_DEPTH);
            }
        }
        if let Some((scene, queue)) = scene {
            self.attach_to_scene(scene, queue);
        }
    }

    /// Give up the bound device, disabling it. Returns the released device.
    pub(crate) fn release_device(&mut self, scene: Option<&mut SceneGraph>) -> Option<InputDevice> {
        if let Some(scene) = scene {
            self.detach_from_scene(scene);
        }
        let device = self.device.take()?;
        device.set_enabled(false);
        self.variant.clear();
        debug!("Cursor {} released {}", self.id, device.identity());
        Some(device)
    }

    /// Hang the proxy node under the device controller
    pub(crate) fn attach_to_scene(&mut self, scene: &mut SceneGraph, queue: &RenderQueue) {
        let Some(device) = self.device.clone() else {
            return;
        };
        let proxy = self.ensure_proxy(scene);
        let mut controller = device.controller();
        controller.attach(scene, queue);
        controller.set_cursor(scene, Some(proxy));
        controller.set_cursor_control(match self.kind {
            CursorKind::Laser => CursorControl::ProjectCursorOnSurface,
            CursorKind::Object => CursorControl::CursorDepthFromController,
        });
        drop(controller);
        self.sync_proxy(scene);
    }

    pub(crate) fn detach_from_scene(&mut self, scene: &mut SceneGraph) {
        if let Some(device) = &self.device {
            let mut controller = device.controller();
            controller.set_cursor(scene, None);
            controller.detach(scene);
        }
        if let Some(proxy) = self.proxy(scene) {
            scene.set_parent(proxy, None);
        }
        self.variant.clear();
    }

    fn sync_proxy(&self, scene: &mut SceneGraph) {
        if let (Some(proxy), Some(asset)) = (self.proxy(scene), self.asset()) {
            asset.apply(scene, proxy);
        }
    }

    /// Sample the device, hit-test and produce this frame's events.
    ///
    /// Events come back in discovery order and ungrouped.
    pub(crate) fn process_frame(&mut self, scene: &mut SceneGraph, now_ms: u64) -> Vec<CursorEvent> {
        let Some(device) = self.device.clone() else {
            return Vec::new();
        };
        let mut controller = device.controller();
        let sample = controller.poll(now_ms);
        if !self.is_active_with(&controller) {
            return Vec::new();
        }
        controller.apply_pose(scene);
        self.sync_proxy(scene);

        match self.kind {
            CursorKind::Laser => {
                let hit = scene.pick_nearest(&sample.ray, self.proxy(scene));
                controller.place_cursor(scene, hit.as_ref());
                drop(controller);
                self.laser_frame(scene, &sample, hit)
            }
            CursorKind::Object => {
                controller.place_cursor(scene, None);
                drop(controller);
                self.object_frame(scene, &sample)
            }
        }
    }

    fn is_active_with(&self, controller: &CursorController) -> bool {
        self.enabled && controller.is_enabled()
    }

    fn laser_frame(
        &mut self,
        scene: &SceneGraph,
        sample: &ControllerSample,
        hit: Option<PickHit>,
    ) -> Vec<CursorEvent> {
        let previous = match &self.variant {
            CursorVariant::Laser(state) => state.target,
            CursorVariant::Object(_) => None,
        };
        let target = hit.map(|h| scene.selectable_root(h.node));

        let mut events = Vec::new();
        if let Some(prev) = previous {
            if Some(prev) != target && scene.contains(prev) {
                events.push(self.build_event(
                    scene,
                    sample,
                    CursorEventKind::Exit,
                    prev,
                    false,
                    false,
                    Vec3::ZERO,
                ));
            }
        }
        if let (Some(target), Some(hit)) = (target, hit) {
            let kind = if previous != Some(target) {
                CursorEventKind::Enter
            } else if sample.active && !sample.previous_active {
                CursorEventKind::TouchStart
            } else if !sample.active && sample.previous_active {
                CursorEventKind::TouchEnd
            } else if sample.active {
                CursorEventKind::Drag
            } else {
                CursorEventKind::Inside
            };
            events.push(self.build_event(scene, sample, kind, target, true, true, hit.point));
        }

        if let CursorVariant::Laser(state) = &mut self.variant {
            state.target = target;
        }
        let action = if sample.active {
            Action::Click
        } else if target.is_some() {
            Action::Hover
        } else {
            Action::Default
        };
        self.check_and_set_asset(action);
        events
    }

    fn object_frame(&mut self, scene: &SceneGraph, sample: &ControllerSample) -> Vec<CursorEvent> {
        let Some(proxy) = self.proxy(scene) else {
            return Vec::new();
        };
        let hits = {
            let extents = self.collision.lock();
            let (scale, _, center) = scene.world_matrix(proxy).to_scale_rotation_translation();
            let volume = Aabb3d::new(Vec3A::from(center), Vec3A::from(*extents * scale.abs()));
            let mut hits: Vec<NodeId> = Vec::new();
            for node in scene.intersecting(&volume, Some(proxy)) {
                let root = scene.selectable_root(node);
                if !hits.contains(&root) {
                    hits.push(root);
                }
            }
            hits
        };

        let previous = match &self.variant {
            CursorVariant::Object(state) => state.intersecting.clone(),
            CursorVariant::Laser(_) => Vec::new(),
        };
        let position = scene.world_position(proxy);
        let mut events = Vec::new();

        for node in previous.iter().filter(|n| !hits.contains(n)) {
            if scene.contains(*node) {
                events.push(self.build_event(
                    scene,
                    sample,
                    CursorEventKind::Exit,
                    *node,
                    false,
                    false,
                    Vec3::ZERO,
                ));
            }
        }
        for node in &hits {
            let kind = if !previous.contains(node) {
                CursorEventKind::Enter
            } else if sample.active && !sample.previous_active {
                CursorEventKind::TouchStart
            } else if !sample.active && sample.previous_active {
                CursorEventKind::TouchEnd
            } else {
                continue;
            };
            events.push(self.build_event(scene, sample, kind, *node, true, true, position));
        }

        let action = match (hits.is_empty(), sample.active) {
            (true, _) => Action::Default,
            (false, true) => Action::Click,
            (false, false) => Action::Intersect,
        };
        if let CursorVariant::Object(state) = &mut self.variant {
            state.intersecting = hits;
        }
        self.check_and_set_asset(action);
        events
    }

    #[allow(clippy::too_many_arguments)]
    fn build_event(
        &self,
        scene: &SceneGraph,
        sample: &ControllerSample,
        kind: CursorEventKind,
        target: NodeId,
        colliding: bool,
        over: bool,
        hit_point: Vec3,
    ) -> CursorEvent {
        let (cursor_position, cursor_rotation) = match self.proxy(scene) {
            Some(proxy) => (scene.world_position(proxy), scene.world_rotation(proxy)),
            None => (sample.ray.at(self.depth), Quat::IDENTITY),
        };
        CursorEvent {
            kind,
            cursor_id: self.id,
            cursor_kind: self.kind,
            target,
            colliding,
            active: sample.active,
            over,
            hit_point,
            cursor_position,
            cursor_rotation,
            key_events: sample.key_events.clone(),
            motion_events: sample.motion_events.clone(),
            group: EventGroup::default(),
        }
    }

    /// Nodes the object cursor currently overlaps
    pub fn intersecting(&self) -> &[NodeId] {
        match &self.variant {
            CursorVariant::Object(state) => &state.intersecting,
            CursorVariant::Laser(_) => &[],
        }
    }

    /// Node the laser cursor currently points at
    pub fn laser_target(&self) -> Option<NodeId> {
        match &self.variant {
            CursorVariant::Laser(state) => state.target,
            CursorVariant::Object(_) => None,
        }
    }

    /// Drop the theme and forget the scene
    pub(crate) fn close(&mut self, scene: Option<&mut SceneGraph>) -> Option<InputDevice> {
        let released = self.release_device(scene);
        if let Some(theme) = self.theme.take() {
            theme.unload(self.id);
        }
        self.proxy = None;
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerKind;
    use crate::input::{KeyCode, KeyEvent};
    use crate::theme::audio::testing::RecordingSink;
    use crate::settings::GlobalSettings;
    use crate::theme::AssetKind;

    fn theme(kind: CursorKind) -> Arc<CursorTheme> {
        Arc::new(
            CursorTheme::new(
                "test",
                "Test",
                kind,
                [
                    CursorAsset::new(Action::Default, AssetKind::Mesh3d, "default")
                        .with_size(0.4, 0.4)
                        .with_sound("default.wav"),
                    CursorAsset::new(Action::Click, AssetKind::Mesh3d, "click").with_size(0.4, 0.4),
                    CursorAsset::new(Action::Intersect, AssetKind::Mesh3d, "hit")
                        .with_size(0.4, 0.4),
                    CursorAsset::new(Action::Hover, AssetKind::Quad2d, "hover"),
                    CursorAsset::new(Action::Loading, AssetKind::Quad2d, "loading"),
                ],
            )
            .expect("valid theme"),
        )
    }

    fn external_device(tag: &str) -> InputDevice {
        InputDevice::new(
            DeviceIdentity::new(10, 20, tag),
            tag,
            "test",
            ControllerKind::External,
        )
    }

    fn cube(scene: &mut SceneGraph, name: &str, pos: Vec3) -> NodeId {
        let id = scene.add_node(name);
        scene.set_translation(id, pos);
        scene.set_box_bounds(id, Vec3::splat(0.25));
        scene.set_collidable(id, true);
        id
    }

    fn bound_cursor(kind: CursorKind, scene: &mut SceneGraph) -> (Cursor, InputDevice) {
        let mut cursor = Cursor::new("test", kind, Arc::new(CursorContext::default()));
        cursor.set_theme(theme(kind)).expect("theme");
        cursor.set_cursor_depth(2.0);
        let device = external_device("d");
        cursor.bind_device(device.clone(), Some((scene, &RenderQueue::new())));
        (cursor, device)
    }

    #[test]
    fn test_ids_are_unique() {
        let ctx = Arc::new(CursorContext::default());
        let a = Cursor::new("a", CursorKind::Laser, ctx.clone());
        let b = Cursor::new("b", CursorKind::Laser, ctx);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_theme_kind_mismatch_is_rejected() {
        let mut cursor = Cursor::new("c", CursorKind::Laser, Arc::new(CursorContext::default()));
        let err = cursor.set_theme(theme(CursorKind::Object)).unwrap_err();
        assert!(matches!(err, CursorError::ThemeMismatch { .. }));
        assert!(cursor.theme().is_none());
    }

    #[test]
    fn test_set_theme_falls_back_to_default() {
        let mut cursor = Cursor::new("c", CursorKind::Laser, Arc::new(CursorContext::default()));
        cursor.set_theme(theme(CursorKind::Laser)).expect("theme");
        cursor.apply_asset(Action::Hover, false);

        let plain = Arc::new(
            CursorTheme::new(
                "plain",
                "Plain",
                CursorKind::Laser,
                [CursorAsset::new(Action::Default, AssetKind::Quad2d, "dot")],
            )
            .expect("theme"),
        );
        let old = cursor.theme().cloned().expect("theme set");
        cursor.set_theme(plain.clone()).expect("theme");
        assert_eq!(cursor.current_action(), Some(Action::Default));
        assert_eq!(old.users(), 0);
        assert!(plain.is_loaded_by(cursor.id()));
    }

    #[test]
    fn test_busy_loading_restores_without_sound() {
        let sink = Arc::new(RecordingSink::default());
        let context = Arc::new(CursorContext::new(GlobalSettings::default(), sink.clone()));
        let mut cursor = Cursor::new("c", CursorKind::Laser, context);
        cursor.set_theme(theme(CursorKind::Laser)).expect("theme");
        cursor.check_and_set_asset(Action::Default);
        assert_eq!(sink.played.lock().len(), 1);

        cursor.set_busy_loading(true);
        assert_eq!(cursor.current_action(), Some(Action::Loading));
        cursor.check_and_set_asset(Action::Hover);
        assert_eq!(cursor.current_action(), Some(Action::Loading));

        cursor.check_and_set_asset(Action::Default);
        cursor.set_busy_loading(false);
        assert_eq!(cursor.current_action(), Some(Action::Default));
        assert!(!cursor.is_busy_loading());
        assert_eq!(sink.played.lock().len(), 1);
    }

    #[test]
    fn test_scale_limits_and_object_halving() {
        let mut scene = SceneGraph::new();
        let (mut cursor, device) = bound_cursor(CursorKind::Object, &mut scene);
        cursor.set_scale(MAX_CURSOR_SCALE + 1.0);
        assert_eq!(cursor.cursor_depth(), 2.0);
        cursor.set_scale(6.0);
        assert_eq!(cursor.cursor_depth(), 3.0);
        assert_eq!(device.near_depth(), OBJECT_CURSOR_NEAR_DEPTH);
        assert_eq!(device.controller().cursor_depth(), 3.0);
    }

    #[test]
    fn test_compatibility_queries() {
        let mut cursor = Cursor::new("c", CursorKind::Laser, Arc::new(CursorContext::default()));
        let mouse = DeviceIdentity::new(1, 1, "mouse");
        cursor.set_compatibility(vec![PriorityDeviceBinding::new(2, mouse.clone())]);
        assert!(cursor.is_device_compatible(&mouse));
        assert!(cursor.is_device_compatible(&DeviceIdentity::gear_vr()));
        assert_eq!(cursor.device_priority(&mouse), Some(2));
        assert_eq!(cursor.device_priority(&DeviceIdentity::gear_vr()), Some(3));
        assert_eq!(cursor.device_for_rank(0), Some(&mouse));
        assert_eq!(cursor.current_device_priority(), None);
    }

    #[test]
    fn test_bind_and_release() {
        let mut scene = SceneGraph::new();
        let (mut cursor, device) = bound_cursor(CursorKind::Laser, &mut scene);
        assert!(cursor.is_active());
        assert_eq!(cursor.current_action(), Some(Action::Default));
        let proxy = cursor.proxy(&scene).expect("proxy");
        assert!(scene.is_attached(proxy));
        assert_eq!(
            device.controller().cursor_control(),
            CursorControl::ProjectCursorOnSurface
        );

        let released = cursor.release_device(Some(&mut scene)).expect("device");
        assert_eq!(released, device);
        assert!(!device.is_enabled());
        assert!(!cursor.is_active());
        assert!(!scene.is_attached(proxy));
    }

    #[test]
    fn test_laser_enter_touch_exit() {
        let mut scene = SceneGraph::new();
        let target = cube(&mut scene, "target", Vec3::new(0.0, 0.0, -5.0));
        let (mut cursor, device) = bound_cursor(CursorKind::Laser, &mut scene);
        let sender = device.sender();

        let events = cursor.process_frame(&mut scene, 0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, CursorEventKind::Enter);
        assert_eq!(events[0].target, target);
        assert_eq!(cursor.current_action(), Some(Action::Hover));

        sender.send_key(KeyEvent::down(KeyCode::Enter, 1));
        let events = cursor.process_frame(&mut scene, 1);
        assert_eq!(events[0].kind, CursorEventKind::TouchStart);
        assert!(events[0].key_down());
        assert_eq!(cursor.current_action(), Some(Action::Click));

        let events = cursor.process_frame(&mut scene, 2);
        assert_eq!(events[0].kind, CursorEventKind::Drag);

        sender.send_key(KeyEvent::up(KeyCode::Enter, 3));
        let events = cursor.process_frame(&mut scene, 3);
        assert_eq!(events[0].kind, CursorEventKind::TouchEnd);

        scene.set_enabled(target, false);
        let events = cursor.process_frame(&mut scene, 4);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, CursorEventKind::Exit);
        assert!(!events[0].over);
        assert_eq!(cursor.current_action(), Some(Action::Default));
    }

    #[test]
    fn test_laser_reports_group_root() {
        let mut scene = SceneGraph::new();
        let group = scene.add_node("group");
        scene.set_group_root(group, true);
        let part = scene.add_child_node(group, "part");
        scene.set_translation(part, Vec3::new(0.0, 0.0, -5.0));
        scene.set_box_bounds(part, Vec3::splat(0.5));
        scene.set_collidable(part, true);

        let (mut cursor, _device) = bound_cursor(CursorKind::Laser, &mut scene);
        let events = cursor.process_frame(&mut scene, 0);
        assert_eq!(events[0].target, group);
    }

    #[test]
    fn test_object_cursor_diffs_intersections() {
        let mut scene = SceneGraph::new();
        let (mut cursor, _device) = bound_cursor(CursorKind::Object, &mut scene);
        let a = cube(&mut scene, "a", Vec3::new(0.0, 0.0, -2.0));
        let b = cube(&mut scene, "b", Vec3::new(0.3, 0.0, -2.0));

        let events = cursor.process_frame(&mut scene, 0);
        let kinds: Vec<_> = events.iter().map(|e| (e.kind, e.target)).collect();
        assert_eq!(
            kinds,
            vec![(CursorEventKind::Enter, a), (CursorEventKind::Enter, b)]
        );
        assert_eq!(cursor.current_action(), Some(Action::Intersect));

        assert!(cursor.process_frame(&mut scene, 1).is_empty());

        scene.set_translation(a, Vec3::new(10.0, 0.0, 0.0));
        let events = cursor.process_frame(&mut scene, 2);
        assert_eq!(events.len(), 1);
        assert_eq!((events[0].kind, events[0].target), (CursorEventKind::Exit, a));
        assert_eq!(cursor.intersecting(), &[b]);
    }
}
