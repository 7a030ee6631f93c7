//! Cursor manager
//!
//! Owns the cursor roster, the known input devices, the scene and the
//! selectable behaviors. Devices move between three lists:
//!
//! - `used`: bound to exactly one cursor
//! - `unused`: connected and free
//! - `disconnected`: known but gone; kept so a reconnect restores identity
//!
//! Every change to devices or cursor enablement re-runs the assignment.

mod assign;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use bevy::prelude::Resource;
use tracing::{debug, error, info, warn};

use crate::controller::RenderQueue;
use crate::cursor::{
    order_events, Cursor, CursorActivationListener, CursorEvent, CursorEventListener, CursorKind,
};
use crate::device::{DeviceIdentity, InputDevice};
use crate::error::{AttachError, CursorError, CursorResult, SettingsError};
use crate::scene::{NodeId, SceneGraph};
use crate::selectable::{SelectableAction, SelectableBehavior};
use crate::settings::{
    CursorConfig, CursorSettings, IoEntry, SettingsStorage, SettingsValidation, StorageConfig,
    ThemeConfig,
};
use crate::theme::{AudioSink, CursorContext, CursorTheme, LogAudioSink};

/// Name of the internal laser cursor used for settings menus
pub const SETTINGS_CURSOR_NAME: &str = "SettingsCursor";

/// Runtime knobs for the cursor manager
#[derive(Debug, Clone, Resource)]
pub struct CursorManagerConfig {
    pub storage: StorageConfig,
    /// Sort each frame's events by target distance from the origin
    pub depth_ordering: bool,
    /// Scale applied to every cursor at construction
    pub cursor_scale: f32,
}

impl Default for CursorManagerConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            depth_ordering: false,
            cursor_scale: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SettingsCursorSession {
    menu_cursor: u32,
    near_depth: f32,
    far_depth: f32,
}

#[derive(Resource)]
pub struct CursorManager {
    config: CursorManagerConfig,
    context: Arc<CursorContext>,
    themes: BTreeMap<String, Arc<CursorTheme>>,
    cursors: Vec<Cursor>,
    settings_cursor: u32,
    settings_session: Option<SettingsCursorSession>,
    used: Vec<InputDevice>,
    unused: Vec<InputDevice>,
    disconnected: Vec<InputDevice>,
    scene: Option<SceneGraph>,
    render_queue: RenderQueue,
    activation_listeners: Vec<Arc<dyn CursorActivationListener>>,
    event_listeners: Vec<Arc<dyn CursorEventListener>>,
    selectables: HashMap<NodeId, SelectableBehavior>,
    depth_ordering: bool,
    started: Instant,
}

impl std::fmt::Debug for CursorManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorManager")
            .field("cursors", &self.cursors)
            .field("used", &self.used.len())
            .field("unused", &self.unused.len())
            .field("disconnected", &self.disconnected.len())
            .field("selectables", &self.selectables.len())
            .finish_non_exhaustive()
    }
}

fn theme_from_config(config: &ThemeConfig) -> Result<CursorTheme, SettingsError> {
    Ok(CursorTheme::new(
        config.id.clone(),
        config.name.clone(),
        config.kind,
        config.assets.iter().cloned(),
    )?
    .with_description(config.description.clone()))
}

impl CursorManager {
    /// Load settings from storage (user file, else bundled defaults) and
    /// build the roster. Invalid settings abort construction.
    pub fn new(config: CursorManagerConfig) -> CursorResult<Self> {
        let storage = SettingsStorage::with_config(config.storage.clone())?;
        let settings = storage.load()?;
        Self::from_settings(config, settings)
    }

    pub fn from_settings(config: CursorManagerConfig, settings: CursorSettings) -> CursorResult<Self> {
        Self::with_audio_sink(config, settings, Arc::new(LogAudioSink))
    }

    pub fn with_audio_sink(
        config: CursorManagerConfig,
        settings: CursorSettings,
        audio: Arc<dyn AudioSink>,
    ) -> CursorResult<Self> {
        settings
            .validate()
            .map_err(|e| SettingsError::Validation(e.to_string()))?;

        let context = Arc::new(CursorContext::new(settings.global.clone(), audio));
        let mut themes = BTreeMap::new();
        for theme in &settings.themes {
            themes.insert(theme.id.clone(), Arc::new(theme_from_config(theme)?));
        }

        let mut cursors = Vec::with_capacity(settings.cursors.len() + 1);
        for entry in &settings.cursors {
            let mut cursor = Cursor::new(entry.name.clone(), entry.kind, Arc::clone(&context));
            cursor.set_compatibility(entry.bindings());
            cursor.set_start_position(entry.position);
            cursor.set_saved_device(entry.saved_device.clone());
            cursor.set_saved_theme_id(Some(entry.theme.clone()));
            if let Some(theme) = themes.get(&entry.theme) {
                cursor.set_theme(Arc::clone(theme))?;
            }
            cursor.set_enabled_flag(entry.active);
            cursor.set_scale(config.cursor_scale);
            cursors.push(cursor);
        }

        let mut settings_cursor =
            Cursor::new(SETTINGS_CURSOR_NAME, CursorKind::Laser, Arc::clone(&context));
        if let Some(theme) = themes.values().find(|t| t.kind() == CursorKind::Laser) {
            settings_cursor.set_theme(Arc::clone(theme))?;
        }
        settings_cursor.set_enabled_flag(false);
        settings_cursor.set_scale(config.cursor_scale);
        let settings_cursor_id = settings_cursor.id();
        cursors.push(settings_cursor);

        let mut manager = Self {
            depth_ordering: config.depth_ordering,
            config,
            context,
            themes,
            cursors,
            settings_cursor: settings_cursor_id,
            settings_session: None,
            used: Vec::new(),
            unused: vec![InputDevice::gear_vr_gaze()],
            disconnected: Vec::new(),
            scene: None,
            render_queue: RenderQueue::new(),
            activation_listeners: Vec::new(),
            event_listeners: Vec::new(),
            selectables: HashMap::new(),
            started: Instant::now(),
        };
        manager.assign_devices();
        info!(
            "✅ Cursor manager ready: {} cursors, {} themes",
            manager.cursors.len() - 1,
            manager.themes.len()
        );
        Ok(manager)
    }

    pub fn config(&self) -> &CursorManagerConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<CursorContext> {
        &self.context
    }

    pub fn render_queue(&self) -> &RenderQueue {
        &self.render_queue
    }

    // Scene

    /// Replace the scene. Cursors leave the old scene and active ones are
    /// placed into the new one. Selectables belong to the old scene and are
    /// dropped with it.
    pub fn set_scene(&mut self, scene: Option<SceneGraph>) -> Option<SceneGraph> {
        let mut old = self.scene.take();
        if let Some(old_scene) = old.as_mut() {
            self.render_queue.run_pending(old_scene);
            for cursor in &mut self.cursors {
                cursor.detach_from_scene(old_scene);
            }
        }
        if !self.selectables.is_empty() {
            debug!("Dropping {} selectables with the old scene", self.selectables.len());
            self.selectables.clear();
        }
        self.scene = scene;
        if let Some(scene) = self.scene.as_mut() {
            for cursor in &mut self.cursors {
                if cursor.device().is_some() {
                    cursor.attach_to_scene(scene, &self.render_queue);
                }
            }
        }
        old
    }

    pub fn scene(&self) -> Option<&SceneGraph> {
        self.scene.as_ref()
    }

    pub fn scene_mut(&mut self) -> Option<&mut SceneGraph> {
        self.scene.as_mut()
    }

    // Themes

    pub fn themes(&self) -> impl Iterator<Item = &Arc<CursorTheme>> {
        self.themes.values()
    }

    pub fn theme(&self, id: &str) -> Option<&Arc<CursorTheme>> {
        self.themes.get(id)
    }

    // Cursor lookup

    fn index_of(&self, cursor_id: u32) -> Option<usize> {
        self.cursors.iter().position(|c| c.id() == cursor_id)
    }

    fn index_or_err(&self, cursor_id: u32) -> CursorResult<usize> {
        self.index_of(cursor_id)
            .ok_or(CursorError::UnknownCursor(cursor_id))
    }

    /// Every cursor, including the internal settings cursor
    pub fn cursors(&self) -> &[Cursor] {
        &self.cursors
    }

    pub fn cursor(&self, cursor_id: u32) -> Option<&Cursor> {
        self.cursors.iter().find(|c| c.id() == cursor_id)
    }

    pub fn settings_cursor(&self) -> Option<&Cursor> {
        self.cursor(self.settings_cursor)
    }

    pub fn find_cursor_by_name(&self, name: &str) -> Option<&Cursor> {
        self.cursors.iter().find(|c| c.name() == name)
    }

    pub fn find_cursor_by_kind(&self, kind: CursorKind) -> Option<&Cursor> {
        self.cursors
            .iter()
            .find(|c| c.kind() == kind && c.id() != self.settings_cursor)
    }

    /// First cursor whose compatibility list names `device`
    pub fn find_cursor_by_device(&self, device: &DeviceIdentity) -> Option<&Cursor> {
        self.cursors.iter().find(|c| c.is_device_compatible(device))
    }

    /// Cursor currently driven by the controller with `controller_id`
    pub fn find_cursor_for_controller(&self, controller_id: u32) -> Option<&Cursor> {
        self.cursors.iter().find(|c| {
            c.device()
                .is_some_and(|d| d.controller_id() == controller_id)
        })
    }

    pub fn active_cursors(&self) -> Vec<&Cursor> {
        self.cursors.iter().filter(|c| c.is_active()).collect()
    }

    pub fn inactive_cursors(&self) -> Vec<&Cursor> {
        self.cursors.iter().filter(|c| !c.is_active()).collect()
    }

    // Devices

    pub fn used_devices(&self) -> &[InputDevice] {
        &self.used
    }

    pub fn available_devices(&self) -> &[InputDevice] {
        &self.unused
    }

    pub fn disconnected_devices(&self) -> &[InputDevice] {
        &self.disconnected
    }

    pub fn is_device_active(&self, identity: &DeviceIdentity) -> bool {
        self.used.iter().any(|d| d.matches(identity))
    }

    pub fn find_device(&self, identity: &DeviceIdentity) -> Option<&InputDevice> {
        self.used
            .iter()
            .chain(&self.unused)
            .chain(&self.disconnected)
            .find(|d| d.matches(identity))
    }

    /// Register a device, or reconnect a known one. Returns false when the
    /// device was already connected.
    pub fn add_device(&mut self, device: InputDevice) -> bool {
        let identity = device.identity().clone();
        if let Some(position) = self.disconnected.iter().position(|d| d.matches(&identity)) {
            let known = self.disconnected.remove(position);
            known.set_connected(true);
            info!("🔌 Device reconnected: {} [{}]", known.name(), identity);
            self.unused.push(known);
        } else if self.find_device(&identity).is_some() {
            debug!("Device {} already known", identity);
            return false;
        } else {
            device.set_connected(true);
            device.set_enabled(false);
            info!("🔌 Device added: {} [{}]", device.name(), identity);
            self.unused.push(device);
        }
        self.assign_devices();
        true
    }

    /// Disconnect a device, freeing its cursor for reassignment
    pub fn remove_device(&mut self, identity: &DeviceIdentity) -> bool {
        if let Some(index) = self
            .cursors
            .iter()
            .position(|c| c.device().is_some_and(|d| d.matches(identity)))
        {
            if let Some(device) = self.release(index) {
                device.set_connected(false);
                self.disconnected.push(device);
            }
        } else if let Some(position) = self.unused.iter().position(|d| d.matches(identity)) {
            let device = self.unused.remove(position);
            device.set_connected(false);
            self.disconnected.push(device);
        } else {
            return false;
        }
        info!("🔌 Device disconnected: {}", identity);
        self.assign_devices();
        true
    }

    pub fn set_device_connected(&mut self, identity: &DeviceIdentity, connected: bool) -> bool {
        if connected {
            match self.disconnected.iter().find(|d| d.matches(identity)).cloned() {
                Some(device) => self.add_device(device),
                None => false,
            }
        } else {
            self.remove_device(identity)
        }
    }

    /// Bind `device` to `cursor_id` by hand, taking it from whichever cursor
    /// holds it. Binding the device a cursor already has is a no-op.
    pub fn attach_device(
        &mut self,
        cursor_id: u32,
        device: &DeviceIdentity,
    ) -> Result<(), AttachError> {
        let index = self
            .index_of(cursor_id)
            .ok_or(AttachError::UnknownCursor(cursor_id))?;
        let cursor = &self.cursors[index];
        if !cursor.is_enabled() {
            return Err(AttachError::CursorNotEnabled(cursor_id));
        }
        if cursor.device().is_some_and(|d| d.matches(device)) {
            return Ok(());
        }
        if !cursor.is_device_compatible(device) {
            return Err(AttachError::NotCompatible(device.clone(), cursor_id));
        }

        let taken = if let Some(holder) = self
            .cursors
            .iter()
            .position(|c| c.device().is_some_and(|d| d.matches(device)))
        {
            self.release(holder)
        } else {
            self.take_unused_device(device)
        };
        let Some(taken) = taken else {
            return Err(AttachError::NotAvailable(device.clone()));
        };

        if let Some(previous) = self.release(index) {
            self.unused.push(previous);
        }
        self.bind(index, taken);
        self.assign_devices();
        Ok(())
    }

    fn take_unused_device(&mut self, identity: &DeviceIdentity) -> Option<InputDevice> {
        let position = self.unused.iter().position(|d| d.matches(identity))?;
        Some(self.unused.remove(position))
    }

    // Binding primitives

    /// Bind an already removed-from-unused device to the cursor at `index`
    fn bind(&mut self, index: usize, device: InputDevice) {
        let scene = self.scene.as_mut().map(|scene| (scene, &self.render_queue));
        self.cursors[index].bind_device(device.clone(), scene);
        self.used.push(device);

        let cursor = &self.cursors[index];
        for listener in &self.activation_listeners {
            listener.on_activated(cursor);
        }
        for selectable in self.selectables.values_mut() {
            selectable.on_cursor_activated(cursor.id());
        }
    }

    /// Unbind the cursor at `index`. The device leaves `used`; the caller
    /// decides where it goes next.
    fn release(&mut self, index: usize) -> Option<InputDevice> {
        let device = self.cursors[index].release_device(self.scene.as_mut())?;
        self.used.retain(|d| *d != device);

        let cursor = &self.cursors[index];
        let cursor_id = cursor.id();
        for listener in &self.activation_listeners {
            listener.on_deactivated(cursor);
        }
        let actions: Vec<SelectableAction> = match self.scene.as_mut() {
            Some(scene) => self
                .selectables
                .values_mut()
                .filter_map(|selectable| selectable.on_cursor_deactivated(cursor_id, scene))
                .collect(),
            None => Vec::new(),
        };
        // The dragged node is already back under its parent; these only log
        for action in actions {
            self.apply_selectable_action(action);
        }
        Some(device)
    }

    /// Move the device of `from` onto `to` without passing through `unused`
    fn transfer_device(&mut self, from: usize, to: usize) -> bool {
        let Some(device) = self.release(from) else {
            return false;
        };
        if let Some(previous) = self.release(to) {
            self.unused.push(previous);
        }
        self.bind(to, device);
        true
    }

    // Cursor state

    /// Enabling makes the cursor eligible for a device; disabling releases
    /// its device to the unused pool before reassignment.
    pub fn set_cursor_enabled(&mut self, cursor_id: u32, enabled: bool) -> CursorResult<()> {
        let index = self.index_or_err(cursor_id)?;
        if self.cursors[index].is_enabled() == enabled {
            return Ok(());
        }
        self.cursors[index].set_enabled_flag(enabled);
        if !enabled {
            if let Some(device) = self.release(index) {
                self.unused.push(device);
            }
        }
        self.assign_devices();
        Ok(())
    }

    /// Hand a compatible device to `new_cursor`, preferring the one held by
    /// `old_cursor`. Returns true if `new_cursor` ends up active.
    pub fn replace_cursor(&mut self, new_cursor: u32, old_cursor: u32) -> CursorResult<bool> {
        let new_index = self.index_or_err(new_cursor)?;
        let old_index = self.index_or_err(old_cursor)?;
        if self.cursors[new_index].is_active() {
            return Ok(true);
        }

        let old_device = self.cursors[old_index].device().map(|d| d.identity().clone());
        if let Some(identity) = old_device {
            if self.cursors[new_index].is_device_compatible(&identity) {
                self.cursors[new_index].set_enabled_flag(true);
                return Ok(self.transfer_device(old_index, new_index));
            }
        }

        let donor = self.cursors.iter().enumerate().find_map(|(i, c)| {
            let device = c.device()?;
            (i != new_index
                && c.is_active()
                && self.cursors[new_index].is_device_compatible(device.identity()))
            .then_some(i)
        });
        match donor {
            Some(donor) => {
                self.cursors[new_index].set_enabled_flag(true);
                Ok(self.transfer_device(donor, new_index))
            }
            None => Ok(false),
        }
    }

    /// Lend the device of `cursor_id` to the settings cursor, remembering
    /// its depth range
    pub fn enable_settings_cursor(&mut self, cursor_id: u32) -> CursorResult<()> {
        let menu_index = self.index_or_err(cursor_id)?;
        let settings_index = self.index_or_err(self.settings_cursor)?;
        if menu_index == settings_index {
            return Err(CursorError::InvalidState(
                "settings cursor cannot lend to itself".to_string(),
            ));
        }
        let (near_depth, far_depth) = match self.cursors[menu_index].device() {
            Some(device) => (device.near_depth(), device.far_depth()),
            None => {
                return Err(CursorError::InvalidState(format!(
                    "cursor {} has no device",
                    cursor_id
                )))
            }
        };
        self.settings_session = Some(SettingsCursorSession {
            menu_cursor: cursor_id,
            near_depth,
            far_depth,
        });
        self.cursors[settings_index].set_enabled_flag(true);
        self.transfer_device(menu_index, settings_index);
        debug!("Settings cursor borrowed device of cursor {}", cursor_id);
        Ok(())
    }

    /// Give the borrowed device back and restore its depth range
    pub fn disable_settings_cursor(&mut self) {
        let Some(session) = self.settings_session.take() else {
            return;
        };
        let Some(settings_index) = self.index_of(self.settings_cursor) else {
            return;
        };
        if let Some(menu_index) = self.index_of(session.menu_cursor) {
            if self.cursors[menu_index].device().is_none() {
                self.transfer_device(settings_index, menu_index);
            }
            if let Some(device) = self.cursors[menu_index].device() {
                device.set_far_depth(session.far_depth);
                device.set_near_depth(session.near_depth);
            }
        }
        self.cursors[settings_index].set_enabled_flag(false);
        if let Some(device) = self.release(settings_index) {
            self.unused.push(device);
        }
        self.assign_devices();
    }

    pub fn is_settings_cursor_enabled(&self) -> bool {
        self.settings_session.is_some()
    }

    pub fn set_cursor_depth(&mut self, cursor_id: u32, depth: f32) -> CursorResult<()> {
        let index = self.index_or_err(cursor_id)?;
        self.cursors[index].set_cursor_depth(depth);
        Ok(())
    }

    pub fn set_cursor_scale(&mut self, cursor_id: u32, scale: f32) -> CursorResult<()> {
        let index = self.index_or_err(cursor_id)?;
        self.cursors[index].set_scale(scale);
        Ok(())
    }

    pub fn set_busy_loading(&mut self, cursor_id: u32, loading: bool) -> CursorResult<()> {
        let index = self.index_or_err(cursor_id)?;
        self.cursors[index].set_busy_loading(loading);
        Ok(())
    }

    pub fn set_cursor_theme(&mut self, cursor_id: u32, theme_id: &str) -> CursorResult<()> {
        let index = self.index_or_err(cursor_id)?;
        let theme = self
            .themes
            .get(theme_id)
            .cloned()
            .ok_or_else(|| CursorError::UnknownTheme(theme_id.to_string()))?;
        self.cursors[index].set_theme(theme)?;
        self.cursors[index].set_saved_theme_id(Some(theme_id.to_string()));
        Ok(())
    }

    pub fn set_sound_enabled(&self, enabled: bool) {
        self.context.set_sound_enabled(enabled);
    }

    pub fn is_sound_enabled(&self) -> bool {
        self.context.is_sound_enabled()
    }

    pub fn set_depth_ordering(&mut self, enabled: bool) {
        self.depth_ordering = enabled;
    }

    pub fn is_depth_ordering(&self) -> bool {
        self.depth_ordering
    }

    // Listeners

    /// Register an activation listener; it is told about every cursor that
    /// is already active
    pub fn add_activation_listener(&mut self, listener: Arc<dyn CursorActivationListener>) {
        for cursor in self.cursors.iter().filter(|c| c.is_active()) {
            listener.on_activated(cursor);
        }
        self.activation_listeners.push(listener);
    }

    pub fn remove_activation_listener(&mut self, listener: &Arc<dyn CursorActivationListener>) -> bool {
        let before = self.activation_listeners.len();
        self.activation_listeners.retain(|l| !Arc::ptr_eq(l, listener));
        before != self.activation_listeners.len()
    }

    /// Listener for the events of every cursor
    pub fn add_event_listener(&mut self, listener: Arc<dyn CursorEventListener>) {
        self.event_listeners.push(listener);
    }

    pub fn remove_event_listener(&mut self, listener: &Arc<dyn CursorEventListener>) -> bool {
        let before = self.event_listeners.len();
        self.event_listeners.retain(|l| !Arc::ptr_eq(l, listener));
        before != self.event_listeners.len()
    }

    /// Listener for the events of a single cursor
    pub fn add_cursor_listener(
        &mut self,
        cursor_id: u32,
        listener: Arc<dyn CursorEventListener>,
    ) -> CursorResult<()> {
        let index = self.index_or_err(cursor_id)?;
        self.cursors[index].add_listener(listener);
        Ok(())
    }

    // Selectables

    /// Attach a selectable behavior to its node. The node becomes a
    /// collidable group root so hits on its children report against it.
    pub fn add_selectable(&mut self, mut behavior: SelectableBehavior) -> CursorResult<()> {
        let scene = self
            .scene
            .as_mut()
            .ok_or_else(|| CursorError::InvalidState("no scene set".to_string()))?;
        let node = behavior.node();
        behavior.attach(scene)?;
        scene.set_group_root(node, true);
        scene.set_collidable(node, true);
        for cursor in self.cursors.iter().filter(|c| c.is_active()) {
            behavior.on_cursor_activated(cursor.id());
        }
        if self.selectables.insert(node, behavior).is_some() {
            debug!("Replaced selectable on {:?}", node);
        }
        Ok(())
    }

    pub fn remove_selectable(&mut self, node: NodeId) -> Option<SelectableBehavior> {
        let behavior = self.selectables.remove(&node)?;
        if let Some(scene) = self.scene.as_mut() {
            scene.set_group_root(node, false);
        }
        Some(behavior)
    }

    pub fn selectable(&self, node: NodeId) -> Option<&SelectableBehavior> {
        self.selectables.get(&node)
    }

    pub fn selectable_mut(&mut self, node: NodeId) -> Option<&mut SelectableBehavior> {
        self.selectables.get_mut(&node)
    }

    fn apply_selectable_action(&mut self, action: SelectableAction) {
        let (cursor_id, started) = match action {
            SelectableAction::StartDrag { cursor_id, node } => {
                let started = self
                    .cursor(cursor_id)
                    .and_then(Cursor::device)
                    .is_some_and(|d| d.controller().start_drag(node));
                (cursor_id, started)
            }
            SelectableAction::StopDrag { cursor_id } => {
                let stopped = self
                    .cursor(cursor_id)
                    .and_then(Cursor::device)
                    .is_some_and(|d| d.controller().stop_drag());
                (cursor_id, stopped)
            }
        };
        if !started {
            debug!("Cursor {} ignored {:?}", cursor_id, action);
        }
    }

    // Frame loop

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Run one frame using the manager's own clock
    pub fn update(&mut self) -> Vec<CursorEvent> {
        let now = self.elapsed_ms();
        self.update_at(now)
    }

    /// Run one frame: deferred scene jobs, per-cursor picking, ordering and
    /// dispatch. Returns the events in delivery order.
    pub fn update_at(&mut self, now_ms: u64) -> Vec<CursorEvent> {
        let Some(scene) = self.scene.as_mut() else {
            return Vec::new();
        };
        self.render_queue.run_pending(scene);

        let mut events = Vec::new();
        for cursor in &mut self.cursors {
            events.extend(cursor.process_frame(scene, now_ms));
        }
        order_events(&mut events, self.depth_ordering, scene);

        let mut actions = Vec::new();
        for event in &events {
            if let Some(cursor) = self.cursors.iter().find(|c| c.id() == event.cursor_id) {
                cursor.notify_listeners(event);
            }
            for listener in &self.event_listeners {
                listener.on_event(event);
            }
            if let Some(selectable) = self.selectables.get_mut(&event.target) {
                actions.extend(selectable.handle_cursor_event(event, scene));
            }
        }
        for action in actions {
            self.apply_selectable_action(action);
        }
        events
    }

    // Persistence

    /// Current roster in settings form. Bound devices are written as the
    /// saved device so the next session restores them first.
    pub fn to_settings(&self) -> CursorSettings {
        let themes = self
            .themes
            .values()
            .map(|theme| ThemeConfig {
                id: theme.id().to_string(),
                name: theme.name().to_string(),
                description: theme.description().to_string(),
                kind: theme.kind(),
                assets: theme.assets().cloned().collect(),
            })
            .collect();

        let cursors = self
            .cursors
            .iter()
            .filter(|c| c.id() != self.settings_cursor)
            .map(|cursor| CursorConfig {
                name: cursor.name().to_string(),
                kind: cursor.kind(),
                active: cursor.is_enabled(),
                theme: cursor
                    .theme()
                    .map(|t| t.id().to_string())
                    .or_else(|| cursor.saved_theme_id().map(str::to_string))
                    .unwrap_or_default(),
                position: cursor.start_position(),
                saved_device: cursor
                    .device()
                    .map(|d| d.identity().clone())
                    .or_else(|| cursor.saved_device().cloned()),
                io: cursor.compatibility().iter().map(IoEntry::from).collect(),
            })
            .collect();

        CursorSettings {
            global: self.context.global(),
            themes,
            cursors,
        }
    }

    /// Write settings to storage. Failures are logged, not returned.
    pub fn save_settings(&self) {
        let result = SettingsStorage::with_config(self.config.storage.clone())
            .and_then(|storage| storage.save(&self.to_settings()));
        if let Err(e) = result {
            error!("Could not save cursor settings: {}", e);
        }
    }

    pub async fn save_settings_async(&self) -> Result<(), SettingsError> {
        let settings = self.to_settings();
        let storage = SettingsStorage::with_config(self.config.storage.clone())?;
        storage.save_async(&settings).await
    }

    /// Release every device and drop all themes
    pub fn close(&mut self) {
        for index in 0..self.cursors.len() {
            if let Some(device) = self.release(index) {
                self.unused.push(device);
            }
        }
        for cursor in &mut self.cursors {
            cursor.close(self.scene.as_mut());
        }
        if !self.used.is_empty() {
            warn!("{} devices still marked used after close", self.used.len());
            self.unused.append(&mut self.used);
        }
        info!("Cursor manager closed");
    }
}
