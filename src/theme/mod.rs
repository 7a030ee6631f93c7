//! Cursor themes and the assets they are made of
//!
//! A theme maps every cursor [`Action`] it supports to a [`CursorAsset`].
//! Themes are shared between cursors and keep track of which cursor slots
//! have them loaded.

pub mod audio;

use std::collections::{BTreeMap, BTreeSet};

use bevy::math::Vec3;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use audio::{AudioSink, CursorContext, LogAudioSink};

use crate::cursor::CursorKind;
use crate::error::SettingsError;
use crate::scene::{NodeId, SceneGraph};

/// Width and height of a quad asset when none is configured
pub const DEFAULT_QUAD_SIZE: f32 = 0.1;
/// Seconds per loop of an animated asset
pub const DEFAULT_ANIMATION_DURATION: f32 = 1.0;
const QUAD_HALF_THICKNESS: f32 = 0.005;

/// Cursor situation an asset is shown for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Default,
    Click,
    Loading,
    Hover,
    Intersect,
    Gesture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    #[serde(rename = "2d")]
    Quad2d,
    #[serde(rename = "3d")]
    Mesh3d,
}

fn default_quad_size() -> f32 {
    DEFAULT_QUAD_SIZE
}

fn default_duration() -> f32 {
    DEFAULT_ANIMATION_DURATION
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorAsset {
    pub action: Action,
    pub kind: AssetKind,
    pub src: String,
    #[serde(default = "default_quad_size")]
    pub x: f32,
    #[serde(default = "default_quad_size")]
    pub y: f32,
    #[serde(default, skip_serializing_if = "is_false")]
    pub animated: bool,
    #[serde(default = "default_duration")]
    pub duration: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound_src: Option<String>,
    #[serde(default)]
    pub sound_enabled: bool,
}

impl CursorAsset {
    pub fn new(action: Action, kind: AssetKind, src: impl Into<String>) -> Self {
        Self {
            action,
            kind,
            src: src.into(),
            x: DEFAULT_QUAD_SIZE,
            y: DEFAULT_QUAD_SIZE,
            animated: false,
            duration: DEFAULT_ANIMATION_DURATION,
            sound_src: None,
            sound_enabled: false,
        }
    }

    pub fn with_size(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_sound(mut self, src: impl Into<String>) -> Self {
        self.sound_src = Some(src.into());
        self.sound_enabled = true;
        self
    }

    pub fn animated(mut self, duration: f32) -> Self {
        self.animated = true;
        self.duration = duration;
        self
    }

    pub fn has_sound(&self) -> bool {
        self.sound_src.is_some()
    }

    /// Half extents of the volume the asset occupies around the cursor node
    pub fn half_extents(&self) -> Vec3 {
        let half_x = self.x.abs() * 0.5;
        let half_y = self.y.abs() * 0.5;
        match self.kind {
            AssetKind::Quad2d => Vec3::new(half_x, half_y, QUAD_HALF_THICKNESS),
            AssetKind::Mesh3d => Vec3::new(half_x, half_y, half_x.min(half_y)),
        }
    }

    /// Make this the current asset, playing its sound unless `muted`
    pub fn set(&self, context: &CursorContext, muted: bool) {
        if !muted {
            context.play_asset_sound(self);
        }
    }

    /// Size the cursor proxy node to this asset
    pub fn apply(&self, scene: &mut SceneGraph, node: NodeId) {
        scene.set_box_bounds(node, self.half_extents());
    }
}

#[derive(Debug)]
pub struct CursorTheme {
    id: String,
    name: String,
    description: String,
    kind: CursorKind,
    assets: BTreeMap<Action, CursorAsset>,
    loaded_by: Mutex<BTreeSet<u32>>,
}

impl CursorTheme {
    /// Build a theme; a DEFAULT asset is mandatory
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: CursorKind,
        assets: impl IntoIterator<Item = CursorAsset>,
    ) -> Result<Self, SettingsError> {
        let id = id.into();
        let assets: BTreeMap<Action, CursorAsset> =
            assets.into_iter().map(|a| (a.action, a)).collect();
        if !assets.contains_key(&Action::Default) {
            return Err(SettingsError::Validation(format!(
                "theme '{}' has no default asset",
                id
            )));
        }
        Ok(Self {
            id,
            name: name.into(),
            description: String::new(),
            kind,
            assets,
            loaded_by: Mutex::new(BTreeSet::new()),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> CursorKind {
        self.kind
    }

    pub fn asset(&self, action: Action) -> Option<&CursorAsset> {
        self.assets.get(&action)
    }

    pub fn default_asset(&self) -> Option<&CursorAsset> {
        self.asset(Action::Default)
    }

    pub fn assets(&self) -> impl Iterator<Item = &CursorAsset> {
        self.assets.values()
    }

    pub fn load(&self, slot: u32) {
        if self.loaded_by.lock().insert(slot) {
            debug!("Theme '{}' loaded by cursor {}", self.id, slot);
        }
    }

    pub fn unload(&self, slot: u32) {
        if self.loaded_by.lock().remove(&slot) {
            debug!("Theme '{}' unloaded by cursor {}", self.id, slot);
        }
    }

    pub fn is_loaded_by(&self, slot: u32) -> bool {
        self.loaded_by.lock().contains(&slot)
    }

    /// Number of cursor slots currently using this theme
    pub fn users(&self) -> usize {
        self.loaded_by.lock().len()
    }
}
