//! On-disk layout of `settings.toml`

use serde::{Deserialize, Serialize};

use crate::cursor::{CursorKind, StartPosition};
use crate::device::{DeviceIdentity, PriorityDeviceBinding};
use crate::theme::CursorAsset;

fn default_true() -> bool {
    true
}

/// Switches shared by every cursor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    pub sound_enabled: bool,
    pub show_onscreen_label: bool,
    pub preview_enabled: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            show_onscreen_label: true,
            preview_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: CursorKind,
    #[serde(default)]
    pub assets: Vec<CursorAsset>,
}

/// One `[[cursors.io]]` row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoEntry {
    pub vendor_id: u32,
    pub product_id: u32,
    pub device_id: String,
    pub priority: u32,
}

impl IoEntry {
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(self.vendor_id, self.product_id, self.device_id.clone())
    }
}

impl From<&IoEntry> for PriorityDeviceBinding {
    fn from(entry: &IoEntry) -> Self {
        PriorityDeviceBinding::new(entry.priority, entry.identity())
    }
}

impl From<&PriorityDeviceBinding> for IoEntry {
    fn from(binding: &PriorityDeviceBinding) -> Self {
        Self {
            vendor_id: binding.device.vendor_id,
            product_id: binding.device.product_id,
            device_id: binding.device.device_id.clone(),
            priority: binding.priority,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorConfig {
    pub name: String,
    pub kind: CursorKind,
    #[serde(default = "default_true")]
    pub active: bool,
    pub theme: String,
    #[serde(default)]
    pub position: StartPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_device: Option<DeviceIdentity>,
    #[serde(default)]
    pub io: Vec<IoEntry>,
}

impl CursorConfig {
    pub fn bindings(&self) -> Vec<PriorityDeviceBinding> {
        self.io.iter().map(PriorityDeviceBinding::from).collect()
    }
}

/// Complete cursor configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CursorSettings {
    #[serde(default)]
    pub global: GlobalSettings,
    #[serde(default)]
    pub themes: Vec<ThemeConfig>,
    #[serde(default)]
    pub cursors: Vec<CursorConfig>,
}

impl CursorSettings {
    pub fn theme(&self, id: &str) -> Option<&ThemeConfig> {
        self.themes.iter().find(|t| t.id == id)
    }

    pub fn cursor(&self, name: &str) -> Option<&CursorConfig> {
        self.cursors.iter().find(|c| c.name == name)
    }
}
