//! XREAL 3D cursor library
//!
//! Turns gaze, hand controllers, mice and gamepads into scene-aware 3D
//! cursors. The [`manager::CursorManager`] binds physical devices to cursor
//! slots by priority, runs picking every frame and delivers ordered
//! enter/exit/touch/drag events to listeners and selectable objects.

pub mod controller;
pub mod cursor;
pub mod device;
pub mod error;
pub mod input;
pub mod manager;
pub mod plugin;
pub mod scene;
pub mod selectable;
pub mod settings;
pub mod theme;

pub use cursor::{Cursor, CursorEvent, CursorEventKind, CursorKind, EventGroup};
pub use device::{DeviceIdentity, InputDevice, PriorityDeviceBinding};
pub use error::{AttachError, CursorError, CursorResult, SettingsError};
pub use manager::{CursorManager, CursorManagerConfig};
pub use plugin::{CursorFrameEvents, CursorPlugin};
pub use scene::{NodeId, SceneGraph};
pub use selectable::{ObjectState, SelectableBehavior};
pub use settings::{CursorSettings, SettingsStorage, StorageConfig};
