//! Cursor settings persistence
//!
//! Themes, cursors and their device preferences are stored as TOML. A file in
//! the user's settings directory overrides the bundled defaults.

pub mod schema;
pub mod storage;
pub mod validation;

pub use schema::{CursorConfig, CursorSettings, GlobalSettings, IoEntry, ThemeConfig};
pub use storage::{parse_settings, SettingsStorage, StorageConfig, SETTINGS_FILE_NAME};
pub use validation::SettingsValidation;
