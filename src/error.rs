use thiserror::Error;

use crate::cursor::CursorKind;
use crate::device::DeviceIdentity;

/// Errors raised while loading, validating or persisting cursor settings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Settings file could not be parsed
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    /// Settings could not be encoded
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Settings file could not be read or written
    #[error("Settings storage failed: {0}")]
    Storage(#[from] std::io::Error),

    /// Settings parsed but describe an impossible configuration
    #[error("Invalid settings: {0}")]
    Validation(String),
}

/// Errors returned when binding a device to a cursor by hand
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttachError {
    #[error("Cursor {0} not found")]
    UnknownCursor(u32),

    #[error("Cursor {0} is not enabled")]
    CursorNotEnabled(u32),

    #[error("Device {0} is not compatible with cursor {1}")]
    NotCompatible(DeviceIdentity, u32),

    #[error("Device {0} cannot be attached")]
    NotAvailable(DeviceIdentity),
}

/// Errors that can occur in the cursor system
#[derive(Debug, Error)]
pub enum CursorError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Attach(#[from] AttachError),

    /// Theme kind does not match the cursor it was bound to
    #[error("Theme '{theme}' is a {theme_kind:?} theme, cursor is {cursor_kind:?}")]
    ThemeMismatch {
        theme: String,
        theme_kind: CursorKind,
        cursor_kind: CursorKind,
    },

    #[error("Unknown theme: {0}")]
    UnknownTheme(String),

    #[error("Unknown cursor: {0}")]
    UnknownCursor(u32),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type for cursor operations
pub type CursorResult<T> = Result<T, CursorError>;
