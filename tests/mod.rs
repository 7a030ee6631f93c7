//! Integration tests for the XREAL 3D cursor library
//!
//! Unit tests live next to the code in src/. These exercise the public API
//! end to end: device assignment, frame processing and settings storage.


pub mod manager;
pub mod settings;
