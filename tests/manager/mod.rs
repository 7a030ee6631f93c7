//! Cursor manager integration tests
//!
//! Device assignment across add/remove/enable cycles and full frames driven
//! through a scene.

pub mod assignment_test;
pub mod frame_test;
