//! Settings integration tests
//!
//! Parsing, validation and persistence of cursor settings.

pub mod storage_test;
