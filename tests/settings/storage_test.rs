//! Tests for settings storage

use xreal_cursor3d::settings::{parse_settings, SettingsValidation};
use xreal_cursor3d::{
    CursorKind, CursorManager, CursorManagerConfig, DeviceIdentity, SettingsError,
    SettingsStorage, StorageConfig,
};

use crate::test_utils::*;

#[test]
fn test_missing_file_falls_back_to_bundled_defaults() {
    let temp_dir = create_temp_dir();
    let storage = SettingsStorage::with_config(StorageConfig::in_directory(temp_dir.path()))
        .expect("Failed to create storage");

    assert!(!storage.exists());
    let settings = storage.load().expect("Load failed");
    assert_eq!(settings, SettingsStorage::load_bundled().expect("bundled"));
}

#[test]
fn test_save_then_load_round_trip() {
    let temp_dir = create_temp_dir();
    let storage = SettingsStorage::with_config(StorageConfig::in_directory(temp_dir.path()))
        .expect("Failed to create storage");

    let mut settings = settings_with(vec![laser("laser", &[(10, 0)])], 0.3);
    settings.global.sound_enabled = false;
    settings.cursors[0].saved_device = Some(identity(10));
    storage.save(&settings).expect("Save failed");

    assert!(storage.exists());
    assert!(!create_temp_file_path(&temp_dir, "settings.tmp").exists());
    assert_eq!(storage.load().expect("Load failed"), settings);
}

#[test]
fn test_invalid_settings_are_not_written() {
    let temp_dir = create_temp_dir();
    let storage = SettingsStorage::with_config(StorageConfig::in_directory(temp_dir.path()))
        .expect("Failed to create storage");

    let mut settings = settings_with(vec![laser("laser", &[])], 0.3);
    settings.cursors[0].theme = "missing".into();
    assert_error_contains!(storage.save(&settings), "missing");
    assert!(!storage.exists());
}

#[test]
fn test_theme_without_default_asset_is_fatal() {
    let text = r#"
        [[themes]]
        id = "hollow"
        name = "Hollow"
        kind = "object"

        [[themes.assets]]
        action = "intersect"
        kind = "3d"
        src = "glow.obj"
    "#;
    assert_error_contains!(parse_settings(text), "has no default asset");
}

#[test]
fn test_corrupt_file_is_a_parse_error() {
    let temp_dir = create_temp_dir();
    let storage = SettingsStorage::with_config(StorageConfig::in_directory(temp_dir.path()))
        .expect("Failed to create storage");
    std::fs::write(storage.settings_path(), "[[cursors]\nname = ").expect("write");

    match storage.load() {
        Err(SettingsError::Parse(_)) => {}
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn test_theme_kind_must_match_cursor() {
    let mut settings = settings_with(vec![laser("laser", &[])], 0.3);
    settings.cursors[0].kind = CursorKind::Object;
    assert_error_contains!(settings.validate(), "laser");
}

#[test]
fn test_manager_rejects_invalid_settings() {
    let temp_dir = create_temp_dir();
    let settings = settings_with(vec![laser("twin", &[]), laser("twin", &[])], 0.3);
    let config = CursorManagerConfig {
        storage: StorageConfig::in_directory(temp_dir.path()),
        ..Default::default()
    };
    assert_error_contains!(CursorManager::from_settings(config, settings), "twin");
}

#[tokio::test]
async fn test_async_save_and_load() {
    let temp_dir = create_temp_dir();
    let storage = SettingsStorage::with_config(StorageConfig::in_directory(temp_dir.path()))
        .expect("Failed to create storage");

    let settings = SettingsStorage::load_bundled().expect("bundled");
    storage.save_async(&settings).await.expect("Save failed");
    let loaded = storage.load_async().await.expect("Load failed");
    assert_eq!(loaded, settings);
}

#[tokio::test]
async fn test_manager_settings_survive_restart() {
    let temp_dir = create_temp_dir();
    let config = CursorManagerConfig {
        storage: StorageConfig::in_directory(temp_dir.path()),
        ..Default::default()
    };
    let first = CursorManager::from_settings(
        config.clone(),
        settings_with(vec![laser("laser", &[(10, 0)])], 0.3),
    )
    .expect("manager");
    first.set_sound_enabled(false);
    first.save_settings_async().await.expect("Save failed");

    let second = CursorManager::new(config).expect("reloaded manager");
    let saved = second.to_settings();
    assert_eq!(saved.cursors.len(), 1);
    assert_eq!(saved.cursors[0].saved_device, Some(DeviceIdentity::gear_vr()));
    assert!(!second.is_sound_enabled());
    assert!(second.find_cursor_by_name("laser").is_some_and(|c| c.is_active()));
}
