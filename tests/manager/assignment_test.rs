//! Tests for priority based device assignment

use std::collections::HashSet;

use xreal_cursor3d::{AttachError, CursorManager, DeviceIdentity};

use crate::test_utils::*;

const A: u32 = 10;
const B: u32 = 20;
const C: u32 = 30;

/// Every known device sits in exactly one list and every used device is
/// bound to exactly one cursor
fn assert_partitioned(manager: &CursorManager) {
    let used: Vec<_> = manager.used_devices().iter().map(|d| d.identity().clone()).collect();
    let unused: Vec<_> = manager
        .available_devices()
        .iter()
        .map(|d| d.identity().clone())
        .collect();
    let gone: Vec<_> = manager
        .disconnected_devices()
        .iter()
        .map(|d| d.identity().clone())
        .collect();

    let mut seen = HashSet::new();
    for identity in used.iter().chain(&unused).chain(&gone) {
        assert!(seen.insert(identity.clone()), "{} listed twice", identity);
    }

    let bound: Vec<DeviceIdentity> = manager
        .cursors()
        .iter()
        .filter_map(|c| c.device().map(|d| d.identity().clone()))
        .collect();
    assert_eq!(bound.len(), used.len());
    for identity in &used {
        assert_eq!(bound.iter().filter(|b| *b == identity).count(), 1);
    }
    for cursor in manager.cursors() {
        if cursor.device().is_some() {
            assert!(cursor.is_enabled(), "disabled cursor {} holds a device", cursor.name());
        }
    }
}

/// A cursor that takes the gaze device so it does not interfere
fn gaze_holder() -> xreal_cursor3d::settings::CursorConfig {
    laser("holder", &[])
}

#[test]
fn test_crossed_priorities_bind_lowest_match() {
    for order in [[A, B], [B, A]] {
        let (mut manager, _dir) = manager(vec![
            gaze_holder(),
            laser("slot1", &[(A, 0), (B, 1)]),
            laser("slot2", &[(B, 0), (A, 1)]),
        ]);
        for vendor in order {
            assert!(manager.add_device(external_device(vendor)));
        }

        assert_eq!(bound_identity(&manager, "slot1"), Some(identity(A)));
        assert_eq!(bound_identity(&manager, "slot2"), Some(identity(B)));
        assert_partitioned(&manager);
    }
}

#[test]
fn test_crossed_priorities_with_devices_already_available() {
    let mut slot1 = laser("slot1", &[(A, 0), (B, 1)]);
    let mut slot2 = laser("slot2", &[(B, 0), (A, 1)]);
    slot1.active = false;
    slot2.active = false;
    let (mut manager, _dir) = manager(vec![gaze_holder(), slot1, slot2]);
    manager.add_device(external_device(A));
    manager.add_device(external_device(B));
    assert_eq!(manager.available_devices().len(), 2);

    let id2 = cursor_id(&manager, "slot2");
    let id1 = cursor_id(&manager, "slot1");
    manager.set_cursor_enabled(id2, true).expect("enable slot2");
    manager.set_cursor_enabled(id1, true).expect("enable slot1");

    assert_eq!(bound_identity(&manager, "slot1"), Some(identity(A)));
    assert_eq!(bound_identity(&manager, "slot2"), Some(identity(B)));
    assert!(manager.available_devices().is_empty());
    assert_partitioned(&manager);
}

#[test]
fn test_saved_device_wins_over_priority() {
    let mut cursor = laser("a", &[(A, 0), (B, 1)]);
    cursor.active = false;
    cursor.saved_device = Some(identity(B));
    let (mut manager, _dir) = manager(vec![gaze_holder(), cursor]);
    manager.add_device(external_device(A));
    manager.add_device(external_device(B));

    let id = cursor_id(&manager, "a");
    manager.set_cursor_enabled(id, true).expect("enable");

    assert_eq!(bound_identity(&manager, "a"), Some(identity(B)));
    assert!(manager.find_cursor_by_name("a").expect("a").saved_device().is_none());
    assert_partitioned(&manager);
}

#[test]
fn test_assignment_is_idempotent() {
    let (mut manager, _dir) = manager(vec![
        gaze_holder(),
        laser("slot1", &[(A, 0)]),
        laser("slot2", &[(B, 0), (C, 1)]),
    ]);
    manager.add_device(external_device(A));
    manager.add_device(external_device(C));

    assert_eq!(manager.assign_devices(), 0);
    assert_eq!(manager.assign_devices(), 0);
    assert_eq!(bound_identity(&manager, "slot2"), Some(identity(C)));
}

#[test]
fn test_disable_releases_device_to_pool() {
    let (mut manager, _dir) = manager(vec![gaze_holder(), laser("slot1", &[(A, 0)])]);
    manager.add_device(external_device(A));
    let id = cursor_id(&manager, "slot1");
    assert!(manager.cursor(id).expect("slot1").is_active());

    manager.set_cursor_enabled(id, false).expect("disable");
    let cursor = manager.cursor(id).expect("slot1");
    assert!(!cursor.is_active());
    assert!(cursor.device().is_none());
    assert!(manager.available_devices().iter().any(|d| d.matches(&identity(A))));
    assert!(!manager.find_device(&identity(A)).expect("device").is_enabled());
    assert_partitioned(&manager);

    manager.set_cursor_enabled(id, true).expect("enable");
    assert_eq!(bound_identity(&manager, "slot1"), Some(identity(A)));
}

#[test]
fn test_disconnect_and_reconnect_restore_binding() {
    let (mut manager, _dir) = manager(vec![gaze_holder(), laser("slot1", &[(A, 0)])]);
    manager.add_device(external_device(A));

    assert!(manager.remove_device(&identity(A)));
    assert!(bound_identity(&manager, "slot1").is_none());
    assert_eq!(manager.disconnected_devices().len(), 1);
    assert!(!manager.find_device(&identity(A)).expect("known").is_connected());
    assert_partitioned(&manager);

    assert!(manager.set_device_connected(&identity(A), true));
    assert_eq!(bound_identity(&manager, "slot1"), Some(identity(A)));
    assert!(manager.disconnected_devices().is_empty());
    assert_partitioned(&manager);

    // Adding a device that is already connected changes nothing
    assert!(!manager.add_device(external_device(A)));
}

#[test]
fn test_freed_device_moves_to_next_candidate() {
    let (mut manager, _dir) = manager(vec![
        gaze_holder(),
        laser("slot1", &[(A, 0)]),
        laser("slot2", &[(A, 0)]),
    ]);
    manager.add_device(external_device(A));
    assert_eq!(bound_identity(&manager, "slot1"), Some(identity(A)));
    assert!(bound_identity(&manager, "slot2").is_none());

    let id1 = cursor_id(&manager, "slot1");
    manager.set_cursor_enabled(id1, false).expect("disable");
    assert_eq!(bound_identity(&manager, "slot2"), Some(identity(A)));
    assert_partitioned(&manager);
}

#[test]
fn test_attach_rejects_incompatible_device() {
    let (mut manager, _dir) = manager(vec![gaze_holder(), laser("slot1", &[(A, 0)])]);
    manager.add_device(external_device(B));
    let id = cursor_id(&manager, "slot1");

    assert_error_contains!(manager.attach_device(id, &identity(B)), "not compatible");
    assert_eq!(
        manager.attach_device(999_999, &identity(A)),
        Err(AttachError::UnknownCursor(999_999))
    );
    assert_partitioned(&manager);
}

#[test]
fn test_replace_cursor_hands_over_device() {
    let mut second = laser("second", &[(A, 0)]);
    second.active = false;
    let (mut manager, _dir) = manager(vec![gaze_holder(), laser("first", &[(A, 0)]), second]);
    manager.add_device(external_device(A));
    let first = cursor_id(&manager, "first");
    let second = cursor_id(&manager, "second");

    assert!(manager.replace_cursor(second, first).expect("replace"));
    assert_eq!(bound_identity(&manager, "second"), Some(identity(A)));
    assert!(bound_identity(&manager, "first").is_none());
    assert_partitioned(&manager);
}
