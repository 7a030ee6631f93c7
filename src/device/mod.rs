//! Physical input devices and their identities

pub mod binding;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bevy::math::{Quat, Vec3};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use binding::PriorityDeviceBinding;

use crate::controller::{ControllerKind, CursorController};
use crate::input::InputSender;

/// Vendor id of the built-in head-gaze device
pub const GEARVR_VENDOR_ID: u32 = 1256;
pub const GEARVR_PRODUCT_ID: u32 = 0xa500;
pub const GEARVR_DEVICE_ID: &str = "gaze";

/// Stable identity of a device: (vendor, product, device id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub vendor_id: u32,
    pub product_id: u32,
    pub device_id: String,
}

impl DeviceIdentity {
    pub fn new(vendor_id: u32, product_id: u32, device_id: impl Into<String>) -> Self {
        Self {
            vendor_id,
            product_id,
            device_id: device_id.into(),
        }
    }

    /// Identity of the head-gaze device every cursor falls back to
    pub fn gear_vr() -> Self {
        Self::new(GEARVR_VENDOR_ID, GEARVR_PRODUCT_ID, GEARVR_DEVICE_ID)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.vendor_id, self.product_id, self.device_id)
    }
}

#[derive(Debug)]
struct DeviceShared {
    identity: DeviceIdentity,
    name: String,
    vendor_name: String,
    connected: AtomicBool,
    sender: InputSender,
    controller: Mutex<CursorController>,
}

/// A connected (or previously connected) input device.
///
/// Clones share state. Equality and hashing only look at the identity.
#[derive(Debug, Clone)]
pub struct InputDevice {
    shared: Arc<DeviceShared>,
}

impl PartialEq for InputDevice {
    fn eq(&self, other: &Self) -> bool {
        self.shared.identity == other.shared.identity
    }
}

impl Eq for InputDevice {}

impl Hash for InputDevice {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.shared.identity.hash(state);
    }
}

impl InputDevice {
    pub fn new(
        identity: DeviceIdentity,
        name: impl Into<String>,
        vendor_name: impl Into<String>,
        kind: ControllerKind,
    ) -> Self {
        let controller = CursorController::new(kind);
        let sender = controller.sender();
        Self {
            shared: Arc::new(DeviceShared {
                identity,
                name: name.into(),
                vendor_name: vendor_name.into(),
                connected: AtomicBool::new(true),
                sender,
                controller: Mutex::new(controller),
            }),
        }
    }

    /// The built-in head-gaze device
    pub fn gear_vr_gaze() -> Self {
        Self::new(
            DeviceIdentity::gear_vr(),
            "GearVR Gaze",
            "Samsung",
            ControllerKind::gaze(),
        )
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.shared.identity
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn vendor_name(&self) -> &str {
        &self.shared.vendor_name
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    pub fn set_connected(&self, connected: bool) {
        let was = self.shared.connected.swap(connected, Ordering::AcqRel);
        if was != connected {
            debug!("Device {} connected={}", self.shared.identity, connected);
        }
    }

    /// Input-thread handle; never blocks on the controller lock
    pub fn sender(&self) -> InputSender {
        self.shared.sender.clone()
    }

    /// Lock the wrapped controller
    pub fn controller(&self) -> MutexGuard<'_, CursorController> {
        self.shared.controller.lock()
    }

    pub fn controller_id(&self) -> u32 {
        self.controller().id()
    }

    pub fn is_enabled(&self) -> bool {
        self.controller().is_enabled()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.controller().set_enabled(enabled);
    }

    pub fn near_depth(&self) -> f32 {
        self.controller().near_depth()
    }

    pub fn set_near_depth(&self, depth: f32) {
        self.controller().set_near_depth(depth);
    }

    pub fn far_depth(&self) -> f32 {
        self.controller().far_depth()
    }

    pub fn set_far_depth(&self, depth: f32) {
        self.controller().set_far_depth(depth);
    }

    pub fn set_position(&self, position: Vec3) {
        self.controller().set_position(position);
    }

    pub fn set_rotation(&self, rotation: Quat) {
        self.controller().set_rotation(rotation);
    }

    /// Matches a persisted or configured identity
    pub fn matches(&self, identity: &DeviceIdentity) -> bool {
        self.shared.identity == *identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_order_and_display() {
        let a = DeviceIdentity::new(1, 2, "a");
        let b = DeviceIdentity::new(1, 2, "b");
        let c = DeviceIdentity::new(1, 3, "a");
        assert!(a < b && b < c);
        assert_eq!(a.to_string(), "1:2:a");
    }

    #[test]
    fn test_clones_share_state_and_compare_by_identity() {
        let device = InputDevice::new(
            DeviceIdentity::new(7, 8, "pad"),
            "Pad",
            "Acme",
            ControllerKind::Gamepad,
        );
        let clone = device.clone();
        clone.set_enabled(true);
        clone.set_connected(false);
        assert!(device.is_enabled());
        assert!(!device.is_connected());

        let other = InputDevice::new(
            DeviceIdentity::new(7, 8, "pad"),
            "Other name",
            "Acme",
            ControllerKind::Mouse,
        );
        assert_eq!(device, other);
    }

    #[test]
    fn test_gear_vr_defaults() {
        let device = InputDevice::gear_vr_gaze();
        assert!(device.matches(&DeviceIdentity::gear_vr()));
        assert_eq!(device.near_depth(), 0.5);
        assert_eq!(device.far_depth(), 50.0);
    }
}
