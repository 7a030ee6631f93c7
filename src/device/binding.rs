use std::cmp::Ordering;

use super::DeviceIdentity;

/// One entry of a cursor's compatibility list. Lower priority binds first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PriorityDeviceBinding {
    pub priority: u32,
    pub device: DeviceIdentity,
}

impl PriorityDeviceBinding {
    pub fn new(priority: u32, device: DeviceIdentity) -> Self {
        Self { priority, device }
    }
}

impl Ord for PriorityDeviceBinding {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.device.cmp(&other.device))
    }
}

impl PartialOrd for PriorityDeviceBinding {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort a compatibility list and make sure the head-gaze device is in it
pub fn normalize_compatibility(mut list: Vec<PriorityDeviceBinding>) -> Vec<PriorityDeviceBinding> {
    let gear = DeviceIdentity::gear_vr();
    if !list.iter().any(|b| b.device == gear) {
        let next = list
            .iter()
            .map(|b| b.priority)
            .max()
            .map_or(0, |p| p.saturating_add(1));
        list.push(PriorityDeviceBinding::new(next, gear));
    }
    list.sort();
    list
}
