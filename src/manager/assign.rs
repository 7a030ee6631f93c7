//! Device to cursor assignment
//!
//! Two passes over the roster. Saved bindings are restored first, then
//! compatibility lists are walked rank by rank. Any binding restarts the
//! current scan from the first cursor.

use tracing::debug;

use super::CursorManager;

impl CursorManager {
    /// Bind as many unbound enabled cursors as possible. Returns the number
    /// of bindings made.
    pub fn assign_devices(&mut self) -> usize {
        let restored = self.restore_saved_devices();
        let ranked = self.assign_by_rank();
        if restored + ranked > 0 {
            debug!(
                "Assignment bound {} saved and {} ranked devices",
                restored, ranked
            );
        }
        restored + ranked
    }

    fn needs_device(&self, index: usize) -> bool {
        let cursor = &self.cursors[index];
        cursor.is_enabled() && cursor.device().is_none()
    }

    fn restore_saved_devices(&mut self) -> usize {
        let mut bound = 0;
        loop {
            let mut bound_this_scan = false;
            for index in 0..self.cursors.len() {
                if !self.needs_device(index) {
                    continue;
                }
                let Some(saved) = self.cursors[index].saved_device().cloned() else {
                    continue;
                };
                if let Some(device) = self.take_unused_device(&saved) {
                    self.cursors[index].set_saved_device(None);
                    self.bind(index, device);
                    bound += 1;
                    bound_this_scan = true;
                }
            }
            if !bound_this_scan {
                return bound;
            }
        }
    }

    fn assign_by_rank(&mut self) -> usize {
        let mut bound = 0;
        let mut rank = 0;
        loop {
            let mut candidates = false;
            let mut bound_this_scan = false;
            for index in 0..self.cursors.len() {
                if !self.needs_device(index) {
                    continue;
                }
                let Some(identity) = self.cursors[index].device_for_rank(rank).cloned() else {
                    continue;
                };
                candidates = true;
                if let Some(device) = self.take_unused_device(&identity) {
                    self.bind(index, device);
                    bound += 1;
                    bound_this_scan = true;
                    break;
                }
            }
            if bound_this_scan {
                continue;
            }
            if !candidates {
                return bound;
            }
            rank += 1;
        }
    }
}
