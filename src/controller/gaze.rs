//! Head-gaze controller driven by a touchpad on the headset
//!
//! A touch becomes a `Button1` press only after it has been held for
//! [`TAP_TIMEOUT_MS`] without sliding. Sliding horizontally pushes the cursor
//! nearer or farther.

use bevy::math::Vec2;

use super::ControllerState;
use crate::input::{KeyCode, KeyEvent, MotionAction, MotionEvent};

/// Delay between touch down and the synthetic button press
pub const TAP_TIMEOUT_MS: u64 = 60;
/// Squared slide distance that cancels a pending press (8 px)
pub const TOUCH_SQUARE: f32 = 64.0;
/// Depth change per touchpad unit
pub const DEPTH_SENSITIVITY: f32 = 0.1;

#[derive(Debug, Clone, Default)]
pub struct GazeController {
    down_position: Vec2,
    down_depth: f32,
    pending_press_at: Option<u64>,
    press_sent: bool,
}

impl GazeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_pending_press(&self) -> bool {
        self.pending_press_at.is_some()
    }

    pub fn handle_motion(&mut self, event: MotionEvent, state: &mut ControllerState) {
        match event.action {
            MotionAction::Down => {
                self.down_position = event.position;
                self.down_depth = state.cursor_depth;
                self.pending_press_at = Some(event.down_time_ms + TAP_TIMEOUT_MS);
            }
            MotionAction::Move => {
                let delta = event.position - self.down_position;
                let depth = (self.down_depth + delta.x * DEPTH_SENSITIVITY)
                    .max(state.near_depth)
                    .min(state.far_depth);
                state.set_cursor_depth(depth);
                if delta.length_squared() > TOUCH_SQUARE {
                    self.pending_press_at = None;
                }
            }
            MotionAction::Up => {
                self.pending_press_at = None;
                if self.press_sent {
                    state.key_events.push(KeyEvent::up(KeyCode::Button1, event.time_ms));
                    state.active = false;
                    self.press_sent = false;
                }
            }
        }
        state.motion_events.push(event);
    }

    /// Fire the delayed press once its deadline has passed
    pub fn tick(&mut self, now_ms: u64, state: &mut ControllerState) {
        if let Some(at) = self.pending_press_at {
            if now_ms >= at {
                self.pending_press_at = None;
                self.press_sent = true;
                state.key_events.push(KeyEvent::down(KeyCode::Button1, at));
                state.active = true;
            }
        }
    }
}
