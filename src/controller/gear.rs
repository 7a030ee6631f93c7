//! Handheld controller with a clickable touchpad
//!
//! Samples arrive as a raw button bitmask plus touchpad and pose data. The
//! controller turns edges of the bitmask into key events and the touchpad
//! into primary-button motion events.

use bevy::math::{Quat, Vec2, Vec3};
use bitflags::bitflags;

use super::{ControllerState, CursorControl};
use crate::input::{KeyAction, KeyCode, KeyEvent, MotionAction, MotionButtons, MotionEvent};

/// Depth change per touchpad unit while dragging horizontally
pub const DEPTH_SENSITIVITY: f32 = 0.01;

bitflags! {
    /// Button bitmask reported by the controller
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GearButtons: u32 {
        const A = 0x1;
        const ENTER = 0x100000;
        const BACK = 0x200000;
        const VOLUME_UP = 0x400000;
        const VOLUME_DOWN = 0x800000;
        const HOME = 0x1000000;
    }
}

/// One hardware sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GearSample {
    pub buttons: GearButtons,
    pub touchpad: Vec2,
    pub touched: bool,
    pub rotation: Quat,
    pub position: Vec3,
    pub time_ms: u64,
}

impl Default for GearSample {
    fn default() -> Self {
        Self {
            buttons: GearButtons::empty(),
            touchpad: Vec2::ZERO,
            touched: false,
            rotation: Quat::IDENTITY,
            position: Vec3::ZERO,
            time_ms: 0,
        }
    }
}

/// Edge detection for one button.
///
/// Returns the key action to emit, or `None` when the button has not changed
/// since `previous`.
pub fn handle_button(
    buttons: GearButtons,
    button: GearButtons,
    previous: KeyAction,
) -> Option<KeyAction> {
    let pressed = buttons.contains(button);
    match (pressed, previous) {
        (true, KeyAction::Up) => Some(KeyAction::Down),
        (false, KeyAction::Down) => Some(KeyAction::Up),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct GearController {
    prev_enter: KeyAction,
    prev_a: KeyAction,
    prev_back: KeyAction,
    prev_volume_up: KeyAction,
    prev_volume_down: KeyAction,
    prev_home: KeyAction,
    action_down: bool,
    touch_down_x: f32,
    enter_down_time: u64,
    a_down_time: u64,
}

impl Default for GearController {
    fn default() -> Self {
        Self::new()
    }
}

impl GearController {
    pub fn new() -> Self {
        Self {
            prev_enter: KeyAction::Up,
            prev_a: KeyAction::Up,
            prev_back: KeyAction::Up,
            prev_volume_up: KeyAction::Up,
            prev_volume_down: KeyAction::Up,
            prev_home: KeyAction::Up,
            action_down: false,
            touch_down_x: 0.0,
            enter_down_time: 0,
            a_down_time: 0,
        }
    }

    /// True while the touchpad is held
    pub fn is_touching(&self) -> bool {
        self.action_down
    }

    pub fn handle_sample(&mut self, sample: &GearSample, state: &mut ControllerState) {
        state.rotation = sample.rotation.normalize();
        state.origin = sample.position;

        self.handle_enter(sample, state);
        self.handle_a(sample, state);

        let time = sample.time_ms;
        let buttons = sample.buttons;
        for (button, code, prev) in [
            (GearButtons::BACK, KeyCode::Back, &mut self.prev_back),
            (GearButtons::VOLUME_UP, KeyCode::VolumeUp, &mut self.prev_volume_up),
            (GearButtons::VOLUME_DOWN, KeyCode::VolumeDown, &mut self.prev_volume_down),
            (GearButtons::HOME, KeyCode::Home, &mut self.prev_home),
        ] {
            if let Some(action) = handle_button(buttons, button, *prev) {
                state.key_events.push(KeyEvent::new(action, code, time));
                *prev = action;
            }
        }
    }

    fn handle_enter(&mut self, sample: &GearSample, state: &mut ControllerState) {
        let time = sample.time_ms;
        let touched = sample.touched;
        let handled = handle_button(sample.buttons, GearButtons::ENTER, self.prev_enter);
        if let Some(action) = handled {
            state.key_events.push(KeyEvent::new(action, KeyCode::Enter, time));
            self.prev_enter = action;
        }

        if handled == Some(KeyAction::Up) || (self.action_down && !touched) {
            state.motion_events.push(
                MotionEvent::new(MotionAction::Up, sample.touchpad, MotionButtons::PRIMARY, time)
                    .with_down_time(self.enter_down_time),
            );
            state.active = false;
        } else if handled == Some(KeyAction::Down) || (touched && !self.action_down) {
            state.motion_events.push(MotionEvent::new(
                MotionAction::Down,
                sample.touchpad,
                MotionButtons::PRIMARY,
                time,
            ));
            if state.touch_buttons.contains(MotionButtons::PRIMARY) {
                state.active = true;
            }
            self.enter_down_time = time;
        } else if self.action_down && touched {
            state.motion_events.push(
                MotionEvent::new(MotionAction::Move, sample.touchpad, MotionButtons::PRIMARY, time)
                    .with_down_time(self.enter_down_time),
            );
        }

        if touched && state.cursor_control == CursorControl::CursorDepthFromController {
            if !self.action_down {
                self.touch_down_x = sample.touchpad.x;
            } else {
                let dx = sample.touchpad.x - self.touch_down_x;
                let depth = state.cursor_depth + dx * DEPTH_SENSITIVITY;
                if depth >= state.near_depth && depth <= state.far_depth {
                    state.cursor_depth = depth;
                }
            }
        }
        self.action_down = touched;
    }

    fn handle_a(&mut self, sample: &GearSample, state: &mut ControllerState) {
        let time = sample.time_ms;
        let Some(action) = handle_button(sample.buttons, GearButtons::A, self.prev_a) else {
            return;
        };
        self.prev_a = action;
        state.key_events.push(KeyEvent::new(action, KeyCode::A, time));
        match action {
            KeyAction::Down => {
                state.motion_events.push(MotionEvent::new(
                    MotionAction::Down,
                    Vec2::ZERO,
                    MotionButtons::SECONDARY,
                    time,
                ));
                if state.touch_buttons.contains(MotionButtons::SECONDARY) {
                    state.active = true;
                }
                self.a_down_time = time;
            }
            KeyAction::Up => {
                state.motion_events.push(
                    MotionEvent::new(MotionAction::Up, Vec2::ZERO, MotionButtons::SECONDARY, time)
                        .with_down_time(self.a_down_time),
                );
                state.active = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(buttons: GearButtons, touched: bool, x: f32, time_ms: u64) -> GearSample {
        GearSample {
            buttons,
            touched,
            touchpad: Vec2::new(x, 0.0),
            time_ms,
            ..Default::default()
        }
    }

    #[test]
    fn test_handle_button_edges() {
        let enter = GearButtons::ENTER;
        assert_eq!(handle_button(enter, enter, KeyAction::Up), Some(KeyAction::Down));
        assert_eq!(handle_button(enter, enter, KeyAction::Down), None);
        assert_eq!(
            handle_button(GearButtons::empty(), enter, KeyAction::Down),
            Some(KeyAction::Up)
        );
        assert_eq!(handle_button(GearButtons::empty(), enter, KeyAction::Up), None);
    }

    #[test]
    fn test_held_button_reports_one_down() {
        let mut gear = GearController::new();
        let mut state = ControllerState::default();
        for t in 0..3 {
            gear.handle_sample(&sample(GearButtons::ENTER, false, 0.0, t), &mut state);
        }
        let downs = state
            .key_events
            .iter()
            .filter(|e| e.code == KeyCode::Enter && e.is_down())
            .count();
        assert_eq!(downs, 1);
        assert!(state.active);

        gear.handle_sample(&sample(GearButtons::empty(), false, 0.0, 4), &mut state);
        assert!(!state.active);
        assert_eq!(state.key_events.last().map(|e| e.action), Some(KeyAction::Up));
    }

    #[test]
    fn test_touch_produces_down_move_up() {
        let mut gear = GearController::new();
        let mut state = ControllerState::default();
        gear.handle_sample(&sample(GearButtons::empty(), true, 0.0, 0), &mut state);
        gear.handle_sample(&sample(GearButtons::empty(), true, 5.0, 1), &mut state);
        gear.handle_sample(&sample(GearButtons::empty(), false, 5.0, 2), &mut state);

        let actions: Vec<_> = state.motion_events.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![MotionAction::Down, MotionAction::Move, MotionAction::Up]
        );
        assert!(!state.active);
    }

    #[test]
    fn test_secondary_press_respects_touch_buttons() {
        let mut gear = GearController::new();
        let mut state = ControllerState {
            touch_buttons: MotionButtons::PRIMARY,
            ..Default::default()
        };
        gear.handle_sample(&sample(GearButtons::A, false, 0.0, 0), &mut state);
        assert!(!state.active);
        assert_eq!(
            state.motion_events.last().map(|e| e.buttons),
            Some(MotionButtons::SECONDARY)
        );
    }

    #[test]
    fn test_depth_gesture_stays_within_bounds() {
        let mut gear = GearController::new();
        let mut state = ControllerState {
            cursor_control: CursorControl::CursorDepthFromController,
            cursor_depth: 1.0,
            near_depth: 0.5,
            far_depth: 2.0,
            ..Default::default()
        };
        gear.handle_sample(&sample(GearButtons::empty(), true, 0.0, 0), &mut state);
        gear.handle_sample(&sample(GearButtons::empty(), true, 50.0, 1), &mut state);
        assert!((state.cursor_depth - 1.5).abs() < 1e-5);

        // 1.5 + 1.0 would exceed far, so depth is left alone
        gear.handle_sample(&sample(GearButtons::empty(), true, 100.0, 2), &mut state);
        assert!((state.cursor_depth - 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_extra_buttons_emit_key_events() {
        let mut gear = GearController::new();
        let mut state = ControllerState::default();
        gear.handle_sample(
            &sample(GearButtons::BACK | GearButtons::HOME, false, 0.0, 0),
            &mut state,
        );
        let codes: Vec<_> = state.key_events.iter().map(|e| e.code).collect();
        assert_eq!(codes, vec![KeyCode::Back, KeyCode::Home]);
    }

    #[test]
    fn test_dpad_bits_are_dropped() {
        // 0x10000..0x80000 is the d-pad, which maps to no key
        let buttons = GearButtons::from_bits_truncate(0x10000 | 0x80000 | 0x200000);
        assert_eq!(buttons, GearButtons::BACK);

        let mut gear = GearController::new();
        let mut state = ControllerState::default();
        gear.handle_sample(&sample(buttons, false, 0.0, 0), &mut state);
        let codes: Vec<_> = state.key_events.iter().map(|e| e.code).collect();
        assert_eq!(codes, vec![KeyCode::Back]);
    }
}
