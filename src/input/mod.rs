//! Normalized input events and the cross-thread input queue
//!
//! Hardware callbacks run on input threads and only ever touch an
//! [`InputSender`]. The update thread drains the matching [`InputQueue`] once
//! per frame, so an event is never processed while it is being enqueued.

use bevy::math::{Quat, Vec2, Vec3};
use bitflags::bitflags;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::warn;

use crate::controller::gear::GearSample;

/// Maximum number of messages buffered between two updates
pub const INPUT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAction {
    Down,
    Up,
}

/// Key codes produced by the bundled controllers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Enter,
    Back,
    VolumeUp,
    VolumeDown,
    Home,
    A,
    /// Synthetic gaze "button"
    Button1,
    Other(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub action: KeyAction,
    pub code: KeyCode,
    pub time_ms: u64,
}

impl KeyEvent {
    pub fn new(action: KeyAction, code: KeyCode, time_ms: u64) -> Self {
        Self {
            action,
            code,
            time_ms,
        }
    }

    pub fn down(code: KeyCode, time_ms: u64) -> Self {
        Self::new(KeyAction::Down, code, time_ms)
    }

    pub fn up(code: KeyCode, time_ms: u64) -> Self {
        Self::new(KeyAction::Up, code, time_ms)
    }

    pub fn is_down(&self) -> bool {
        self.action == KeyAction::Down
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionAction {
    Down,
    Move,
    Up,
}

bitflags! {
    /// Pointer buttons attached to a motion event
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MotionButtons: u32 {
        const PRIMARY = 0x1;
        const SECONDARY = 0x2;
        const TERTIARY = 0x4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionEvent {
    pub action: MotionAction,
    pub position: Vec2,
    pub buttons: MotionButtons,
    pub down_time_ms: u64,
    pub time_ms: u64,
}

impl MotionEvent {
    pub fn new(action: MotionAction, position: Vec2, buttons: MotionButtons, time_ms: u64) -> Self {
        Self {
            action,
            position,
            buttons,
            down_time_ms: time_ms,
            time_ms,
        }
    }

    pub fn with_down_time(mut self, down_time_ms: u64) -> Self {
        self.down_time_ms = down_time_ms;
        self
    }
}

/// Everything an input thread can hand to a controller
#[derive(Debug, Clone, PartialEq)]
pub enum InputMessage {
    Key(KeyEvent),
    Motion(MotionEvent),
    Gear(GearSample),
    Pose { position: Vec3, rotation: Quat },
}

/// Producer half, cheap to clone and safe to move to input threads
#[derive(Debug, Clone)]
pub struct InputSender {
    tx: Sender<InputMessage>,
}

impl InputSender {
    /// Queue a message; returns false when the queue is full or closed
    pub fn send(&self, message: InputMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                warn!("Input queue full, dropping {:?}", message);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn send_key(&self, event: KeyEvent) -> bool {
        self.send(InputMessage::Key(event))
    }

    pub fn send_motion(&self, event: MotionEvent) -> bool {
        self.send(InputMessage::Motion(event))
    }

    pub fn send_gear(&self, sample: GearSample) -> bool {
        self.send(InputMessage::Gear(sample))
    }

    pub fn send_pose(&self, position: Vec3, rotation: Quat) -> bool {
        self.send(InputMessage::Pose { position, rotation })
    }
}

/// Consumer half owned by a controller
#[derive(Debug)]
pub struct InputQueue {
    tx: Sender<InputMessage>,
    rx: Receiver<InputMessage>,
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::new(INPUT_QUEUE_CAPACITY)
    }
}

impl InputQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    pub fn sender(&self) -> InputSender {
        InputSender {
            tx: self.tx.clone(),
        }
    }

    /// Take every message queued so far
    pub fn drain(&self) -> Vec<InputMessage> {
        self.rx.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
