use bevy::math::{Quat, Vec3};

use super::CursorKind;
use crate::input::{KeyAction, KeyEvent, MotionEvent};
use crate::scene::{NodeId, SceneGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorEventKind {
    Enter,
    Exit,
    /// Still over the same target with no press change
    Inside,
    TouchStart,
    TouchEnd,
    Drag,
}

/// Position of an event inside the batch produced by one update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EventGroup {
    #[default]
    Single,
    MultiStart,
    Multi,
    MultiStop,
    GroupDisabled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CursorEvent {
    pub kind: CursorEventKind,
    pub cursor_id: u32,
    pub cursor_kind: CursorKind,
    pub target: NodeId,
    pub colliding: bool,
    pub active: bool,
    pub over: bool,
    pub hit_point: Vec3,
    pub cursor_position: Vec3,
    pub cursor_rotation: Quat,
    pub key_events: Vec<KeyEvent>,
    pub motion_events: Vec<MotionEvent>,
    pub group: EventGroup,
}

impl CursorEvent {
    /// A key went down during the frame that produced this event
    pub fn key_down(&self) -> bool {
        self.key_events
            .iter()
            .any(|e| e.action == KeyAction::Down)
    }
}

/// Tag a batch of events with their group and, when depth ordering is on,
/// sort them by target distance from the origin. Equal distances keep their
/// discovery order.
pub fn order_events(events: &mut [CursorEvent], depth_ordering: bool, scene: &SceneGraph) {
    if !depth_ordering {
        for event in events.iter_mut() {
            event.group = EventGroup::GroupDisabled;
        }
        return;
    }

    events.sort_by(|a, b| {
        let da = scene.world_position(a.target).length();
        let db = scene.world_position(b.target).length();
        da.total_cmp(&db)
    });

    let last = events.len().saturating_sub(1);
    for (i, event) in events.iter_mut().enumerate() {
        event.group = match (i, last) {
            (_, 0) => EventGroup::Single,
            (0, _) => EventGroup::MultiStart,
            (i, last) if i == last => EventGroup::MultiStop,
            _ => EventGroup::Multi,
        };
    }
}
