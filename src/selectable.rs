//! Selectable scene objects
//!
//! A [`SelectableBehavior`] tracks how every active cursor relates to one
//! node and shows the highest-ranked state across all of them. When the node
//! has one child per declared state, only the child for the visible state is
//! enabled.

use std::collections::BTreeMap;
use std::sync::Arc;

use bevy::math::{Quat, Vec3};
use tracing::debug;

use crate::cursor::{CursorEvent, CursorKind};
use crate::error::{CursorError, CursorResult};
use crate::scene::{NodeId, SceneGraph};

/// Appearance states, lowest priority first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectState {
    Default,
    /// A cursor is farther away than the object
    Behind,
    Colliding,
    Clicked,
}

impl ObjectState {
    pub const ALL: [ObjectState; 4] = [
        ObjectState::Default,
        ObjectState::Behind,
        ObjectState::Colliding,
        ObjectState::Clicked,
    ];
}

/// Notified whenever the visible state of a selectable changes
pub trait StateChangedListener: Send + Sync {
    fn on_state_changed(
        &self,
        node: NodeId,
        previous: ObjectState,
        current: ObjectState,
        cursor_id: Option<u32>,
    );
}

impl<F> StateChangedListener for F
where
    F: Fn(NodeId, ObjectState, ObjectState, Option<u32>) + Send + Sync,
{
    fn on_state_changed(
        &self,
        node: NodeId,
        previous: ObjectState,
        current: ObjectState,
        cursor_id: Option<u32>,
    ) {
        self(node, previous, current, cursor_id)
    }
}

/// Work a behavior asks the manager to do on its behalf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectableAction {
    /// Carry `node` with the controller of `cursor_id`
    StartDrag { cursor_id: u32, node: NodeId },
    StopDrag { cursor_id: u32 },
}

#[derive(Debug, Clone, Default)]
struct MovableState {
    /// Cursor holding the object
    holder: Option<(u32, CursorKind)>,
    selected: bool,
    previous_cursor_position: Vec3,
}

pub struct SelectableBehavior {
    node: NodeId,
    /// Child index for each declared state
    children: Vec<ObjectState>,
    state: ObjectState,
    current_state: ObjectState,
    per_cursor: BTreeMap<u32, ObjectState>,
    previous_over: bool,
    previous_active: bool,
    listener: Option<Arc<dyn StateChangedListener>>,
    movable: Option<MovableState>,
}

impl std::fmt::Debug for SelectableBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectableBehavior")
            .field("node", &self.node)
            .field("state", &self.state)
            .field("per_cursor", &self.per_cursor)
            .field("movable", &self.movable.is_some())
            .finish_non_exhaustive()
    }
}

impl SelectableBehavior {
    /// `states` maps the node's children, left to right, to object states
    pub fn new(node: NodeId, states: &[ObjectState]) -> CursorResult<Self> {
        if !states.contains(&ObjectState::Default) {
            return Err(CursorError::InvalidState(
                "selectable needs an asset for the default state".to_string(),
            ));
        }
        Ok(Self {
            node,
            children: states.to_vec(),
            state: ObjectState::Default,
            current_state: ObjectState::Default,
            per_cursor: BTreeMap::new(),
            previous_over: false,
            previous_active: false,
            listener: None,
            movable: None,
        })
    }

    /// Behavior without per-state children
    pub fn simple(node: NodeId) -> Self {
        Self {
            node,
            children: vec![ObjectState::Default],
            state: ObjectState::Default,
            current_state: ObjectState::Default,
            per_cursor: BTreeMap::new(),
            previous_over: false,
            previous_active: false,
            listener: None,
            movable: None,
        }
    }

    /// Behavior with a child for every state, in [`ObjectState::ALL`] order
    pub fn with_all_states(node: NodeId) -> Self {
        let mut behavior = Self::simple(node);
        behavior.children = ObjectState::ALL.to_vec();
        behavior
    }

    /// Make this a movable object: it follows the cursor that clicked it
    pub fn movable(mut self) -> Self {
        self.movable = Some(MovableState::default());
        self
    }

    pub fn is_movable(&self) -> bool {
        self.movable.is_some()
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn state(&self) -> ObjectState {
        self.state
    }

    /// State last recorded for `cursor_id`
    pub fn cursor_state(&self, cursor_id: u32) -> Option<ObjectState> {
        self.per_cursor.get(&cursor_id).copied()
    }

    pub fn set_state_changed_listener(&mut self, listener: Arc<dyn StateChangedListener>) {
        self.listener = Some(listener);
    }

    /// Check the node hierarchy and show the default child
    pub fn attach(&mut self, scene: &mut SceneGraph) -> CursorResult<()> {
        if !scene.contains(self.node) {
            return Err(CursorError::InvalidState(format!(
                "node {:?} is not part of the scene",
                self.node
            )));
        }
        let count = scene.children(self.node).len();
        if self.children.len() > 1 && count != self.children.len() {
            return Err(CursorError::InvalidState(format!(
                "node has {} children but {} states were declared",
                count,
                self.children.len()
            )));
        }
        self.apply_switch(scene);
        Ok(())
    }

    fn apply_switch(&self, scene: &mut SceneGraph) {
        if self.children.len() <= 1 {
            return;
        }
        let Some(index) = self.children.iter().position(|s| *s == self.state) else {
            return;
        };
        let children = scene.children(self.node).to_vec();
        for (i, child) in children.into_iter().enumerate() {
            scene.set_enabled(child, i == index);
        }
    }

    fn set_state(&mut self, scene: &mut SceneGraph, state: ObjectState, cursor_id: Option<u32>) {
        let previous = self.state;
        self.state = state;
        self.apply_switch(scene);
        if previous != state {
            debug!(
                "Selectable {:?}: {:?} -> {:?}",
                self.node, previous, self.current_state
            );
            if let Some(listener) = &self.listener {
                listener.on_state_changed(self.node, previous, self.current_state, cursor_id);
            }
        }
    }

    fn higher_or_equal_present(&self, target: ObjectState) -> bool {
        self.per_cursor.values().any(|s| *s >= target)
    }

    fn highest_state(&self) -> ObjectState {
        self.per_cursor
            .values()
            .copied()
            .max()
            .unwrap_or(ObjectState::Default)
    }

    /// Record `state` for the cursor, showing it unless another cursor
    /// already holds something at least as strong as `guard`
    fn raise(&mut self, scene: &mut SceneGraph, cursor_id: u32, state: ObjectState, guard: ObjectState) {
        self.per_cursor.remove(&cursor_id);
        if !self.higher_or_equal_present(guard) {
            self.current_state = state;
            self.set_state(scene, state, Some(cursor_id));
        }
        self.per_cursor.insert(cursor_id, state);
    }

    fn set_button_press(&mut self, scene: &mut SceneGraph, cursor_id: u32) {
        self.raise(scene, cursor_id, ObjectState::Clicked, ObjectState::Clicked);
    }

    fn set_intersect(&mut self, scene: &mut SceneGraph, cursor_id: u32) {
        self.raise(scene, cursor_id, ObjectState::Colliding, ObjectState::Clicked);
    }

    fn set_behind(&mut self, scene: &mut SceneGraph, cursor_id: u32) {
        self.raise(scene, cursor_id, ObjectState::Behind, ObjectState::Behind);
    }

    fn set_default(&mut self, scene: &mut SceneGraph, cursor_id: u32) {
        self.per_cursor.remove(&cursor_id);
        let highest = self.highest_state();
        if self.current_state != highest {
            self.current_state = highest;
            self.set_state(scene, highest, Some(cursor_id));
        }
        self.per_cursor.insert(cursor_id, ObjectState::Default);
    }

    /// Run one cursor event through the state machine
    pub fn handle_cursor_event(
        &mut self,
        event: &CursorEvent,
        scene: &mut SceneGraph,
    ) -> Vec<SelectableAction> {
        let mut actions = Vec::new();
        let cursor_id = event.cursor_id;
        let Some(state) = self.per_cursor.get(&cursor_id).copied() else {
            return actions;
        };
        let cursor_distance = event.cursor_position.length();
        let object_distance = scene.world_position(self.node).length();
        let (over, active, colliding) = (event.over, event.active, event.colliding);
        let key_down = event.key_down();

        match state {
            ObjectState::Default => {
                if over {
                    if colliding {
                        if active && self.previous_over && !self.previous_active {
                            if key_down {
                                self.set_button_press(scene, cursor_id);
                                self.on_click(event, scene, &mut actions);
                            }
                        } else if !active {
                            self.set_intersect(scene, cursor_id);
                        }
                    } else if cursor_distance > object_distance {
                        self.set_behind(scene, cursor_id);
                    }
                }
            }
            ObjectState::Clicked => {
                if over && colliding {
                    if active {
                        self.on_drag(event, scene);
                    } else {
                        self.set_intersect(scene, cursor_id);
                        self.on_release(event, &mut actions);
                    }
                } else if active {
                    if event.cursor_kind == CursorKind::Object {
                        self.set_default(scene, cursor_id);
                    }
                    self.on_leave(event, scene, &mut actions);
                } else {
                    self.set_default(scene, cursor_id);
                    self.on_release(event, &mut actions);
                }
            }
            ObjectState::Colliding => {
                if !over {
                    self.set_default(scene, cursor_id);
                } else if colliding {
                    if active && key_down {
                        self.set_button_press(scene, cursor_id);
                        self.on_click(event, scene, &mut actions);
                    }
                } else if cursor_distance > object_distance {
                    self.set_behind(scene, cursor_id);
                } else if cursor_distance < object_distance {
                    self.set_default(scene, cursor_id);
                }
            }
            ObjectState::Behind => {
                if !over {
                    self.set_default(scene, cursor_id);
                } else if colliding {
                    if active {
                        if key_down {
                            self.set_button_press(scene, cursor_id);
                            self.on_click(event, scene, &mut actions);
                        }
                    } else {
                        self.set_intersect(scene, cursor_id);
                    }
                } else if cursor_distance < object_distance {
                    self.set_default(scene, cursor_id);
                }
            }
        }
        self.previous_over = over;
        self.previous_active = active;
        actions
    }

    pub fn on_cursor_activated(&mut self, cursor_id: u32) {
        self.per_cursor.insert(cursor_id, ObjectState::Default);
    }

    /// Forget the cursor. Returns a drag stop when it was holding the object.
    pub fn on_cursor_deactivated(
        &mut self,
        cursor_id: u32,
        scene: &mut SceneGraph,
    ) -> Option<SelectableAction> {
        if let Some(state) = self.per_cursor.remove(&cursor_id) {
            if self.current_state == state {
                let highest = self.highest_state();
                self.current_state = highest;
                self.set_state(scene, highest, Some(cursor_id));
            }
        }
        let movable = self.movable.as_mut()?;
        match movable.holder {
            Some((holder, _)) if holder == cursor_id => {
                let selected = movable.selected;
                *movable = MovableState::default();
                selected.then_some(SelectableAction::StopDrag { cursor_id })
            }
            _ => None,
        }
    }

    fn on_click(&mut self, event: &CursorEvent, scene: &mut SceneGraph, actions: &mut Vec<SelectableAction>) {
        let node = self.node;
        let Some(movable) = self.movable.as_mut() else {
            return;
        };
        if movable.selected && movable.holder.map(|(id, _)| id) != Some(event.cursor_id) {
            return;
        }
        movable.holder = Some((event.cursor_id, event.cursor_kind));
        movable.previous_cursor_position = event.cursor_position;
        movable.selected = true;
        if event.cursor_kind == CursorKind::Object && scene.contains(node) {
            actions.push(SelectableAction::StartDrag {
                cursor_id: event.cursor_id,
                node,
            });
        }
    }

    fn on_drag(&mut self, event: &CursorEvent, scene: &mut SceneGraph) {
        let node = self.node;
        let Some(movable) = self.movable.as_mut() else {
            return;
        };
        if movable.holder == Some((event.cursor_id, CursorKind::Laser)) {
            rotate_to_follow(scene, node, movable.previous_cursor_position, event.cursor_position);
            movable.previous_cursor_position = event.cursor_position;
        }
    }

    fn on_leave(&mut self, event: &CursorEvent, scene: &mut SceneGraph, actions: &mut Vec<SelectableAction>) {
        let node = self.node;
        let Some(movable) = self.movable.as_mut() else {
            return;
        };
        if !event.active || movable.holder.map(|(id, _)| id) != Some(event.cursor_id) {
            return;
        }
        match event.cursor_kind {
            CursorKind::Laser => {
                rotate_to_follow(scene, node, movable.previous_cursor_position, event.cursor_position);
                movable.previous_cursor_position = event.cursor_position;
            }
            CursorKind::Object => self.on_release(event, actions),
        }
    }

    fn on_release(&mut self, event: &CursorEvent, actions: &mut Vec<SelectableAction>) {
        let Some(movable) = self.movable.as_mut() else {
            return;
        };
        let holder = movable.holder;
        if movable.selected && holder.map(|(id, _)| id) != Some(event.cursor_id) {
            return;
        }
        if movable.selected && holder.map(|(_, kind)| kind) == Some(CursorKind::Object) {
            actions.push(SelectableAction::StopDrag {
                cursor_id: event.cursor_id,
            });
        }
        movable.selected = false;
    }
}

/// Rotate `node` about the origin by the arc between two cursor positions
fn rotate_to_follow(scene: &mut SceneGraph, node: NodeId, from: Vec3, to: Vec3) {
    let (Some(from), Some(to)) = (from.try_normalize(), to.try_normalize()) else {
        return;
    };
    let rotation = Quat::from_rotation_arc(from, to);
    let mut transform = scene.transform(node);
    transform.translation = rotation * transform.translation;
    transform.rotation = (rotation * transform.rotation).normalize();
    scene.set_transform(node, transform);
}
