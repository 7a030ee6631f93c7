//! Drag lifecycle and the run-once render queue
//!
//! Scene mutation requested from outside the update loop is posted to a
//! [`RenderQueue`] and executed at the start of the next update, before any
//! picking happens.

use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::debug;

use crate::scene::{NodeId, SceneGraph};

/// A unit of deferred scene work
pub type RenderJob = Box<dyn FnOnce(&mut SceneGraph) + Send + 'static>;

/// Multi-producer queue of jobs that run exactly once on the update thread
#[derive(Clone)]
pub struct RenderQueue {
    tx: Sender<RenderJob>,
    rx: Receiver<RenderJob>,
}

impl fmt::Debug for RenderQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderQueue")
            .field("pending", &self.rx.len())
            .finish()
    }
}

impl Default for RenderQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn post<F>(&self, job: F)
    where
        F: FnOnce(&mut SceneGraph) + Send + 'static,
    {
        // Both ends live in self, the channel cannot be disconnected here.
        let _ = self.tx.send(Box::new(job));
    }

    /// Run every job queued so far; returns how many ran
    pub fn run_pending(&self, scene: &mut SceneGraph) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job(scene);
            ran += 1;
        }
        ran
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragPhase {
    Idle,
    Starting(NodeId),
    Dragging {
        node: NodeId,
        parent: Option<NodeId>,
    },
    Stopping {
        node: NodeId,
        parent: Option<NodeId>,
    },
}

/// Moves one node at a time under a controller's drag root
#[derive(Debug)]
pub struct Dragger {
    phase: Arc<Mutex<DragPhase>>,
    target: Option<(RenderQueue, NodeId)>,
}

impl Default for Dragger {
    fn default() -> Self {
        Self::new()
    }
}

impl Dragger {
    pub fn new() -> Self {
        Self {
            phase: Arc::new(Mutex::new(DragPhase::Idle)),
            target: None,
        }
    }

    /// Bind the dragger to a drag root; until then every start fails
    pub fn set_target(&mut self, queue: RenderQueue, drag_root: NodeId) {
        self.target = Some((queue, drag_root));
    }

    pub fn clear_target(&mut self) {
        self.target = None;
    }

    /// Request `node` to be dragged. Fails while another drag is pending or
    /// running.
    pub fn start(&self, node: NodeId) -> bool {
        let Some((queue, drag_root)) = self.target.clone() else {
            return false;
        };
        {
            let mut phase = self.phase.lock();
            if *phase != DragPhase::Idle {
                return false;
            }
            *phase = DragPhase::Starting(node);
        }

        let phase = Arc::clone(&self.phase);
        queue.post(move |scene| {
            let mut phase = phase.lock();
            if let DragPhase::Starting(node) = *phase {
                let parent = scene.parent(node);
                scene.reparent_keep_world(node, Some(drag_root));
                debug!("Drag started on {:?}", node);
                *phase = DragPhase::Dragging { node, parent };
            }
        });
        true
    }

    /// Request the current drag to end, restoring the original parent
    pub fn stop(&self) -> bool {
        let Some((queue, _)) = self.target.clone() else {
            return false;
        };
        let mut phase = self.phase.lock();
        match *phase {
            DragPhase::Starting(_) => {
                // start job has not run yet; it will see Idle and do nothing
                *phase = DragPhase::Idle;
                true
            }
            DragPhase::Dragging { node, parent } => {
                *phase = DragPhase::Stopping { node, parent };
                drop(phase);

                let phase = Arc::clone(&self.phase);
                queue.post(move |scene| {
                    let mut phase = phase.lock();
                    if let DragPhase::Stopping { node, parent } = *phase {
                        restore(scene, node, parent);
                        debug!("Drag stopped on {:?}", node);
                        *phase = DragPhase::Idle;
                    }
                });
                true
            }
            DragPhase::Idle | DragPhase::Stopping { .. } => false,
        }
    }

    /// Immediately put a dragged node back, used when the controller leaves
    /// the scene
    pub fn release_now(&self, scene: &mut SceneGraph) {
        let mut phase = self.phase.lock();
        match *phase {
            DragPhase::Dragging { node, parent } | DragPhase::Stopping { node, parent } => {
                restore(scene, node, parent);
            }
            DragPhase::Starting(_) | DragPhase::Idle => {}
        }
        *phase = DragPhase::Idle;
    }

    /// True from a successful start until the stop job has run
    pub fn is_dragging(&self) -> bool {
        *self.phase.lock() != DragPhase::Idle
    }

    pub fn dragged(&self) -> Option<NodeId> {
        match *self.phase.lock() {
            DragPhase::Idle => None,
            DragPhase::Starting(node)
            | DragPhase::Dragging { node, .. }
            | DragPhase::Stopping { node, .. } => Some(node),
        }
    }
}

fn restore(scene: &mut SceneGraph, node: NodeId, parent: Option<NodeId>) {
    let target = parent
        .filter(|p| scene.contains(*p))
        .unwrap_or_else(|| scene.root());
    scene.reparent_keep_world(node, Some(target));
}
