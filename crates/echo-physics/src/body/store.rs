// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use super::{Body, ObjectId};
use crate::error::PhysicsError;

enum BodyCommand {
    Add(Arc<Body>),
    Remove(Arc<Body>),
}

/// Thread-safe entry point for adding and removing bodies.
///
/// Calls only record a command; nothing happens to the simulation until the
/// store's next [`BodyStore::refresh`].
#[derive(Clone, Default)]
pub struct BodyQueue {
    commands: Arc<Mutex<Vec<BodyCommand>>>,
}

impl BodyQueue {
    fn push(&self, command: BodyCommand) {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
    }

    fn drain(&self) -> Vec<BodyCommand> {
        core::mem::take(&mut *self.commands.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Queues `body` for admission.
    ///
    /// Fails when the body already belongs to a world or is queued.
    pub fn add_body(&self, body: Arc<Body>) -> Result<(), PhysicsError> {
        if !body.claim() {
            return Err(PhysicsError::InvalidArgument(format!(
                "body '{}' is already added",
                body.name()
            )));
        }
        self.push(BodyCommand::Add(body));
        Ok(())
    }

    /// Queues `body` for removal.
    ///
    /// Fails when the body was never added.
    pub fn remove_body(&self, body: &Arc<Body>) -> Result<(), PhysicsError> {
        if !body.release() {
            return Err(PhysicsError::UnknownBody(body.name().to_owned()));
        }
        self.push(BodyCommand::Remove(Arc::clone(body)));
        Ok(())
    }
}

/// Change of the live body set, emitted by [`BodyStore::refresh`].
///
/// `id` is the id the body held when the command was applied. A body removed
/// and re-added within one refresh already carries its new id by the time
/// consumers see the removal, so consumers key on `id`, never on
/// [`Body::object_id`].
#[derive(Debug, Clone)]
pub enum BodyEvent {
    /// The body joined the simulation under `id`.
    Added {
        /// Freshly assigned id.
        id: ObjectId,
        /// Admitted body.
        body: Arc<Body>,
    },
    /// The body left the simulation. The event keeps it alive until every
    /// consumer has detached it.
    Removed {
        /// Id the body held while it was live.
        id: ObjectId,
        /// Removed body.
        body: Arc<Body>,
    },
}

impl BodyEvent {
    /// Id of the body at the time of the event.
    pub fn id(&self) -> ObjectId {
        match self {
            Self::Added { id, .. } | Self::Removed { id, .. } => *id,
        }
    }

    /// Body the event is about.
    pub fn body(&self) -> &Arc<Body> {
        match self {
            Self::Added { body, .. } | Self::Removed { body, .. } => body,
        }
    }
}

/// Live body list owned by the simulation thread.
pub struct BodyStore {
    queue: BodyQueue,
    bodies: Vec<Arc<Body>>,
    next_id: u32,
    subscribers: Vec<Sender<BodyEvent>>,
}

impl Default for BodyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BodyStore {
    /// Empty store.
    pub fn new() -> Self {
        Self {
            queue: BodyQueue::default(),
            bodies: Vec::new(),
            next_id: 1,
            subscribers: Vec::new(),
        }
    }

    /// Cloneable handle for queueing changes from any thread.
    pub fn queue(&self) -> BodyQueue {
        self.queue.clone()
    }

    /// Receiver of every future [`BodyEvent`].
    pub fn subscribe(&mut self) -> Receiver<BodyEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Bodies adopted so far, in admission order.
    pub fn bodies(&self) -> &[Arc<Body>] {
        &self.bodies
    }

    /// Number of live bodies.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// `true` when no body is live.
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Applies queued commands in FIFO order and returns the resulting events.
    ///
    /// Added bodies receive the next id. Events are also forwarded to every
    /// subscriber; closed subscriptions are dropped.
    pub fn refresh(&mut self) -> Vec<BodyEvent> {
        let mut events = Vec::new();
        for command in self.queue.drain() {
            match command {
                BodyCommand::Add(body) => {
                    let id = ObjectId::new(self.next_id);
                    self.next_id += 1;
                    body.assign_id(id);
                    debug!(body = body.name(), %id, "body added");
                    self.bodies.push(Arc::clone(&body));
                    events.push(BodyEvent::Added { id, body });
                }
                BodyCommand::Remove(body) => {
                    let live = self.bodies.iter().position(|b| Arc::ptr_eq(b, &body));
                    match (live, body.object_id()) {
                        (Some(index), Some(id)) => {
                            let removed = self.bodies.remove(index);
                            debug!(body = removed.name(), %id, "body removed");
                            events.push(BodyEvent::Removed { id, body: removed });
                        }
                        _ => warn!(body = body.name(), "removal of a body that is not live"),
                    }
                }
            }
        }
        if !events.is_empty() {
            self.subscribers
                .retain(|tx| events.iter().all(|event| tx.send(event.clone()).is_ok()));
        }
        events
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use echo_geom::{CollisionShape, Pose};

    use super::*;

    fn body(name: &str) -> Arc<Body> {
        Body::rigid(name, Pose::identity(), CollisionShape::sphere(1.0).unwrap())
    }

    #[test]
    fn bodies_are_invisible_until_refresh() {
        let mut store = BodyStore::new();
        store.queue().add_body(body("a")).unwrap();
        assert!(store.is_empty());
        let events = store.refresh();
        assert_eq!(events.len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn ids_are_monotonic_in_fifo_order() {
        let mut store = BodyStore::new();
        let queue = store.queue();
        let (a, b) = (body("a"), body("b"));
        queue.add_body(Arc::clone(&a)).unwrap();
        queue.add_body(Arc::clone(&b)).unwrap();
        store.refresh();
        assert_eq!(a.object_id(), Some(ObjectId::new(1)));
        assert_eq!(b.object_id(), Some(ObjectId::new(2)));

        queue.remove_body(&a).unwrap();
        queue.add_body(Arc::clone(&a)).unwrap();
        store.refresh();
        assert_eq!(a.object_id(), Some(ObjectId::new(3)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn contract_violations_are_rejected() {
        let store = BodyStore::new();
        let queue = store.queue();
        let a = body("a");
        assert!(matches!(queue.remove_body(&a), Err(PhysicsError::UnknownBody(_))));
        queue.add_body(Arc::clone(&a)).unwrap();
        assert!(matches!(
            queue.add_body(Arc::clone(&a)),
            Err(PhysicsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn removal_event_keeps_body_alive() {
        let mut store = BodyStore::new();
        let rx = store.subscribe();
        let queue = store.queue();
        let a = body("a");
        queue.add_body(Arc::clone(&a)).unwrap();
        store.refresh();
        queue.remove_body(&a).unwrap();
        drop(a);
        let events = store.refresh();
        let [BodyEvent::Removed { id, body: removed }] = events.as_slice() else {
            unreachable!("expected a single removal");
        };
        assert_eq!(removed.name(), "a");
        assert_eq!(*id, ObjectId::new(1));
        assert!(matches!(rx.try_recv(), Ok(BodyEvent::Added { .. })));
        assert!(matches!(rx.try_recv(), Ok(BodyEvent::Removed { .. })));
    }

    #[test]
    fn readmission_in_one_refresh_reports_both_ids() {
        let mut store = BodyStore::new();
        let queue = store.queue();
        let a = body("a");
        queue.add_body(Arc::clone(&a)).unwrap();
        store.refresh();
        queue.remove_body(&a).unwrap();
        queue.add_body(Arc::clone(&a)).unwrap();
        let events = store.refresh();
        let ids: Vec<_> = events
            .iter()
            .map(|event| (matches!(event, BodyEvent::Added { .. }), event.id()))
            .collect();
        assert_eq!(ids, vec![(false, ObjectId::new(1)), (true, ObjectId::new(2))]);
        assert_eq!(a.object_id(), Some(ObjectId::new(2)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn queue_is_usable_from_other_threads() {
        let mut store = BodyStore::new();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let queue = store.queue();
                std::thread::spawn(move || queue.add_body(body(&format!("b{i}"))))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        store.refresh();
        assert_eq!(store.len(), 4);
    }
}
