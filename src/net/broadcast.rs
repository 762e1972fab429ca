use crate::entities::container::ContainerId;
use crate::entities::creature::CreatureId;
use crate::net::protocol::ServerMessage;
use crate::world::coord::{Coord, Geometry, SectorIndex};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::mpsc::Sender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct Subscriber {
    outbox: Sender<ServerMessage>,
    loaded: HashSet<SectorIndex>,
    creature: Option<CreatureId>,
    containers: HashSet<ContainerId>,
}

impl Subscriber {
    fn push(&self, message: ServerMessage) {
        // A closed outbox means the writer thread is gone; teardown follows.
        let _ = self.outbox.send(message);
    }
}

/// Routes world updates to the sessions that can see them.
///
/// Pushing onto an outbox never blocks, so every notify is safe to call while
/// the world lock is held; the network write happens on the session's own
/// writer thread.
#[derive(Debug)]
pub struct Broadcaster {
    geometry: Geometry,
    sessions: BTreeMap<SessionId, Subscriber>,
    next_id: u64,
}

impl Broadcaster {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            sessions: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn register(&mut self, outbox: Sender<ServerMessage>) -> SessionId {
        let id = SessionId(self.next_id);
        self.next_id += 1;
        self.sessions.insert(
            id,
            Subscriber {
                outbox,
                loaded: HashSet::new(),
                creature: None,
                containers: HashSet::new(),
            },
        );
        id
    }

    /// Drops the session's outbox, which ends its writer thread.
    pub fn unregister(&mut self, session: SessionId) -> bool {
        self.sessions.remove(&session).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn is_registered(&self, session: SessionId) -> bool {
        self.sessions.contains_key(&session)
    }

    pub fn load_sector(&mut self, session: SessionId, index: SectorIndex) {
        if let Some(subscriber) = self.sessions.get_mut(&session) {
            subscriber.loaded.insert(index);
        }
    }

    pub fn unload_sector(&mut self, session: SessionId, index: SectorIndex) {
        if let Some(subscriber) = self.sessions.get_mut(&session) {
            subscriber.loaded.remove(&index);
        }
    }

    pub fn has_sector_loaded(&self, session: SessionId, index: SectorIndex) -> bool {
        self.sessions
            .get(&session)
            .is_some_and(|subscriber| subscriber.loaded.contains(&index))
    }

    /// Marks the session as authenticated and controlling `creature`, and
    /// subscribes it to the player's own containers.
    pub fn bind_player(&mut self, session: SessionId, creature: CreatureId, containers: &[ContainerId]) {
        if let Some(subscriber) = self.sessions.get_mut(&session) {
            subscriber.creature = Some(creature);
            subscriber.containers.extend(containers.iter().copied());
        }
    }

    pub fn watch_container(&mut self, session: SessionId, container: ContainerId) {
        if let Some(subscriber) = self.sessions.get_mut(&session) {
            subscriber.containers.insert(container);
        }
    }

    pub fn unwatch_container(&mut self, session: SessionId, container: ContainerId) {
        if let Some(subscriber) = self.sessions.get_mut(&session) {
            subscriber.containers.remove(&container);
        }
    }

    pub fn send_to(&self, session: SessionId, message: ServerMessage) {
        if let Some(subscriber) = self.sessions.get(&session) {
            subscriber.push(message);
        }
    }

    fn send_where<F>(&self, message: ServerMessage, mut wants: F) -> usize
    where
        F: FnMut(SessionId, &Subscriber) -> bool,
    {
        let mut delivered = 0;
        for (id, subscriber) in &self.sessions {
            if wants(*id, subscriber) {
                subscriber.push(message.clone());
                delivered += 1;
            }
        }
        delivered
    }

    pub fn notify_sector(&self, index: SectorIndex, message: ServerMessage) -> usize {
        self.send_where(message, |_, subscriber| subscriber.loaded.contains(&index))
    }

    pub fn notify_area(&self, coord: Coord, message: ServerMessage) -> usize {
        self.notify_sector(self.geometry.sector_index_of(coord), message)
    }

    /// Every session with a logged-in player.
    pub fn notify_global(&self, message: ServerMessage) -> usize {
        self.send_where(message, |_, subscriber| subscriber.creature.is_some())
    }

    pub fn notify_global_except(&self, skip: SessionId, message: ServerMessage) -> usize {
        self.send_where(message, |id, subscriber| {
            id != skip && subscriber.creature.is_some()
        })
    }

    /// Sessions that see either end of a move, plus whoever controls the
    /// moving creature.
    pub fn notify_move(
        &self,
        from: SectorIndex,
        to: SectorIndex,
        creature: CreatureId,
        message: ServerMessage,
    ) -> usize {
        self.send_where(message, |_, subscriber| {
            subscriber.loaded.contains(&from)
                || subscriber.loaded.contains(&to)
                || subscriber.creature == Some(creature)
        })
    }

    pub fn notify_container(&self, container: ContainerId, message: ServerMessage) -> usize {
        self.send_where(message, |_, subscriber| {
            subscriber.containers.contains(&container)
        })
    }
}
