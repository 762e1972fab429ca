use crate::entities::creature::{Creature, CreatureId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// Owns every live creature. Identities come from a monotonic counter and are
/// never handed out twice for the life of the registry.
#[derive(Debug)]
pub struct CreatureRegistry {
    next_id: AtomicU32,
    creatures: HashMap<CreatureId, Creature>,
}

impl Default for CreatureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CreatureRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(1),
            creatures: HashMap::new(),
        }
    }

    pub fn allocate(&self) -> CreatureId {
        CreatureId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Registers a creature under its own id. Returns false if the id is taken.
    pub fn insert(&mut self, creature: Creature) -> bool {
        if self.creatures.contains_key(&creature.id) {
            return false;
        }
        self.creatures.insert(creature.id, creature);
        true
    }

    pub fn get(&self, id: CreatureId) -> Option<&Creature> {
        self.creatures.get(&id)
    }

    pub fn get_mut(&mut self, id: CreatureId) -> Option<&mut Creature> {
        self.creatures.get_mut(&id)
    }

    pub fn remove(&mut self, id: CreatureId) -> Option<Creature> {
        self.creatures.remove(&id)
    }

    pub fn contains(&self, id: CreatureId) -> bool {
        self.creatures.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.creatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creatures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Creature> {
        self.creatures.values()
    }

    /// Ids sorted ascending, so callers that mutate while walking the list
    /// visit creatures in spawn order.
    pub fn ids(&self) -> Vec<CreatureId> {
        let mut ids: Vec<CreatureId> = self.creatures.keys().copied().collect();
        ids.sort();
        ids
    }
}
