use crate::entities::creature::{CreatureId, DEFAULT_LIFE};
use crate::scripting::{
    BehaviorHandle, BehaviorKind, EventPayload, EventType, ScriptAction, ScriptHost,
};
use crate::world::coord::Direction;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// One in this many ticks a wandering creature takes a step.
const WANDER_ONE_IN: u32 = 3;
/// Ticks between regenerating one life point.
const REGEN_EVERY: u64 = 10;

#[derive(Debug, Clone, Copy)]
struct Attached {
    creature: CreatureId,
    kind: BehaviorKind,
}

/// Behaviors the server ships with: wandering and life regeneration.
#[derive(Debug)]
pub struct BuiltinScripts {
    attached: HashMap<BehaviorHandle, Attached>,
    next_handle: u32,
    rng: StdRng,
}

impl BuiltinScripts {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            attached: HashMap::new(),
            next_handle: 1,
            rng,
        }
    }

    pub fn attached_count(&self) -> usize {
        self.attached.len()
    }

    fn kinds_for(&self, creature: CreatureId) -> Vec<BehaviorKind> {
        let mut kinds: Vec<BehaviorKind> = self
            .attached
            .values()
            .filter(|attached| attached.creature == creature)
            .map(|attached| attached.kind)
            .collect();
        kinds.sort_by_key(|kind| matches!(kind, BehaviorKind::Life));
        kinds
    }
}

impl Default for BuiltinScripts {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptHost for BuiltinScripts {
    fn attach(&mut self, creature: CreatureId, kind: BehaviorKind) -> BehaviorHandle {
        let handle = BehaviorHandle(self.next_handle);
        self.next_handle += 1;
        self.attached.insert(handle, Attached { creature, kind });
        handle
    }

    fn detach(&mut self, handle: BehaviorHandle) {
        self.attached.remove(&handle);
    }

    fn dispatch(
        &mut self,
        event: EventType,
        target: CreatureId,
        payload: &EventPayload,
    ) -> Vec<ScriptAction> {
        let EventPayload::Tick { tick, life } = payload else {
            return Vec::new();
        };
        if event != EventType::Tick {
            return Vec::new();
        }
        let mut actions = Vec::new();
        for kind in self.kinds_for(target) {
            match kind {
                BehaviorKind::Wander => {
                    if self.rng.gen_range(0..WANDER_ONE_IN) == 0 {
                        let direction = Direction::ALL[self.rng.gen_range(0..Direction::ALL.len())];
                        actions.push(ScriptAction::Step {
                            creature: target,
                            direction,
                        });
                    }
                }
                BehaviorKind::Life => {
                    if *life > 0 && *life < DEFAULT_LIFE && tick % REGEN_EVERY == 0 {
                        actions.push(ScriptAction::Heal {
                            creature: target,
                            amount: 1,
                        });
                    }
                }
            }
        }
        actions
    }
}
