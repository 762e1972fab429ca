//! Creature behavior hooks. The world attaches opaque handles to creatures and
//! forwards events; whatever runs behind a handle answers with actions the
//! world applies under its own rules.

pub mod builtin;

use crate::entities::creature::CreatureId;
use crate::world::coord::Direction;
use serde::{Deserialize, Serialize};

pub use builtin::BuiltinScripts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BehaviorHandle(pub u32);

/// Default behaviors attached at spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BehaviorKind {
    /// Random stepping; never attached to player creatures.
    Wander,
    /// Slow life regeneration.
    Life,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Tick,
    Hurt,
    Death,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    Tick { tick: u64, life: i32 },
    Hurt { amount: i32, life: i32 },
    Death,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptAction {
    Step {
        creature: CreatureId,
        direction: Direction,
    },
    Heal {
        creature: CreatureId,
        amount: i32,
    },
}

pub trait ScriptHost: Send {
    fn attach(&mut self, creature: CreatureId, kind: BehaviorKind) -> BehaviorHandle;

    fn detach(&mut self, handle: BehaviorHandle);

    fn dispatch(
        &mut self,
        event: EventType,
        target: CreatureId,
        payload: &EventPayload,
    ) -> Vec<ScriptAction>;
}
