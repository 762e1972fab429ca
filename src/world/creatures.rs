use crate::content::MonsterDefinition;
use crate::entities::container::{ContainerError, ContainerId, ContainerKind};
use crate::entities::creature::{Creature, CreatureId, CreatureImage, DEFAULT_LIFE};
use crate::entities::item::ItemInstance;
use crate::net::protocol::{CreatureSnapshot, ServerMessage};
use crate::scripting::{BehaviorKind, EventPayload, EventType, ScriptAction};
use crate::world::coord::{Coord, Direction};
use crate::world::error::MapError;
use crate::world::items::{ItemError, DEATH_DROP_RANGE};
use crate::world::state::World;

/// How far a spawn may slide off its requested tile to find a free one.
const SPAWN_SEARCH_RANGE: i32 = 10;
/// Milliseconds a client animates one walking step over.
pub const STEP_DURATION_MS: u32 = 200;

#[derive(Debug, thiserror::Error)]
pub enum CreatureError {
    #[error("unknown creature {0}")]
    Unknown(CreatureId),
    #[error("tile {0} is occupied")]
    Occupied(Coord),
    #[error(transparent)]
    Map(#[from] MapError),
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error(transparent)]
    Item(#[from] ItemError),
}

/// Everything needed to bring a creature into the world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCreature {
    pub name: String,
    pub image: CreatureImage,
    pub location: Coord,
    pub life: i32,
    pub belongs_to_player: bool,
    pub is_friendly: bool,
    pub friendly_message: Option<String>,
    pub inventory: Option<ContainerId>,
}

impl NewCreature {
    pub fn monster(name: impl Into<String>, image: CreatureImage, location: Coord) -> Self {
        Self {
            name: name.into(),
            image,
            location,
            life: DEFAULT_LIFE,
            belongs_to_player: false,
            is_friendly: false,
            friendly_message: None,
            inventory: None,
        }
    }
}

impl World {
    /// Spawns and announces to viewers of the landing sector.
    pub fn spawn(&mut self, new: NewCreature) -> Result<CreatureId, MapError> {
        let id = self.spawn_quietly(new)?;
        if let Some(creature) = self.creatures.get(id) {
            self.broadcaster.notify_area(
                creature.location,
                ServerMessage::AddCreature(CreatureSnapshot::from(creature)),
            );
        }
        Ok(id)
    }

    /// Spawns without telling anyone; used when rebuilding stored creatures.
    pub fn spawn_quietly(&mut self, new: NewCreature) -> Result<CreatureId, MapError> {
        let location = self.free_tile_near(new.location)?;
        let id = self.creatures.allocate();
        self.map.set_creature(location, Some(id))?;
        let mut behaviors = Vec::with_capacity(2);
        if !new.belongs_to_player {
            behaviors.push(self.scripts.attach(id, BehaviorKind::Wander));
        }
        behaviors.push(self.scripts.attach(id, BehaviorKind::Life));
        self.creatures.insert(Creature {
            id,
            name: new.name,
            image: new.image,
            location,
            life: new.life,
            belongs_to_player: new.belongs_to_player,
            is_friendly: new.is_friendly,
            friendly_message: new.friendly_message,
            inventory: new.inventory,
            behaviors,
        });
        tracing::debug!(creature = %id, location = %location, "spawned creature");
        Ok(id)
    }

    fn free_tile_near(&mut self, origin: Coord) -> Result<Coord, MapError> {
        let origin = self.map.wrap(origin);
        for position in self
            .geometry()
            .ring_positions(origin, SPAWN_SEARCH_RANGE, true)
        {
            if self.map.creature(position)?.is_none() {
                return Ok(position);
            }
        }
        Err(MapError::NoFreeTile(origin))
    }

    /// Spawns a catalog monster carrying its drops in a throwaway inventory.
    pub fn spawn_monster(
        &mut self,
        definition: &MonsterDefinition,
        location: Coord,
        friendly: bool,
    ) -> Result<CreatureId, MapError> {
        let drops = definition
            .drops
            .iter()
            .map(|drop| ItemInstance::new(drop.item, drop.quantity))
            .filter(|item| !item.is_none())
            .collect();
        let inventory = self
            .containers
            .create_in_memory(ContainerKind::Inventory, drops);
        let mut new = NewCreature::monster(
            definition.name.clone(),
            CreatureImage::fixed(definition.image),
            location,
        );
        new.life = definition.life;
        new.is_friendly = friendly;
        new.inventory = Some(inventory);
        self.spawn(new)
    }

    /// Registers creatures read from freshly loaded sector files.
    pub fn adopt_restored(&mut self) -> usize {
        let restored = self.map.take_restored();
        let mut adopted = 0;
        for entry in restored {
            let origin = self.geometry().sector_origin(entry.sector);
            let location = origin.offset(entry.local.0, entry.local.1, 0);
            let new = NewCreature {
                name: entry.record.name,
                image: entry.record.image,
                location,
                life: entry.record.life,
                belongs_to_player: false,
                is_friendly: entry.record.is_friendly,
                friendly_message: entry.record.friendly_message,
                inventory: None,
            };
            match self.spawn_quietly(new) {
                Ok(_) => adopted += 1,
                Err(err) => tracing::warn!(location = %location, error = %err, "dropped stored creature"),
            }
        }
        adopted
    }

    /// Moves a creature, keeping tile and registry in step.
    ///
    /// Viewers of the old sector first get a zero-length move to resync, then
    /// viewers of either sector and the creature's owner get the real move.
    pub fn move_creature(
        &mut self,
        id: CreatureId,
        destination: Coord,
        duration_ms: u32,
        teleport: bool,
    ) -> Result<(), CreatureError> {
        let creature = self.creatures.get(id).ok_or(CreatureError::Unknown(id))?;
        let from = creature.location;
        let destination = self.map.wrap(destination);
        if destination == from {
            return Ok(());
        }
        if let Some(other) = self.map.creature(destination)? {
            if other != id {
                return Err(CreatureError::Occupied(destination));
            }
        }
        let from_sector = self.map.sector_index_of(from);
        self.broadcaster.notify_sector(
            from_sector,
            ServerMessage::MoveCreature {
                id,
                destination: from,
                duration_ms: 0,
                teleport: false,
                on_raft: false,
            },
        );
        self.map.set_creature(from, None)?;
        self.map.set_creature(destination, Some(id))?;
        if let Some(creature) = self.creatures.get_mut(id) {
            creature.location = destination;
        }
        let to_sector = self.map.sector_index_of(destination);
        self.broadcaster.notify_move(
            from_sector,
            to_sector,
            id,
            ServerMessage::MoveCreature {
                id,
                destination,
                duration_ms,
                teleport,
                on_raft: false,
            },
        );
        Ok(())
    }

    /// One step if the tile ahead can be entered; returns whether it moved.
    pub fn walk(&mut self, id: CreatureId, direction: Direction) -> Result<bool, CreatureError> {
        let creature = self.creatures.get(id).ok_or(CreatureError::Unknown(id))?;
        let target = self.map.wrap(creature.location.step(direction));
        if !self.map.walkable(target, &self.content.items)? {
            return Ok(false);
        }
        self.move_creature(id, target, STEP_DURATION_MS, false)?;
        Ok(true)
    }

    pub fn teleport(&mut self, id: CreatureId, destination: Coord) -> Result<(), CreatureError> {
        let creature = self.creatures.get(id).ok_or(CreatureError::Unknown(id))?;
        let from = creature.location;
        let destination = self.free_tile_near(destination)?;
        self.broadcaster
            .notify_area(from, ServerMessage::animation("WarpOut", from));
        self.move_creature(id, destination, STEP_DURATION_MS, true)?;
        self.broadcaster
            .notify_area(destination, ServerMessage::animation("WarpIn", destination));
        Ok(())
    }

    /// Removes a creature for good: registry, tile and behaviors.
    pub fn retire(&mut self, id: CreatureId) -> Result<Creature, CreatureError> {
        let creature = self.creatures.remove(id).ok_or(CreatureError::Unknown(id))?;
        if self.map.creature(creature.location)? == Some(id) {
            self.map.set_creature(creature.location, None)?;
        }
        for handle in &creature.behaviors {
            self.scripts.detach(*handle);
        }
        if !creature.belongs_to_player {
            if let Some(inventory) = creature.inventory {
                self.containers.discard(inventory);
            }
        }
        self.broadcaster
            .notify_area(creature.location, ServerMessage::RemoveCreature { id });
        tracing::debug!(creature = %id, "retired creature");
        Ok(creature)
    }

    pub fn update_creature_image(&mut self, id: CreatureId, image: CreatureImage) {
        let Some(creature) = self.creatures.get_mut(id) else {
            return;
        };
        creature.image = image;
        let location = creature.location;
        self.broadcaster
            .notify_area(location, ServerMessage::UpdateCreatureImage { id, image });
    }

    /// Applies damage. At zero life players go back to the spawn with their
    /// belongings intact; anything else drops what it carried and is retired.
    pub fn hurt(&mut self, id: CreatureId, amount: i32) -> Result<(), CreatureError> {
        let creature = self.creatures.get_mut(id).ok_or(CreatureError::Unknown(id))?;
        creature.life -= amount;
        let life = creature.life;
        let location = creature.location;
        let belongs_to_player = creature.belongs_to_player;
        let inventory = creature.inventory;
        self.broadcaster
            .notify_area(location, ServerMessage::animation("Hit", location));
        self.scripts
            .dispatch(EventType::Hurt, id, &EventPayload::Hurt { amount, life });
        if life > 0 {
            return Ok(());
        }

        self.broadcaster
            .notify_area(location, ServerMessage::animation("Death", location));
        self.scripts.dispatch(EventType::Death, id, &EventPayload::Death);
        if let Some(corpse) = self.meta.corpse_item {
            self.drop_item_near(location, ItemInstance::new(corpse, 1), DEATH_DROP_RANGE)?;
        }
        if belongs_to_player {
            if let Some(creature) = self.creatures.get_mut(id) {
                creature.life = DEFAULT_LIFE;
            }
            let spawn = self.map.default_player_spawn(&mut self.rng);
            self.teleport(id, spawn)?;
            return Ok(());
        }
        if let Some(inventory) = inventory {
            self.drop_container_near(inventory, location, DEATH_DROP_RANGE)?;
        }
        self.retire(id)?;
        Ok(())
    }

    /// Sends a tick to every creature's behaviors and applies their answers.
    pub fn tick_behaviors(&mut self) -> Result<(), MapError> {
        let tick = self.tick;
        for id in self.creatures.ids() {
            let Some(creature) = self.creatures.get(id) else {
                continue;
            };
            let payload = EventPayload::Tick {
                tick,
                life: creature.life,
            };
            let actions = self.scripts.dispatch(EventType::Tick, id, &payload);
            for action in actions {
                self.apply_script_action(action)?;
            }
        }
        Ok(())
    }

    fn apply_script_action(&mut self, action: ScriptAction) -> Result<(), MapError> {
        match action {
            ScriptAction::Step {
                creature,
                direction,
            } => match self.walk(creature, direction) {
                Ok(_) | Err(CreatureError::Unknown(_)) | Err(CreatureError::Occupied(_)) => {}
                Err(CreatureError::Map(err)) => return Err(err),
                Err(err) => tracing::warn!(creature = %creature, error = %err, "scripted step failed"),
            },
            ScriptAction::Heal { creature, amount } => {
                if let Some(creature) = self.creatures.get_mut(creature) {
                    creature.life = (creature.life + amount).min(DEFAULT_LIFE);
                }
            }
        }
        Ok(())
    }
}
