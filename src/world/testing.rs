//! Small in-memory world used by unit tests across the crate.

use crate::config::WorldMeta;
use crate::content::{Content, ItemUseCatalog, MonsterCatalog, MonsterDefinition, MonsterDrop};
use crate::entities::container::ContainerStore;
use crate::entities::creature::CreatureId;
use crate::entities::item::{ArmorSpot, ItemCatalog, ItemClass, ItemDefinition, ItemId};
use crate::net::broadcast::SessionId;
use crate::net::protocol::ServerMessage;
use crate::persistence::accounts::PlayerStore;
use crate::scripting::BuiltinScripts;
use crate::world::coord::Coord;
use crate::world::item_use::{ItemUse, UseProduct};
use crate::world::sector_store::{MemorySectorStorage, SectorStorage};
use crate::world::state::{World, WorldParts};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::mpsc::{channel, Receiver};

pub const GOLD: ItemId = ItemId(1);
pub const SWORD: ItemId = ItemId(2);
pub const ROCK: ItemId = ItemId(3);
pub const AXE: ItemId = ItemId(4);
pub const TREE: ItemId = ItemId(5);
pub const LOG: ItemId = ItemId(6);
pub const SAPLING: ItemId = ItemId(7);
pub const HELMET: ItemId = ItemId(8);

pub const TEST_PASSWORD: &str = "secret";

fn item(id: ItemId, name: &str) -> ItemDefinition {
    ItemDefinition {
        id,
        name: name.to_string(),
        image: id.0 * 10,
        ..ItemDefinition::empty()
    }
}

fn catalog() -> ItemCatalog {
    ItemCatalog::new(vec![
        ItemDefinition {
            class: ItemClass::Money,
            moveable: true,
            stackable: true,
            ..item(GOLD, "gold")
        },
        ItemDefinition {
            class: ItemClass::Weapon,
            moveable: true,
            wear_image: 55,
            ..item(SWORD, "sword")
        },
        ItemDefinition {
            class: ItemClass::Wall,
            walkable: false,
            ..item(ROCK, "rock")
        },
        ItemDefinition {
            class: ItemClass::Tool,
            moveable: true,
            ..item(AXE, "axe")
        },
        ItemDefinition {
            class: ItemClass::Plant,
            ..item(TREE, "tree")
        },
        ItemDefinition {
            moveable: true,
            stackable: true,
            ..item(LOG, "log")
        },
        ItemDefinition {
            class: ItemClass::Plant,
            growth_delta: 2,
            growth_item: TREE,
            ..item(SAPLING, "sapling")
        },
        ItemDefinition {
            class: ItemClass::Armor,
            armor_spot: Some(ArmorSpot::Head),
            moveable: true,
            wear_image: 77,
            ..item(HELMET, "helmet")
        },
    ])
}

fn content() -> Content {
    Content {
        items: catalog(),
        monsters: MonsterCatalog::new(vec![MonsterDefinition {
            id: 1,
            name: "Rat".to_string(),
            image: 40,
            life: 20,
            drops: vec![
                MonsterDrop { item: GOLD, quantity: 7 },
                MonsterDrop { item: SWORD, quantity: 1 },
            ],
        }]),
        uses: ItemUseCatalog::new(vec![ItemUse {
            tool: AXE,
            focus: TREE,
            tool_quantity_consumed: 0,
            focus_quantity_consumed: 1,
            products: vec![UseProduct { item: LOG, quantity: 2 }],
            success_tool: None,
            surface_ground: None,
            animation: Some("Chop".to_string()),
            success_message: Some("You chop the tree.".to_string()),
            failure_message: Some("The tree stands firm.".to_string()),
        }]),
    }
}

/// A 40x40 single-level world with 10x10 sectors, spawning players at
/// (1, 1, 0) on floor 1.
pub struct TestWorld {
    pub world: World,
}

impl TestWorld {
    pub fn new() -> Self {
        Self::with_starter_items(Vec::new())
    }

    pub fn with_starter_items(starter_items: Vec<ItemId>) -> Self {
        Self::build(starter_items, Box::new(MemorySectorStorage::new()))
    }

    /// Same world, reading and writing sectors through `sectors`.
    pub fn with_sectors(sectors: Box<dyn SectorStorage>) -> Self {
        Self::build(Vec::new(), sectors)
    }

    fn build(starter_items: Vec<ItemId>, sectors: Box<dyn SectorStorage>) -> Self {
        let meta = WorldMeta {
            size: 40,
            depth: 1,
            sector_size: 10,
            default_player_spawn: Coord::new(1, 1, 0),
            default_floor: 1,
            corpse_item: None,
            starter_items,
        };
        let world = World::new(WorldParts {
            name: "test".to_string(),
            meta,
            sectors,
            containers: ContainerStore::in_memory(),
            content: content(),
            accounts: PlayerStore::in_memory(),
            scripts: Box::new(BuiltinScripts::seeded(7)),
            rng: StdRng::seed_from_u64(11),
        })
        .expect("test world");
        Self { world }
    }

    /// Connects and registers `name`, which also logs it in.
    pub fn login(&mut self, name: &str) -> (SessionId, Receiver<ServerMessage>) {
        let (tx, rx) = channel();
        let session = self.world.connect(tx);
        self.world
            .register(session, name, TEST_PASSWORD)
            .expect("register");
        (session, rx)
    }

    pub fn creature_of(&self, session: SessionId) -> CreatureId {
        self.world.player(session).expect("logged in").creature
    }
}

pub fn drain(rx: &Receiver<ServerMessage>) -> Vec<ServerMessage> {
    rx.try_iter().collect()
}

/// Chat texts waiting in `rx`; everything else is discarded.
pub fn chat_lines(rx: &Receiver<ServerMessage>) -> Vec<String> {
    rx.try_iter()
        .filter_map(|message| match message {
            ServerMessage::Chat { text, .. } => Some(text),
            _ => None,
        })
        .collect()
}
