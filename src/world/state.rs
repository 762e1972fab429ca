use crate::config::WorldMeta;
use crate::content::Content;
use crate::entities::container::ContainerStore;
use crate::entities::player::Player;
use crate::entities::registry::CreatureRegistry;
use crate::net::broadcast::{Broadcaster, SessionId};
use crate::net::protocol::ServerMessage;
use crate::persistence::accounts::PlayerStore;
use crate::scripting::{BuiltinScripts, ScriptHost};
use crate::world::coord::{Coord, Geometry};
use crate::world::error::{MapError, StorageError};
use crate::world::sector_store::{FileSectorStorage, SectorStorage};
use crate::world::tile_map::TileMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::path::Path;

/// Counts from one full world save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub sectors: usize,
    pub players: usize,
    pub containers: usize,
}

/// Everything one running world owns. Callers hold it behind a single mutex;
/// every `&mut self` method is one serialized world mutation.
pub struct World {
    pub name: String,
    pub meta: WorldMeta,
    pub map: TileMap,
    pub creatures: CreatureRegistry,
    pub containers: ContainerStore,
    pub content: Content,
    pub accounts: PlayerStore,
    pub players: HashMap<SessionId, Player>,
    pub broadcaster: Broadcaster,
    pub(crate) scripts: Box<dyn ScriptHost>,
    pub(crate) rng: StdRng,
    pub(crate) tick: u64,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("name", &self.name)
            .field("map", &self.map)
            .field("creatures", &self.creatures.len())
            .field("players", &self.players.len())
            .field("tick", &self.tick)
            .finish()
    }
}

/// Collaborators a world is assembled from.
pub struct WorldParts {
    pub name: String,
    pub meta: WorldMeta,
    pub sectors: Box<dyn SectorStorage>,
    pub containers: ContainerStore,
    pub content: Content,
    pub accounts: PlayerStore,
    pub scripts: Box<dyn ScriptHost>,
    pub rng: StdRng,
}

impl World {
    pub fn new(parts: WorldParts) -> Result<Self, MapError> {
        let meta = parts.meta;
        let geometry = Geometry::new(meta.size, meta.depth, meta.sector_size)?;
        let map = TileMap::new(
            geometry,
            parts.sectors,
            meta.default_floor,
            meta.default_player_spawn,
        );
        Ok(Self {
            name: parts.name,
            meta,
            map,
            creatures: CreatureRegistry::new(),
            containers: parts.containers,
            content: parts.content,
            accounts: parts.accounts,
            players: HashMap::new(),
            broadcaster: Broadcaster::new(geometry),
            scripts: parts.scripts,
            rng: parts.rng,
            tick: 0,
        })
    }

    /// Opens the world stored under `root`: `map/` (meta and sector files),
    /// `content/`, `players/` and `containers/`.
    pub fn open(root: &Path, name: impl Into<String>) -> Result<Self, MapError> {
        let meta = WorldMeta::load(root)?;
        let content = Content::load(root)?;
        let containers = ContainerStore::open(root.join("containers"))?;
        let accounts = PlayerStore::open(root.join("players"))?;
        let world = Self::new(WorldParts {
            name: name.into(),
            meta,
            sectors: Box::new(FileSectorStorage::new(root.join("map").join("sectors"))),
            containers,
            content,
            accounts,
            scripts: Box::new(BuiltinScripts::new()),
            rng: StdRng::from_entropy(),
        })?;
        tracing::info!(
            world = %world.name,
            size = world.meta.size,
            depth = world.meta.depth,
            sector_size = world.meta.sector_size,
            "opened world"
        );
        Ok(world)
    }

    pub fn geometry(&self) -> Geometry {
        *self.map.geometry()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn player(&self, session: SessionId) -> Option<&Player> {
        self.players.get(&session)
    }

    pub fn session_named(&self, username: &str) -> Option<SessionId> {
        self.players
            .iter()
            .find(|(_, player)| player.username().eq_ignore_ascii_case(username))
            .map(|(session, _)| *session)
    }

    /// Usernames of everyone online, sorted.
    pub fn online_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .players
            .values()
            .map(|player| player.username().to_string())
            .collect();
        names.sort();
        names
    }

    /// Where the session's creature stands, or the default spawn before login.
    pub fn session_location(&self, session: SessionId) -> Coord {
        self.players
            .get(&session)
            .and_then(|player| self.creatures.get(player.creature))
            .map(|creature| creature.location)
            .unwrap_or_else(|| self.map.default_spawn())
    }

    pub fn tell(&self, session: SessionId, text: impl Into<String>) {
        let location = self.session_location(session);
        self.broadcaster
            .send_to(session, ServerMessage::chat(text, location));
    }

    pub fn announce(&self, text: impl Into<String>) {
        self.broadcaster
            .notify_global(ServerMessage::chat(text, Coord::default()));
    }

    /// Writes sectors, online players and every persisted container.
    pub fn save(&mut self) -> Result<SaveReport, StorageError> {
        self.announce("Saving world...");
        self.adopt_restored();
        let creatures = &self.creatures;
        let sectors = self.map.save(|id| {
            creatures
                .get(id)
                .filter(|creature| !creature.belongs_to_player)
                .map(|creature| creature.record())
        })?;
        let mut players = 0;
        for player in self.players.values_mut() {
            if let Some(creature) = self.creatures.get(player.creature) {
                player.account.location = creature.location;
            }
            self.accounts.save(&player.account)?;
            players += 1;
        }
        let containers = self.containers.save_all()?;
        let report = SaveReport {
            sectors,
            players,
            containers,
        };
        tracing::info!(
            sectors = report.sectors,
            players = report.players,
            containers = report.containers,
            "world saved"
        );
        self.announce("Saved!");
        Ok(report)
    }

    /// One simulation step: registers creatures restored from freshly loaded
    /// sectors, runs behaviors and, every `growth_every` ticks, grows items.
    pub fn run_tick(&mut self, growth_every: u64) -> Result<(), MapError> {
        self.tick += 1;
        self.adopt_restored();
        self.tick_behaviors()?;
        if growth_every != 0 && self.tick % growth_every == 0 {
            let grown = self.grow();
            if grown > 0 {
                tracing::debug!(grown, "growth pass");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::world::testing::TestWorld;

    #[test]
    fn save_persists_player_location_and_announces() {
        let mut test = TestWorld::new();
        let (session, rx) = test.login("anna");
        let creature = test.creature_of(session);
        let destination = test.world.map.wrap(crate::world::coord::Coord::new(8, 8, 0));
        test.world
            .move_creature(creature, destination, 200, false)
            .expect("move");
        rx.try_iter().count();

        let report = test.world.save().expect("save");
        assert_eq!(report.players, 1);
        assert!(report.sectors >= 1);
        let chats = crate::world::testing::chat_lines(&rx);
        assert_eq!(chats, vec!["Saving world...".to_string(), "Saved!".to_string()]);
        let account = test.world.accounts.load("anna").expect("load").expect("account");
        assert_eq!(account.location, destination);
    }

    #[test]
    fn growth_runs_on_its_period() {
        let mut test = TestWorld::new();
        let sapling = crate::world::coord::Coord::new(4, 4, 0);
        test.world
            .map
            .set_item(
                sapling,
                crate::entities::item::ItemInstance::new(crate::world::testing::SAPLING, 1),
            )
            .expect("plant");
        for _ in 0..4 {
            test.world.run_tick(2).expect("tick");
        }
        assert_eq!(
            test.world.map.item(sapling).expect("item").item,
            crate::world::testing::TREE
        );
    }
}
