use crate::entities::container::{ContainerError, ContainerId, ContainerKind, INVENTORY_SIZE};
use crate::entities::creature::{CreatureId, CreatureImage, PlayerImage, DEFAULT_LIFE};
use crate::entities::item::{ArmorSpot, ItemInstance};
use crate::entities::player::{AccountDetails, Player};
use crate::net::broadcast::SessionId;
use crate::net::protocol::{ClientCommand, CreatureSnapshot, ServerMessage, PROTOCOL_VERSION};
use crate::persistence::accounts::{hash_password, validate_username, AuthError};
use crate::world::coord::SectorIndex;
use crate::world::creatures::{CreatureError, NewCreature};
use crate::world::sector::Tile;
use crate::world::state::World;
use rand::Rng;
use std::sync::mpsc::Sender;

/// Quantity a stackable starter item arrives with.
const STARTER_STACK: u32 = 999;

impl World {
    /// Registers a fresh connection and greets it with the world layout.
    pub fn connect(&mut self, outbox: Sender<ServerMessage>) -> SessionId {
        let session = self.broadcaster.register(outbox);
        let geometry = self.geometry();
        self.broadcaster.send_to(
            session,
            ServerMessage::Initialize {
                version: PROTOCOL_VERSION.to_string(),
                world_name: self.name.clone(),
                size: geometry.size,
                depth: geometry.depth,
                sector_size: geometry.sector_size,
            },
        );
        session
    }

    pub fn login(&mut self, session: SessionId, username: &str, password: &str) -> Result<(), AuthError> {
        if self.players.contains_key(&session) || self.session_named(username).is_some() {
            return Err(AuthError::AlreadyOnline);
        }
        let account = self.accounts.authenticate(username, password)?;
        self.enter_world(session, account)
    }

    /// Creates the account with its containers, then logs it in. The very
    /// first account is an admin.
    pub fn register(&mut self, session: SessionId, username: &str, password: &str) -> Result<(), AuthError> {
        if self.players.contains_key(&session) {
            return Err(AuthError::AlreadyOnline);
        }
        validate_username(username)?;
        if self.accounts.exists(username) {
            return Err(AuthError::DuplicateUser);
        }
        let is_admin = self.accounts.is_empty()?;
        let mut starter: Vec<ItemInstance> = self
            .meta
            .starter_items
            .iter()
            .map(|id| {
                let quantity = if self.content.items.get(*id).stackable {
                    STARTER_STACK
                } else {
                    1
                };
                ItemInstance::new(*id, quantity)
            })
            .filter(|item| !item.is_none())
            .collect();
        starter.resize(INVENTORY_SIZE.max(starter.len()), ItemInstance::NONE);
        let inventory_id = self.containers.create(ContainerKind::Inventory, starter)?;
        let equipment_id = self.containers.create(ContainerKind::Equipment, Vec::new())?;
        let account = AccountDetails {
            username: username.to_string(),
            password_hash: hash_password(password),
            inventory_id,
            equipment_id,
            is_admin,
            location: self.map.default_player_spawn(&mut self.rng),
        };
        self.accounts.save(&account)?;
        tracing::info!(username, is_admin, "registered account");
        self.enter_world(session, account)
    }

    fn enter_world(&mut self, session: SessionId, account: AccountDetails) -> Result<(), AuthError> {
        let inventory = self.containers.get(account.inventory_id)?.clone();
        let equipment = self.containers.get(account.equipment_id)?.clone();
        let bare = PlayerImage::bare(
            self.rng.gen_range(0..100),
            self.rng.gen_range(0..10),
            self.rng.gen_range(0..10),
            self.rng.gen_range(0..10),
        );
        let image = bare.resolve_equipment(&equipment, &self.content.items);
        let creature = self.spawn(NewCreature {
            name: account.username.clone(),
            image: CreatureImage::Composable(image),
            location: account.location,
            life: DEFAULT_LIFE,
            belongs_to_player: true,
            is_friendly: false,
            friendly_message: None,
            inventory: Some(account.inventory_id),
        })?;
        self.broadcaster
            .bind_player(session, creature, &[inventory.id, equipment.id]);
        self.broadcaster
            .send_to(session, ServerMessage::SetFocus { id: creature });
        for container in [&inventory, &equipment] {
            self.broadcaster.send_to(
                session,
                ServerMessage::Container {
                    id: container.id,
                    kind: container.kind,
                    items: container.items().to_vec(),
                },
            );
        }
        for other in self.creatures.iter() {
            self.broadcaster.send_to(
                session,
                ServerMessage::AddCreature(CreatureSnapshot::from(other)),
            );
        }
        let location = self
            .creatures
            .get(creature)
            .map(|c| c.location)
            .unwrap_or(account.location);
        self.broadcaster.notify_global_except(
            session,
            ServerMessage::chat(format!("{} has joined the game!", account.username), location),
        );
        tracing::info!(session = %session, username = %account.username, "player logged in");
        self.players.insert(session, Player::new(account, creature));
        Ok(())
    }

    /// Tears a session down completely: the creature leaves, the account and
    /// its containers are written, the others are told. Every step runs even
    /// when an earlier one fails.
    pub fn disconnect(&mut self, session: SessionId) {
        let Some(mut player) = self.players.remove(&session) else {
            self.broadcaster.unregister(session);
            return;
        };
        let location = self
            .creatures
            .get(player.creature)
            .map(|c| c.location)
            .unwrap_or(player.account.location);
        player.account.location = location;
        if let Err(err) = self.retire(player.creature) {
            tracing::error!(session = %session, error = %err, "retiring player creature failed");
        }
        if let Err(err) = self.accounts.save(&player.account) {
            tracing::error!(username = %player.username(), error = %err, "saving account failed");
        }
        for container in [player.inventory(), player.equipment()] {
            if let Err(err) = self.containers.save(container) {
                tracing::error!(container = %container, error = %err, "saving container failed");
            }
        }
        self.broadcaster.unregister(session);
        self.announce(format!("{} has left the building.", player.username()));
        self.broadcaster
            .notify_area(location, ServerMessage::animation("WarpOut", location));
        tracing::info!(session = %session, username = %player.username(), "player logged out");
    }

    fn player_parts(&self, session: SessionId) -> Option<(CreatureId, ContainerId, ContainerId)> {
        self.players
            .get(&session)
            .map(|player| (player.creature, player.inventory(), player.equipment()))
    }

    /// Recomputes the composable image from the worn equipment.
    pub fn refresh_player_image(&mut self, session: SessionId) -> Result<(), ContainerError> {
        let Some((creature, _, equipment)) = self.player_parts(session) else {
            return Ok(());
        };
        let Some(CreatureImage::Composable(current)) = self.creatures.get(creature).map(|c| c.image)
        else {
            return Ok(());
        };
        let equipment = self.containers.get(equipment)?;
        let image = current.resolve_equipment(equipment, &self.content.items);
        self.update_creature_image(creature, CreatureImage::Composable(image));
        Ok(())
    }

    /// Moves a wearable item from an inventory slot into its equipment spot,
    /// swapping out whatever was worn there.
    pub fn equip(&mut self, session: SessionId, slot: usize) -> Result<(), ContainerError> {
        let Some((_, inventory, equipment)) = self.player_parts(session) else {
            return Ok(());
        };
        let item = self
            .containers
            .get(inventory)?
            .get(slot)
            .copied()
            .ok_or(ContainerError::SlotOutOfRange {
                container: inventory,
                index: slot,
            })?;
        if item.is_none() {
            return Ok(());
        }
        let Some(spot) = self.content.items.get(item.item).equip_spot() else {
            self.tell(session, "You cannot equip that.");
            return Ok(());
        };
        let worn = self
            .containers
            .get(equipment)?
            .get(spot.index())
            .copied()
            .unwrap_or(ItemInstance::NONE);
        let remaining = item.reduced(1);
        let returned = if worn.is_none() {
            None
        } else if remaining.is_none() {
            Some((slot, worn))
        } else {
            let mut probe = self.containers.get(inventory)?.clone();
            probe.set(slot, remaining);
            let Some(index) = probe.add(worn, &self.content.items) else {
                self.tell(session, "Your inventory is full.");
                return Ok(());
            };
            Some((index, probe.get(index).copied().unwrap_or(worn)))
        };
        self.set_container_slot(inventory, slot, remaining)?;
        if let Some((index, placed)) = returned {
            self.set_container_slot(inventory, index, placed)?;
        }
        self.set_container_slot(equipment, spot.index(), item.with_quantity(1))?;
        self.refresh_player_image(session)
    }

    pub fn unequip(&mut self, session: SessionId, slot: usize) -> Result<(), ContainerError> {
        let Some((_, inventory, equipment)) = self.player_parts(session) else {
            return Ok(());
        };
        if ArmorSpot::from_index(slot).is_none() {
            return Err(ContainerError::SlotOutOfRange {
                container: equipment,
                index: slot,
            });
        }
        let worn = self
            .containers
            .get(equipment)?
            .get(slot)
            .copied()
            .unwrap_or(ItemInstance::NONE);
        if worn.is_none() {
            return Ok(());
        }
        let mut probe = self.containers.get(inventory)?.clone();
        let Some(index) = probe.add(worn, &self.content.items) else {
            self.tell(session, "Your inventory is full.");
            return Ok(());
        };
        let placed = probe.get(index).copied().unwrap_or(worn);
        self.set_container_slot(equipment, slot, ItemInstance::NONE)?;
        self.set_container_slot(inventory, index, placed)?;
        self.refresh_player_image(session)
    }

    /// Lets a session watch a container. Anyone may look into a world drop;
    /// inventories and equipment stay private to their owner.
    pub fn open_container(&mut self, session: SessionId, id: ContainerId) -> Result<(), ContainerError> {
        let Some(player) = self.players.get(&session) else {
            return Ok(());
        };
        let owned = player.inventory() == id || player.equipment() == id;
        let container = self.containers.get(id)?;
        if !owned && container.kind != ContainerKind::WorldDrop {
            self.tell(session, "You cannot open that.");
            return Ok(());
        }
        let message = ServerMessage::Container {
            id,
            kind: container.kind,
            items: container.items().to_vec(),
        };
        if let Some(player) = self.players.get_mut(&session) {
            if !owned {
                player.opened_containers.insert(id);
            }
        }
        self.broadcaster.watch_container(session, id);
        self.broadcaster.send_to(session, message);
        Ok(())
    }

    pub fn close_container(&mut self, session: SessionId, id: ContainerId) {
        let Some(player) = self.players.get_mut(&session) else {
            return;
        };
        if player.opened_containers.remove(&id) {
            self.broadcaster.unwatch_container(session, id);
        }
    }

    /// Subscribes the session to a sector and sends its tiles and creatures.
    pub fn request_sector(&mut self, session: SessionId, index: SectorIndex) -> Result<(), CreatureError> {
        self.map.sector(index)?;
        self.adopt_restored();
        let sector = self.map.sector(index)?;
        let tiles: Vec<Tile> = sector.tiles().map(|(_, tile)| *tile).collect();
        let occupants: Vec<CreatureId> = tiles.iter().filter_map(|tile| tile.creature).collect();
        self.broadcaster.load_sector(session, index);
        self.broadcaster
            .send_to(session, ServerMessage::sector_data(index, &tiles));
        for id in occupants {
            if let Some(creature) = self.creatures.get(id) {
                self.broadcaster.send_to(
                    session,
                    ServerMessage::AddCreature(CreatureSnapshot::from(creature)),
                );
            }
        }
        Ok(())
    }

    /// Dispatches one decoded client command. Problems the player caused come
    /// back as chat; storage trouble is also logged.
    pub fn handle_command(&mut self, session: SessionId, command: ClientCommand) {
        match command {
            ClientCommand::Login { username, password } => {
                if let Err(err) = self.login(session, &username, &password) {
                    self.report_auth_failure(session, &username, err);
                }
            }
            ClientCommand::Register { username, password } => {
                if let Err(err) = self.register(session, &username, &password) {
                    self.report_auth_failure(session, &username, err);
                }
            }
            ClientCommand::RequestSector { index } => {
                if let Err(err) = self.request_sector(session, index) {
                    self.report(session, err);
                }
            }
            ClientCommand::UnloadSector { index } => self.broadcaster.unload_sector(session, index),
            command => {
                let Some(creature) = self.players.get(&session).map(|p| p.creature) else {
                    self.tell(session, "Log in first.");
                    return;
                };
                self.handle_player_command(session, creature, command);
            }
        }
        self.adopt_restored();
    }

    fn handle_player_command(&mut self, session: SessionId, creature: CreatureId, command: ClientCommand) {
        let result: Result<(), CreatureError> = match command {
            ClientCommand::Chat { text } => {
                self.chat(session, &text);
                Ok(())
            }
            ClientCommand::UseItem {
                tool,
                focus,
                use_index,
                destination,
            } => {
                self.use_item(session, use_index as usize, tool, focus, destination);
                Ok(())
            }
            ClientCommand::Equip { slot } => self.equip(session, slot as usize).map_err(Into::into),
            ClientCommand::Unequip { slot } => self.unequip(session, slot as usize).map_err(Into::into),
            ClientCommand::Walk { direction } => self.walk(creature, direction).map(|_| ()),
            ClientCommand::MoveItem { from, to } => {
                self.handle_move_item(session, from, to);
                Ok(())
            }
            ClientCommand::OpenContainer { id } => self.open_container(session, id).map_err(Into::into),
            ClientCommand::CloseContainer { id } => {
                self.close_container(session, id);
                Ok(())
            }
            ClientCommand::Login { .. }
            | ClientCommand::Register { .. }
            | ClientCommand::RequestSector { .. }
            | ClientCommand::UnloadSector { .. } => Ok(()),
        };
        if let Err(err) = result {
            self.report(session, err);
        }
    }

    pub(crate) fn report(&self, session: SessionId, err: CreatureError) {
        match &err {
            CreatureError::Map(_) | CreatureError::Container(ContainerError::Storage(_)) => {
                tracing::error!(session = %session, error = %err, "command failed");
            }
            _ => tracing::debug!(session = %session, error = %err, "command rejected"),
        }
        self.tell(session, err.to_string());
    }

    fn report_auth_failure(&self, session: SessionId, username: &str, err: AuthError) {
        match &err {
            AuthError::Storage(_) | AuthError::Container(_) | AuthError::Map(_) => {
                tracing::error!(session = %session, username, error = %err, "login failed");
            }
            _ => tracing::info!(session = %session, username, reason = %err, "login refused"),
        }
        self.tell(session, err.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::coord::Coord;
    use crate::entities::creature::CreatureRecord;
    use crate::world::sector::{SectorRecord, TileRecord};
    use crate::world::sector_store::{MemorySectorStorage, SectorStorage};
    use crate::world::testing::{chat_lines, drain, TestWorld, GOLD, HELMET, SWORD};
    use std::sync::mpsc::channel;
    use std::sync::Arc;

    /// A 10x10 grass sector with a rat on the given row-major tile.
    fn sector_with_rat(tile: usize) -> SectorRecord {
        let mut tiles = vec![
            TileRecord {
                floor: 1,
                item: ItemInstance::NONE,
                creature: None,
            };
            100
        ];
        tiles[tile].creature = Some(CreatureRecord {
            name: "Rat".to_string(),
            image: CreatureImage::fixed(40),
            is_friendly: false,
            friendly_message: None,
            life: 20,
        });
        SectorRecord {
            sector_size: 10,
            tiles,
        }
    }

    #[test]
    fn connect_sends_initialize() {
        let mut test = TestWorld::new();
        let (tx, rx) = channel();
        test.world.connect(tx);
        assert!(matches!(
            rx.try_recv(),
            Ok(ServerMessage::Initialize { size: 40, sector_size: 10, .. })
        ));
    }

    #[test]
    fn first_account_is_admin_and_gets_starter_kit() {
        let mut test = TestWorld::with_starter_items(vec![GOLD, SWORD]);
        let (first, _rx) = test.login("anna");
        let (second, _rx2) = test.login("bert");
        assert!(test.world.player(first).expect("anna").is_admin());
        assert!(!test.world.player(second).expect("bert").is_admin());

        let inventory = test.world.player(first).expect("anna").inventory();
        let container = test.world.containers.get(inventory).expect("inventory");
        assert_eq!(container.len(), INVENTORY_SIZE);
        assert_eq!(container.get(0).map(|i| (i.item, i.quantity)), Some((GOLD, 999)));
        assert_eq!(container.get(1).map(|i| (i.item, i.quantity)), Some((SWORD, 1)));
    }

    #[test]
    fn registration_rules() {
        let mut test = TestWorld::new();
        let (tx, _rx) = channel();
        let session = test.world.connect(tx);
        assert!(matches!(
            test.world.register(session, "ab", "pw"),
            Err(AuthError::UsernameTooShort)
        ));
        test.world.register(session, "anna", "pw").expect("register");
        let (tx, _rx) = channel();
        let other = test.world.connect(tx);
        assert!(matches!(
            test.world.register(other, "anna", "pw"),
            Err(AuthError::DuplicateUser)
        ));
        assert!(matches!(
            test.world.login(other, "anna", "pw"),
            Err(AuthError::AlreadyOnline)
        ));
    }

    #[test]
    fn login_sequence_and_join_announcement() {
        let mut test = TestWorld::new();
        let (_anna, anna_rx) = test.login("anna");
        drain(&anna_rx);
        let (tx, rx) = channel();
        let session = test.world.connect(tx);
        test.world.register(session, "bert", "pw").expect("register");
        let messages = drain(&rx);
        assert!(matches!(messages[0], ServerMessage::Initialize { .. }));
        assert!(matches!(messages[1], ServerMessage::SetFocus { .. }));
        assert!(matches!(
            messages[2],
            ServerMessage::Container { kind: ContainerKind::Inventory, .. }
        ));
        assert!(matches!(
            messages[3],
            ServerMessage::Container { kind: ContainerKind::Equipment, .. }
        ));
        let snapshots = messages
            .iter()
            .filter(|m| matches!(m, ServerMessage::AddCreature(_)))
            .count();
        assert_eq!(snapshots, 2);
        assert_eq!(chat_lines(&anna_rx), vec!["bert has joined the game!".to_string()]);
    }

    #[test]
    fn disconnect_saves_and_announces() {
        let mut test = TestWorld::new();
        let (_anna, anna_rx) = test.login("anna");
        let (bert, _bert_rx) = test.login("bert");
        let creature = test.creature_of(bert);
        test.world
            .move_creature(creature, Coord::new(25, 25, 0), 0, true)
            .expect("move");
        drain(&anna_rx);

        test.world.disconnect(bert);

        assert!(!test.world.creatures.contains(creature));
        assert!(test.world.player(bert).is_none());
        assert!(!test.world.broadcaster.is_registered(bert));
        let saved = test.world.accounts.load("bert").expect("load").expect("account");
        assert_eq!(saved.location, Coord::new(25, 25, 0));
        assert_eq!(chat_lines(&anna_rx), vec!["bert has left the building.".to_string()]);
    }

    #[test]
    fn equip_and_unequip_update_the_image() {
        let mut test = TestWorld::new();
        let (session, rx) = test.login("anna");
        let player = test.world.player(session).expect("player").clone();
        test.world
            .set_container_slot(player.inventory(), 3, ItemInstance::new(HELMET, 1))
            .expect("helmet");
        let sector = test.world.map.sector_index_of(test.world.session_location(session));
        test.world.broadcaster.load_sector(session, sector);
        drain(&rx);

        test.world.equip(session, 3).expect("equip");
        let worn = test.world.containers.get(player.equipment()).expect("eq").get(0).copied();
        assert_eq!(worn.map(|i| i.item), Some(HELMET));
        let image = test.world.creatures.get(player.creature).map(|c| c.image);
        assert!(matches!(
            image,
            Some(CreatureImage::Composable(PlayerImage { head: 77, .. }))
        ));
        assert!(drain(&rx)
            .iter()
            .any(|m| matches!(m, ServerMessage::UpdateCreatureImage { .. })));

        test.world.unequip(session, 0).expect("unequip");
        let slot = test.world.containers.get(player.inventory()).expect("inv").get(0).copied();
        assert_eq!(slot.map(|i| i.item), Some(HELMET));
        let image = test.world.creatures.get(player.creature).map(|c| c.image);
        let Some(CreatureImage::Composable(parts)) = image else {
            panic!("player image should stay composable");
        };
        assert_eq!(parts.head, parts.bare_head);
    }

    #[test]
    fn equipping_takes_one_from_a_stack() {
        let mut test = TestWorld::new();
        let (session, rx) = test.login("anna");
        let player = test.world.player(session).expect("player").clone();
        test.world
            .set_container_slot(player.inventory(), 3, ItemInstance::new(HELMET, 3))
            .expect("helmets");
        test.world.equip(session, 3).expect("equip");

        let head = ArmorSpot::Head.index();
        let worn = test.world.containers.get(player.equipment()).expect("eq").get(head).copied();
        assert_eq!(worn, Some(ItemInstance::new(HELMET, 1)));
        let left = test.world.containers.get(player.inventory()).expect("inv").get(3).copied();
        assert_eq!(left, Some(ItemInstance::new(HELMET, 2)));

        for slot in 0..INVENTORY_SIZE {
            if slot != 3 {
                test.world
                    .set_container_slot(player.inventory(), slot, ItemInstance::new(SWORD, 1))
                    .expect("fill");
            }
        }
        drain(&rx);
        test.world.equip(session, 3).expect("equip again");
        assert_eq!(chat_lines(&rx), vec!["Your inventory is full.".to_string()]);
        let left = test.world.containers.get(player.inventory()).expect("inv").get(3).copied();
        assert_eq!(left, Some(ItemInstance::new(HELMET, 2)));
        let worn = test.world.containers.get(player.equipment()).expect("eq").get(head).copied();
        assert_eq!(worn, Some(ItemInstance::new(HELMET, 1)));
    }

    #[test]
    fn unequip_into_full_inventory_is_refused() {
        let mut test = TestWorld::new();
        let (session, rx) = test.login("anna");
        let player = test.world.player(session).expect("player").clone();
        for slot in 0..INVENTORY_SIZE {
            test.world
                .set_container_slot(player.inventory(), slot, ItemInstance::new(SWORD, 1))
                .expect("fill");
        }
        test.world
            .set_container_slot(player.equipment(), ArmorSpot::Head.index(), ItemInstance::new(HELMET, 1))
            .expect("wear");
        drain(&rx);
        test.world.unequip(session, ArmorSpot::Head.index()).expect("unequip");
        assert_eq!(chat_lines(&rx), vec!["Your inventory is full.".to_string()]);
        let worn = test.world.containers.get(player.equipment()).expect("eq").get(0).copied();
        assert_eq!(worn.map(|i| i.item), Some(HELMET));
    }

    #[test]
    fn sector_request_subscribes_and_sends_tiles() {
        let mut test = TestWorld::new();
        let (session, rx) = test.login("anna");
        drain(&rx);
        let index = SectorIndex::new(1, 1, 0);
        test.world.request_sector(session, index).expect("sector");
        assert!(test.world.broadcaster.has_sector_loaded(session, index));
        let messages = drain(&rx);
        assert!(matches!(
            &messages[0],
            ServerMessage::SectorData { tiles, .. } if tiles.len() == 100
        ));

        test.world.handle_command(session, ClientCommand::UnloadSector { index });
        assert!(!test.world.broadcaster.has_sector_loaded(session, index));
        test.world
            .handle_command(session, ClientCommand::RequestSector { index: SectorIndex::new(9, 0, 0) });
        assert_eq!(chat_lines(&rx).len(), 1);
    }

    #[test]
    fn requested_sector_brings_its_stored_creatures() {
        let storage = Arc::new(MemorySectorStorage::new());
        let index = SectorIndex::new(2, 2, 0);
        storage.insert(index, sector_with_rat(33));
        let mut test = TestWorld::with_sectors(Box::new(Arc::clone(&storage)));
        let (session, rx) = test.login("anna");
        drain(&rx);

        test.world.request_sector(session, index).expect("sector");
        assert_eq!(test.world.creatures.len(), 2);
        let rats: Vec<Coord> = drain(&rx)
            .into_iter()
            .filter_map(|message| match message {
                ServerMessage::AddCreature(snapshot) if snapshot.name == "Rat" => Some(snapshot.location),
                _ => None,
            })
            .collect();
        assert_eq!(rats, vec![Coord::new(23, 23, 0)]);
    }

    #[test]
    fn save_keeps_creatures_of_sectors_nobody_requested() {
        let storage = Arc::new(MemorySectorStorage::new());
        let index = SectorIndex::new(2, 2, 0);
        storage.insert(index, sector_with_rat(33));
        let mut test = TestWorld::with_sectors(Box::new(Arc::clone(&storage)));
        test.world.map.tile(Coord::new(23, 23, 0)).expect("tile");

        test.world.save().expect("save");
        let record = storage.load(index).expect("load").expect("stored");
        let rats = record.tiles.iter().filter(|tile| tile.creature.is_some()).count();
        assert_eq!(rats, 1);
        assert_eq!(test.world.creatures.len(), 1);
    }

    #[test]
    fn guests_must_log_in_first() {
        let mut test = TestWorld::new();
        let (tx, rx) = channel();
        let session = test.world.connect(tx);
        drain(&rx);
        test.world
            .handle_command(session, ClientCommand::Chat { text: "hi".to_string() });
        assert_eq!(chat_lines(&rx), vec!["Log in first.".to_string()]);
        test.world.handle_command(
            session,
            ClientCommand::Login {
                username: "nobody".to_string(),
                password: "pw".to_string(),
            },
        );
        assert_eq!(chat_lines(&rx), vec!["Bad user/password.".to_string()]);
    }
}
