use crate::admin::commands::{parse_command, ChatCommand, ItemSpec, INVALID_COMMAND, INVALID_QUANTITY};
use crate::entities::creature::{CreatureId, CreatureImage, PlayerImage};
use crate::entities::item::{ItemInstance, MAX_STACK};
use crate::net::broadcast::SessionId;
use crate::net::protocol::ServerMessage;
use crate::world::coord::Coord;
use crate::world::creatures::CreatureError;
use crate::world::error::MapError;
use crate::world::state::World;
use rand::Rng;

/// Damage dealt by `!die` and `!kill`; enough for anything.
const FATAL_DAMAGE: i32 = 100_000;
/// `!item` drops within this many tiles of the player.
const ITEM_RANGE: i32 = 3;
/// `!clr` wipes this many tiles per side around the player.
const CLEAR_SPAN: i32 = 20;

impl World {
    /// Handles one line of player chat: `!` commands run, anything else is
    /// said out loud to everyone online.
    pub fn chat(&mut self, session: SessionId, text: &str) {
        let Some(player) = self.players.get(&session) else {
            return;
        };
        let name = player.username().to_string();
        let is_admin = player.is_admin();
        let creature = player.creature;
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        match parse_command(text) {
            Ok(None) => {
                let location = self.session_location(session);
                self.broadcaster
                    .notify_global(ServerMessage::chat(format!("{name} says: {text}"), location));
            }
            Ok(Some(command)) => {
                if command.requires_admin() && !is_admin {
                    tracing::info!(session = %session, username = %name, command = text, "non-admin used admin command");
                    self.tell(session, INVALID_COMMAND);
                } else if let Err(err) = self.run_chat_command(session, creature, command) {
                    self.report(session, err);
                }
                self.tell(session, format!("Command: {text}"));
            }
            Err(reason) => {
                self.tell(session, reason);
                self.tell(session, format!("Command: {text}"));
            }
        }
    }

    fn run_chat_command(
        &mut self,
        session: SessionId,
        creature: CreatureId,
        command: ChatCommand,
    ) -> Result<(), CreatureError> {
        let location = self.session_location(session);
        match command {
            ChatCommand::Location => self.tell(session, format!("You are at: {location}")),
            ChatCommand::Online => {
                let names = self.online_names().join(", ");
                self.tell(session, format!("Players online: {names}"));
            }
            ChatCommand::Warp { destination } => {
                if !self.geometry().in_bounds(destination) {
                    self.tell(session, "Invalid location.");
                    return Ok(());
                }
                self.teleport(creature, destination)?;
            }
            ChatCommand::Teleport { target } => {
                let Some(destination) = self
                    .session_named(&target)
                    .map(|other| self.session_location(other))
                else {
                    self.tell(session, "Invalid player.");
                    return Ok(());
                };
                self.teleport(creature, destination)?;
            }
            ChatCommand::Die => self.hurt(creature, FATAL_DAMAGE)?,
            ChatCommand::Kill => {
                let target = self.map.wrap(location.offset(0, 1, 0));
                match self.map.creature(target)? {
                    Some(victim) => self.hurt(victim, FATAL_DAMAGE)?,
                    None => self.tell(session, "There is nothing to kill."),
                }
            }
            ChatCommand::Image {
                image,
                width,
                height,
            } => self.change_own_image(session, creature, image, width, height)?,
            ChatCommand::Save => {
                self.save().map_err(MapError::from)?;
            }
            ChatCommand::Item { item, quantity } => self.create_item(session, location, item, quantity)?,
            ChatCommand::Delete => self.change_item(location, ItemInstance::NONE)?,
            ChatCommand::Clear => {
                let half = CLEAR_SPAN / 2;
                for dy in -half..CLEAR_SPAN - half {
                    for dx in -half..CLEAR_SPAN - half {
                        let coord = self.map.wrap(location.offset(dx, dy, 0));
                        if !self.map.item(coord)?.is_none() {
                            self.change_item(coord, ItemInstance::NONE)?;
                        }
                    }
                }
            }
            ChatCommand::Monster { id } => self.spawn_from_catalog(session, location, id, None)?,
            ChatCommand::Friendly { id, message } => {
                self.spawn_from_catalog(session, location, id, Some(message))?
            }
            ChatCommand::Admin { target } => self.promote(session, &target)?,
        }
        Ok(())
    }

    fn change_own_image(
        &mut self,
        session: SessionId,
        creature: CreatureId,
        image: u32,
        width: u8,
        height: u8,
    ) -> Result<(), CreatureError> {
        if image != 0 {
            self.update_creature_image(
                creature,
                CreatureImage::Fixed {
                    image,
                    width,
                    height,
                },
            );
            return Ok(());
        }
        if !matches!(
            self.creatures.get(creature).map(|c| c.image),
            Some(CreatureImage::Composable(_))
        ) {
            let bare = PlayerImage::bare(
                self.rng.gen_range(0..100),
                self.rng.gen_range(0..10),
                self.rng.gen_range(0..10),
                self.rng.gen_range(0..10),
            );
            if let Some(existing) = self.creatures.get_mut(creature) {
                existing.image = CreatureImage::Composable(bare);
            }
        }
        self.refresh_player_image(session)?;
        Ok(())
    }

    fn create_item(
        &mut self,
        session: SessionId,
        location: Coord,
        spec: ItemSpec,
        quantity: u32,
    ) -> Result<(), CreatureError> {
        let definition = match &spec {
            ItemSpec::Id(id) if self.content.items.contains(*id) => Some(self.content.items.get(*id)),
            ItemSpec::Id(_) => None,
            ItemSpec::Name(name) => self.content.items.find_by_name(name),
        };
        let Some(definition) = definition else {
            self.tell(session, "Invalid item.");
            return Ok(());
        };
        if quantity >= MAX_STACK || (!definition.stackable && quantity > 1) {
            self.tell(session, INVALID_QUANTITY);
            return Ok(());
        }
        let item = ItemInstance::new(definition.id, quantity);
        if self.add_item_near(location, item, ITEM_RANGE, true)?.is_none() {
            self.tell(session, "There is no room for that.");
        }
        Ok(())
    }

    fn spawn_from_catalog(
        &mut self,
        session: SessionId,
        location: Coord,
        id: u32,
        friendly_message: Option<String>,
    ) -> Result<(), CreatureError> {
        let Some(definition) = self.content.monsters.get(id).cloned() else {
            self.tell(session, "Invalid monster.");
            return Ok(());
        };
        let friendly = friendly_message.is_some();
        let spawned = self.spawn_monster(&definition, location, friendly)?;
        if let Some(creature) = self.creatures.get_mut(spawned) {
            creature.friendly_message = friendly_message;
        }
        Ok(())
    }

    fn promote(&mut self, session: SessionId, target: &str) -> Result<(), CreatureError> {
        let online = self.session_named(target);
        let account = match online.and_then(|other| self.players.get_mut(&other)) {
            Some(player) => {
                player.account.is_admin = true;
                Some(player.account.clone())
            }
            None => self
                .accounts
                .load(target)
                .map_err(MapError::from)?
                .map(|mut account| {
                    account.is_admin = true;
                    account
                }),
        };
        let Some(account) = account else {
            self.tell(session, "Invalid player.");
            return Ok(());
        };
        self.accounts.save(&account).map_err(MapError::from)?;
        tracing::info!(username = %account.username, "promoted to admin");
        self.tell(session, format!("{} is now an admin.", account.username));
        Ok(())
    }
}
