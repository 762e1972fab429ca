use crate::entities::container::{ContainerError, ContainerId, ContainerKind};
use crate::entities::item::ItemInstance;
use crate::net::broadcast::SessionId;
use crate::net::protocol::{ItemSource, ServerMessage};
use crate::world::coord::Coord;
use crate::world::error::MapError;
use crate::world::state::World;

/// Range searched when a dying creature's belongings hit the ground.
pub const DEATH_DROP_RANGE: i32 = 10;

/// A resolved item position, shared by every read and write path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemLocation {
    World(Coord),
    ContainerSlot(ContainerId, usize),
}

#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error("There is nothing there.")]
    Nothing,
    #[error("You cannot move that.")]
    NotMoveable,
    #[error("There is no room there.")]
    NoRoom,
    #[error("Use equip and unequip for that.")]
    EquipmentSlot,
    #[error("You cannot reach that container.")]
    NoAccess(ContainerId),
    #[error("index {0} is outside the world")]
    BadIndex(u32),
    #[error(transparent)]
    Map(#[from] MapError),
    #[error(transparent)]
    Container(#[from] ContainerError),
}

impl World {
    /// Turns a client-supplied source into a location this session may touch.
    /// Bare hands resolve to `None`.
    pub fn resolve_source(
        &self,
        session: SessionId,
        source: ItemSource,
    ) -> Result<Option<ItemLocation>, ItemError> {
        match source {
            ItemSource::Hand => Ok(None),
            ItemSource::World(index) => {
                if index >= self.geometry().volume() as u32 {
                    return Err(ItemError::BadIndex(index));
                }
                Ok(Some(ItemLocation::World(self.map.coord_from_index(index))))
            }
            ItemSource::Container(id, slot) => {
                let allowed = self
                    .players
                    .get(&session)
                    .is_some_and(|player| player.can_access(id));
                if !allowed {
                    return Err(ItemError::NoAccess(id));
                }
                Ok(Some(ItemLocation::ContainerSlot(id, slot as usize)))
            }
        }
    }

    pub fn read_item(&mut self, location: ItemLocation) -> Result<ItemInstance, ItemError> {
        match location {
            ItemLocation::World(coord) => Ok(self.map.item(coord)?),
            ItemLocation::ContainerSlot(id, index) => {
                let container = self.containers.get(id)?;
                container
                    .get(index)
                    .copied()
                    .ok_or(ItemError::Container(ContainerError::SlotOutOfRange {
                        container: id,
                        index,
                    }))
            }
        }
    }

    /// Replaces whatever is at `location` and tells the watchers.
    pub fn write_item(&mut self, location: ItemLocation, item: ItemInstance) -> Result<(), ItemError> {
        match location {
            ItemLocation::World(coord) => self.change_item(coord, item)?,
            ItemLocation::ContainerSlot(id, index) => self.set_container_slot(id, index, item)?,
        }
        Ok(())
    }

    pub fn set_container_slot(
        &mut self,
        id: ContainerId,
        index: usize,
        item: ItemInstance,
    ) -> Result<(), ContainerError> {
        let container = self.containers.get_mut(id)?;
        if !container.set(index, item) {
            return Err(ContainerError::SlotOutOfRange {
                container: id,
                index,
            });
        }
        self.update_container_slot(id, index);
        Ok(())
    }

    pub fn update_container_slot(&self, id: ContainerId, index: usize) {
        let Some(item) = self.containers.loaded(id).and_then(|c| c.get(index)).copied() else {
            return;
        };
        self.broadcaster.notify_container(
            id,
            ServerMessage::UpdateContainerSlot {
                container: id,
                index: index as u16,
                item,
            },
        );
    }

    /// Sends the tile's current floor and item to everyone viewing it.
    pub fn update_tile(&mut self, coord: Coord) -> Result<(), MapError> {
        let coord = self.map.wrap(coord);
        let tile = self.map.tile(coord)?;
        self.broadcaster
            .notify_area(coord, ServerMessage::update_tile(coord, &tile));
        Ok(())
    }

    pub fn change_item(&mut self, coord: Coord, item: ItemInstance) -> Result<(), MapError> {
        self.map.set_item(coord, item)?;
        self.update_tile(coord)
    }

    pub fn change_floor(&mut self, coord: Coord, floor: u32) -> Result<(), MapError> {
        self.map.set_floor(coord, floor)?;
        self.update_tile(coord)
    }

    /// Places `item` on the tile if it is empty or the stacks merge.
    pub fn add_item_at(&mut self, coord: Coord, item: ItemInstance) -> Result<bool, MapError> {
        if item.is_none() {
            return Ok(false);
        }
        let coord = self.map.wrap(coord);
        let existing = self.map.item(coord)?;
        if !self.content.items.accepts(&existing, &item) {
            return Ok(false);
        }
        self.change_item(coord, item.merged_onto(&existing))?;
        Ok(true)
    }

    /// Ring search around `origin` out to `range`; returns where the item
    /// landed. `None` means nothing within range could take it and the item
    /// was not placed.
    pub fn add_item_near(
        &mut self,
        origin: Coord,
        item: ItemInstance,
        range: i32,
        include_origin: bool,
    ) -> Result<Option<Coord>, MapError> {
        for position in self
            .geometry()
            .ring_positions(origin, range, include_origin)
        {
            if self.add_item_at(position, item)? {
                return Ok(Some(position));
            }
        }
        Ok(None)
    }

    /// Add-near for items that have nowhere else to go. An item that finds no
    /// room is destroyed; the return value says whether it survived.
    pub fn drop_item_near(
        &mut self,
        origin: Coord,
        item: ItemInstance,
        range: i32,
    ) -> Result<bool, MapError> {
        if self.add_item_near(origin, item, range, true)?.is_some() {
            return Ok(true);
        }
        tracing::warn!(
            item = %item.item,
            quantity = item.quantity,
            origin = %origin,
            range,
            "no room to drop item, destroyed"
        );
        Ok(false)
    }

    /// Empties a container onto the ground around `origin`. Returns how many
    /// stacks were lost for lack of room.
    pub fn drop_container_near(
        &mut self,
        id: ContainerId,
        origin: Coord,
        range: i32,
    ) -> Result<usize, ItemError> {
        let items = self.containers.get_mut(id)?.drain_items();
        let slots = self.containers.loaded(id).map_or(0, |c| c.len());
        for index in 0..slots {
            self.update_container_slot(id, index);
        }
        let mut lost = 0;
        for item in items {
            if !self.drop_item_near(origin, item, range)? {
                lost += 1;
            }
        }
        Ok(lost)
    }

    /// Moves a whole stack between tiles and container slots.
    ///
    /// A world-to-world move only lands on an empty tile. Anything else lands
    /// where the stack can merge, falling back to the container's first free
    /// slot. Equipment is handled by equip/unequip.
    pub fn move_item(&mut self, from: ItemLocation, to: ItemLocation) -> Result<(), ItemError> {
        if from == to {
            return Ok(());
        }
        for location in [from, to] {
            if let ItemLocation::ContainerSlot(id, _) = location {
                if self.containers.get(id)?.kind == ContainerKind::Equipment {
                    return Err(ItemError::EquipmentSlot);
                }
            }
        }
        let item = self.read_item(from)?;
        if item.is_none() {
            return Err(ItemError::Nothing);
        }
        if !self.content.items.get(item.item).moveable {
            return Err(ItemError::NotMoveable);
        }
        let target = self.move_target(from, to, &item)?;
        if target == from {
            return Ok(());
        }
        let existing = self.read_item(target)?;
        self.write_item(from, ItemInstance::NONE)?;
        self.write_item(target, item.merged_onto(&existing))?;
        Ok(())
    }

    fn move_target(
        &mut self,
        from: ItemLocation,
        to: ItemLocation,
        item: &ItemInstance,
    ) -> Result<ItemLocation, ItemError> {
        let existing = self.read_item(to)?;
        match (from, to) {
            (ItemLocation::World(_), ItemLocation::World(_)) => {
                if existing.is_none() {
                    Ok(to)
                } else {
                    Err(ItemError::NoRoom)
                }
            }
            (_, ItemLocation::World(_)) => {
                if self.content.items.accepts(&existing, item) {
                    Ok(to)
                } else {
                    Err(ItemError::NoRoom)
                }
            }
            (_, ItemLocation::ContainerSlot(id, _)) => {
                if self.content.items.accepts(&existing, item) {
                    return Ok(to);
                }
                let mut probe = self.containers.get(id)?.clone();
                probe
                    .add(*item, &self.content.items)
                    .map(|index| ItemLocation::ContainerSlot(id, index))
                    .ok_or(ItemError::NoRoom)
            }
        }
    }

    /// Ages every growing item on resident tiles and swaps in successors that
    /// came of age. Returns how many items changed into something else.
    pub fn grow(&mut self) -> usize {
        let catalog = &self.content.items;
        let mut grown = Vec::new();
        self.map.for_each_loaded_tile_mut(|coord, tile| {
            let definition = catalog.get(tile.item.item);
            if definition.growth_delta == 0 {
                return;
            }
            tile.item.age += 1;
            if tile.item.age >= definition.growth_delta {
                tile.item = ItemInstance::new(definition.growth_item, 1);
                grown.push(coord);
            }
        });
        for coord in &grown {
            if let Err(err) = self.update_tile(*coord) {
                tracing::warn!(coord = %coord, error = %err, "growth update failed");
            }
        }
        grown.len()
    }

    /// Session-facing move: resolves both ends and reports problems by chat.
    pub fn handle_move_item(&mut self, session: SessionId, from: ItemSource, to: ItemSource) {
        if let Err(err) = self.move_between_sources(session, from, to) {
            tracing::debug!(session = %session, error = %err, "move item rejected");
            self.tell(session, err.to_string());
        }
    }

    fn move_between_sources(
        &mut self,
        session: SessionId,
        from: ItemSource,
        to: ItemSource,
    ) -> Result<(), ItemError> {
        let from = self
            .resolve_source(session, from)?
            .ok_or(ItemError::Nothing)?;
        let to = self.resolve_source(session, to)?.ok_or(ItemError::Nothing)?;
        self.move_item(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::testing::{drain, TestWorld, GOLD, ROCK, SWORD};

    #[test]
    fn stack_cap_rejects_and_leaves_tile_alone() {
        let mut test = TestWorld::new();
        let coord = Coord::new(5, 5, 0);
        test.world
            .map
            .set_item(coord, ItemInstance::new(GOLD, 950))
            .expect("seed");
        assert!(!test
            .world
            .add_item_at(coord, ItemInstance::new(GOLD, 60))
            .expect("add"));
        assert_eq!(test.world.map.item(coord).expect("item").quantity, 950);
        assert!(test
            .world
            .add_item_at(coord, ItemInstance::new(GOLD, 49))
            .expect("add"));
        assert_eq!(test.world.map.item(coord).expect("item").quantity, 999);
    }

    #[test]
    fn add_near_with_zero_range() {
        let mut test = TestWorld::new();
        let coord = Coord::new(3, 3, 0);
        let sword = ItemInstance::new(SWORD, 1);
        assert_eq!(
            test.world.add_item_near(coord, sword, 0, false).expect("near"),
            None
        );
        assert_eq!(
            test.world.add_item_near(coord, sword, 0, true).expect("near"),
            Some(coord)
        );
        assert_eq!(
            test.world.add_item_near(coord, sword, 0, true).expect("near"),
            None
        );
    }

    #[test]
    fn add_near_walks_the_first_ring_in_order() {
        let mut test = TestWorld::new();
        let origin = Coord::new(0, 0, 0);
        let rock = ItemInstance::new(ROCK, 1);
        test.world.map.set_item(origin, rock).expect("block");
        let placed = test
            .world
            .add_item_near(origin, ItemInstance::new(SWORD, 1), 1, true)
            .expect("near");
        let size = test.world.meta.size;
        assert_eq!(placed, Some(Coord::new(size - 1, size - 1, 0)));
    }

    #[test]
    fn world_moves_need_an_empty_tile() {
        let mut test = TestWorld::new();
        let from = Coord::new(2, 2, 0);
        let to = Coord::new(2, 3, 0);
        test.world.map.set_item(from, ItemInstance::new(GOLD, 5)).expect("seed");
        test.world.map.set_item(to, ItemInstance::new(GOLD, 5)).expect("seed");
        assert!(matches!(
            test.world
                .move_item(ItemLocation::World(from), ItemLocation::World(to)),
            Err(ItemError::NoRoom)
        ));
        test.world.map.set_item(to, ItemInstance::NONE).expect("clear");
        test.world
            .move_item(ItemLocation::World(from), ItemLocation::World(to))
            .expect("move");
        assert!(test.world.map.item(from).expect("from").is_none());
        assert_eq!(test.world.map.item(to).expect("to").quantity, 5);
    }

    #[test]
    fn world_to_inventory_and_back() {
        let mut test = TestWorld::new();
        let (session, rx) = test.login("anna");
        let inventory = test.world.player(session).expect("player").inventory();
        let ground = Coord::new(9, 9, 0);
        test.world.map.set_item(ground, ItemInstance::new(SWORD, 1)).expect("seed");
        drain(&rx);

        test.world.handle_move_item(
            session,
            ItemSource::World(test.world.map.index_from_coord(ground)),
            ItemSource::Container(inventory, 39),
        );
        assert!(test.world.map.item(ground).expect("ground").is_none());
        let slot = test
            .world
            .containers
            .get(inventory)
            .expect("inventory")
            .get(39)
            .copied();
        assert_eq!(slot.map(|item| item.item), Some(SWORD));
        let updates = drain(&rx);
        assert!(updates
            .iter()
            .any(|m| matches!(m, ServerMessage::UpdateContainerSlot { index: 39, .. })));

        test.world.handle_move_item(
            session,
            ItemSource::Container(inventory, 39),
            ItemSource::World(test.world.map.index_from_coord(ground)),
        );
        assert_eq!(test.world.map.item(ground).expect("ground").item, SWORD);
    }

    #[test]
    fn unmoveable_items_stay() {
        let mut test = TestWorld::new();
        let from = Coord::new(6, 6, 0);
        test.world.map.set_item(from, ItemInstance::new(ROCK, 1)).expect("seed");
        assert!(matches!(
            test.world.move_item(
                ItemLocation::World(from),
                ItemLocation::World(Coord::new(6, 7, 0))
            ),
            Err(ItemError::NotMoveable)
        ));
    }

    #[test]
    fn foreign_containers_are_out_of_reach() {
        let mut test = TestWorld::new();
        let (session, _rx) = test.login("anna");
        assert!(matches!(
            test.world
                .resolve_source(session, ItemSource::Container(ContainerId(999), 0)),
            Err(ItemError::NoAccess(_))
        ));
        assert!(matches!(
            test.world.resolve_source(session, ItemSource::World(u32::MAX)),
            Err(ItemError::BadIndex(_))
        ));
    }
}
