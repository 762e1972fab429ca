use crate::entities::container::ContainerId;
use crate::entities::item::{ItemId, ItemInstance};
use crate::net::broadcast::SessionId;
use crate::net::protocol::{ItemSource, ServerMessage};
use crate::world::coord::Coord;
use crate::world::error::MapError;
use crate::world::items::{ItemError, ItemLocation};
use crate::world::state::World;
use serde::{Deserialize, Serialize};

/// How far from the focus a product may land on the ground.
pub const PRODUCT_RANGE: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseProduct {
    pub item: ItemId,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

/// A declared interaction: using `tool` (or bare hands, id 0) on `focus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUse {
    #[serde(default)]
    pub tool: ItemId,
    pub focus: ItemId,
    #[serde(default)]
    pub tool_quantity_consumed: u32,
    #[serde(default)]
    pub focus_quantity_consumed: u32,
    /// Placed next to the focus, or into the focus's container.
    #[serde(default)]
    pub products: Vec<UseProduct>,
    /// Replaces whatever is left of the tool.
    #[serde(default)]
    pub success_tool: Option<ItemId>,
    #[serde(default)]
    pub surface_ground: Option<u32>,
    #[serde(default)]
    pub animation: Option<String>,
    #[serde(default)]
    pub success_message: Option<String>,
    #[serde(default)]
    pub failure_message: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ItemUseError {
    #[error("There is no such use.")]
    NoSuchUse(usize),
    #[error("You need item {expected} for that, not {found}.")]
    ToolMismatch { expected: ItemId, found: ItemId },
    #[error("That only works on item {expected}, not {found}.")]
    FocusMismatch { expected: ItemId, found: ItemId },
    #[error("You need {needed} of your tool but have {available}.")]
    InsufficientTool { needed: u32, available: u32 },
    #[error("You need {needed} of that but there are {available}.")]
    InsufficientFocus { needed: u32, available: u32 },
    #[error("There is no room for the result.")]
    PlacementFailed,
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Item(#[from] ItemError),
    #[error(transparent)]
    Map(#[from] MapError),
}

/// Decides whether a use may go ahead; the pipeline only executes.
pub trait UseRules {
    fn check(
        &self,
        item_use: &ItemUse,
        tool: &ItemInstance,
        focus: &ItemInstance,
    ) -> Result<(), ItemUseError>;
}

/// Ids must match and both stacks must cover what the use consumes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

impl UseRules for StandardRules {
    fn check(
        &self,
        item_use: &ItemUse,
        tool: &ItemInstance,
        focus: &ItemInstance,
    ) -> Result<(), ItemUseError> {
        if tool.item != item_use.tool {
            return Err(ItemUseError::ToolMismatch {
                expected: item_use.tool,
                found: tool.item,
            });
        }
        if focus.item != item_use.focus {
            return Err(ItemUseError::FocusMismatch {
                expected: item_use.focus,
                found: focus.item,
            });
        }
        if !tool.is_none() && tool.quantity < item_use.tool_quantity_consumed {
            return Err(ItemUseError::InsufficientTool {
                needed: item_use.tool_quantity_consumed,
                available: tool.quantity,
            });
        }
        if focus.quantity < item_use.focus_quantity_consumed {
            return Err(ItemUseError::InsufficientFocus {
                needed: item_use.focus_quantity_consumed,
                available: focus.quantity,
            });
        }
        Ok(())
    }
}

/// Planned writes, applied only once the whole use is known to fit.
/// Later entries for a location supersede earlier ones.
#[derive(Debug, Default)]
struct Staging {
    writes: Vec<(ItemLocation, ItemInstance)>,
}

impl Staging {
    fn get(&self, location: ItemLocation) -> Option<ItemInstance> {
        self.writes
            .iter()
            .rev()
            .find(|(staged, _)| *staged == location)
            .map(|(_, item)| *item)
    }

    fn put(&mut self, location: ItemLocation, item: ItemInstance) {
        self.writes.push((location, item));
    }

    /// Final value per location, in first-touched order.
    fn into_commits(self) -> Vec<(ItemLocation, ItemInstance)> {
        let mut commits: Vec<(ItemLocation, ItemInstance)> = Vec::new();
        for (location, item) in self.writes {
            match commits.iter_mut().find(|(seen, _)| *seen == location) {
                Some(entry) => entry.1 = item,
                None => commits.push((location, item)),
            }
        }
        commits
    }
}

impl World {
    fn staged_item(
        &mut self,
        staging: &Staging,
        location: ItemLocation,
    ) -> Result<ItemInstance, ItemError> {
        match staging.get(location) {
            Some(item) => Ok(item),
            None => self.read_item(location),
        }
    }

    fn stage_product(
        &mut self,
        staging: &mut Staging,
        focus: ItemLocation,
        product: ItemInstance,
    ) -> Result<(), ItemUseError> {
        match focus {
            ItemLocation::World(coord) => {
                for position in self.geometry().ring_positions(coord, PRODUCT_RANGE, true) {
                    let location = ItemLocation::World(position);
                    let existing = self.staged_item(staging, location)?;
                    if self.content.items.accepts(&existing, &product) {
                        staging.put(location, product.merged_onto(&existing));
                        return Ok(());
                    }
                }
                Err(ItemUseError::PlacementFailed)
            }
            ItemLocation::ContainerSlot(id, _) => self.stage_into_container(staging, id, product),
        }
    }

    fn stage_into_container(
        &mut self,
        staging: &mut Staging,
        id: ContainerId,
        product: ItemInstance,
    ) -> Result<(), ItemUseError> {
        let mut probe = self.containers.get(id).map_err(ItemError::from)?.clone();
        for (location, item) in &staging.writes {
            if let ItemLocation::ContainerSlot(staged_id, index) = *location {
                if staged_id == id {
                    probe.set(index, *item);
                }
            }
        }
        let index = probe
            .add(product, &self.content.items)
            .ok_or(ItemUseError::PlacementFailed)?;
        let placed = probe.get(index).copied().unwrap_or(product);
        staging.put(ItemLocation::ContainerSlot(id, index), placed);
        Ok(())
    }

    /// Runs one use to completion or not at all. Nothing in the world changes
    /// unless every check and every product placement succeeds. Floor changes
    /// and animations land on `destination`, else on the focus tile, else on
    /// the user's own tile.
    pub fn execute_item_use(
        &mut self,
        session: SessionId,
        rules: &dyn UseRules,
        item_use: &ItemUse,
        tool: Option<ItemLocation>,
        focus: ItemLocation,
        destination: Option<Coord>,
    ) -> Result<(), ItemUseError> {
        let mut staging = Staging::default();
        let tool_item = match tool {
            Some(location) => self.read_item(location)?,
            None => ItemInstance::NONE,
        };
        let focus_item = self.read_item(focus)?;
        rules.check(item_use, &tool_item, &focus_item)?;

        if let Some(location) = tool {
            let mut remaining = tool_item.reduced(item_use.tool_quantity_consumed);
            if let Some(replacement) = item_use.success_tool {
                remaining = ItemInstance::new(replacement, 1);
            }
            if remaining != tool_item {
                staging.put(location, remaining);
            }
        }
        let focus_now = self.staged_item(&staging, focus)?;
        let focus_after = focus_now.reduced(item_use.focus_quantity_consumed);
        if focus_after != focus_now {
            staging.put(focus, focus_after);
        }
        for product in &item_use.products {
            let product = ItemInstance::new(product.item, product.quantity);
            if product.is_none() {
                continue;
            }
            self.stage_product(&mut staging, focus, product)?;
        }

        for (location, item) in staging.into_commits() {
            self.write_item(location, item)?;
        }

        let destination = match (destination, focus) {
            (Some(coord), _) => self.map.wrap(coord),
            (None, ItemLocation::World(coord)) => coord,
            (None, ItemLocation::ContainerSlot(..)) => self.session_location(session),
        };
        if let Some(floor) = item_use.surface_ground {
            self.change_floor(destination, floor)?;
        }
        if let Some(animation) = &item_use.animation {
            self.broadcaster
                .notify_area(destination, ServerMessage::animation(animation, destination));
        }
        if let Some(message) = &item_use.success_message {
            self.tell(session, message.clone());
        }
        Ok(())
    }

    /// The client entry point. Failures reach the acting session only, as
    /// the use's own failure text followed by the reason.
    pub fn use_item(
        &mut self,
        session: SessionId,
        use_index: usize,
        tool: ItemSource,
        focus: ItemSource,
        destination: Option<u32>,
    ) {
        let Some(item_use) = self.content.uses.get(use_index).cloned() else {
            self.tell(session, ItemUseError::NoSuchUse(use_index).to_string());
            return;
        };
        let destination = destination.map(|index| self.map.coord_from_index(index));
        let result = self.resolve_use(session, &item_use, tool, focus, destination);
        let Err(err) = result else {
            return;
        };
        if matches!(
            err,
            ItemUseError::Map(_) | ItemUseError::Item(ItemError::Map(_) | ItemError::Container(_))
        ) {
            tracing::error!(session = %session, error = %err, "item use failed");
        }
        let text = match &item_use.failure_message {
            Some(prefix) => format!("{prefix}\n{err}"),
            None => err.to_string(),
        };
        self.tell(session, text);
    }

    fn resolve_use(
        &mut self,
        session: SessionId,
        item_use: &ItemUse,
        tool: ItemSource,
        focus: ItemSource,
        destination: Option<Coord>,
    ) -> Result<(), ItemUseError> {
        let tool = self.resolve_source(session, tool)?;
        let focus = self
            .resolve_source(session, focus)?
            .ok_or(ItemError::Nothing)?;
        self.execute_item_use(session, &StandardRules, item_use, tool, focus, destination)
    }
}
