use crate::entities::container::ContainerId;
use crate::entities::creature::CreatureId;
use crate::world::coord::Coord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One account file under `players/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDetails {
    pub username: String,
    pub password_hash: String,
    pub inventory_id: ContainerId,
    pub equipment_id: ContainerId,
    #[serde(default)]
    pub is_admin: bool,
    /// Where the player stood on the last save.
    pub location: Coord,
}

/// A logged-in account bound to its creature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub account: AccountDetails,
    pub creature: CreatureId,
    /// Containers this session can currently see, beyond its own two.
    pub opened_containers: BTreeSet<ContainerId>,
}

impl Player {
    pub fn new(account: AccountDetails, creature: CreatureId) -> Self {
        Self {
            account,
            creature,
            opened_containers: BTreeSet::new(),
        }
    }

    pub fn username(&self) -> &str {
        &self.account.username
    }

    pub fn inventory(&self) -> ContainerId {
        self.account.inventory_id
    }

    pub fn equipment(&self) -> ContainerId {
        self.account.equipment_id
    }

    pub fn is_admin(&self) -> bool {
        self.account.is_admin
    }

    /// Whether this player may read or modify `container`.
    pub fn can_access(&self, container: ContainerId) -> bool {
        container == self.inventory()
            || container == self.equipment()
            || self.opened_containers.contains(&container)
    }
}
