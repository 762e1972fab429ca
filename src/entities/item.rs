use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stack quantities must stay strictly below this.
pub const MAX_STACK: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u32);

impl ItemId {
    pub const NONE: ItemId = ItemId(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ItemClass {
    #[default]
    Normal,
    Weapon,
    Armor,
    Shield,
    Container,
    Plant,
    Ore,
    Food,
    Money,
    Wall,
    Tool,
    Raft,
    Corpse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArmorSpot {
    Head,
    Chest,
    Legs,
    Weapon,
    Shield,
}

impl ArmorSpot {
    pub const COUNT: usize = 5;

    pub const ALL: [ArmorSpot; 5] = [
        ArmorSpot::Head,
        ArmorSpot::Chest,
        ArmorSpot::Legs,
        ArmorSpot::Weapon,
        ArmorSpot::Shield,
    ];

    pub fn index(self) -> usize {
        match self {
            ArmorSpot::Head => 0,
            ArmorSpot::Chest => 1,
            ArmorSpot::Legs => 2,
            ArmorSpot::Weapon => 3,
            ArmorSpot::Shield => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        ArmorSpot::ALL.get(index).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub id: ItemId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: u32,
    #[serde(default)]
    pub wear_image: u32,
    #[serde(default)]
    pub class: ItemClass,
    #[serde(default)]
    pub armor_spot: Option<ArmorSpot>,
    #[serde(default = "default_true")]
    pub walkable: bool,
    #[serde(default = "default_true")]
    pub moveable: bool,
    #[serde(default)]
    pub stackable: bool,
    /// Growth ticks before turning into `growth_item`; zero never grows.
    #[serde(default)]
    pub growth_delta: u32,
    #[serde(default)]
    pub growth_item: ItemId,
}

fn default_true() -> bool {
    true
}

impl ItemDefinition {
    pub fn empty() -> Self {
        Self {
            id: ItemId::NONE,
            name: "nothing".to_string(),
            image: 0,
            wear_image: 0,
            class: ItemClass::Normal,
            armor_spot: None,
            walkable: true,
            moveable: false,
            stackable: false,
            growth_delta: 0,
            growth_item: ItemId::NONE,
        }
    }

    /// Equipment slot the item goes into, if it can be worn at all.
    pub fn equip_spot(&self) -> Option<ArmorSpot> {
        match self.class {
            ItemClass::Armor => self.armor_spot,
            ItemClass::Weapon => Some(ArmorSpot::Weapon),
            ItemClass::Shield => Some(ArmorSpot::Shield),
            _ => None,
        }
    }
}

/// Immutable item table. Unknown ids resolve to the empty definition.
#[derive(Debug, Clone)]
pub struct ItemCatalog {
    definitions: HashMap<ItemId, ItemDefinition>,
    empty: ItemDefinition,
}

impl Default for ItemCatalog {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ItemCatalog {
    pub fn new(definitions: Vec<ItemDefinition>) -> Self {
        let definitions = definitions
            .into_iter()
            .filter(|definition| !definition.id.is_none())
            .map(|definition| (definition.id, definition))
            .collect();
        Self {
            definitions,
            empty: ItemDefinition::empty(),
        }
    }

    pub fn get(&self, id: ItemId) -> &ItemDefinition {
        self.definitions.get(&id).unwrap_or(&self.empty)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.definitions.contains_key(&id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ItemDefinition> {
        self.definitions
            .values()
            .find(|definition| definition.name.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Whether `incoming` can merge onto `existing`.
    pub fn stackable(&self, existing: &ItemInstance, incoming: &ItemInstance) -> bool {
        existing.item == incoming.item
            && self.get(existing.item).stackable
            && existing
                .quantity
                .checked_add(incoming.quantity)
                .is_some_and(|total| total < MAX_STACK)
    }

    /// True when `incoming` may be put where `existing` is: empty or mergeable.
    pub fn accepts(&self, existing: &ItemInstance, incoming: &ItemInstance) -> bool {
        existing.is_none() || self.stackable(existing, incoming)
    }
}

/// A concrete item: definition reference plus mutable quantity and age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemInstance {
    pub item: ItemId,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub age: u32,
}

impl ItemInstance {
    pub const NONE: ItemInstance = ItemInstance {
        item: ItemId::NONE,
        quantity: 0,
        age: 0,
    };

    pub fn new(item: ItemId, quantity: u32) -> Self {
        if item.is_none() {
            return Self::NONE;
        }
        Self {
            item,
            quantity,
            age: 0,
        }
    }

    pub fn is_none(&self) -> bool {
        self.item.is_none()
    }

    /// Merged result of placing `self` onto `existing`. Callers check
    /// [`ItemCatalog::accepts`] first.
    pub fn merged_onto(self, existing: &ItemInstance) -> ItemInstance {
        if existing.is_none() {
            return self;
        }
        ItemInstance {
            item: self.item,
            quantity: self.quantity.saturating_add(existing.quantity),
            age: existing.age,
        }
    }

    /// Remaining stack after taking `amount`; empty stacks become NONE.
    pub fn reduced(self, amount: u32) -> ItemInstance {
        if amount >= self.quantity {
            return ItemInstance::NONE;
        }
        ItemInstance {
            quantity: self.quantity - amount,
            ..self
        }
    }

    /// Copy of this stack with a different quantity.
    pub fn with_quantity(self, quantity: u32) -> ItemInstance {
        if quantity == 0 {
            return ItemInstance::NONE;
        }
        ItemInstance { quantity, ..self }
    }
}
