use crate::entities::container::{Container, ContainerId};
use crate::entities::item::{ArmorSpot, ItemCatalog};
use crate::scripting::BehaviorHandle;
use crate::world::coord::Coord;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LIFE: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreatureId(pub u32);

impl std::fmt::Display for CreatureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bare body parts plus whatever equipment currently overrides them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerImage {
    pub bare_head: u32,
    pub bare_arms: u32,
    pub bare_chest: u32,
    pub bare_legs: u32,
    #[serde(default)]
    pub head: u32,
    #[serde(default)]
    pub arms: u32,
    #[serde(default)]
    pub chest: u32,
    #[serde(default)]
    pub legs: u32,
    #[serde(default)]
    pub shield: u32,
    #[serde(default)]
    pub weapon: u32,
}

impl PlayerImage {
    pub fn bare(head: u32, arms: u32, chest: u32, legs: u32) -> Self {
        Self {
            bare_head: head,
            bare_arms: arms,
            bare_chest: chest,
            bare_legs: legs,
            head,
            arms,
            chest,
            legs,
            shield: 0,
            weapon: 0,
        }
    }

    /// Recomputes the visible parts from an equipment container.
    pub fn resolve_equipment(&self, equipment: &Container, catalog: &ItemCatalog) -> PlayerImage {
        let worn = |spot: ArmorSpot| {
            equipment
                .get(spot.index())
                .filter(|item| !item.is_none())
                .map(|item| catalog.get(item.item).wear_image)
        };
        PlayerImage {
            head: worn(ArmorSpot::Head).unwrap_or(self.bare_head),
            arms: self.bare_arms,
            chest: worn(ArmorSpot::Chest).unwrap_or(self.bare_chest),
            legs: worn(ArmorSpot::Legs).unwrap_or(self.bare_legs),
            weapon: worn(ArmorSpot::Weapon).unwrap_or(0),
            shield: worn(ArmorSpot::Shield).unwrap_or(0),
            ..*self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CreatureImage {
    Fixed { image: u32, width: u8, height: u8 },
    Composable(PlayerImage),
}

impl CreatureImage {
    pub fn fixed(image: u32) -> Self {
        CreatureImage::Fixed {
            image,
            width: 1,
            height: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Creature {
    pub id: CreatureId,
    pub name: String,
    pub image: CreatureImage,
    pub location: Coord,
    pub life: i32,
    pub belongs_to_player: bool,
    pub is_friendly: bool,
    pub friendly_message: Option<String>,
    pub inventory: Option<ContainerId>,
    pub behaviors: Vec<BehaviorHandle>,
}

impl Creature {
    pub fn record(&self) -> CreatureRecord {
        CreatureRecord {
            name: self.name.clone(),
            image: self.image,
            is_friendly: self.is_friendly,
            friendly_message: self.friendly_message.clone(),
            life: self.life,
        }
    }
}

/// What goes into a sector file for a creature standing on a tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatureRecord {
    pub name: String,
    pub image: CreatureImage,
    #[serde(default)]
    pub is_friendly: bool,
    #[serde(default)]
    pub friendly_message: Option<String>,
    pub life: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::container::ContainerKind;
    use crate::entities::item::{ItemClass, ItemDefinition, ItemId, ItemInstance};

    #[test]
    fn resolve_equipment_overrides_only_worn_parts() {
        let catalog = ItemCatalog::new(vec![
            ItemDefinition {
                id: ItemId(20),
                class: ItemClass::Armor,
                armor_spot: Some(ArmorSpot::Head),
                wear_image: 77,
                ..ItemDefinition::empty()
            },
            ItemDefinition {
                id: ItemId(21),
                class: ItemClass::Weapon,
                wear_image: 12,
                ..ItemDefinition::empty()
            },
        ]);
        let mut equipment = Container::new(ContainerId(1), ContainerKind::Equipment, Vec::new());
        equipment.set(ArmorSpot::Head.index(), ItemInstance::new(ItemId(20), 1));
        equipment.set(ArmorSpot::Weapon.index(), ItemInstance::new(ItemId(21), 1));

        let bare = PlayerImage::bare(3, 4, 5, 6);
        let resolved = bare.resolve_equipment(&equipment, &catalog);
        assert_eq!(resolved.head, 77);
        assert_eq!(resolved.chest, 5);
        assert_eq!(resolved.legs, 6);
        assert_eq!(resolved.weapon, 12);
        assert_eq!(resolved.shield, 0);

        equipment.delete_slot(ArmorSpot::Head.index());
        let resolved = resolved.resolve_equipment(&equipment, &catalog);
        assert_eq!(resolved.head, 3);
    }

    #[test]
    fn image_tag_survives_yaml() {
        let image = CreatureImage::Fixed {
            image: 9,
            width: 2,
            height: 1,
        };
        let encoded = serde_yaml::to_string(&image).expect("encode");
        let decoded: CreatureImage = serde_yaml::from_str(&encoded).expect("decode");
        assert_eq!(decoded, image);
    }
}
