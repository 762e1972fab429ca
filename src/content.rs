use crate::entities::item::{ItemCatalog, ItemDefinition, ItemId};
use crate::world::error::StorageError;
use crate::world::item_use::ItemUse;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterDefinition {
    pub id: u32,
    pub name: String,
    pub image: u32,
    #[serde(default = "default_monster_life")]
    pub life: i32,
    /// Carried in the monster's inventory and dropped on death.
    #[serde(default)]
    pub drops: Vec<MonsterDrop>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterDrop {
    pub item: ItemId,
    #[serde(default = "default_drop_quantity")]
    pub quantity: u32,
}

fn default_monster_life() -> i32 {
    crate::entities::creature::DEFAULT_LIFE
}

fn default_drop_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, Default)]
pub struct MonsterCatalog {
    monsters: HashMap<u32, MonsterDefinition>,
}

impl MonsterCatalog {
    pub fn new(monsters: Vec<MonsterDefinition>) -> Self {
        Self {
            monsters: monsters
                .into_iter()
                .map(|monster| (monster.id, monster))
                .collect(),
        }
    }

    pub fn get(&self, id: u32) -> Option<&MonsterDefinition> {
        self.monsters.get(&id)
    }

    pub fn len(&self) -> usize {
        self.monsters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monsters.is_empty()
    }
}

/// Declared uses in file order; a use is addressed by its position.
#[derive(Debug, Clone, Default)]
pub struct ItemUseCatalog {
    uses: Vec<ItemUse>,
}

impl ItemUseCatalog {
    pub fn new(uses: Vec<ItemUse>) -> Self {
        Self { uses }
    }

    pub fn get(&self, index: usize) -> Option<&ItemUse> {
        self.uses.get(index)
    }

    /// Indices of every use declared for this tool and focus pair.
    pub fn matching(&self, tool: ItemId, focus: ItemId) -> Vec<usize> {
        self.uses
            .iter()
            .enumerate()
            .filter(|(_, item_use)| item_use.tool == tool && item_use.focus == focus)
            .map(|(index, _)| index)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.uses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uses.is_empty()
    }
}

/// Static definitions read once at startup.
#[derive(Debug, Clone, Default)]
pub struct Content {
    pub items: ItemCatalog,
    pub monsters: MonsterCatalog,
    pub uses: ItemUseCatalog,
}

impl Content {
    /// Reads `<root>/content/{items,monsters,item_uses}.yaml`. A missing file
    /// is an empty table.
    pub fn load(root: &Path) -> Result<Self, StorageError> {
        let dir = root.join("content");
        let items: Vec<ItemDefinition> = load_list(&dir.join("items.yaml"))?;
        let monsters: Vec<MonsterDefinition> = load_list(&dir.join("monsters.yaml"))?;
        let uses: Vec<ItemUse> = load_list(&dir.join("item_uses.yaml"))?;
        tracing::info!(
            items = items.len(),
            monsters = monsters.len(),
            uses = uses.len(),
            "loaded content"
        );
        Ok(Self {
            items: ItemCatalog::new(items),
            monsters: MonsterCatalog::new(monsters),
            uses: ItemUseCatalog::new(uses),
        })
    }
}

fn load_list<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StorageError> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StorageError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_yaml::from_str(&data).map_err(|err| StorageError::corrupt(path, err))
}
