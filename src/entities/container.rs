use crate::entities::item::{ArmorSpot, ItemCatalog, ItemInstance};
use crate::world::error::StorageError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const INVENTORY_SIZE: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(pub u32);

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerKind {
    Inventory,
    Equipment,
    WorldDrop,
}

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("unknown container {0}")]
    Unknown(ContainerId),
    #[error("container {container} has no slot {index}")]
    SlotOutOfRange { container: ContainerId, index: usize },
    #[error("container {container} slot {index} is empty")]
    EmptySlot { container: ContainerId, index: usize },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Ordered item slots. Inventory and equipment have a fixed slot count;
/// world drops grow as needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub id: ContainerId,
    pub kind: ContainerKind,
    capacity: Option<usize>,
    slots: Vec<ItemInstance>,
}

impl Container {
    pub fn new(id: ContainerId, kind: ContainerKind, items: Vec<ItemInstance>) -> Self {
        let capacity = match kind {
            ContainerKind::Equipment => Some(ArmorSpot::COUNT),
            ContainerKind::Inventory => Some(items.len().max(1)),
            ContainerKind::WorldDrop => None,
        };
        Self::with_capacity(id, kind, capacity, items)
    }

    pub fn with_capacity(
        id: ContainerId,
        kind: ContainerKind,
        capacity: Option<usize>,
        mut items: Vec<ItemInstance>,
    ) -> Self {
        if let Some(capacity) = capacity {
            items.truncate(capacity);
            items.resize(capacity, ItemInstance::NONE);
        }
        Self {
            id,
            kind,
            capacity,
            slots: items,
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(ItemInstance::is_none)
    }

    pub fn items(&self) -> &[ItemInstance] {
        &self.slots
    }

    pub fn get(&self, index: usize) -> Option<&ItemInstance> {
        self.slots.get(index)
    }

    /// Puts `item` into the first empty or stack-compatible slot and returns
    /// that slot. Equipment only accepts an item into its own empty spot.
    /// Nothing changes when `None` is returned.
    pub fn add(&mut self, item: ItemInstance, catalog: &ItemCatalog) -> Option<usize> {
        if item.is_none() {
            return None;
        }
        if self.kind == ContainerKind::Equipment {
            let index = catalog.get(item.item).equip_spot()?.index();
            let slot = self.slots.get_mut(index)?;
            if !slot.is_none() {
                return None;
            }
            *slot = item.with_quantity(1);
            return Some(index);
        }
        if let Some(index) = self
            .slots
            .iter()
            .position(|existing| catalog.accepts(existing, &item))
        {
            let merged = item.merged_onto(&self.slots[index]);
            self.slots[index] = merged;
            return Some(index);
        }
        if self.capacity.is_none() {
            self.slots.push(item);
            return Some(self.slots.len() - 1);
        }
        None
    }

    /// Replaces a slot outright. Returns false for an index past the end,
    /// except that world drops grow empty slots up to `index`.
    pub fn set(&mut self, index: usize, item: ItemInstance) -> bool {
        if self.capacity.is_none() && index >= self.slots.len() {
            self.slots.resize(index + 1, ItemInstance::NONE);
        }
        match self.slots.get_mut(index) {
            Some(slot) => {
                *slot = item;
                true
            }
            None => false,
        }
    }

    pub fn delete_slot(&mut self, index: usize) -> Option<ItemInstance> {
        let slot = self.slots.get_mut(index)?;
        Some(std::mem::replace(slot, ItemInstance::NONE))
    }

    pub fn reduce_quantity_at(
        &mut self,
        index: usize,
        amount: u32,
    ) -> Result<ItemInstance, ContainerError> {
        let id = self.id;
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(ContainerError::SlotOutOfRange {
                container: id,
                index,
            })?;
        if slot.is_none() {
            return Err(ContainerError::EmptySlot {
                container: id,
                index,
            });
        }
        *slot = slot.reduced(amount);
        Ok(*slot)
    }

    /// Empties every slot, returning the items that were there.
    pub fn drain_items(&mut self) -> Vec<ItemInstance> {
        let mut drained = Vec::new();
        for slot in self.slots.iter_mut() {
            if !slot.is_none() {
                drained.push(std::mem::replace(slot, ItemInstance::NONE));
            }
        }
        drained
    }
}

/// Allocates container ids and owns every container the world knows about.
/// Containers created through [`ContainerStore::create`] get a file on disk;
/// in-memory ones (monster loot) vanish with the process.
#[derive(Debug)]
pub struct ContainerStore {
    dir: Option<PathBuf>,
    containers: HashMap<ContainerId, Container>,
    persisted: HashSet<ContainerId>,
    next_id: u32,
}

impl ContainerStore {
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            containers: HashMap::new(),
            persisted: HashSet::new(),
            next_id: 1,
        }
    }

    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StorageError::Write {
            path: dir.clone(),
            source,
        })?;
        let next_id = highest_container_id(&dir)? + 1;
        Ok(Self {
            dir: Some(dir),
            containers: HashMap::new(),
            persisted: HashSet::new(),
            next_id,
        })
    }

    fn allocate(&mut self) -> ContainerId {
        let id = ContainerId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn create(
        &mut self,
        kind: ContainerKind,
        items: Vec<ItemInstance>,
    ) -> Result<ContainerId, StorageError> {
        let id = self.allocate();
        self.containers.insert(id, Container::new(id, kind, items));
        self.persisted.insert(id);
        self.save(id)?;
        Ok(id)
    }

    pub fn create_in_memory(&mut self, kind: ContainerKind, items: Vec<ItemInstance>) -> ContainerId {
        let id = self.allocate();
        self.containers.insert(id, Container::new(id, kind, items));
        id
    }

    fn ensure_loaded(&mut self, id: ContainerId) -> Result<(), ContainerError> {
        if self.containers.contains_key(&id) {
            return Ok(());
        }
        let Some(dir) = self.dir.as_ref() else {
            return Err(ContainerError::Unknown(id));
        };
        let path = container_path(dir, id);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ContainerError::Unknown(id));
            }
            Err(source) => return Err(StorageError::Read { path, source }.into()),
        };
        let container: Container =
            serde_yaml::from_str(&data).map_err(|err| StorageError::corrupt(&path, err))?;
        if container.id != id {
            return Err(StorageError::corrupt(
                &path,
                format!("file holds container {}", container.id),
            )
            .into());
        }
        self.containers.insert(id, container);
        self.persisted.insert(id);
        Ok(())
    }

    pub fn get(&mut self, id: ContainerId) -> Result<&Container, ContainerError> {
        self.ensure_loaded(id)?;
        self.containers.get(&id).ok_or(ContainerError::Unknown(id))
    }

    pub fn get_mut(&mut self, id: ContainerId) -> Result<&mut Container, ContainerError> {
        self.ensure_loaded(id)?;
        self.containers
            .get_mut(&id)
            .ok_or(ContainerError::Unknown(id))
    }

    /// Read-only lookup that never touches the disk.
    pub fn loaded(&self, id: ContainerId) -> Option<&Container> {
        self.containers.get(&id)
    }

    /// Forgets an in-memory container. Persisted containers stay.
    pub fn discard(&mut self, id: ContainerId) {
        if !self.persisted.contains(&id) {
            self.containers.remove(&id);
        }
    }

    pub fn save(&self, id: ContainerId) -> Result<(), StorageError> {
        let Some(dir) = self.dir.as_ref() else {
            return Ok(());
        };
        if !self.persisted.contains(&id) {
            return Ok(());
        }
        let Some(container) = self.containers.get(&id) else {
            return Ok(());
        };
        let path = container_path(dir, id);
        let data = serde_yaml::to_string(container)?;
        fs::write(&path, data).map_err(|source| StorageError::Write { path, source })
    }

    pub fn save_all(&self) -> Result<usize, StorageError> {
        let mut saved = 0;
        for id in &self.persisted {
            self.save(*id)?;
            saved += 1;
        }
        Ok(saved)
    }
}

fn container_path(dir: &Path, id: ContainerId) -> PathBuf {
    dir.join(format!("{}.yaml", id.0))
}

fn highest_container_id(dir: &Path) -> Result<u32, StorageError> {
    let entries = fs::read_dir(dir).map_err(|source| StorageError::Read {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut highest = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(stem) = name.to_str().and_then(|name| name.strip_suffix(".yaml")) else {
            continue;
        };
        if let Ok(id) = stem.parse::<u32>() {
            highest = highest.max(id);
        }
    }
    Ok(highest)
}
