use crate::entities::creature::{CreatureId, CreatureRecord};
use crate::entities::item::ItemInstance;
use crate::world::coord::SectorIndex;
use serde::{Deserialize, Serialize};

/// One grid cell. `creature` is a lookup key into the creature registry,
/// never an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub floor: u32,
    pub item: ItemInstance,
    pub creature: Option<CreatureId>,
}

impl Tile {
    pub fn with_floor(floor: u32) -> Self {
        Self {
            floor,
            item: ItemInstance::NONE,
            creature: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sector {
    pub index: SectorIndex,
    size: i32,
    tiles: Vec<Tile>,
}

impl Sector {
    pub fn filled(index: SectorIndex, size: i32, floor: u32) -> Self {
        Self {
            index,
            size,
            tiles: vec![Tile::with_floor(floor); (size * size) as usize],
        }
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.size || y >= self.size {
            return None;
        }
        Some((y * self.size + x) as usize)
    }

    pub fn tile(&self, x: i32, y: i32) -> Option<&Tile> {
        self.offset(x, y).and_then(|offset| self.tiles.get(offset))
    }

    pub fn tile_mut(&mut self, x: i32, y: i32) -> Option<&mut Tile> {
        self.offset(x, y).and_then(|offset| self.tiles.get_mut(offset))
    }

    /// Tiles in row-major order, with their local `(x, y)`.
    pub fn tiles(&self) -> impl Iterator<Item = ((i32, i32), &Tile)> + '_ {
        let size = self.size;
        self.tiles
            .iter()
            .enumerate()
            .map(move |(offset, tile)| ((offset as i32 % size, offset as i32 / size), tile))
    }

    pub fn tiles_mut(&mut self) -> impl Iterator<Item = ((i32, i32), &mut Tile)> + '_ {
        let size = self.size;
        self.tiles
            .iter_mut()
            .enumerate()
            .map(move |(offset, tile)| ((offset as i32 % size, offset as i32 / size), tile))
    }
}

/// On-disk form of one tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRecord {
    pub floor: u32,
    #[serde(default, skip_serializing_if = "ItemInstance::is_none")]
    pub item: ItemInstance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creature: Option<CreatureRecord>,
}

/// On-disk form of one sector; `tiles` is row-major and has exactly
/// `sector_size * sector_size` entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorRecord {
    pub sector_size: i32,
    pub tiles: Vec<TileRecord>,
}

/// A creature found in a sector file, waiting to be registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredCreature {
    pub sector: SectorIndex,
    pub local: (i32, i32),
    pub record: CreatureRecord,
}

impl SectorRecord {
    /// Builds the record for `sector`; `creature_record` supplies what to
    /// persist for a creature reference (players return `None`).
    pub fn capture<F>(sector: &Sector, creature_record: F) -> Self
    where
        F: Fn(CreatureId) -> Option<CreatureRecord>,
    {
        let tiles = sector
            .tiles
            .iter()
            .map(|tile| TileRecord {
                floor: tile.floor,
                item: tile.item,
                creature: tile.creature.and_then(&creature_record),
            })
            .collect();
        Self {
            sector_size: sector.size,
            tiles,
        }
    }

    /// Rebuilds a sector, handing back the creatures it held. Tile creature
    /// slots stay empty until the caller registers them.
    pub fn restore(self, index: SectorIndex) -> Result<(Sector, Vec<RestoredCreature>), String> {
        let expected = (self.sector_size * self.sector_size) as usize;
        if self.tiles.len() != expected {
            return Err(format!(
                "expected {} tiles, found {}",
                expected,
                self.tiles.len()
            ));
        }
        let size = self.sector_size;
        let mut restored = Vec::new();
        let mut tiles = Vec::with_capacity(expected);
        for (offset, record) in self.tiles.into_iter().enumerate() {
            if let Some(creature) = record.creature {
                restored.push(RestoredCreature {
                    sector: index,
                    local: (offset as i32 % size, offset as i32 / size),
                    record: creature,
                });
            }
            tiles.push(Tile {
                floor: record.floor,
                item: record.item,
                creature: None,
            });
        }
        Ok((Sector { index, size, tiles }, restored))
    }
}
