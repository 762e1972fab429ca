use crate::entities::creature::{CreatureId, CreatureRecord};
use crate::entities::item::{ItemCatalog, ItemInstance};
use crate::world::coord::{Coord, Geometry, SectorIndex};
use crate::world::error::{MapError, StorageError};
use crate::world::sector::{RestoredCreature, Sector, SectorRecord, Tile};
use crate::world::sector_store::SectorStorage;
use rand::Rng;
use std::collections::HashMap;

/// Sector load counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileMapStats {
    pub hits: u64,
    pub loads: u64,
    pub synthesized: u64,
}

/// The tile grid. Sectors materialize on first touch and stay resident.
pub struct TileMap {
    geometry: Geometry,
    default_floor: u32,
    default_spawn: Coord,
    sectors: HashMap<SectorIndex, Sector>,
    storage: Box<dyn SectorStorage>,
    restored: Vec<RestoredCreature>,
    stats: TileMapStats,
}

impl std::fmt::Debug for TileMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileMap")
            .field("geometry", &self.geometry)
            .field("loaded_sectors", &self.sectors.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl TileMap {
    pub fn new(
        geometry: Geometry,
        storage: Box<dyn SectorStorage>,
        default_floor: u32,
        default_spawn: Coord,
    ) -> Self {
        Self {
            geometry,
            default_floor,
            default_spawn: geometry.wrap_coord(default_spawn),
            sectors: HashMap::new(),
            storage,
            restored: Vec::new(),
            stats: TileMapStats::default(),
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn stats(&self) -> TileMapStats {
        self.stats
    }

    pub fn wrap(&self, coord: Coord) -> Coord {
        self.geometry.wrap_coord(coord)
    }

    pub fn sector_index_of(&self, coord: Coord) -> SectorIndex {
        self.geometry.sector_index_of(coord)
    }

    pub fn loaded_sector_count(&self) -> usize {
        self.sectors.len()
    }

    /// Returns the cached sector, loading or synthesizing it on first access.
    pub fn sector(&mut self, index: SectorIndex) -> Result<&mut Sector, MapError> {
        if !self.geometry.sector_in_bounds(index) {
            return Err(MapError::SectorOutOfRange(index));
        }
        if self.sectors.contains_key(&index) {
            self.stats.hits += 1;
        } else {
            let sector = self.load_sector(index)?;
            self.sectors.insert(index, sector);
        }
        self.sectors
            .get_mut(&index)
            .ok_or(MapError::SectorOutOfRange(index))
    }

    fn load_sector(&mut self, index: SectorIndex) -> Result<Sector, MapError> {
        let Some(record) = self.storage.load(index)? else {
            self.stats.synthesized += 1;
            tracing::debug!(sector = %index, "synthesized empty sector");
            return Ok(Sector::filled(
                index,
                self.geometry.sector_size,
                self.default_floor,
            ));
        };
        if record.sector_size != self.geometry.sector_size {
            return Err(MapError::CorruptSector {
                index,
                reason: format!(
                    "sector_size {} does not match world sector_size {}",
                    record.sector_size, self.geometry.sector_size
                ),
            });
        }
        let (sector, creatures) = record
            .restore(index)
            .map_err(|reason| MapError::CorruptSector { index, reason })?;
        self.stats.loads += 1;
        tracing::debug!(sector = %index, creatures = creatures.len(), "loaded sector");
        self.restored.extend(creatures);
        Ok(sector)
    }

    /// Creatures read out of sector files since the last call.
    pub fn take_restored(&mut self) -> Vec<RestoredCreature> {
        std::mem::take(&mut self.restored)
    }

    fn check_depth(&self, coord: Coord) -> Result<(), MapError> {
        if coord.z < 0 || coord.z >= self.geometry.depth {
            return Err(MapError::OutOfBounds(coord));
        }
        Ok(())
    }

    pub fn tile(&mut self, coord: Coord) -> Result<Tile, MapError> {
        self.tile_mut(coord).map(|tile| *tile)
    }

    pub fn tile_mut(&mut self, coord: Coord) -> Result<&mut Tile, MapError> {
        self.check_depth(coord)?;
        let index = self.geometry.sector_index_of(coord);
        let (lx, ly) = self.geometry.local_of(coord);
        self.sector(index)?
            .tile_mut(lx, ly)
            .ok_or(MapError::OutOfBounds(coord))
    }

    pub fn floor(&mut self, coord: Coord) -> Result<u32, MapError> {
        Ok(self.tile(coord)?.floor)
    }

    pub fn set_floor(&mut self, coord: Coord, floor: u32) -> Result<(), MapError> {
        self.tile_mut(coord)?.floor = floor;
        Ok(())
    }

    pub fn item(&mut self, coord: Coord) -> Result<ItemInstance, MapError> {
        Ok(self.tile(coord)?.item)
    }

    pub fn set_item(&mut self, coord: Coord, item: ItemInstance) -> Result<(), MapError> {
        self.tile_mut(coord)?.item = item;
        Ok(())
    }

    pub fn creature(&mut self, coord: Coord) -> Result<Option<CreatureId>, MapError> {
        Ok(self.tile(coord)?.creature)
    }

    pub fn set_creature(
        &mut self,
        coord: Coord,
        creature: Option<CreatureId>,
    ) -> Result<(), MapError> {
        self.tile_mut(coord)?.creature = creature;
        Ok(())
    }

    /// A tile can be entered when it has a floor, its item is walkable and no
    /// creature stands on it.
    pub fn walkable(&mut self, coord: Coord, catalog: &ItemCatalog) -> Result<bool, MapError> {
        if !self.geometry.in_bounds(self.wrap(coord)) {
            return Ok(false);
        }
        let tile = self.tile(coord)?;
        Ok(tile.creature.is_none() && tile.floor != 0 && catalog.get(tile.item.item).walkable)
    }

    pub fn index_from_coord(&self, coord: Coord) -> u32 {
        self.geometry.index_from_coord(coord)
    }

    pub fn coord_from_index(&self, index: u32) -> Coord {
        self.geometry.coord_from_index(index)
    }

    /// Default spawn with a random offset of up to two tiles on each axis.
    pub fn default_player_spawn<R: Rng>(&self, rng: &mut R) -> Coord {
        let spawn = self
            .default_spawn
            .offset(rng.gen_range(0..3), rng.gen_range(0..3), 0);
        self.wrap(spawn)
    }

    pub fn default_spawn(&self) -> Coord {
        self.default_spawn
    }

    fn loaded_indices(&self) -> Vec<SectorIndex> {
        let mut indices: Vec<SectorIndex> = self.sectors.keys().copied().collect();
        indices.sort_by_key(|index| (index.z, index.y, index.x));
        indices
    }

    /// Visits every tile of every resident sector. Never loads a sector.
    pub fn for_each_loaded_tile<F>(&self, mut visit: F)
    where
        F: FnMut(Coord, &Tile),
    {
        for index in self.loaded_indices() {
            let Some(sector) = self.sectors.get(&index) else {
                continue;
            };
            let origin = self.geometry.sector_origin(index);
            for ((x, y), tile) in sector.tiles() {
                visit(origin.offset(x, y, 0), tile);
            }
        }
    }

    pub fn for_each_loaded_tile_mut<F>(&mut self, mut visit: F)
    where
        F: FnMut(Coord, &mut Tile),
    {
        for index in self.loaded_indices() {
            let origin = self.geometry.sector_origin(index);
            let Some(sector) = self.sectors.get_mut(&index) else {
                continue;
            };
            for ((x, y), tile) in sector.tiles_mut() {
                visit(origin.offset(x, y, 0), tile);
            }
        }
    }

    /// Persists every resident sector; untouched sectors are left alone on disk.
    pub fn save<F>(&self, creature_record: F) -> Result<usize, StorageError>
    where
        F: Fn(CreatureId) -> Option<CreatureRecord>,
    {
        let mut saved = 0;
        for index in self.loaded_indices() {
            let Some(sector) = self.sectors.get(&index) else {
                continue;
            };
            let record = SectorRecord::capture(sector, &creature_record);
            self.storage.save(index, &record)?;
            saved += 1;
        }
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::creature::CreatureImage;
    use crate::entities::item::{ItemDefinition, ItemId};
    use crate::world::sector_store::{FileSectorStorage, MemorySectorStorage};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn geometry() -> Geometry {
        Geometry::new(40, 2, 10).expect("geometry")
    }

    fn map_with(storage: impl SectorStorage + 'static) -> TileMap {
        TileMap::new(geometry(), Box::new(storage), 1, Coord::new(1, 1, 0))
    }

    #[test]
    fn absent_sector_is_synthesized_with_default_floor() {
        let mut map = map_with(MemorySectorStorage::new());
        assert_eq!(map.floor(Coord::new(5, 5, 1)).expect("floor"), 1);
        assert_eq!(map.stats().synthesized, 1);
        assert_eq!(map.loaded_sector_count(), 1);
    }

    #[test]
    fn loading_twice_returns_the_cached_sector() {
        let mut map = map_with(MemorySectorStorage::new());
        let index = SectorIndex::new(1, 1, 0);
        map.sector(index).expect("sector").tile_mut(0, 0).expect("tile").floor = 9;
        assert_eq!(map.sector(index).expect("sector").tile(0, 0).map(|t| t.floor), Some(9));
        assert_eq!(map.stats().synthesized, 1);
        assert_eq!(map.stats().hits, 1);
    }

    #[test]
    fn reads_go_through_wrap() {
        let mut map = map_with(MemorySectorStorage::new());
        map.set_item(Coord::new(-1, 41, 0), ItemInstance::new(ItemId(3), 2))
            .expect("set");
        assert_eq!(
            map.item(Coord::new(39, 1, 0)).expect("item"),
            ItemInstance::new(ItemId(3), 2)
        );
    }

    #[test]
    fn out_of_depth_is_rejected() {
        let mut map = map_with(MemorySectorStorage::new());
        assert!(matches!(
            map.tile(Coord::new(0, 0, 2)),
            Err(MapError::OutOfBounds(_))
        ));
        assert!(matches!(
            map.sector(SectorIndex::new(4, 0, 0)),
            Err(MapError::SectorOutOfRange(_))
        ));
    }

    #[test]
    fn save_then_reload_round_trips_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let coord = Coord::new(12, 3, 0);
        let item = ItemInstance {
            item: ItemId(5),
            quantity: 17,
            age: 3,
        };
        {
            let mut map = map_with(FileSectorStorage::new(dir.path()));
            map.set_item(coord, item).expect("set item");
            map.set_floor(coord, 4).expect("set floor");
            map.set_creature(coord, Some(CreatureId(8))).expect("set creature");
            let saved = map
                .save(|id| {
                    (id == CreatureId(8)).then(|| CreatureRecord {
                        name: "Bat".to_string(),
                        image: CreatureImage::fixed(11),
                        is_friendly: true,
                        friendly_message: Some("squeak".to_string()),
                        life: 33,
                    })
                })
                .expect("save");
            assert_eq!(saved, 1);
        }
        let mut map = map_with(FileSectorStorage::new(dir.path()));
        let tile = map.tile(coord).expect("tile");
        assert_eq!(tile.item, item);
        assert_eq!(tile.floor, 4);
        assert_eq!(tile.creature, None);
        let restored = map.take_restored();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].record.life, 33);
        assert_eq!(restored[0].local, (2, 3));
        assert!(map.take_restored().is_empty());
    }

    #[test]
    fn save_skips_sectors_never_loaded() {
        let storage = Arc::new(MemorySectorStorage::new());
        let mut map = TileMap::new(
            geometry(),
            Box::new(Arc::clone(&storage)),
            1,
            Coord::new(1, 1, 0),
        );
        map.tile(Coord::new(0, 0, 0)).expect("tile");
        assert_eq!(map.save(|_| None).expect("save"), 1);
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn mismatched_sector_size_is_corrupt() {
        let storage = MemorySectorStorage::new();
        let index = SectorIndex::new(0, 0, 0);
        storage.insert(
            index,
            SectorRecord::capture(&Sector::filled(index, 5, 1), |_| None),
        );
        let mut map = map_with(storage);
        assert!(matches!(
            map.sector(index),
            Err(MapError::CorruptSector { .. })
        ));
    }

    #[test]
    fn visiting_loaded_tiles_never_loads() {
        let mut map = map_with(MemorySectorStorage::new());
        map.tile(Coord::new(15, 15, 0)).expect("tile");
        let mut visited = 0;
        map.for_each_loaded_tile(|coord, _| {
            assert_eq!(map.geometry().sector_index_of(coord), SectorIndex::new(1, 1, 0));
            visited += 1;
        });
        assert_eq!(visited, 100);
        assert_eq!(map.loaded_sector_count(), 1);
    }

    #[test]
    fn walkable_needs_floor_walkable_item_and_no_creature() {
        let catalog = ItemCatalog::new(vec![ItemDefinition {
            id: ItemId(2),
            walkable: false,
            ..ItemDefinition::empty()
        }]);
        let mut map = map_with(MemorySectorStorage::new());
        let coord = Coord::new(3, 3, 0);
        assert!(map.walkable(coord, &catalog).expect("walkable"));
        map.set_item(coord, ItemInstance::new(ItemId(2), 1)).expect("set");
        assert!(!map.walkable(coord, &catalog).expect("walkable"));
        map.set_item(coord, ItemInstance::NONE).expect("set");
        map.set_creature(coord, Some(CreatureId(1))).expect("set");
        assert!(!map.walkable(coord, &catalog).expect("walkable"));
        map.set_creature(coord, None).expect("set");
        map.set_floor(coord, 0).expect("set");
        assert!(!map.walkable(coord, &catalog).expect("walkable"));
    }

    #[test]
    fn default_spawn_offset_stays_within_two_tiles() {
        let map = map_with(MemorySectorStorage::new());
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..20 {
            let spawn = map.default_player_spawn(&mut rng);
            assert!((1..=3).contains(&spawn.x));
            assert!((1..=3).contains(&spawn.y));
        }
    }
}
