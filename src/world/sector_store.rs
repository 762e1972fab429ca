use crate::world::coord::SectorIndex;
use crate::world::error::StorageError;
use crate::world::sector::SectorRecord;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Durable home of sector records. `load` returns `Ok(None)` when the sector
/// has never been written; an unreadable or malformed record is an error.
pub trait SectorStorage: Send {
    fn load(&self, index: SectorIndex) -> Result<Option<SectorRecord>, StorageError>;
    fn save(&self, index: SectorIndex, record: &SectorRecord) -> Result<(), StorageError>;
}

/// One YAML file per sector under `dir`, named `<sx>-<sy>-<sz>.yaml`.
#[derive(Debug, Clone)]
pub struct FileSectorStorage {
    dir: PathBuf,
}

impl FileSectorStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, index: SectorIndex) -> PathBuf {
        self.dir
            .join(format!("{}-{}-{}.yaml", index.x, index.y, index.z))
    }
}

impl SectorStorage for FileSectorStorage {
    fn load(&self, index: SectorIndex) -> Result<Option<SectorRecord>, StorageError> {
        let path = self.path(index);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StorageError::Read { path, source }),
        };
        let record = serde_yaml::from_str(&data).map_err(|err| StorageError::corrupt(&path, err))?;
        Ok(Some(record))
    }

    fn save(&self, index: SectorIndex, record: &SectorRecord) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|source| StorageError::Write {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path(index);
        let data = serde_yaml::to_string(record)?;
        fs::write(&path, data).map_err(|source| StorageError::Write { path, source })
    }
}

/// Keeps records in memory; for ephemeral worlds and tests.
#[derive(Debug, Default)]
pub struct MemorySectorStorage {
    records: Mutex<HashMap<SectorIndex, SectorRecord>>,
}

impl MemorySectorStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, index: SectorIndex, record: SectorRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.insert(index, record);
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SectorStorage for MemorySectorStorage {
    fn load(&self, index: SectorIndex) -> Result<Option<SectorRecord>, StorageError> {
        let records = self
            .records
            .lock()
            .map_err(|_| StorageError::corrupt("<memory>", "sector storage lock poisoned"))?;
        Ok(records.get(&index).cloned())
    }

    fn save(&self, index: SectorIndex, record: &SectorRecord) -> Result<(), StorageError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| StorageError::corrupt("<memory>", "sector storage lock poisoned"))?;
        records.insert(index, record.clone());
        Ok(())
    }
}

impl<T: SectorStorage + Sync> SectorStorage for std::sync::Arc<T> {
    fn load(&self, index: SectorIndex) -> Result<Option<SectorRecord>, StorageError> {
        (**self).load(index)
    }

    fn save(&self, index: SectorIndex, record: &SectorRecord) -> Result<(), StorageError> {
        (**self).save(index, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::sector::{Sector, SectorRecord};

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileSectorStorage::new(dir.path());
        assert!(storage
            .load(SectorIndex::new(0, 0, 0))
            .expect("load")
            .is_none());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("0-0-0.yaml"), "tiles: {{{").expect("write");
        let storage = FileSectorStorage::new(dir.path());
        assert!(matches!(
            storage.load(SectorIndex::new(0, 0, 0)),
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileSectorStorage::new(dir.path().join("sectors"));
        let index = SectorIndex::new(2, 1, 0);
        let record = SectorRecord::capture(&Sector::filled(index, 3, 7), |_| None);
        storage.save(index, &record).expect("save");
        assert_eq!(storage.load(index).expect("load"), Some(record));
    }
}
