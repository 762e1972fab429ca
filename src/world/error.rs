use crate::world::coord::{Coord, SectorIndex};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("world dimensions must be positive (size={size}, depth={depth}, sector_size={sector_size})")]
    Dimensions {
        size: i32,
        depth: i32,
        sector_size: i32,
    },
    #[error("sector_size {sector_size} must be a factor of size {size}")]
    SectorSize { size: i32, sector_size: i32 },
    #[error("sector_size {sector_size} exceeds the maximum of {max}")]
    SectorTooLarge { sector_size: i32, max: i32 },
    #[error("sector {0} is outside the world")]
    SectorOutOfRange(SectorIndex),
    #[error("coordinate {0} is outside the world")]
    OutOfBounds(Coord),
    #[error("no free tile near {0}")]
    NoFreeTile(Coord),
    #[error("sector {index} is corrupt: {reason}")]
    CorruptSector { index: SectorIndex, reason: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures reading or writing durable state. An absent file is not an error.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("read {} failed: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("write {} failed: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("encode failed: {0}")]
    Encode(#[from] serde_yaml::Error),
}

impl StorageError {
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        StorageError::Corrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
