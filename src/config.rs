use crate::entities::item::ItemId;
use crate::world::coord::Coord;
use crate::world::error::StorageError;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Parser)]
#[command(name = "tileworld", about = "Tile world server")]
pub struct AppConfig {
    /// World directory holding map/, content/, players/ and containers/.
    pub root: PathBuf,

    #[arg(long, default_value = "0.0.0.0:1234")]
    pub bind: String,

    /// Defaults to the root directory's name.
    #[arg(long)]
    pub name: Option<String>,

    /// Seconds between automatic saves; 0 disables.
    #[arg(long, env = "TILEWORLD_AUTOSAVE_SECS", default_value_t = 0)]
    pub autosave_secs: u64,

    #[arg(long, default_value_t = 1000)]
    pub tick_ms: u64,

    /// Simulation ticks between growth passes.
    #[arg(long, default_value_t = 60)]
    pub growth_every: u64,

    #[arg(short, long)]
    pub verbose: bool,
}

impl AppConfig {
    pub fn world_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.root
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "World".to_string())
        })
    }
}

/// `<root>/map/meta.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldMeta {
    pub size: i32,
    pub depth: i32,
    pub sector_size: i32,
    pub default_player_spawn: Coord,
    pub default_floor: u32,
    /// Dropped near a creature when it dies.
    pub corpse_item: Option<ItemId>,
    /// Given to every new account; stackables arrive as a full stack.
    pub starter_items: Vec<ItemId>,
}

impl Default for WorldMeta {
    fn default() -> Self {
        Self {
            size: 100,
            depth: 1,
            sector_size: 20,
            default_player_spawn: Coord::new(1, 1, 0),
            default_floor: 1,
            corpse_item: None,
            starter_items: Vec::new(),
        }
    }
}

impl WorldMeta {
    pub fn path(root: &Path) -> PathBuf {
        root.join("map").join("meta.yaml")
    }

    /// Missing file yields defaults; an unreadable or malformed one is an error.
    pub fn load(root: &Path) -> Result<Self, StorageError> {
        let path = Self::path(root);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(StorageError::Read { path, source }),
        };
        serde_yaml::from_str(&data).map_err(|err| StorageError::corrupt(&path, err))
    }
}
