pub mod chat;
pub mod coord;
pub mod creatures;
pub mod error;
pub mod item_use;
pub mod items;
pub mod sector;
pub mod sector_store;
pub mod session;
pub mod state;
pub mod tile_map;

#[cfg(test)]
pub mod testing;
