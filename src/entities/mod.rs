pub mod container;
pub mod creature;
pub mod item;
pub mod player;
pub mod registry;
