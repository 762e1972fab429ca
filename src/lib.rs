pub mod admin;
pub mod config;
pub mod content;
pub mod entities;
pub mod net;
pub mod persistence;
pub mod scripting;
pub mod telemetry;
pub mod world;

use std::sync::{Arc, Mutex};

pub use config::{AppConfig, WorldMeta};
pub use net::server::{run_game_server, serve, GameServerConfig, ServerControl, ServerError};
pub use world::state::World;

/// Opens the world under `config.root` and serves it until shutdown, then
/// writes everything back.
pub fn run(config: &AppConfig) -> Result<(), ServerError> {
    let log_path = telemetry::logging::init(&config.root, config.verbose)?;
    tracing::info!(root = %config.root.display(), log = %log_path.display(), "starting tileworld");

    let world = World::open(&config.root, config.world_name())?;
    let world = Arc::new(Mutex::new(world));
    let control = Arc::new(ServerControl::new());
    run_game_server(GameServerConfig::from(config), Arc::clone(&world), control)?;

    let report = net::server::lock_world(&world)?.save()?;
    tracing::info!(
        sectors = report.sectors,
        players = report.players,
        containers = report.containers,
        "final save complete"
    );
    Ok(())
}
