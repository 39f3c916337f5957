//! World server
//!
//! Loads the game data, builds the map and runs the fixed-rate creature
//! simulation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{info, warn};

use realm_server::behavior::DefaultBehaviorFactory;
use realm_server::config::ServerConfig;
use realm_server::database::GameDb;
use realm_server::world::{GameWorld, GridMap, SystemClock};

const CONFIG_PATH: &str = "server.json";

/// Ticks between status log lines
const STATUS_INTERVAL: u64 = 600;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting world server...");

    let config = ServerConfig::load_or_default(CONFIG_PATH);
    info!("Tick rate: {} Hz, {} workers", config.tick_rate, config.tick_workers);

    let db = Arc::new(GameDb::load_or_default(&config.data_dir));
    let map = GridMap::new(config.map_width, config.map_height);
    let world = Arc::new(GameWorld::new(
        map,
        db,
        Arc::new(DefaultBehaviorFactory),
        Arc::new(SystemClock),
    ));

    // Initial population
    world.process_respawns();
    info!("Spawned {} creatures", world.creature_count());

    let tick_duration = Duration::from_secs_f64(1.0 / config.tick_rate as f64);
    let mut tick_count: u64 = 0;

    info!("Server started successfully!");

    loop {
        let tick_start = Instant::now();

        tokio::select! {
            _ = world.process_parallel(config.tick_workers) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }

        tick_count += 1;
        if tick_count % STATUS_INTERVAL == 0 {
            info!("Tick {}: {} creatures", tick_count, world.creature_count());
        }

        // Sleep until next tick
        let elapsed = tick_start.elapsed();
        if elapsed < tick_duration {
            tokio::time::sleep(tick_duration - elapsed).await;
        } else {
            warn!("Tick {} overran by {:?}", tick_count, elapsed - tick_duration);
        }
    }
}
