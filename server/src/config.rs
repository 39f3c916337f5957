//! Server configuration.
//!
//! Loaded from an optional `server.json`. Every field has a default so a
//! missing or partial file still produces a usable configuration.

use std::path::{Path, PathBuf};
use log::{info, warn, error};
use serde::Deserialize;

use realm_shared::SERVER_TICK_RATE;

/// Runtime configuration for the world server
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Directory holding monsters.json, items.json, spawns.json and Drops/
    pub data_dir: PathBuf,
    /// Map width in cells
    pub map_width: i32,
    /// Map height in cells
    pub map_height: i32,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Number of worker tasks creatures are split across each tick
    pub tick_workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            map_width: 200,
            map_height: 200,
            tick_rate: SERVER_TICK_RATE,
            tick_workers: 4,
        }
    }
}

impl ServerConfig {
    /// Load the configuration, falling back to defaults when the file is
    /// missing or unreadable
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                if e.kind() == std::io::ErrorKind::NotFound {
                    info!("No {:?} found, using default configuration", path);
                } else {
                    warn!("Failed to read config file {:?}: {}", path, e);
                }
                return Self::default();
            }
        };

        match serde_json::from_str::<ServerConfig>(&content) {
            Ok(config) => {
                info!("Loaded configuration from {:?}", path);
                config.sanitized()
            }
            Err(e) => {
                error!("Failed to parse {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    fn sanitized(mut self) -> Self {
        self.tick_rate = self.tick_rate.max(1);
        self.tick_workers = self.tick_workers.max(1);
        self.map_width = self.map_width.max(1);
        self.map_height = self.map_height.max(1);
        self
    }
}
