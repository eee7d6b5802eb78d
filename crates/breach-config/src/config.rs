//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Host networking settings.
    pub network: NetworkConfig,
    /// Region streaming settings.
    pub streaming: StreamingConfig,
    /// Edit validation rules.
    pub gameplay: GameplayConfig,
    /// Map baseline settings.
    pub world: WorldConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Network configuration for the authoritative host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the host binds to.
    pub bind_address: String,
    /// Host port.
    pub port: u16,
    /// Maximum number of connected peers.
    pub max_peers: u32,
    /// Simulation ticks per second on the host.
    pub tick_rate: u32,
    /// Largest accepted frame payload in bytes.
    pub max_frame_bytes: u32,
    /// Payloads at or above this size are LZ4-compressed.
    pub compression_threshold: usize,
}

/// Region streaming configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamingConfig {
    /// Regions whose origin lies within this many blocks of an observer are loaded.
    pub view_distance: f32,
    /// Extra distance beyond `view_distance` before a region is torn down.
    pub unload_margin: f32,
    /// Maximum regions materialized per update.
    pub loads_per_tick: u32,
    /// Read neighbouring regions when meshing so seam faces are culled.
    pub cull_region_seams: bool,
}

/// Rules the host applies to incoming edit requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameplayConfig {
    /// Maximum distance in blocks between a player and the block they edit.
    pub reach_distance: f32,
}

/// Map baseline configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    /// Height of the procedural ground surface when no map file is given.
    pub ground_height: i32,
    /// Optional authored map (RON list of block placements).
    pub map_file: Option<PathBuf>,
    /// Optional block table (RON list of block definitions).
    pub block_table: Option<PathBuf>,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 7777,
            max_peers: 32,
            tick_rate: 30,
            max_frame_bytes: 1_048_576,
            compression_threshold: 256,
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            view_distance: 64.0,
            unload_margin: 16.0,
            loads_per_tick: 16,
            cull_region_seams: false,
        }
    }
}

impl Default for GameplayConfig {
    fn default() -> Self {
        Self {
            reach_distance: 8.0,
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            ground_height: 8,
            map_file: None,
            block_table: None,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Platform config directory for Breach (`<config_dir>/breach`).
///
/// Falls back to `./config` when the platform has no config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("breach"))
        .unwrap_or_else(|| PathBuf::from("config"))
}

// --- Load / Save / Reload ---

/// File name of the persisted config inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.ron";

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl Config {
    /// Reads `config.ron` from `config_dir`, writing the defaults there first
    /// when the file does not exist yet.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Wrote default host config to {}", path.display());
            return Ok(config);
        }

        let config = read_config(&path)?;
        log::info!("Loaded host config from {}", path.display());
        Ok(config)
    }

    /// Writes this config to `config_dir/config.ron`, creating the directory.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: config_dir.to_path_buf(),
            source,
        };
        std::fs::create_dir_all(config_dir).map_err(write_err)?;

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(2)
            .enumerate_arrays(false);
        let rendered = ron::ser::to_string_pretty(self, pretty)?;

        let path = config_dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, rendered).map_err(|source| ConfigError::Write { path, source })
    }

    /// Re-reads the file; `Some` only when it differs from `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let fresh = read_config(&config_dir.join(CONFIG_FILE_NAME))?;
        if fresh == *self {
            return Ok(None);
        }
        log::info!("Host config changed on disk");
        Ok(Some(fresh))
    }
}
