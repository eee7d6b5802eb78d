//! Command-line argument parsing for the Breach host.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Breach host command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "breach-server", about = "Authoritative Breach world host")]
pub struct CliArgs {
    /// Address to bind.
    #[arg(long)]
    pub bind: Option<String>,

    /// Port to listen on.
    #[arg(long)]
    pub port: Option<u16>,

    /// View distance in blocks.
    #[arg(long)]
    pub view_distance: Option<f32>,

    /// Authored map file to load instead of the procedural baseline.
    #[arg(long)]
    pub map: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref bind) = args.bind {
            self.network.bind_address = bind.clone();
        }
        if let Some(port) = args.port {
            self.network.port = port;
        }
        if let Some(distance) = args.view_distance {
            self.streaming.view_distance = distance;
        }
        if let Some(ref map) = args.map {
            self.world.map_file = Some(map.clone());
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
