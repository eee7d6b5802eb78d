//! Headless authoritative host for a Breach world.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p breach-server -- --port 7777 --map maps/arena.ron`.

mod host_loop;
mod settings;

use std::process::ExitCode;
use std::sync::Arc;

use breach_config::{CliArgs, Config, default_config_dir};
use breach_net::{HostServer, create_listener};
use breach_sync::{EditHost, EditRules};
use breach_world::{NullSink, VoxelWorld};
use clap::Parser;

use crate::host_loop::run_host_loop;
use crate::settings::{ServerError, server_config, tick_interval};

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    breach_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Host failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), ServerError> {
    let world = VoxelWorld::from_config(&config, Box::new(NullSink::default()))?;
    tracing::info!(
        "World ready: {} block types, map {:?}",
        world.registry().len(),
        config.world.map_file
    );
    let host = EditHost::new(world, EditRules::from(&config.gameplay));

    let server_config = server_config(&config.network)?;
    let listener = create_listener(server_config.bind_addr, &server_config.socket)?;
    tracing::info!(
        "Host listening on {} at {} Hz",
        server_config.bind_addr,
        config.network.tick_rate
    );

    let (server, events) = HostServer::new(server_config);
    let server = Arc::new(server);
    let accept = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.run_with_listener(listener).await })
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown requested");
    };
    let mut host = run_host_loop(
        Arc::clone(&server),
        events,
        host,
        tick_interval(&config.network),
        shutdown,
    )
    .await;

    server.shutdown();
    host.world_mut().shutdown();
    tracing::info!("Host stopped at seq {}", host.last_seq());

    match accept.await {
        Ok(result) => result?,
        Err(e) => tracing::warn!("Accept task ended abnormally: {e}"),
    }
    Ok(())
}
