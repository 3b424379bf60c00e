//! Inspects persisted implicit availability and raster overlay coverage
//! without a renderer.

mod cli;
mod commands;

use self::cli::{Cli, Command};
use bevy_log::error;
use clap::Parser;
use std::process::ExitCode;
use tessera_async::AsyncSystem;
use tessera_tiles::TilesResult;
use tracing_subscriber::EnvFilter;

fn run(cli: Cli) -> TilesResult<()> {
    match cli.command {
        Command::Availability(args) => {
            commands::query(&args)?;
        }
        Command::Map(args) => {
            commands::map(&args, &AsyncSystem::default())?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
