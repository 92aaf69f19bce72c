use std::process::ExitCode;

use clap::Parser;
use owo_colors::OwoColorize;
use pausewatch_core::{Cancellation, Error as CoreError};

mod args;
mod handlers;
mod output;
mod shutdown;

use args::{Cli, Commands};

const EXIT_CONFIGURATION: u8 = 2;
const EXIT_SERVICE: u8 = 3;
const EXIT_STATE: u8 = 4;
const EXIT_CANCELLED: u8 = 130;
const EXIT_OTHER: u8 = 1;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cancel = Cancellation::new();

    let interrupt = tokio::spawn(shutdown::watch_for_interrupt(cancel.clone()));

    let result = match cli.command {
        Commands::Discover(args) => handlers::run_discover(args, &cancel).await,
        Commands::Pause(args) => handlers::run_pause(args, &cancel).await,
        Commands::Resume(args) => handlers::run_resume(args, &cancel).await,
        Commands::Snapshots(args) => handlers::run_snapshots(args).await,
    };

    interrupt.abort();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red());
            ExitCode::from(exit_code_for(&e))
        }
    }
}

/// Maps a core `Error` (if that's what the CLI-level `anyhow::Error`
/// actually wraps) to a distinct process exit code, so scripts driving
/// `pausewatch` can tell a config mistake from a transient AWS failure
/// from a snapshot corruption without scraping stderr text.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<CoreError>() {
        Some(CoreError::Cancelled) => EXIT_CANCELLED,
        Some(CoreError::Configuration(_) | CoreError::Authentication(_)) => EXIT_CONFIGURATION,
        Some(CoreError::Service { .. }) => EXIT_SERVICE,
        Some(e) if e.is_state() => EXIT_STATE,
        _ => EXIT_OTHER,
    }
}
