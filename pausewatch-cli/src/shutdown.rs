use owo_colors::OwoColorize;
use pausewatch_core::Cancellation;

/// Waits for SIGINT/SIGTERM (Ctrl+C on non-Unix) and flips `cancel`. Spawned
/// alongside the command being run so a long discover/pause/resume call can
/// unwind cleanly instead of leaving cloud resources half-mutated.
pub async fn watch_for_interrupt(cancel: Cancellation) {
    wait_for_signal().await;
    eprintln!("{}", "received interrupt, cancelling in-flight work...".yellow());
    cancel.request_cancel();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");

    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    tokio::signal::ctrl_c().await.expect("install Ctrl+C handler");
}
