//! Ctrl+C / SIGTERM handling.
//!
//! The first signal cancels the returned token; the orchestrator stops
//! dispatching, lets in-flight transfers finish, and their ledger rows land
//! normally. A second signal exits immediately with 130 (128 + SIGINT),
//! abandoning whatever is still in flight.

use tokio_util::sync::CancellationToken;

/// Spawn the signal watcher and hand back the token the orchestrator polls.
pub(crate) fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutdown requested; in-flight transfers will finish");
        tracing::info!("Signal again to exit immediately");
        cancel.cancel();

        wait_for_signal().await;
        tracing::warn!("Second signal, exiting now");
        std::process::exit(130);
    });
    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("Could not register SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
