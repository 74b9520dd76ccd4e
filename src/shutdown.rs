use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Spawn a listener that fires the returned token on the first Ctrl-C and
/// exits the process on the second.
pub fn start_shutdown_listener() -> CancellationToken {
    let token = CancellationToken::new();

    let listener = token.clone();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to listen for Ctrl-C: {e}");
            return;
        }
        warn!("received Ctrl-C, cancelling in-flight work (press again to force)");
        listener.cancel();

        if signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    token
}
