use spaces_launcher_core::CancellationToken;
use tracing::{info, warn};

/// Returns a token that is cancelled the first time the process is asked to stop:
/// Ctrl-C anywhere, and SIGTERM as well on Unix.
///
/// Handlers are installed before this function returns, so a signal that arrives
/// while the child is being spawned is not lost. Must be called inside a runtime.
pub fn shutdown_on_signal() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) {
            (Ok(mut interrupt), Ok(mut terminate)) => {
                tokio::spawn(async move {
                    tokio::select! {
                        _ = interrupt.recv() => info!("SIGINT received"),
                        _ = terminate.recv() => info!("SIGTERM received"),
                    }
                    trigger.cancel();
                });
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "failed to install signal handlers, falling back to ctrl_c");
                tokio::spawn(wait_for_ctrl_c(trigger));
            }
        }
    }

    #[cfg(not(unix))]
    tokio::spawn(wait_for_ctrl_c(trigger));

    token
}

async fn wait_for_ctrl_c(trigger: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Ctrl-C received");
            trigger.cancel();
        }
        Err(e) => warn!(error = %e, "failed to listen for Ctrl-C, interrupts will not be forwarded"),
    }
}
