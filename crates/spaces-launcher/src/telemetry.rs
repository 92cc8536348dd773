use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_DIRECTIVE: &str = "warn";

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs the diagnostics subscriber (if one is not already active).
///
/// Diagnostics go to stderr so stdout only carries the banner and the relayed
/// application output. Honours `RUST_LOG`. Calling this more than once is harmless.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();

    let _ = TRACING_INIT.set(());
}
