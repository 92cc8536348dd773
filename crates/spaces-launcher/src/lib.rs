//! spaces-launcher - starts a web application under a hosting platform's process contract
//!
//! Resolves `PORT`, spawns the application, relays its merged output line by line
//! and turns its lifecycle into this process's exit status.

mod cli;
mod factory;
mod runner;
mod signals;
mod telemetry;

pub use cli::Cli;
pub use factory::{PlatformProcessHandle, PlatformProcessManager, PlatformProcessManagerFactory};
pub use runner::SpacesLauncher;
pub use signals::shutdown_on_signal;
pub use telemetry::{DEFAULT_LOG_DIRECTIVE, init_tracing};

// Re-export core functionality
pub use spaces_launcher_core::*;
