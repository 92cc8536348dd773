//! spaces-launcher core - platform-independent launcher logic
//!
//! Configuration, error types, the line codec used to relay child output, the
//! process management traits implemented by the platform crates, and the
//! [`Launcher`] state machine that ties them together.

mod codec;
mod config;
mod error;
mod launcher;
mod outcome;
mod process;
mod stdio;

pub use codec::*;
pub use config::*;
pub use error::*;
pub use launcher::{Launcher, NotStarted, Running};
pub use outcome::*;
pub use process::*;
pub use stdio::*;

// Re-exported so platform crates and callers share one cancellation type
pub use tokio_util::sync::CancellationToken;
