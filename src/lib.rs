pub mod autosave;
pub mod bareme;
pub mod bridge;
pub mod config;
pub mod draft;
mod error;
pub mod media;
pub mod notation;
pub mod project;
pub mod session;

pub use autosave::{AutosaveHandle, AutosaveScheduler, AutosaveState, DirtySignal};
pub use config::SyncConfig;
pub use draft::{CellKey, DraftCellLedger};
pub use error::NotationError;
pub use session::ScoringSession;

/// Install the `tracing` subscriber, filtered by `RUST_LOG` (default
/// `info`). Does nothing if a subscriber is already installed.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}
