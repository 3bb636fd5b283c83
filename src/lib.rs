pub mod commands;
pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::error::{InstallerError, InstallerResult};
pub use crate::core::orchestrator::{InstallEvent, InstallReport, Operation, Orchestrator};

/// Structured logging for the binary; `RUST_LOG` overrides the default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,skyblock_installer=debug")),
        )
        .with_writer(std::io::stderr)
        .init();
}
