//! Log output for simulation runs.
//!
//! The crate logs through `tracing`: transitions at TRACE, queue and lifecycle events at DEBUG,
//! run boundaries and reports at INFO, recovered input problems at WARN and persistence failures
//! at ERROR. `RUST_LOG` overrides the level passed here.

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs a formatting subscriber at INFO.
pub fn init_logging() -> bool {
    init_logging_with_level("info")
}

/// Installs a formatting subscriber at `level` ("trace" through "error").
///
/// Returns false if a global subscriber was already installed, in which case nothing changes.
pub fn init_logging_with_level(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{}={level}", env!("CARGO_CRATE_NAME")).into());
    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_line_number(true),
        )
        .with(filter)
        .try_init()
        .is_ok();
    if installed {
        info!(level, "logging initialized");
    }
    installed
}
