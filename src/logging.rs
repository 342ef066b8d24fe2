//! Logger initialization for the `astragrad` binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the application.

use crate::{Error, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a compact fmt subscriber.
///
/// `RUST_LOG` takes precedence over the `verbose`/`quiet` flags when set.
pub fn init_logger(verbose: bool, quiet: bool) -> Result<()> {
    let default_level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .try_init()
        .map_err(|e| Error::config(format!("failed to initialize logger: {e}")))
}
