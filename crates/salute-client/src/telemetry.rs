//! Diagnostic output for the `salute` binary and embedding applications.
//!
//! The library only emits `tracing` events (connects and closes at `info`,
//! call failures at `error`, isolated batch failures at `warn`); installing a
//! subscriber is left to the application. [`init_tracing`] installs the one
//! the CLI uses.
//!
//! ## Behavior
//!
//! - Filtering comes from `RUST_LOG` when set, otherwise from `default_level`.
//! - Each line carries an RFC 3339 local timestamp, the level, the emitting
//!   component (the event's target) and the message.

use tracing_subscriber::{EnvFilter, fmt};

/// Installs a global `fmt` subscriber.
///
/// # Errors
///
/// Fails if `default_level` is not a valid filter directive or a global
/// subscriber is already installed.
pub fn init_tracing(default_level: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level)?,
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_timer(fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install subscriber: {e}"))?;

    Ok(())
}
