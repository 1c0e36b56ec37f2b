//! Log subscriber setup for the greeter server.
//!
//! Events are printed through `tracing_subscriber::fmt` with local RFC 3339
//! timestamps, thread ids and source locations. Filtering comes from
//! `RUST_LOG` when set, otherwise from the configured default level.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber.
///
/// # Errors
///
/// Fails if `default_level` is not a valid filter directive or a global
/// subscriber is already installed.
pub fn init_telemetry(default_level: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level)?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(true)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true),
        )
        .try_init()?;

    Ok(())
}
