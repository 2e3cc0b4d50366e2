pub mod agenda; // schedule lifecycle: create, update, terminate
pub mod calendar; // materializer: schedules + ledger -> events
pub mod config;
pub mod conflict; // slot double-booking detection
pub mod db;
pub mod error;
pub mod models;
pub mod occurrence; // per-occurrence state machine
pub mod pricing;
pub mod recurrence;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}
