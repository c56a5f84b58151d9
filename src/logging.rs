//! Tracing initialization.
//!
//! Grounded on the teacher's `src/bin/server.rs`, which builds a
//! `tracing_subscriber` env-filter from a log-level string read out of the
//! environment rather than a bare `env_logger::init()`.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::SdkConfig;

/// Install a global `tracing` subscriber using the console log level from
/// `config`. Safe to call once per process; a second call is a no-op logged
/// at `debug`.
pub fn init_tracing(config: &SdkConfig) {
    let filter = EnvFilter::try_new(&config.console_log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
