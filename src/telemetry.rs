//! Tracing setup.
//!
//! stdout carries the IPC protocol, so every log line goes to stderr.
//! - LOG_LEVEL sets the filter (e.g. "debug" or "info,schoold::workflow=debug").
//! - LOG_FORMAT=json switches to JSON lines; anything else is the default fmt output.

use crate::config::Config;
use tracing_subscriber::EnvFilter;

pub fn init_tracing(cfg: &Config) {
    let filter = EnvFilter::try_new(&cfg.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true);

    if cfg.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}
