//! Structured logging setup.

use super::constants::{APP_NAME_LOWER, ENV_LOG};

/// Initialize the global `tracing` subscriber. Filter is read from
/// `YOKAI_LOG`, falling back to `RUST_LOG`, falling back to a sensible
/// per-crate default.
pub fn init() {
    let default_filter = format!("info,{APP_NAME_LOWER}=info");

    let filter = std::env::var(ENV_LOG)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or(default_filter);

    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_ansi(true)
        .compact()
        .with_env_filter(filter)
        .init();
}
