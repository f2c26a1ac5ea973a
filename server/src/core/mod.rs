//! Core application infrastructure: CLI, configuration, logging, and the
//! hot-reload supervisor.

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod supervisor;

pub use cli::{CliConfig, Commands};
pub use config::AppConfig;
