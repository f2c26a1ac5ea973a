use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    ENV_APP_CONFIG, ENV_APP_VENDOR, ENV_HTTP_ENABLED, ENV_HTTP_PORT, ENV_MQTT_BROKER,
    ENV_MQTT_CLIENT_ID, ENV_MQTT_ENABLED, ENV_MQTT_KEEP_ALIVE, ENV_MQTT_PING_TIMEOUT,
};

#[derive(Parser)]
#[command(name = "yokai")]
#[command(version, about = "A small reactive-app runtime", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the YAML config file
    #[arg(long, short = 'c', global = true, env = "YOKAI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the root app definition
    #[arg(long, global = true, env = ENV_APP_CONFIG)]
    pub app_config: Option<PathBuf>,

    /// Extra vendor library search paths for the app library
    #[arg(long, global = true, env = ENV_APP_VENDOR, value_delimiter = ',')]
    pub app_vendor: Option<Vec<PathBuf>>,

    /// Enable the MQTT adapter
    #[arg(long, global = true, env = ENV_MQTT_ENABLED)]
    pub mqtt_enabled: Option<bool>,

    /// MQTT broker address (e.g. tcp://localhost:1883)
    #[arg(long, global = true, env = ENV_MQTT_BROKER)]
    pub mqtt_broker: Option<String>,

    /// MQTT client id
    #[arg(long, global = true, env = ENV_MQTT_CLIENT_ID)]
    pub mqtt_client_id: Option<String>,

    /// MQTT keep-alive interval in seconds
    #[arg(long, global = true, env = ENV_MQTT_KEEP_ALIVE)]
    pub mqtt_keep_alive_secs: Option<u64>,

    /// MQTT ping timeout in seconds
    #[arg(long, global = true, env = ENV_MQTT_PING_TIMEOUT)]
    pub mqtt_ping_timeout_secs: Option<u64>,

    /// Enable the HTTP adapter
    #[arg(long, global = true, env = ENV_HTTP_ENABLED)]
    pub http_enabled: Option<bool>,

    /// HTTP listen port
    #[arg(long, global = true, env = ENV_HTTP_PORT)]
    pub http_port: Option<u16>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Run one epoch, no file watcher (exits when it ends)
    Run,
    /// Run with hot-reload: watches the app config directory and restarts
    /// the epoch on change
    Serve,
    /// Publish a payload to a topic on a running server
    Post {
        /// Topic to publish to
        #[arg(short, long)]
        topic: String,
        /// Payload body
        #[arg(short, long)]
        payload: String,
    },
    /// Fetch a rendered view from a running server
    Get {
        /// View key to fetch
        #[arg(short, long)]
        view: String,
    },
}

/// Configuration derived from CLI arguments, independent of clap so the
/// rest of the crate doesn't need to depend on it directly.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub app_config: Option<PathBuf>,
    pub app_vendor: Option<Vec<PathBuf>>,
    pub mqtt_enabled: Option<bool>,
    pub mqtt_broker: Option<String>,
    pub mqtt_client_id: Option<String>,
    pub mqtt_keep_alive_secs: Option<u64>,
    pub mqtt_ping_timeout_secs: Option<u64>,
    pub http_enabled: Option<bool>,
    pub http_port: Option<u16>,
}

/// Parse CLI arguments and return config with command.
pub fn parse() -> (CliConfig, Commands) {
    let cli = Cli::parse();
    let config = CliConfig {
        config: cli.config,
        app_config: cli.app_config,
        app_vendor: cli.app_vendor,
        mqtt_enabled: cli.mqtt_enabled,
        mqtt_broker: cli.mqtt_broker,
        mqtt_client_id: cli.mqtt_client_id,
        mqtt_keep_alive_secs: cli.mqtt_keep_alive_secs,
        mqtt_ping_timeout_secs: cli.mqtt_ping_timeout_secs,
        http_enabled: cli.http_enabled,
        http_port: cli.http_port,
    };
    (config, cli.command)
}
