//! Layered configuration: defaults -> config file -> CLI/env overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::cli::CliConfig;
use super::constants::{
    DEFAULT_APP_CONFIG, DEFAULT_HTTP_PORT, DEFAULT_MQTT_CLIENT_ID,
    DEFAULT_MQTT_KEEP_ALIVE_SECS, DEFAULT_MQTT_PING_TIMEOUT_SECS,
};

/// File-based configuration (YAML), every field optional so a partial file
/// only overrides what it names.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub mqtt: Option<MqttFileConfig>,
    pub http: Option<HttpFileConfig>,
    pub app: Option<AppFileConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MqttFileConfig {
    pub enabled: Option<bool>,
    pub broker: Option<String>,
    pub client_id: Option<String>,
    pub keep_alive_secs: Option<u64>,
    pub ping_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HttpFileConfig {
    pub enabled: Option<bool>,
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppFileConfig {
    pub config: Option<PathBuf>,
    pub vendor: Option<Vec<PathBuf>>,
}

impl FileConfig {
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }
}

/// MQTT plugin configuration.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub enabled: bool,
    pub broker: String,
    pub client_id: String,
    pub keep_alive: Duration,
    pub ping_timeout: Duration,
}

/// HTTP plugin configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub enabled: bool,
    pub port: u16,
}

/// App library configuration: path to the root app definition and any
/// extra vendor library search paths.
#[derive(Debug, Clone)]
pub struct AppConfigSection {
    pub config: PathBuf,
    pub vendor: Vec<PathBuf>,
}

/// Final merged application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mqtt: MqttConfig,
    pub http: HttpConfig,
    pub app: AppConfigSection,
}

impl AppConfig {
    /// Load configuration from all sources.
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Config file (YAML, path from `--config`/`YOKAI_CONFIG`, falling
    ///    back to `./yokai.yaml` if present)
    /// 3. CLI arguments (which already carry environment-variable fallbacks
    ///    via clap's `env = ...` attributes)
    pub fn load(cli: &CliConfig, hot_reload: bool) -> Result<Self> {
        tracing::debug!("loading application configuration");

        let file_config = if let Some(ref path) = cli.config {
            if !path.exists() {
                anyhow::bail!("config file not found: {}", path.display());
            }
            FileConfig::load_from_file(path)?
        } else {
            let local = PathBuf::from("yokai.yaml");
            if local.exists() {
                FileConfig::load_from_file(&local)?
            } else {
                FileConfig::default()
            }
        };

        let file_mqtt = file_config.mqtt.unwrap_or_default();
        let file_http = file_config.http.unwrap_or_default();
        let file_app = file_config.app.unwrap_or_default();

        // serve (hot-reload) defaults MQTT/HTTP to disabled, matching a
        // local dev loop with no external transports wired up yet; `run`
        // defaults to both enabled, matching a deployed one-shot epoch.
        let mqtt_default_enabled = !hot_reload;
        let http_default_enabled = !hot_reload;

        let mqtt = MqttConfig {
            enabled: cli.mqtt_enabled.or(file_mqtt.enabled).unwrap_or(mqtt_default_enabled),
            broker: cli
                .mqtt_broker
                .clone()
                .or(file_mqtt.broker)
                .unwrap_or_default(),
            client_id: cli
                .mqtt_client_id
                .clone()
                .or(file_mqtt.client_id)
                .unwrap_or_else(|| DEFAULT_MQTT_CLIENT_ID.to_string()),
            keep_alive: Duration::from_secs(
                cli.mqtt_keep_alive_secs
                    .or(file_mqtt.keep_alive_secs)
                    .unwrap_or(DEFAULT_MQTT_KEEP_ALIVE_SECS),
            ),
            ping_timeout: Duration::from_secs(
                cli.mqtt_ping_timeout_secs
                    .or(file_mqtt.ping_timeout_secs)
                    .unwrap_or(DEFAULT_MQTT_PING_TIMEOUT_SECS),
            ),
        };

        let http = HttpConfig {
            enabled: cli.http_enabled.or(file_http.enabled).unwrap_or(http_default_enabled),
            port: cli.http_port.or(file_http.port).unwrap_or(DEFAULT_HTTP_PORT),
        };

        let config_path = cli
            .app_config
            .clone()
            .or(file_app.config)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_APP_CONFIG));
        let vendor = cli
            .app_vendor
            .clone()
            .or(file_app.vendor)
            .unwrap_or_default();

        // Resolve relative config/vendor paths against the config file's
        // own directory, the way a dotfile-relative reference should work.
        let base_dir = cli
            .config
            .as_ref()
            .and_then(|p| p.parent())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let config_path = resolve_relative(&base_dir, config_path);
        let vendor = vendor
            .into_iter()
            .map(|p| resolve_relative(&base_dir, p))
            .collect();

        Ok(Self {
            mqtt,
            http,
            app: AppConfigSection {
                config: config_path,
                vendor,
            },
        })
    }
}

fn resolve_relative(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
