// =============================================================================
// Application Identity
// =============================================================================

/// Application name in lowercase (for paths, identifiers, and log filters)
pub const APP_NAME_LOWER: &str = "yokai";

// =============================================================================
// Environment Variables - Logging
// =============================================================================

/// Environment variable for the tracing filter
pub const ENV_LOG: &str = "YOKAI_LOG";

// =============================================================================
// Environment Variables - App config
// =============================================================================

/// Environment variable for the app config file path
pub const ENV_APP_CONFIG: &str = "YOKAI_APP_CONFIG";

/// Environment variable for the app vendor library search paths
pub const ENV_APP_VENDOR: &str = "YOKAI_APP_VENDOR";

// =============================================================================
// Environment Variables - MQTT
// =============================================================================

pub const ENV_MQTT_ENABLED: &str = "YOKAI_MQTT_ENABLED";
pub const ENV_MQTT_BROKER: &str = "YOKAI_MQTT_BROKER";
pub const ENV_MQTT_CLIENT_ID: &str = "YOKAI_MQTT_CLIENT_ID";
pub const ENV_MQTT_KEEP_ALIVE: &str = "YOKAI_MQTT_KEEP_ALIVE";
pub const ENV_MQTT_PING_TIMEOUT: &str = "YOKAI_MQTT_PING_TIMEOUT";

// =============================================================================
// Environment Variables - HTTP
// =============================================================================

pub const ENV_HTTP_ENABLED: &str = "YOKAI_HTTP_ENABLED";
pub const ENV_HTTP_PORT: &str = "YOKAI_HTTP_PORT";

// =============================================================================
// Defaults
// =============================================================================

pub const DEFAULT_APP_CONFIG: &str = "config.jsonnet";
pub const DEFAULT_MQTT_CLIENT_ID: &str = "yokai";
pub const DEFAULT_MQTT_KEEP_ALIVE_SECS: u64 = 2;
pub const DEFAULT_MQTT_PING_TIMEOUT_SECS: u64 = 1;
pub const DEFAULT_HTTP_PORT: u16 = 8000;
pub const DEFAULT_HTTP_SCHEME: &str = "http";
pub const DEFAULT_HTTP_HOST: &str = "localhost";

/// Grace period given to the MQTT client to flush/disconnect on shutdown
pub const MQTT_DISCONNECT_GRACE_MS: u64 = 250;

/// Reserved topic used to route WebSocket client messages into a model
pub const TOPIC_VIEW_EVENTS: &str = "viewEvents";

/// Topic the built-in delay command listens on
pub const TOPIC_DELAY: &str = "yokai/delay";

/// Reserved key in an update result denoting the new model value
pub const UPDATE_RESULT_MODEL_KEY: &str = "model";

/// Broker subscriber channel capacity for ordinary topic subscriptions
pub const TOPIC_SUBSCRIBER_CAPACITY: usize = 16;

/// Broker subscriber channel capacity for view-fragment subscriptions
pub const VIEW_SUBSCRIBER_CAPACITY: usize = 100;

/// In/Out test-harness adapter's captured-output channel capacity
pub const INOUT_OUTPUT_CAPACITY: usize = 100;
