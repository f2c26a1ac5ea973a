//! Plugins translating between external transports and the three epoch
//! brokers. Every plugin starts onto a shared `TaskTracker`/`CancellationToken`
//! pair and runs until the token is cancelled.

pub mod http;
pub mod inout;
pub mod loop_adapter;
pub mod mqtt;

pub use http::HttpPlugin;
pub use inout::InOutPlugin;
pub use loop_adapter::LoopPlugin;
pub use mqtt::{MqttInPlugin, MqttOutPlugin};
