//! MQTT IO adapter: `MqttInPlugin` bridges an external broker into the
//! **source** broker; `MqttOutPlugin` republishes everything seen on the
//! **sink** broker back out to it.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::broker::Broker;
use crate::core::config::MqttConfig;
use crate::core::constants::MQTT_DISCONNECT_GRACE_MS;
use crate::registry::Registry;

fn parse_broker(address: &str) -> (String, u16) {
    let without_scheme = address.rsplit("://").next().unwrap_or(address);
    match without_scheme.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.parse().unwrap_or(1883)),
        None => (without_scheme.to_string(), 1883),
    }
}

fn build_options(config: &MqttConfig) -> MqttOptions {
    let (host, port) = parse_broker(&config.broker);
    let mut options = MqttOptions::new(config.client_id.clone(), host, port);
    options.set_keep_alive(config.keep_alive);
    options
}

/// Subscribes to every topic a Model is registered against and feeds
/// incoming publishes into the **source** broker. Command topics (e.g.
/// `yokai/delay`) are not subscribed externally.
pub struct MqttInPlugin {
    config: MqttConfig,
}

impl MqttInPlugin {
    pub fn new(config: MqttConfig) -> Self {
        Self { config }
    }

    pub fn start(
        self,
        token: CancellationToken,
        tracker: &TaskTracker,
        registry: Arc<Registry>,
        source: Arc<Broker>,
    ) {
        let options = build_options(&self.config);
        let ping_timeout = self.config.ping_timeout;
        // Only model-subscribed topics are reached from the outside world;
        // command topics like `yokai/delay` are internal, reached via the
        // Loop adapter bridging sink back to source.
        let topics: Vec<String> = registry.topic_to_models.keys().cloned().collect();
        let (client, event_loop) = AsyncClient::new(options, 100);

        tracker.spawn(subscribe_job(client.clone(), topics, token.clone()));
        tracker.spawn(poll_job(client, event_loop, source, ping_timeout, token));
    }
}

async fn subscribe_job(client: AsyncClient, topics: Vec<String>, token: CancellationToken) {
    for topic in topics {
        tokio::select! {
            _ = token.cancelled() => return,
            result = client.subscribe(&topic, QoS::AtMostOnce) => {
                if let Err(err) = result {
                    tracing::error!(topic = %topic, error = %err, "failed to subscribe to mqtt topic");
                }
            }
        }
    }
}

async fn poll_job(
    client: AsyncClient,
    mut event_loop: EventLoop,
    source: Arc<Broker>,
    ping_timeout: Duration,
    token: CancellationToken,
) {
    loop {
        let polled = tokio::select! {
            _ = token.cancelled() => break,
            polled = tokio::time::timeout(ping_timeout.max(Duration::from_secs(1)) * 10, event_loop.poll()) => polled,
        };

        let event = match polled {
            Ok(Ok(event)) => event,
            Ok(Err(err)) => {
                tracing::error!(error = %err, "mqtt connection error, cancelling epoch");
                token.cancel();
                break;
            }
            Err(_) => {
                tracing::warn!("mqtt poll timed out waiting for broker activity");
                continue;
            }
        };

        if let Event::Incoming(Incoming::Publish(publish)) = event {
            let payload = String::from_utf8_lossy(&publish.payload).into_owned();
            source.publish(publish.topic, payload);
        }
    }

    tokio::select! {
        _ = client.disconnect() => {}
        _ = tokio::time::sleep(Duration::from_millis(MQTT_DISCONNECT_GRACE_MS)) => {}
    }
}

/// Republishes every message seen on the **sink** broker to the external
/// MQTT broker at QoS 0, not retained.
pub struct MqttOutPlugin {
    config: MqttConfig,
}

impl MqttOutPlugin {
    pub fn new(config: MqttConfig) -> Self {
        Self { config }
    }

    pub fn start(self, token: CancellationToken, tracker: &TaskTracker, sink: Arc<Broker>) {
        let options = build_options(&self.config);
        let (client, mut event_loop) = AsyncClient::new(options, 100);

        tracker.spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    polled = event_loop.poll() => {
                        if polled.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        tracker.spawn(async move {
            let (mut rx, _subscription) = sink.subscribe_all();
            loop {
                let message = tokio::select! {
                    _ = token.cancelled() => break,
                    message = rx.recv() => match message {
                        Some(message) => message,
                        None => break,
                    },
                };

                if let Err(err) = client
                    .publish(message.topic.clone(), QoS::AtMostOnce, false, message.payload)
                    .await
                {
                    tracing::error!(topic = %message.topic, error = %err, "failed to publish to mqtt");
                }
            }

            tokio::select! {
                _ = client.disconnect() => {}
                _ = tokio::time::sleep(Duration::from_millis(MQTT_DISCONNECT_GRACE_MS)) => {}
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_broker_strips_scheme_and_splits_port() {
        assert_eq!(parse_broker("tcp://localhost:1883"), ("localhost".to_string(), 1883));
        assert_eq!(parse_broker("localhost:1884"), ("localhost".to_string(), 1884));
        assert_eq!(parse_broker("localhost"), ("localhost".to_string(), 1883));
    }
}
