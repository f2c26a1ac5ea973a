//! Feedback bridge: republishes everything seen on the **sink** broker back
//! onto the **source** broker, so an app's outgoing commands can drive
//! another app (or itself) without an external transport round-trip.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::broker::Broker;

pub struct LoopPlugin;

impl LoopPlugin {
    pub fn start(
        self,
        token: CancellationToken,
        tracker: &TaskTracker,
        source: Arc<Broker>,
        sink: Arc<Broker>,
    ) {
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
                source.publish(message.topic, message.payload);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sink_publishes_reappear_on_source_exactly_once() {
        let source = Arc::new(Broker::new());
        let sink = Arc::new(Broker::new());
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();

        let (mut source_rx, _sub) = source.subscribe("fed-back");

        LoopPlugin.start(token.clone(), &tracker, source.clone(), sink.clone());
        tracker.close();

        sink.publish("fed-back", "payload");
        assert_eq!(source_rx.recv().await, Some("payload".to_string()));
        assert!(source_rx.try_recv().is_err());

        token.cancel();
        tracker.wait().await;
    }
}
