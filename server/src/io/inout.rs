//! Test-harness adapter: publishes a fixed list of inputs to the **source**
//! broker, and exposes everything seen on the **sink** broker on an
//! externally-readable output channel.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::broker::{Broker, TopicPayload};
use crate::core::constants::INOUT_OUTPUT_CAPACITY;

/// Drives an epoch with a scripted sequence of inputs and captures its
/// outputs, for use in end-to-end tests without a container harness.
pub struct InOutPlugin {
    inputs: Vec<(String, String)>,
}

impl InOutPlugin {
    pub fn new(inputs: Vec<(String, String)>) -> Self {
        Self { inputs }
    }

    /// Starts publishing `inputs` onto `source` and returns a receiver fed
    /// by every publish observed on `sink`.
    pub fn start(
        self,
        token: CancellationToken,
        tracker: &TaskTracker,
        source: Arc<Broker>,
        sink: Arc<Broker>,
    ) -> mpsc::Receiver<TopicPayload> {
        let (output_tx, output_rx) = mpsc::channel(INOUT_OUTPUT_CAPACITY);

        let publish_token = token.clone();
        let inputs = self.inputs;
        tracker.spawn(async move {
            for (topic, payload) in inputs {
                if publish_token.is_cancelled() {
                    return;
                }
                source.publish(topic, payload);
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
                let _ = output_tx.try_send(message);
            }
        });

        output_rx
    }
}
