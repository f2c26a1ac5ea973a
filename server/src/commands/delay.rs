//! The built-in `yokai/delay` command: sleeps for a configured duration
//! then republishes a message on another topic. The sleep is cancellable —
//! a cancelled delay emits nothing.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::Command;
use crate::broker::{Payload, Topic};
use crate::core::error::AppLibError;

#[derive(Debug, Deserialize)]
struct DelaySpec {
    #[serde(alias = "milliseconds")]
    #[serde(rename = "Milliseconds")]
    milliseconds: u64,
    #[serde(alias = "topic")]
    #[serde(rename = "Topic")]
    topic: String,
    #[serde(alias = "message")]
    #[serde(rename = "Message")]
    message: Value,
}

pub struct DelayCommand;

#[async_trait]
impl Command for DelayCommand {
    async fn run(
        &self,
        token: &CancellationToken,
        _topic: &str,
        payload: &str,
    ) -> Result<BTreeMap<Topic, Payload>, AppLibError> {
        let spec: DelaySpec = serde_json::from_str(payload)
            .map_err(|e| AppLibError::Evaluation(format!("invalid delay payload: {e}")))?;

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(spec.milliseconds)) => {}
            _ = token.cancelled() => return Ok(BTreeMap::new()),
        }

        let message = serde_json::to_string(&spec.message)
            .map_err(|e| AppLibError::Evaluation(e.to_string()))?;
        let mut out = BTreeMap::new();
        out.insert(spec.topic, message);
        Ok(out)
    }
}
