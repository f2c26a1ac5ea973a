//! Built-in, model-less, view-less topic handlers dispatched by the
//! Updater alongside Models.

pub mod delay;

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::broker::{Payload, Topic};
use crate::core::error::AppLibError;

pub use delay::DelayCommand;

#[async_trait]
pub trait Command: Send + Sync {
    /// React to one payload on the topic this command is registered under,
    /// returning any outgoing (topic, payload) pairs.
    async fn run(
        &self,
        token: &CancellationToken,
        topic: &str,
        payload: &str,
    ) -> Result<BTreeMap<Topic, Payload>, AppLibError>;
}
