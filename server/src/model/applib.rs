//! The external evaluator boundary.
//!
//! `AppLib` is the seam between the runtime (which only ever shuffles
//! opaque JSON around) and whatever expression language actually encodes
//! an app's `init`/`update`/`view`/`subscriptions`. This crate does not
//! implement that language — see `model::native` for the one concrete,
//! native-Rust implementation it does ship.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::broker::Topic;
use crate::core::error::AppLibError;

/// The result of `AppLib::list_apps` for one app.
#[derive(Debug, Clone)]
pub struct AppData {
    pub init: Value,
    pub subscriptions: Vec<Topic>,
}

#[async_trait]
pub trait AppLib: Send + Sync {
    /// Enumerate every app this library defines, keyed by its app key.
    /// Called once per epoch.
    async fn list_apps(&self) -> Result<BTreeMap<String, AppData>, AppLibError>;

    /// Compute the next model value and outgoing messages for one app
    /// reacting to one input. The result maps either the reserved key
    /// `"model"` (new model value) or a topic (outgoing payload).
    async fn update(
        &self,
        key: &str,
        topic: &str,
        payload: &str,
        model: &Value,
    ) -> Result<BTreeMap<String, Value>, AppLibError>;

    /// Render the app's current model as HTML. `fragment` selects an
    /// incremental update fragment versus a full-page render.
    async fn view(&self, key: &str, model: &Value, fragment: bool) -> Result<String, AppLibError>;
}
