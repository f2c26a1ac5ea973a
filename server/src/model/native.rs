//! `NativeAppLib`: the one concrete `AppLib` this crate ships, built from
//! native Rust closures instead of an external expression-language VM.
//!
//! A real deployment is expected to bring its own `AppLib` wired to
//! whatever expression language it prefers (jsonnet, Starlark, ...); this
//! implementation exists so the runtime, its tests, and simple embedders
//! have something to register apps against without needing one.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::applib::{AppData, AppLib};
use crate::broker::Topic;
use crate::core::error::AppLibError;

pub type UpdateFn = Arc<dyn Fn(&Value, &str, &Value) -> BTreeMap<String, Value> + Send + Sync>;
pub type ViewFn = Arc<dyn Fn(&Value, bool) -> String + Send + Sync>;

/// One app definition registered against `NativeAppLib`.
#[derive(Clone)]
pub struct NativeApp {
    pub init: Value,
    pub subscriptions: Vec<Topic>,
    /// Update function, shared across every subscribed topic; receives
    /// the current model, the triggering topic, and the payload value.
    pub update: UpdateFn,
    pub view: ViewFn,
}

/// An `AppLib` built entirely from in-process Rust closures.
pub struct NativeAppLib {
    apps: BTreeMap<String, NativeApp>,
}

impl NativeAppLib {
    pub fn new(apps: BTreeMap<String, NativeApp>) -> Self {
        Self { apps }
    }

    fn app(&self, key: &str) -> Result<&NativeApp, AppLibError> {
        self.apps
            .get(key)
            .ok_or_else(|| AppLibError::UnknownApp(key.to_string()))
    }
}

#[async_trait]
impl AppLib for NativeAppLib {
    async fn list_apps(&self) -> Result<BTreeMap<String, AppData>, AppLibError> {
        Ok(self
            .apps
            .iter()
            .map(|(key, app)| {
                (
                    key.clone(),
                    AppData {
                        init: app.init.clone(),
                        subscriptions: app.subscriptions.clone(),
                    },
                )
            })
            .collect())
    }

    async fn update(
        &self,
        key: &str,
        topic: &str,
        payload: &str,
        model: &Value,
    ) -> Result<BTreeMap<String, Value>, AppLibError> {
        let app = self.app(key)?;
        let payload_value: Value = serde_json::from_str(payload)
            .unwrap_or_else(|_| Value::String(payload.to_string()));
        Ok((app.update)(model, topic, &payload_value))
    }

    async fn view(&self, key: &str, model: &Value, fragment: bool) -> Result<String, AppLibError> {
        let app = self.app(key)?;
        Ok((app.view)(model, fragment))
    }
}
