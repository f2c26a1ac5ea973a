//! The stateful reactive unit: owns the current model value, serializes
//! `AppLib::update` calls, and fans rendered fragments out to subscribers.

pub mod applib;
pub mod native;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex as SyncMutex;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, mpsc};

pub use applib::{AppData, AppLib};

use crate::broker::{Payload, Topic};
use crate::core::constants::{UPDATE_RESULT_MODEL_KEY, VIEW_SUBSCRIBER_CAPACITY};
use crate::core::error::ModelError;

/// What one `AppModel::update` call produced.
#[derive(Debug, Default)]
pub struct UpdateOutcome {
    pub outputs: BTreeMap<Topic, Payload>,
    /// The re-rendered fragment, present only if the update changed the
    /// model and the re-render succeeded.
    pub view: Option<String>,
}

struct ViewSubscriberEntry {
    id: u64,
    sender: mpsc::Sender<String>,
}

/// A running app: its key, its library, and its current model value.
pub struct AppModel {
    key: String,
    app_lib: Arc<dyn AppLib>,
    current: SyncMutex<Value>,
    update_lock: AsyncMutex<()>,
    view_subs: RwLock<Vec<ViewSubscriberEntry>>,
    next_sub_id: AtomicU64,
}

impl AppModel {
    pub fn new(key: impl Into<String>, app_lib: Arc<dyn AppLib>, init: Value) -> Arc<Self> {
        Arc::new(Self {
            key: key.into(),
            app_lib,
            current: SyncMutex::new(init),
            update_lock: AsyncMutex::new(()),
            view_subs: RwLock::new(Vec::new()),
            next_sub_id: AtomicU64::new(0),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Snapshot of the current model value.
    pub fn current(&self) -> Value {
        self.current.lock().clone()
    }

    /// Apply one input event: runs `AppLib::update`, atomically swaps the
    /// model if it changed, broadcasts the re-rendered fragment to view
    /// subscribers, and returns the outgoing (topic, payload) pairs plus
    /// that same fragment (if any) for the Updater to republish on the
    /// view broker.
    pub async fn update(&self, topic: &str, payload: &str) -> Result<UpdateOutcome, ModelError> {
        let _serialize = self.update_lock.lock().await;

        let snapshot = self.current();
        let mut result = self
            .app_lib
            .update(&self.key, topic, payload, &snapshot)
            .await?;

        let mut view = None;
        if let Some(new_model) = result.remove(UPDATE_RESULT_MODEL_KEY) {
            *self.current.lock() = new_model.clone();

            match self.app_lib.view(&self.key, &new_model, true).await {
                Ok(fragment) => {
                    self.broadcast_view(fragment.clone());
                    view = Some(fragment);
                }
                Err(err) => {
                    tracing::error!(key = %self.key, error = %err, "view render failed after update");
                }
            }
        }

        let mut outputs = BTreeMap::new();
        for (topic, value) in result {
            let payload = serde_json::to_string(&value)
                .map_err(|e| ModelError::AppLib(crate::core::error::AppLibError::Evaluation(e.to_string())))?;
            outputs.insert(topic, payload);
        }
        Ok(UpdateOutcome { outputs, view })
    }

    /// Full-page render of the current model.
    pub async fn view(&self) -> Result<String, ModelError> {
        let snapshot = self.current();
        Ok(self.app_lib.view(&self.key, &snapshot, false).await?)
    }

    fn broadcast_view(&self, fragment: String) {
        let subs = self.view_subs.read();
        for sub in subs.iter() {
            let _ = sub.sender.try_send(fragment.clone());
        }
    }

    /// Subscribe to rendered fragments produced by successful updates.
    pub fn subscribe_view(self: &Arc<Self>) -> (mpsc::Receiver<String>, ViewSubscription) {
        let (tx, rx) = mpsc::channel(VIEW_SUBSCRIBER_CAPACITY);
        let id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);
        self.view_subs
            .write()
            .push(ViewSubscriberEntry { id, sender: tx });
        (
            rx,
            ViewSubscription {
                model: self.clone(),
                id,
                removed: AtomicBool::new(false),
            },
        )
    }

    fn remove_view_subscriber(&self, id: u64) {
        self.view_subs.write().retain(|s| s.id != id);
    }
}

/// Handle returned by `subscribe_view`. Unsubscribes on drop; idempotent.
pub struct ViewSubscription {
    model: Arc<AppModel>,
    id: u64,
    removed: AtomicBool,
}

impl ViewSubscription {
    pub fn unsubscribe(&self) {
        if self.removed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.model.remove_view_subscriber(self.id);
    }
}

impl Drop for ViewSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct CounterLib;

    #[async_trait]
    impl AppLib for CounterLib {
        async fn list_apps(
            &self,
        ) -> Result<BTreeMap<String, AppData>, crate::core::error::AppLibError> {
            unreachable!("not used in these tests")
        }

        async fn update(
            &self,
            _key: &str,
            _topic: &str,
            payload: &str,
            model: &Value,
        ) -> Result<BTreeMap<String, Value>, crate::core::error::AppLibError> {
            if payload == "fail" {
                return Err(crate::core::error::AppLibError::Evaluation("boom".into()));
            }
            let count = model["count"].as_i64().unwrap_or(0) + 1;
            let mut out = BTreeMap::new();
            out.insert("model".to_string(), json!({"count": count}));
            out.insert("out".to_string(), json!(payload));
            Ok(out)
        }

        async fn view(
            &self,
            _key: &str,
            model: &Value,
            _fragment: bool,
        ) -> Result<String, crate::core::error::AppLibError> {
            Ok(format!("count={}", model["count"]))
        }
    }

    #[tokio::test]
    async fn update_mutates_model_and_returns_outputs() {
        let model = AppModel::new("counter", Arc::new(CounterLib), json!({"count": 0}));
        let outputs = model.update("in", "\"a\"").await.unwrap();
        assert_eq!(outputs.get("out"), Some(&"\"a\"".to_string()));
        assert_eq!(model.current()["count"], 1);
    }

    #[tokio::test]
    async fn failed_update_leaves_model_unchanged() {
        let model = AppModel::new("counter", Arc::new(CounterLib), json!({"count": 0}));
        assert!(model.update("in", "fail").await.is_err());
        assert_eq!(model.current()["count"], 0);
    }

    #[tokio::test]
    async fn view_reflects_latest_model() {
        let model = AppModel::new("counter", Arc::new(CounterLib), json!({"count": 0}));
        model.update("in", "\"a\"").await.unwrap();
        assert_eq!(model.view().await.unwrap(), "count=1");
    }

    #[tokio::test]
    async fn view_subscribers_receive_fragments_in_order() {
        let model = AppModel::new("counter", Arc::new(CounterLib), json!({"count": 0}));
        let (mut rx, _sub) = model.subscribe_view();
        model.update("in", "\"a\"").await.unwrap();
        model.update("in", "\"b\"").await.unwrap();
        assert_eq!(rx.recv().await, Some("count=1".to_string()));
        assert_eq!(rx.recv().await, Some("count=2".to_string()));
    }

    #[tokio::test]
    async fn failed_update_does_not_broadcast_a_view() {
        let model = AppModel::new("counter", Arc::new(CounterLib), json!({"count": 0}));
        let (mut rx, _sub) = model.subscribe_view();
        assert!(model.update("in", "fail").await.is_err());
        assert!(rx.try_recv().is_err());
    }
}
