//! The central dispatcher: one worker per topic, bridging the **source**
//! broker to the **view** and **sink** brokers through a topic's Models and
//! Commands.
//!
//! Every topic present in the epoch's [`Registry`] gets exactly one worker
//! task, so a topic's inputs are processed strictly in arrival order while
//! unrelated topics run fully concurrently (§4.4 of the design).

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::broker::Broker;
use crate::commands::Command;
use crate::model::AppModel;
use crate::registry::Registry;

/// Spawn one worker per topic in `registry` onto `tracker`. Workers run
/// until `token` is cancelled or their source subscription closes.
pub fn spawn(
    registry: Arc<Registry>,
    source: Arc<Broker>,
    view: Arc<Broker>,
    sink: Arc<Broker>,
    tracker: &TaskTracker,
    token: CancellationToken,
) {
    for topic in registry.all_topics() {
        let models = registry.topic_to_models.get(&topic).cloned().unwrap_or_default();
        let commands = registry.topic_to_commands.get(&topic).cloned().unwrap_or_default();
        let source = source.clone();
        let view = view.clone();
        let sink = sink.clone();
        let token = token.clone();
        tracker.spawn(run_topic_worker(topic, models, commands, source, view, sink, token));
    }
}

async fn run_topic_worker(
    topic: String,
    models: Vec<Arc<AppModel>>,
    commands: Vec<Arc<dyn Command>>,
    source: Arc<Broker>,
    view: Arc<Broker>,
    sink: Arc<Broker>,
    token: CancellationToken,
) {
    let (mut rx, _subscription) = source.subscribe(topic.clone());

    loop {
        let payload = tokio::select! {
            _ = token.cancelled() => break,
            received = rx.recv() => match received {
                Some(payload) => payload,
                None => break,
            },
        };

        let mut views = Vec::new();
        let mut outputs = Vec::new();

        for model in &models {
            match model.update(&topic, &payload).await {
                Ok(outcome) => {
                    if let Some(fragment) = outcome.view {
                        views.push((model.key().to_string(), fragment));
                    }
                    outputs.extend(outcome.outputs);
                }
                Err(err) => {
                    tracing::error!(topic = %topic, key = model.key(), error = %err, "model update failed");
                }
            }
        }

        for command in &commands {
            match command.run(&token, &topic, &payload).await {
                Ok(command_outputs) => outputs.extend(command_outputs),
                Err(err) => {
                    tracing::error!(topic = %topic, error = %err, "command failed");
                }
            }
        }

        for (key, fragment) in views {
            view.publish(key, fragment);
        }
        for (out_topic, out_payload) in outputs {
            sink.publish(out_topic, out_payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::native::{NativeApp, NativeAppLib};
    use crate::model::AppLib;
    use crate::registry::{AppRegistration, CommandRegistration, CompoundRegistration, Registration};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn echo_lib() -> Arc<dyn AppLib> {
        let mut apps = BTreeMap::new();
        apps.insert(
            "echo".to_string(),
            NativeApp {
                init: json!({}),
                subscriptions: vec!["in".to_string()],
                update: Arc::new(|model, _topic, payload| {
                    let mut out = BTreeMap::new();
                    out.insert("model".to_string(), model.clone());
                    out.insert("out".to_string(), payload.clone());
                    out
                }),
                view: Arc::new(|_model, _fragment| "view".to_string()),
            },
        );
        Arc::new(NativeAppLib::new(apps))
    }

    async fn build_registry(lib: Arc<dyn AppLib>) -> Arc<Registry> {
        let registration = CompoundRegistration::new(vec![
            Arc::new(AppRegistration::new(lib)),
            Arc::new(CommandRegistration),
        ]);
        Arc::new(registration.register().await.unwrap())
    }

    #[tokio::test]
    async fn single_app_echo_publishes_view_then_command() {
        let registry = build_registry(echo_lib()).await;
        let source = Arc::new(Broker::new());
        let view = Arc::new(Broker::new());
        let sink = Arc::new(Broker::new());
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();

        let (mut sink_rx, _s1) = sink.subscribe("out");
        let (mut view_rx, _s2) = view.subscribe("echo");

        spawn(registry, source.clone(), view, sink, &tracker, token.clone());
        tracker.close();

        source.publish("in", "\"hello\"");

        assert_eq!(sink_rx.recv().await, Some("\"hello\"".to_string()));
        assert_eq!(view_rx.recv().await, Some("view".to_string()));

        token.cancel();
        tracker.wait().await;
    }

    #[tokio::test]
    async fn delay_command_emits_after_sleeping() {
        let registry = build_registry(echo_lib()).await;
        let source = Arc::new(Broker::new());
        let view = Arc::new(Broker::new());
        let sink = Arc::new(Broker::new());
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();

        let (mut later_rx, _s) = sink.subscribe("later");
        spawn(registry, source.clone(), view, sink, &tracker, token.clone());
        tracker.close();

        source.publish(
            "yokai/delay",
            r#"{"milliseconds":20,"topic":"later","message":"x"}"#,
        );

        let result = tokio::time::timeout(Duration::from_millis(500), later_rx.recv()).await;
        assert_eq!(result.unwrap(), Some("\"x\"".to_string()));

        token.cancel();
        tracker.wait().await;
    }

    #[tokio::test]
    async fn cancelling_before_delay_fires_yields_no_publish() {
        let registry = build_registry(echo_lib()).await;
        let source = Arc::new(Broker::new());
        let view = Arc::new(Broker::new());
        let sink = Arc::new(Broker::new());
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();

        let (mut later_rx, _s) = sink.subscribe("later");
        spawn(registry, source.clone(), view, sink, &tracker, token.clone());
        tracker.close();

        source.publish(
            "yokai/delay",
            r#"{"milliseconds":500,"topic":"later","message":"x"}"#,
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
        tracker.wait().await;

        assert!(later_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn order_is_preserved_within_a_topic() {
        let mut apps = BTreeMap::new();
        apps.insert(
            "list".to_string(),
            NativeApp {
                init: json!({"items": []}),
                subscriptions: vec!["t".to_string()],
                update: Arc::new(|model, _topic, payload| {
                    let mut items: Vec<serde_json::Value> =
                        model["items"].as_array().cloned().unwrap_or_default();
                    items.push(payload.clone());
                    let mut out = BTreeMap::new();
                    out.insert("model".to_string(), json!({"items": items}));
                    out
                }),
                view: Arc::new(|model, _fragment| format!("{}", model["items"])),
            },
        );
        let lib: Arc<dyn AppLib> = Arc::new(NativeAppLib::new(apps));
        let registry = build_registry(lib.clone()).await;
        let source = Arc::new(Broker::new());
        let view = Arc::new(Broker::new());
        let sink = Arc::new(Broker::new());
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();

        let model = registry.key_to_model["list"].clone();

        spawn(registry, source.clone(), view, sink, &tracker, token.clone());
        tracker.close();

        source.publish("t", "\"a\"");
        source.publish("t", "\"b\"");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(model.current()["items"], json!(["a", "b"]));

        token.cancel();
        tracker.wait().await;
    }

    #[tokio::test]
    async fn isolation_on_error_does_not_block_sibling_model() {
        // NativeAppLib has no failure hook, so this scenario is exercised
        // end to end against a custom `AppLib` where app "a" always errors.
        struct FlakyLib;
        #[async_trait::async_trait]
        impl AppLib for FlakyLib {
            async fn list_apps(
                &self,
            ) -> Result<BTreeMap<String, crate::model::AppData>, crate::core::error::AppLibError>
            {
                let mut apps = BTreeMap::new();
                apps.insert(
                    "a".to_string(),
                    crate::model::AppData {
                        init: json!({}),
                        subscriptions: vec!["t".to_string()],
                    },
                );
                apps.insert(
                    "b".to_string(),
                    crate::model::AppData {
                        init: json!({}),
                        subscriptions: vec!["t".to_string()],
                    },
                );
                Ok(apps)
            }

            async fn update(
                &self,
                key: &str,
                _topic: &str,
                payload: &str,
                model: &serde_json::Value,
            ) -> Result<BTreeMap<String, serde_json::Value>, crate::core::error::AppLibError> {
                if key == "a" {
                    return Err(crate::core::error::AppLibError::Evaluation("boom".into()));
                }
                let mut out = BTreeMap::new();
                out.insert("model".to_string(), model.clone());
                out.insert("out".to_string(), json!(payload));
                Ok(out)
            }

            async fn view(
                &self,
                _key: &str,
                _model: &serde_json::Value,
                _fragment: bool,
            ) -> Result<String, crate::core::error::AppLibError> {
                Ok(String::new())
            }
        }

        let lib: Arc<dyn AppLib> = Arc::new(FlakyLib);
        let registry = build_registry(lib).await;
        let source = Arc::new(Broker::new());
        let view = Arc::new(Broker::new());
        let sink = Arc::new(Broker::new());
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();

        let (mut sink_rx, _s) = sink.subscribe("out");
        spawn(registry, source.clone(), view, sink, &tracker, token.clone());
        tracker.close();

        source.publish("t", "\"p\"");
        assert_eq!(sink_rx.recv().await, Some("\"\\\"p\\\"\"".to_string()));

        token.cancel();
        tracker.wait().await;
    }
}
