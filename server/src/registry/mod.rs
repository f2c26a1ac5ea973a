//! The per-epoch, immutable dispatch table: which models and commands
//! react to which topics, and how to address a model by its key.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::broker::Topic;
use crate::commands::{Command, DelayCommand};
use crate::core::constants::TOPIC_DELAY;
use crate::core::error::RegistryError;
use crate::model::{AppLib, AppModel};

/// Built once per run epoch. Every `AppModel` present in `topic_to_models`
/// also appears in `key_to_model` under its key.
#[derive(Default)]
pub struct Registry {
    pub topic_to_models: HashMap<Topic, Vec<Arc<AppModel>>>,
    pub key_to_model: HashMap<String, Arc<AppModel>>,
    pub topic_to_commands: HashMap<Topic, Vec<Arc<dyn Command>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_model(&mut self, model: Arc<AppModel>, subscriptions: &[Topic]) {
        for topic in subscriptions {
            self.topic_to_models
                .entry(topic.clone())
                .or_default()
                .push(model.clone());
        }
        self.key_to_model.insert(model.key().to_string(), model);
    }

    fn add_command(&mut self, topic: impl Into<Topic>, command: Arc<dyn Command>) {
        self.topic_to_commands
            .entry(topic.into())
            .or_default()
            .push(command);
    }

    /// Every topic either a model or a command cares about — the set the
    /// Updater spawns one worker per, and the set MQTT-in subscribes to.
    pub fn all_topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self.topic_to_models.keys().cloned().collect();
        for topic in self.topic_to_commands.keys() {
            if !topics.contains(topic) {
                topics.push(topic.clone());
            }
        }
        topics
    }

    fn merge(&mut self, other: Registry) {
        for (topic, models) in other.topic_to_models {
            self.topic_to_models.entry(topic).or_default().extend(models);
        }
        self.key_to_model.extend(other.key_to_model);
        for (topic, commands) in other.topic_to_commands {
            self.topic_to_commands.entry(topic).or_default().extend(commands);
        }
    }
}

/// Something that contributes entries to a `Registry` at epoch start.
#[async_trait]
pub trait Registration: Send + Sync {
    async fn register(&self) -> Result<Registry, RegistryError>;
}

/// Registers every app exposed by an `AppLib`.
pub struct AppRegistration {
    app_lib: Arc<dyn AppLib>,
}

impl AppRegistration {
    pub fn new(app_lib: Arc<dyn AppLib>) -> Self {
        Self { app_lib }
    }
}

#[async_trait]
impl Registration for AppRegistration {
    async fn register(&self) -> Result<Registry, RegistryError> {
        let apps = self.app_lib.list_apps().await?;
        let mut registry = Registry::new();
        for (key, data) in apps {
            if registry.key_to_model.contains_key(&key) {
                return Err(RegistryError::DuplicateKey(key));
            }
            let model = AppModel::new(key, self.app_lib.clone(), data.init);
            registry.add_model(model, &data.subscriptions);
        }
        Ok(registry)
    }
}

/// Registers the built-in commands (currently just `yokai/delay`).
pub struct CommandRegistration;

#[async_trait]
impl Registration for CommandRegistration {
    async fn register(&self) -> Result<Registry, RegistryError> {
        let mut registry = Registry::new();
        registry.add_command(TOPIC_DELAY, Arc::new(DelayCommand));
        Ok(registry)
    }
}

/// Merges the registries produced by a set of `Registration`s into one.
pub struct CompoundRegistration {
    registrations: Vec<Arc<dyn Registration>>,
}

impl CompoundRegistration {
    pub fn new(registrations: Vec<Arc<dyn Registration>>) -> Self {
        Self { registrations }
    }
}

#[async_trait]
impl Registration for CompoundRegistration {
    async fn register(&self) -> Result<Registry, RegistryError> {
        let mut registry = Registry::new();
        for registration in &self.registrations {
            registry.merge(registration.register().await?);
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::native::{NativeApp, NativeAppLib};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn echo_lib() -> Arc<dyn AppLib> {
        let mut apps = BTreeMap::new();
        apps.insert(
            "echo".to_string(),
            NativeApp {
                init: json!({}),
                subscriptions: vec!["in".to_string()],
                update: Arc::new(|_m, _t, p| {
                    let mut out = BTreeMap::new();
                    out.insert("model".to_string(), json!({}));
                    out.insert("out".to_string(), p.clone());
                    out
                }),
                view: Arc::new(|_m, _f| String::new()),
            },
        );
        Arc::new(NativeAppLib::new(apps))
    }

    #[tokio::test]
    async fn app_registration_wires_topic_and_key() {
        let registration = AppRegistration::new(echo_lib());
        let registry = registration.register().await.unwrap();
        assert!(registry.key_to_model.contains_key("echo"));
        assert_eq!(registry.topic_to_models["in"].len(), 1);
    }

    #[tokio::test]
    async fn command_registration_wires_delay() {
        let registration = CommandRegistration;
        let registry = registration.register().await.unwrap();
        assert_eq!(registry.topic_to_commands[TOPIC_DELAY].len(), 1);
    }

    #[tokio::test]
    async fn compound_registration_merges_both() {
        let registration = CompoundRegistration::new(vec![
            Arc::new(AppRegistration::new(echo_lib())),
            Arc::new(CommandRegistration),
        ]);
        let registry = registration.register().await.unwrap();
        assert!(registry.key_to_model.contains_key("echo"));
        assert!(registry.topic_to_commands.contains_key(TOPIC_DELAY));
        let topics = registry.all_topics();
        assert!(topics.contains(&"in".to_string()));
        assert!(topics.contains(&TOPIC_DELAY.to_string()));
    }
}
