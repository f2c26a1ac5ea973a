//! In-process topic pub/sub with bounded, drop-on-full delivery.
//!
//! A `Broker` never blocks a publisher: each subscriber has its own bounded
//! channel, and a publish that would block a full channel is simply skipped
//! for that subscriber. This mirrors the Go reference's non-blocking
//! `select { case ch <- payload: default: }` send.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::core::constants::TOPIC_SUBSCRIBER_CAPACITY;

pub type Topic = String;
pub type Payload = String;

#[derive(Debug, Clone)]
pub struct TopicPayload {
    pub topic: Topic,
    pub payload: Payload,
}

struct SubscriberEntry<T> {
    id: u64,
    sender: mpsc::Sender<T>,
}

struct Inner {
    topics: HashMap<Topic, Vec<SubscriberEntry<Payload>>>,
    all: Vec<SubscriberEntry<TopicPayload>>,
}

/// One of the three epoch-scoped message buses (source, view, sink).
pub struct Broker {
    inner: RwLock<Inner>,
    next_id: AtomicU64,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                topics: HashMap::new(),
                all: Vec::new(),
            }),
            next_id: AtomicU64::new(0),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Subscribe to a single topic. The returned `Subscription` removes and
    /// closes the channel on drop (or on an explicit `unsubscribe()` call).
    pub fn subscribe(self: &Arc<Self>, topic: impl Into<Topic>) -> (mpsc::Receiver<Payload>, Subscription) {
        let topic = topic.into();
        let (tx, rx) = mpsc::channel(TOPIC_SUBSCRIBER_CAPACITY);
        let id = self.next_id();
        self.inner
            .write()
            .topics
            .entry(topic.clone())
            .or_default()
            .push(SubscriberEntry { id, sender: tx });

        let sub = Subscription::new_topic(self.clone(), topic, id);
        (rx, sub)
    }

    /// Subscribe to every publish on every topic, in publish order.
    pub fn subscribe_all(self: &Arc<Self>) -> (mpsc::Receiver<TopicPayload>, Subscription) {
        let (tx, rx) = mpsc::channel(TOPIC_SUBSCRIBER_CAPACITY);
        let id = self.next_id();
        self.inner.write().all.push(SubscriberEntry { id, sender: tx });

        let sub = Subscription::new_all(self.clone(), id);
        (rx, sub)
    }

    /// Publish `payload` on `topic`. Never blocks; a subscriber whose queue
    /// is full simply misses this delivery.
    pub fn publish(&self, topic: impl Into<Topic>, payload: impl Into<Payload>) {
        let topic = topic.into();
        let payload = payload.into();
        let inner = self.inner.read();

        if let Some(subs) = inner.topics.get(&topic) {
            for sub in subs {
                let _ = sub.sender.try_send(payload.clone());
            }
        }
        for sub in &inner.all {
            let _ = sub.sender.try_send(TopicPayload {
                topic: topic.clone(),
                payload: payload.clone(),
            });
        }
    }

    fn remove_topic_subscriber(&self, topic: &str, id: u64) {
        let mut inner = self.inner.write();
        if let Some(subs) = inner.topics.get_mut(topic) {
            subs.retain(|s| s.id != id);
            if subs.is_empty() {
                inner.topics.remove(topic);
            }
        }
    }

    fn remove_all_subscriber(&self, id: u64) {
        self.inner.write().all.retain(|s| s.id != id);
    }
}

enum SubscriptionKind {
    Topic(Topic),
    All,
}

/// Handle returned by `subscribe`/`subscribe_all`. Dropping it (or calling
/// `unsubscribe()` explicitly) removes the subscriber from the broker.
/// A second unsubscribe is a safe no-op.
pub struct Subscription {
    broker: Arc<Broker>,
    kind: SubscriptionKind,
    id: u64,
    removed: AtomicBool,
}

impl Subscription {
    fn new_topic(broker: Arc<Broker>, topic: Topic, id: u64) -> Self {
        Self {
            broker,
            kind: SubscriptionKind::Topic(topic),
            id,
            removed: AtomicBool::new(false),
        }
    }

    fn new_all(broker: Arc<Broker>, id: u64) -> Self {
        Self {
            broker,
            kind: SubscriptionKind::All,
            id,
            removed: AtomicBool::new(false),
        }
    }

    /// Remove this subscriber from the broker. Idempotent.
    pub fn unsubscribe(&self) {
        if self.removed.swap(true, Ordering::AcqRel) {
            return;
        }
        match &self.kind {
            SubscriptionKind::Topic(topic) => self.broker.remove_topic_subscriber(topic, self.id),
            SubscriptionKind::All => self.broker.remove_all_subscriber(self.id),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_delivers_to_topic_subscriber() {
        let broker = Arc::new(Broker::new());
        let (mut rx, _sub) = broker.subscribe("t");
        broker.publish("t", "hello");
        assert_eq!(rx.recv().await, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn publish_does_not_leak_across_topics() {
        let broker = Arc::new(Broker::new());
        let (mut rx, _sub) = broker.subscribe("a");
        broker.publish("b", "hello");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn subscribe_all_receives_every_topic_in_order() {
        let broker = Arc::new(Broker::new());
        let (mut rx, _sub) = broker.subscribe_all();
        broker.publish("a", "1");
        broker.publish("b", "2");
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.topic, "a");
        assert_eq!(second.topic, "b");
    }

    #[tokio::test]
    async fn publish_never_blocks_on_a_full_subscriber() {
        let broker = Arc::new(Broker::new());
        let (_rx, _sub) = broker.subscribe("t");
        for i in 0..(TOPIC_SUBSCRIBER_CAPACITY + 10) {
            broker.publish("t", i.to_string());
        }
        // No panic, no deadlock: publish is non-blocking even once the
        // subscriber's queue is saturated.
    }

    #[tokio::test]
    async fn unsubscribe_removes_and_closes_the_channel() {
        let broker = Arc::new(Broker::new());
        let (mut rx, sub) = broker.subscribe("t");
        sub.unsubscribe();
        broker.publish("t", "hello");
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let broker = Arc::new(Broker::new());
        let (_rx, sub) = broker.subscribe("t");
        sub.unsubscribe();
        sub.unsubscribe();
        assert!(broker.inner.read().topics.is_empty());
    }

    #[tokio::test]
    async fn drop_unsubscribes() {
        let broker = Arc::new(Broker::new());
        let (_rx, sub) = broker.subscribe("t");
        drop(sub);
        assert!(broker.inner.read().topics.is_empty());
    }

    #[tokio::test]
    async fn multiple_subscribers_on_same_topic_each_receive() {
        let broker = Arc::new(Broker::new());
        let (mut rx1, _s1) = broker.subscribe("t");
        let (mut rx2, _s2) = broker.subscribe("t");
        broker.publish("t", "hi");
        assert_eq!(rx1.recv().await, Some("hi".to_string()));
        assert_eq!(rx2.recv().await, Some("hi".to_string()));
    }
}
