//! Subscription registry.
//!
//! Maps canonical pattern keys to destinations. Re-registering a key
//! replaces the previous entry; only an explicit [`SubscriptionRegistry::remove`]
//! drops one.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::pattern::ChannelPattern;
use crate::protocol::Message;

/// A registered subscription.
#[derive(Debug, Clone)]
pub struct Subscription {
    pattern: ChannelPattern,
    destination: mpsc::Sender<Message>,
    ext: Option<Value>,
}

impl Subscription {
    /// Bind a compiled pattern to a destination.
    pub fn new(
        pattern: ChannelPattern,
        destination: mpsc::Sender<Message>,
        ext: Option<Value>,
    ) -> Self {
        Self {
            pattern,
            destination,
            ext,
        }
    }
}

/// A destination selected for one message.
#[derive(Debug, Clone)]
pub struct Route {
    /// Source text of the pattern that matched.
    pub pattern: String,
    /// Where to deliver.
    pub destination: mpsc::Sender<Message>,
}

/// Pattern-keyed subscriptions.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: HashMap<String, Subscription>,
}

impl SubscriptionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace, returning the replaced subscription.
    pub fn insert(&mut self, subscription: Subscription) -> Option<Subscription> {
        let key = subscription.pattern.canonical().to_owned();
        self.entries.insert(key, subscription)
    }

    /// Remove the subscription registered under `pattern`'s key.
    pub fn remove(&mut self, pattern: &ChannelPattern) -> Option<Subscription> {
        self.entries.remove(pattern.canonical())
    }

    /// Destinations of every pattern matching `channel`.
    ///
    /// Returns owned senders so the caller can deliver without holding the
    /// registry.
    pub fn matching(&self, channel: &str) -> Vec<Route> {
        self.entries
            .values()
            .filter(|sub| sub.pattern.matches(channel))
            .map(|sub| Route {
                pattern: sub.pattern.as_str().to_owned(),
                destination: sub.destination.clone(),
            })
            .collect()
    }

    /// Pattern source and ext of every entry, for re-subscribing after a
    /// new handshake.
    pub fn snapshot(&self) -> Vec<(String, Option<Value>)> {
        self.entries
            .values()
            .map(|sub| (sub.pattern.as_str().to_owned(), sub.ext.clone()))
            .collect()
    }

    /// Number of registered patterns.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
