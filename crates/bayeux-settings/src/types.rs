//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` for the JSON file
//! format. Missing fields take their [`Default`] value, so a partial file
//! only needs to name what it overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default bound of the pushed-message queue between senders and the worker.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// How the long-poll worker hands a pushed message to a subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeliveryPolicy {
    /// Wait for capacity on each destination in turn.
    ///
    /// A destination that is never drained stalls delivery to every other
    /// subscriber, and eventually the senders feeding the queue.
    #[default]
    Block,
    /// Drop the message for a destination whose buffer is full and log it.
    DropWhenFull,
}

/// What the client does with `advice` returned on `/meta/connect`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdvicePolicy {
    /// Parse and log advice, never act on it.
    #[default]
    Ignore,
    /// Apply the advised interval and honor `handshake` / `none` reconnects.
    Follow,
}

/// Root settings type for the Bayeux client.
///
/// ```json
/// {
///   "pollIntervalMs": 0,
///   "queueCapacity": 100,
///   "delivery": "block",
///   "advice": "ignore"
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BayeuxSettings {
    /// Delay between consecutive `/meta/connect` requests.
    pub poll_interval_ms: u64,
    /// Capacity of the internal pushed-message queue.
    pub queue_capacity: usize,
    /// Per-request timeout for the bundled HTTP transport. Unset means
    /// long-polls are bounded only by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
    /// Fan-out backpressure policy.
    pub delivery: DeliveryPolicy,
    /// Server advice handling.
    pub advice: AdvicePolicy,
    /// Default `tracing` filter used by binaries.
    pub log_level: String,
}

impl Default for BayeuxSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 0,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            request_timeout_ms: None,
            delivery: DeliveryPolicy::default(),
            advice: AdvicePolicy::default(),
            log_level: "warn".to_string(),
        }
    }
}

impl BayeuxSettings {
    /// Correct values that would make the client unusable.
    ///
    /// A zero queue capacity is raised to 1 with a warning; `tokio` channels
    /// reject a zero bound.
    pub fn validate(&mut self) {
        if self.queue_capacity == 0 {
            tracing::warn!("queue_capacity must be at least 1, using 1");
            self.queue_capacity = 1;
        }
    }

    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Request timeout as a [`Duration`], if configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = BayeuxSettings::default();
        assert_eq!(s.poll_interval_ms, 0);
        assert_eq!(s.queue_capacity, 100);
        assert_eq!(s.delivery, DeliveryPolicy::Block);
        assert_eq!(s.advice, AdvicePolicy::Ignore);
        assert!(s.request_timeout().is_none());
        assert_eq!(s.poll_interval(), Duration::ZERO);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let s: BayeuxSettings =
            serde_json::from_str(r#"{"delivery": "dropWhenFull"}"#).unwrap();
        assert_eq!(s.delivery, DeliveryPolicy::DropWhenFull);
        assert_eq!(s.queue_capacity, 100);
        assert_eq!(s.log_level, "warn");
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(BayeuxSettings::default()).unwrap();
        assert_eq!(json["pollIntervalMs"], 0);
        assert_eq!(json["queueCapacity"], 100);
        assert_eq!(json["advice"], "ignore");
        assert!(json.get("requestTimeoutMs").is_none());
    }

    #[test]
    fn validate_raises_zero_capacity() {
        let mut s = BayeuxSettings {
            queue_capacity: 0,
            ..Default::default()
        };
        s.validate();
        assert_eq!(s.queue_capacity, 1);
    }

    #[test]
    fn request_timeout_converts() {
        let s = BayeuxSettings {
            request_timeout_ms: Some(1500),
            ..Default::default()
        };
        assert_eq!(s.request_timeout(), Some(Duration::from_millis(1500)));
    }
}
