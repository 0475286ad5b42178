//! Bayeux wire types.
//!
//! Outgoing requests are [`Request`] values, always sent as a one-element
//! JSON array. A response body is an array of [`Reply`] envelopes: one of
//! them answers the request, the rest are messages the server pushed
//! alongside it and are converted to [`Message`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version sent on handshake.
pub const BAYEUX_VERSION: &str = "1.0";

/// Oldest protocol version the client accepts.
pub const MINIMUM_VERSION: &str = "1.0";

/// The only connection type this client speaks.
pub const LONG_POLLING: &str = "long-polling";

/// Reserved control channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetaChannel {
    /// `/meta/handshake`
    Handshake,
    /// `/meta/connect`
    Connect,
    /// `/meta/subscribe`
    Subscribe,
    /// `/meta/unsubscribe`
    Unsubscribe,
    /// `/meta/disconnect`
    Disconnect,
}

impl MetaChannel {
    /// Channel name on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Handshake => "/meta/handshake",
            Self::Connect => "/meta/connect",
            Self::Subscribe => "/meta/subscribe",
            Self::Unsubscribe => "/meta/unsubscribe",
            Self::Disconnect => "/meta/disconnect",
        }
    }
}

impl fmt::Display for MetaChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An application message pushed by the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Channel the message was published on.
    pub channel: String,
    /// Application payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Server-assigned message id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Session the message was routed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Extension payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

/// A client-to-server envelope. Absent fields are omitted on the wire.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Target channel.
    pub channel: String,
    /// Application payload. Unused by the meta operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Client-chosen message id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Session id, present on everything but the handshake.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Protocol version offered on handshake.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Minimum protocol version accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_version: Option<String>,
    /// Transports the client can speak.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_connection_types: Option<Vec<String>>,
    /// Transport used by this connect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,
    /// Pattern targeted by subscribe / unsubscribe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
    /// Extension payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

impl Request {
    /// `/meta/handshake` offering long-polling only.
    pub fn handshake() -> Self {
        Self {
            channel: MetaChannel::Handshake.as_str().to_owned(),
            version: Some(BAYEUX_VERSION.to_owned()),
            minimum_version: Some(MINIMUM_VERSION.to_owned()),
            supported_connection_types: Some(vec![LONG_POLLING.to_owned()]),
            ..Self::default()
        }
    }

    /// `/meta/connect` for an established session.
    pub fn connect(client_id: &str) -> Self {
        Self {
            channel: MetaChannel::Connect.as_str().to_owned(),
            client_id: Some(client_id.to_owned()),
            connection_type: Some(LONG_POLLING.to_owned()),
            ..Self::default()
        }
    }

    /// `/meta/subscribe` for `pattern`, carrying `ext` when given.
    pub fn subscribe(client_id: &str, pattern: &str, ext: Option<Value>) -> Self {
        Self {
            channel: MetaChannel::Subscribe.as_str().to_owned(),
            client_id: Some(client_id.to_owned()),
            subscription: Some(pattern.to_owned()),
            ext,
            ..Self::default()
        }
    }

    /// `/meta/unsubscribe` for `pattern`.
    pub fn unsubscribe(client_id: &str, pattern: &str) -> Self {
        Self {
            channel: MetaChannel::Unsubscribe.as_str().to_owned(),
            client_id: Some(client_id.to_owned()),
            subscription: Some(pattern.to_owned()),
            ..Self::default()
        }
    }

    /// `/meta/disconnect` ending the session.
    pub fn disconnect(client_id: &str) -> Self {
        Self {
            channel: MetaChannel::Disconnect.as_str().to_owned(),
            client_id: Some(client_id.to_owned()),
            ..Self::default()
        }
    }
}

/// Any server-to-client envelope.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    /// Channel of the envelope.
    pub channel: String,
    /// Whether the meta operation succeeded. Absent on pushed messages.
    #[serde(default)]
    pub successful: bool,
    /// Session id assigned on handshake.
    pub client_id: Option<String>,
    /// Server-supplied failure description.
    pub error: Option<String>,
    /// Pattern acknowledged by subscribe / unsubscribe.
    pub subscription: Option<String>,
    /// Reconnection advice.
    pub advice: Option<Advice>,
    /// Application payload.
    pub data: Option<Value>,
    /// Message id.
    pub id: Option<String>,
    /// Extension payload.
    pub ext: Option<Value>,
    /// Server timestamp.
    pub timestamp: Option<String>,
    /// Negotiated protocol version.
    pub version: Option<String>,
    /// Server's minimum version.
    pub minimum_version: Option<String>,
    /// Transports the server supports.
    pub supported_connection_types: Option<Vec<String>>,
    /// Transport in use.
    pub connection_type: Option<String>,
}

impl Reply {
    /// Server error string, or a generic one when the server sent none.
    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| "unsuccessful reply".to_owned())
    }

    /// Reduce a pushed envelope to the application message it carries.
    pub fn into_message(self) -> Message {
        Message {
            channel: self.channel,
            data: self.data,
            id: self.id,
            client_id: self.client_id,
            ext: self.ext,
        }
    }
}

/// Server reconnection advice.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Advice {
    /// What the client should do after this connect.
    pub reconnect: Option<Reconnect>,
    /// Long-poll hold time in milliseconds.
    pub timeout: Option<i64>,
    /// Delay before the next connect in milliseconds.
    pub interval: Option<i64>,
}

/// Value of `advice.reconnect`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reconnect {
    /// Keep polling with the current session.
    Retry,
    /// The session is gone; handshake again.
    Handshake,
    /// Stop polling.
    #[serde(rename = "none")]
    Stop,
    /// A value this client does not know.
    #[serde(other)]
    Unknown,
}
