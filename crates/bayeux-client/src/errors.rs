//! Client error types.

use thiserror::Error;

/// Errors surfaced by the Bayeux client.
///
/// Every variant carries owned strings so the error is `Clone`: a failed
/// handshake is handed to every caller that was waiting on it.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BayeuxError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, lossily decoded.
        body: String,
    },

    /// The outgoing request could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(String),

    /// The response body is not a valid batch of envelopes.
    #[error("failed to decode response batch: {0}")]
    Decode(String),

    /// The server replied with `successful: false`.
    #[error("{channel} failed: {message}")]
    Protocol {
        /// Meta channel of the rejected operation.
        channel: String,
        /// Server-supplied error string.
        message: String,
    },

    /// The response batch carried no envelope for the request's channel.
    #[error("no reply for {channel} in response batch")]
    MissingReply {
        /// Channel of the request left unanswered.
        channel: String,
    },

    /// A subscription pattern failed to compile.
    #[error("invalid pattern {pattern:?}: {message}")]
    InvalidPattern {
        /// Pattern as given by the caller.
        pattern: String,
        /// Compiler message.
        message: String,
    },

    /// The client has been closed.
    #[error("client is closed")]
    Closed,
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, BayeuxError>;
