//! Request encoding and response demultiplexing.

use crate::errors::{BayeuxError, Result};
use crate::protocol::{Message, Reply, Request};

/// Content type of every Bayeux POST.
pub const CONTENT_TYPE: &str = "application/json";

/// Serialize a request as a one-element JSON array.
pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    serde_json::to_vec(&[request]).map_err(|e| BayeuxError::Encode(e.to_string()))
}

/// Parse a response body into its envelopes.
pub fn decode_batch(body: &[u8]) -> Result<Vec<Reply>> {
    serde_json::from_slice(body).map_err(|e| BayeuxError::Decode(e.to_string()))
}

/// A response batch split into the answer and everything else.
#[derive(Debug, Default)]
pub struct Demuxed {
    /// First envelope on the request's channel.
    pub reply: Option<Reply>,
    /// Remaining envelopes, in arrival order.
    pub pushed: Vec<Message>,
}

/// Split `batch` by channel.
///
/// The first envelope whose channel equals `channel` is the reply. Every
/// other envelope, including later ones on the same channel, is a pushed
/// message.
pub fn demux(channel: &str, batch: Vec<Reply>) -> Demuxed {
    let mut out = Demuxed::default();
    for envelope in batch {
        if out.reply.is_none() && envelope.channel == channel {
            out.reply = Some(envelope);
        } else {
            out.pushed.push(envelope.into_message());
        }
    }
    out
}
