//! # bayeux-client
//!
//! Client for the Bayeux publish/subscribe protocol over HTTP long-polling.
//!
//! - [`BayeuxClient`]: handshake on first use, subscribe by glob pattern,
//!   receive pushed messages on `tokio::sync::mpsc` channels
//! - [`HttpTransport`]: the POST seam, with [`ReqwestTransport`] as default
//! - [`protocol`] / [`codec`]: wire envelopes and response demultiplexing
//!
//! ```no_run
//! use bayeux_client::{BayeuxClient, Message};
//! use bayeux_settings::BayeuxSettings;
//! use tokio::sync::mpsc;
//!
//! # async fn run() -> bayeux_client::Result<()> {
//! let url = "https://example.com/cometd";
//! let client = BayeuxClient::with_reqwest(url, BayeuxSettings::default());
//! let (tx, mut rx) = mpsc::channel::<Message>(64);
//! client.subscribe("/chat/**", tx).await?;
//! while let Some(message) = rx.recv().await {
//!     println!("{}: {:?}", message.channel, message.data);
//! }
//! client.close().await
//! # }
//! ```

#![deny(unsafe_code)]

pub mod client;
pub mod codec;
pub mod errors;
pub mod logging;
pub mod pattern;
pub mod protocol;
pub mod registry;
pub mod transport;

mod session;
mod worker;

#[cfg(test)]
mod test_utils;

pub use client::BayeuxClient;
pub use errors::{BayeuxError, Result};
pub use pattern::ChannelPattern;
pub use protocol::{Advice, Message, MetaChannel, Reconnect, Reply, Request};
pub use session::SessionPhase;
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};
