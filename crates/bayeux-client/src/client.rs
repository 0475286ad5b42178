//! Public client facade.

use std::sync::Arc;

use bayeux_settings::BayeuxSettings;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::errors::Result;
use crate::pattern::ChannelPattern;
use crate::protocol::Message;
use crate::session::{Session, SessionPhase};
use crate::transport::{HttpTransport, ReqwestTransport};

/// A Bayeux long-polling client.
///
/// The first operation that needs a session performs the handshake and
/// starts the background poller. Pushed messages are delivered to the
/// `mpsc::Sender` given for every subscription whose pattern matches their
/// channel.
///
/// With the default [`DeliveryPolicy::Block`](bayeux_settings::DeliveryPolicy)
/// a destination that is not drained stalls delivery to every other
/// subscription. Keep receivers read, or configure `DropWhenFull`.
///
/// Dropping the client stops the poller without sending `/meta/disconnect`;
/// call [`close`](Self::close) for a clean shutdown.
pub struct BayeuxClient {
    session: Arc<Session>,
}

impl BayeuxClient {
    /// Client for `url` with default settings.
    pub fn new(url: impl Into<String>, transport: Arc<dyn HttpTransport>) -> Self {
        Self::with_settings(url, transport, BayeuxSettings::default())
    }

    /// Client for `url` with explicit settings.
    pub fn with_settings(
        url: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
        settings: BayeuxSettings,
    ) -> Self {
        Self {
            session: Arc::new(Session::new(url.into(), transport, settings)),
        }
    }

    /// Client using the bundled `reqwest` transport, honoring the settings'
    /// request timeout.
    pub fn with_reqwest(url: impl Into<String>, settings: BayeuxSettings) -> Self {
        let transport = Arc::new(ReqwestTransport::with_timeout(settings.request_timeout()));
        Self::with_settings(url, transport, settings)
    }

    /// Handshake now instead of on first use.
    pub async fn connect(&self) -> Result<()> {
        let _ = self.session.ensure_connected().await?;
        Ok(())
    }

    /// Subscribe `destination` to channels matching `pattern`.
    ///
    /// Subscribing again with an equivalent pattern replaces the previous
    /// destination.
    pub async fn subscribe(&self, pattern: &str, destination: mpsc::Sender<Message>) -> Result<()> {
        self.subscribe_ext(pattern, destination, None).await
    }

    /// [`subscribe`](Self::subscribe) with an extension payload on the
    /// `/meta/subscribe` request.
    pub async fn subscribe_ext(
        &self,
        pattern: &str,
        destination: mpsc::Sender<Message>,
        ext: Option<Value>,
    ) -> Result<()> {
        let pattern = ChannelPattern::compile(pattern)?;
        self.session.subscribe(pattern, destination, ext).await
    }

    /// Remove the subscription for `pattern`.
    ///
    /// The registry does not close destinations. Stop reading from the
    /// receiver before relying on the removal.
    pub async fn unsubscribe(&self, pattern: &str) -> Result<()> {
        let pattern = ChannelPattern::compile(pattern)?;
        self.session.unsubscribe(pattern).await
    }

    /// Stop polling and send `/meta/disconnect`.
    ///
    /// The client is unusable afterwards even when the disconnect fails.
    pub async fn close(&self) -> Result<()> {
        self.session.close().await
    }

    /// Server-issued client id, once handshaken.
    pub async fn client_id(&self) -> Option<String> {
        self.session.client_id().await
    }

    /// Current lifecycle phase.
    pub async fn phase(&self) -> SessionPhase {
        self.session.phase().await
    }

    /// Whether a session is established.
    pub async fn is_connected(&self) -> bool {
        self.phase().await == SessionPhase::Connected
    }

    /// Number of registered patterns.
    pub async fn subscription_count(&self) -> usize {
        self.session.subscription_count().await
    }
}

impl Drop for BayeuxClient {
    fn drop(&mut self) {
        self.session.shutdown.cancel();
    }
}
