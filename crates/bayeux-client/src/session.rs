//! Session state machine.
//!
//! Owns the client id, the subscription registry and the long-poll worker
//! behind one `RwLock`. Every meta operation goes through [`Session::send`],
//! which also feeds pushed messages from each response into the worker's
//! queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bayeux_settings::BayeuxSettings;
use serde_json::Value;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::codec::{self, CONTENT_TYPE, Demuxed};
use crate::errors::{BayeuxError, Result};
use crate::pattern::ChannelPattern;
use crate::protocol::{Message, Reply, Request};
use crate::registry::{Route, Subscription, SubscriptionRegistry};
use crate::transport::HttpTransport;
use crate::worker;

/// Where the session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    /// No client id. Initial state, and the state after the server advised
    /// the client to stop reconnecting.
    Disconnected,
    /// A handshake is in flight.
    Handshaking,
    /// Client id issued, worker polling.
    Connected,
    /// `close` is stopping the worker and sending `/meta/disconnect`.
    Disconnecting,
    /// Closed for good.
    Closed,
}

pub(crate) struct SessionState {
    pub(crate) phase: SessionPhase,
    pub(crate) client_id: Option<String>,
    pub(crate) registry: SubscriptionRegistry,
    worker: Option<JoinHandle<()>>,
    /// Held here until the worker starts, and handed back if it stops on
    /// server advice.
    pub(crate) queue_rx: Option<mpsc::Receiver<Message>>,
    last_handshake_error: Option<BayeuxError>,
}

pub(crate) struct Session {
    url: String,
    transport: Arc<dyn HttpTransport>,
    pub(crate) settings: BayeuxSettings,
    queue: mpsc::Sender<Message>,
    pub(crate) shutdown: CancellationToken,
    /// Finished handshake attempts. Read outside the lock so a caller can
    /// tell whether a handshake completed while it was waiting.
    handshakes: AtomicU64,
    pub(crate) state: RwLock<SessionState>,
}

impl Session {
    pub(crate) fn new(
        url: String,
        transport: Arc<dyn HttpTransport>,
        settings: BayeuxSettings,
    ) -> Self {
        let (queue, queue_rx) = mpsc::channel(settings.queue_capacity.max(1));
        Self {
            url,
            transport,
            settings,
            queue,
            shutdown: CancellationToken::new(),
            handshakes: AtomicU64::new(0),
            state: RwLock::new(SessionState {
                phase: SessionPhase::Disconnected,
                client_id: None,
                registry: SubscriptionRegistry::new(),
                worker: None,
                queue_rx: Some(queue_rx),
                last_handshake_error: None,
            }),
        }
    }

    // ── wire ────────────────────────────────────────────────────────

    /// Post one request and split the response batch.
    async fn exchange(&self, request: &Request) -> Result<Demuxed> {
        let body = codec::encode_request(request)?;
        debug!(channel = %request.channel, bytes = body.len(), "sending request");

        let response = self.transport.post(&self.url, CONTENT_TYPE, body).await?;
        if !response.is_success() {
            return Err(BayeuxError::Status {
                status: response.status,
                body: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }

        let batch = codec::decode_batch(&response.body)?;
        Ok(codec::demux(&request.channel, batch))
    }

    /// Hand pushed messages to the worker. Waits while the queue is full,
    /// so a worker must be draining it.
    async fn enqueue(&self, pushed: Vec<Message>) {
        for message in pushed {
            trace!(channel = %message.channel, "enqueueing pushed message");
            if self.queue.send(message).await.is_err() {
                debug!("message queue closed, dropping pushed message");
            }
        }
    }

    /// Send one request and return its reply. Other envelopes in the
    /// response are enqueued for the worker.
    pub(crate) async fn send(&self, request: &Request) -> Result<Reply> {
        let Demuxed { reply, pushed } = self.exchange(request).await?;
        self.enqueue(pushed).await;
        reply.ok_or_else(|| BayeuxError::MissingReply {
            channel: request.channel.clone(),
        })
    }

    /// Send and require `successful: true`.
    async fn request_ok(&self, request: Request) -> Result<Reply> {
        let reply = self.send(&request).await?;
        accept(&request.channel, reply)
    }

    /// `/meta/handshake`, returning the issued client id together with any
    /// messages pushed alongside the reply.
    ///
    /// The pushes are not enqueued here: on a first handshake no worker is
    /// draining the queue yet.
    pub(crate) async fn handshake(&self) -> Result<(String, Vec<Message>)> {
        let request = Request::handshake();
        let Demuxed { reply, pushed } = self.exchange(&request).await?;
        let reply = reply.ok_or_else(|| BayeuxError::MissingReply {
            channel: request.channel.clone(),
        })?;
        let client_id = accept(&request.channel, reply)?
            .client_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| BayeuxError::Decode("handshake reply carried no clientId".into()))?;
        Ok((client_id, pushed))
    }

    /// `/meta/connect`. The reply is returned as-is; the worker decides what
    /// an unsuccessful one means.
    pub(crate) async fn connect(&self, client_id: &str) -> Result<Reply> {
        self.send(&Request::connect(client_id)).await
    }

    /// `/meta/disconnect`.
    pub(crate) async fn disconnect(&self, client_id: &str) -> Result<()> {
        let _ = self.request_ok(Request::disconnect(client_id)).await?;
        Ok(())
    }

    // ── lifecycle ───────────────────────────────────────────────────

    /// Handshake unless already connected, starting the worker on success.
    ///
    /// Callers that waited on a handshake which then failed get that
    /// failure back rather than starting another one.
    pub(crate) async fn ensure_connected(self: &Arc<Self>) -> Result<String> {
        let seen = self.handshakes.load(Ordering::Acquire);
        {
            let state = self.state.read().await;
            if let Some(result) = settled(&state) {
                return result;
            }
        }

        let mut state = self.state.write().await;
        if let Some(result) = settled(&state) {
            return result;
        }
        if self.handshakes.load(Ordering::Acquire) != seen
            && let Some(err) = &state.last_handshake_error
        {
            return Err(err.clone());
        }

        state.phase = SessionPhase::Handshaking;
        let outcome = self.handshake().await;
        let _ = self.handshakes.fetch_add(1, Ordering::AcqRel);

        match outcome {
            Ok((client_id, pushed)) => {
                info!(client_id = %client_id, "handshake succeeded");
                state.phase = SessionPhase::Connected;
                state.client_id = Some(client_id.clone());
                state.last_handshake_error = None;
                if state.worker.is_none()
                    && let Some(queue) = state.queue_rx.take()
                {
                    state.worker = Some(worker::spawn(Arc::clone(self), queue));
                }
                drop(state);

                self.enqueue(pushed).await;
                Ok(client_id)
            }
            Err(e) => {
                warn!(error = %e, "handshake failed");
                state.phase = SessionPhase::Disconnected;
                state.last_handshake_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Handshake again from the worker after the server dropped the
    /// session, then replay every registered subscription.
    pub(crate) async fn rehandshake(&self) -> Result<()> {
        let (client_id, pushed) = self.handshake().await?;
        let resubscribe = {
            let mut state = self.state.write().await;
            if state.phase != SessionPhase::Connected {
                return Err(BayeuxError::Closed);
            }
            state.client_id = Some(client_id.clone());
            state.registry.snapshot()
        };
        info!(
            client_id = %client_id,
            subscriptions = resubscribe.len(),
            "session re-established"
        );
        self.enqueue(pushed).await;

        for (pattern, ext) in resubscribe {
            if let Err(e) = self
                .request_ok(Request::subscribe(&client_id, &pattern, ext))
                .await
            {
                warn!(pattern = %pattern, error = %e, "re-subscribe failed");
            }
        }
        Ok(())
    }

    /// Called by a worker that stopped on server advice: drop the session
    /// and keep the queue for the next worker.
    pub(crate) async fn park(&self, queue: mpsc::Receiver<Message>) {
        let mut state = self.state.write().await;
        if state.phase != SessionPhase::Connected {
            return;
        }
        info!("server advised no reconnect, session dropped");
        state.phase = SessionPhase::Disconnected;
        state.client_id = None;
        state.worker = None;
        state.queue_rx = Some(queue);
    }

    /// Stop the worker, then send one best-effort `/meta/disconnect`.
    ///
    /// The session is closed afterwards whatever the disconnect returns.
    pub(crate) async fn close(&self) -> Result<()> {
        let (client_id, worker) = {
            let mut state = self.state.write().await;
            if matches!(
                state.phase,
                SessionPhase::Disconnecting | SessionPhase::Closed
            ) {
                return Ok(());
            }
            state.phase = SessionPhase::Disconnecting;
            state.queue_rx = None;
            (state.client_id.take(), state.worker.take())
        };

        self.shutdown.cancel();
        if let Some(worker) = worker
            && let Err(e) = worker.await
        {
            warn!(error = %e, "long-poll worker ended abnormally");
        }

        let result = match &client_id {
            Some(id) => self.disconnect(id).await,
            None => Ok(()),
        };
        self.state.write().await.phase = SessionPhase::Closed;

        match &result {
            Ok(()) => info!(client_id = client_id.as_deref(), "session closed"),
            Err(e) => warn!(
                client_id = client_id.as_deref(),
                error = %e,
                "disconnect failed, session closed anyway"
            ),
        }
        result
    }

    // ── subscriptions ───────────────────────────────────────────────

    pub(crate) async fn subscribe(
        self: &Arc<Self>,
        pattern: ChannelPattern,
        destination: mpsc::Sender<Message>,
        ext: Option<Value>,
    ) -> Result<()> {
        let client_id = self.ensure_connected().await?;
        let _ = self
            .request_ok(Request::subscribe(&client_id, pattern.as_str(), ext.clone()))
            .await?;

        let source = pattern.as_str().to_owned();
        let replaced = self
            .state
            .write()
            .await
            .registry
            .insert(Subscription::new(pattern, destination, ext));
        info!(pattern = %source, replaced = replaced.is_some(), "subscribed");
        Ok(())
    }

    /// Server failure leaves the registry entry in place.
    pub(crate) async fn unsubscribe(self: &Arc<Self>, pattern: ChannelPattern) -> Result<()> {
        let client_id = self.ensure_connected().await?;
        let _ = self
            .request_ok(Request::unsubscribe(&client_id, pattern.as_str()))
            .await?;

        let removed = self.state.write().await.registry.remove(&pattern);
        info!(pattern = %pattern, removed = removed.is_some(), "unsubscribed");
        Ok(())
    }

    // ── accessors ───────────────────────────────────────────────────

    pub(crate) async fn routes(&self, channel: &str) -> Vec<Route> {
        self.state.read().await.registry.matching(channel)
    }

    pub(crate) async fn client_id(&self) -> Option<String> {
        self.state.read().await.client_id.clone()
    }

    pub(crate) async fn phase(&self) -> SessionPhase {
        self.state.read().await.phase
    }

    pub(crate) async fn subscription_count(&self) -> usize {
        self.state.read().await.registry.len()
    }
}

/// `Ok` for a successful reply, otherwise the server's error.
fn accept(channel: &str, reply: Reply) -> Result<Reply> {
    if reply.successful {
        Ok(reply)
    } else {
        Err(BayeuxError::Protocol {
            channel: channel.to_owned(),
            message: reply.error_message(),
        })
    }
}

/// Outcome for states that need no handshake.
fn settled(state: &SessionState) -> Option<Result<String>> {
    match state.phase {
        SessionPhase::Connected => state.client_id.clone().map(Ok),
        SessionPhase::Disconnecting | SessionPhase::Closed => Some(Err(BayeuxError::Closed)),
        SessionPhase::Disconnected | SessionPhase::Handshaking => None,
    }
}
