//! Long-poll worker.
//!
//! One task per connected session. It races three things: pushed messages
//! arriving on the queue, the session's shutdown token, and the poll timer.
//! While a `/meta/connect` is held open by the server the worker keeps
//! draining the queue, so pushes produced by its own request are delivered
//! and a blocked poll never stops `close`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bayeux_settings::{AdvicePolicy, DeliveryPolicy};
use metrics::counter;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::protocol::{Message, Reconnect, Reply};
use crate::registry::Route;
use crate::session::Session;

/// Start polling for `session`.
pub(crate) fn spawn(session: Arc<Session>, queue: mpsc::Receiver<Message>) -> JoinHandle<()> {
    let worker = Worker {
        interval: session.settings.poll_interval(),
        cancel: session.shutdown.clone(),
        session,
        queue,
    };
    tokio::spawn(worker.run())
}

/// What the loop does after a poll.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    /// Server advised no reconnect.
    Stop,
    Cancelled,
}

enum Delivery {
    Delivered,
    Dropped,
    Closed,
}

struct Worker {
    session: Arc<Session>,
    queue: mpsc::Receiver<Message>,
    cancel: CancellationToken,
    interval: Duration,
}

impl Worker {
    async fn run(mut self) {
        debug!(interval = ?self.interval, "long-poll worker started");
        let timer = time::sleep(self.interval);
        tokio::pin!(timer);

        let flow = loop {
            tokio::select! {
                () = self.cancel.cancelled() => break Flow::Cancelled,
                Some(message) = self.queue.recv() => self.dispatch(message).await,
                () = &mut timer => match self.poll().await {
                    Flow::Continue => timer.as_mut().reset(Instant::now() + self.interval),
                    other => break other,
                },
            }
        };

        if flow == Flow::Stop {
            self.session.park(self.queue).await;
        }
        debug!(?flow, "long-poll worker stopped");
    }

    /// One `/meta/connect` round trip.
    async fn poll(&mut self) -> Flow {
        let Some(client_id) = self.session.client_id().await else {
            return Flow::Cancelled;
        };
        let session = Arc::clone(&self.session);
        let Some(result) = self
            .drive(async move { session.connect(&client_id).await })
            .await
        else {
            return Flow::Cancelled;
        };

        match result {
            Ok(reply) => self.on_connect_reply(reply).await,
            Err(e) => {
                counter!("bayeux_connect_failures_total").increment(1);
                warn!(error = %e, "connect failed");
                Flow::Continue
            }
        }
    }

    async fn on_connect_reply(&mut self, reply: Reply) -> Flow {
        if !reply.successful {
            warn!(error = reply.error.as_deref(), "connect unsuccessful");
        }
        let Some(advice) = reply.advice else {
            return Flow::Continue;
        };
        debug!(?advice, "connect advice");
        if self.session.settings.advice == AdvicePolicy::Ignore {
            return Flow::Continue;
        }

        if let Some(ms) = advice.interval.and_then(|ms| u64::try_from(ms).ok()) {
            self.interval = Duration::from_millis(ms);
        }
        match advice.reconnect {
            Some(Reconnect::Handshake) => self.rehandshake().await,
            Some(Reconnect::Stop) => Flow::Stop,
            Some(Reconnect::Retry | Reconnect::Unknown) | None => Flow::Continue,
        }
    }

    async fn rehandshake(&mut self) -> Flow {
        info!("server advised re-handshake");
        let session = Arc::clone(&self.session);
        match self.drive(async move { session.rehandshake().await }).await {
            None => Flow::Cancelled,
            Some(Ok(())) => Flow::Continue,
            Some(Err(e)) => {
                warn!(error = %e, "re-handshake failed");
                Flow::Continue
            }
        }
    }

    /// Await `fut` while still serving the queue. `None` if cancelled first.
    async fn drive<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return None,
                out = &mut fut => return Some(out),
                Some(message) = self.queue.recv() => self.dispatch(message).await,
            }
        }
    }

    /// Fan a pushed message out to every matching subscription.
    async fn dispatch(&self, message: Message) {
        let routes = self.session.routes(&message.channel).await;
        if routes.is_empty() {
            debug!(channel = %message.channel, "no subscription for pushed message");
            return;
        }

        for route in routes {
            let Some(outcome) = self.deliver(&route, message.clone()).await else {
                return;
            };
            match outcome {
                Delivery::Delivered => {
                    counter!("bayeux_messages_delivered_total").increment(1);
                }
                Delivery::Dropped => {
                    counter!("bayeux_delivery_drops_total").increment(1);
                    warn!(
                        channel = %message.channel,
                        pattern = %route.pattern,
                        "destination full, message dropped"
                    );
                }
                Delivery::Closed => {
                    debug!(pattern = %route.pattern, "destination closed, skipping");
                }
            }
        }
    }

    /// `None` if cancelled while waiting on a full destination.
    async fn deliver(&self, route: &Route, message: Message) -> Option<Delivery> {
        match self.session.settings.delivery {
            DeliveryPolicy::Block => tokio::select! {
                sent = route.destination.send(message) => Some(if sent.is_ok() {
                    Delivery::Delivered
                } else {
                    Delivery::Closed
                }),
                () = self.cancel.cancelled() => None,
            },
            DeliveryPolicy::DropWhenFull => Some(match route.destination.try_send(message) {
                Ok(()) => Delivery::Delivered,
                Err(TrySendError::Full(_)) => Delivery::Dropped,
                Err(TrySendError::Closed(_)) => Delivery::Closed,
            }),
        }
    }
}
