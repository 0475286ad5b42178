//! Scripted in-memory transport for state machine and worker tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::errors::Result;
use crate::transport::{HttpResponse, HttpTransport};

pub(crate) const TEST_URL: &str = "http://bayeux.test/cometd";

/// Answers each request by channel: scripted responses first, then a
/// successful default. Default handshakes hand out `abc123`; default
/// connects are held for a few milliseconds like a short long-poll.
pub(crate) struct ScriptedTransport {
    latency: Duration,
    connect_hold: Duration,
    log: Mutex<Vec<Value>>,
    scripted: Mutex<HashMap<String, VecDeque<HttpResponse>>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self {
            latency: Duration::ZERO,
            connect_hold: Duration::from_millis(5),
            log: Mutex::new(Vec::new()),
            scripted: Mutex::new(HashMap::new()),
        }
    }

    /// Delay every request by `latency` before answering.
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue a 200 response with `batch` as its body for the next request
    /// on `channel`.
    pub(crate) fn respond(&self, channel: &str, batch: Value) {
        self.respond_raw(channel, 200, serde_json::to_vec(&batch).unwrap());
    }

    /// Queue an arbitrary status and body for the next request on `channel`.
    pub(crate) fn respond_raw(&self, channel: &str, status: u16, body: Vec<u8>) {
        self.scripted
            .lock()
            .unwrap()
            .entry(channel.to_owned())
            .or_default()
            .push_back(HttpResponse { status, body });
    }

    /// Every request envelope sent on `channel`, in order.
    pub(crate) fn requests(&self, channel: &str) -> Vec<Value> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r["channel"] == channel)
            .cloned()
            .collect()
    }

    pub(crate) fn count(&self, channel: &str) -> usize {
        self.requests(channel).len()
    }

    pub(crate) fn total(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    fn next_scripted(&self, channel: &str) -> Option<HttpResponse> {
        self.scripted
            .lock()
            .unwrap()
            .get_mut(channel)
            .and_then(VecDeque::pop_front)
    }
}

fn ok(batch: &Value) -> HttpResponse {
    HttpResponse {
        status: 200,
        body: serde_json::to_vec(batch).unwrap(),
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn post(&self, _url: &str, content_type: &str, body: Vec<u8>) -> Result<HttpResponse> {
        assert_eq!(content_type, "application/json");
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let batch: Value = serde_json::from_slice(&body).unwrap();
        let request = batch[0].clone();
        assert_eq!(batch.as_array().map(Vec::len), Some(1));
        let channel = request["channel"].as_str().unwrap().to_owned();
        self.log.lock().unwrap().push(request);

        if let Some(response) = self.next_scripted(&channel) {
            return Ok(response);
        }
        Ok(match channel.as_str() {
            "/meta/handshake" => ok(&json!([{
                "channel": "/meta/handshake",
                "successful": true,
                "clientId": "abc123",
                "version": "1.0",
                "supportedConnectionTypes": ["long-polling"],
            }])),
            "/meta/connect" => {
                tokio::time::sleep(self.connect_hold).await;
                ok(&json!([{"channel": "/meta/connect", "successful": true}]))
            }
            other => ok(&json!([{"channel": other, "successful": true}])),
        })
    }
}
