//! HTTP transport seam.
//!
//! The session only needs "POST these bytes, give me status and body back".
//! [`ReqwestTransport`] is the production implementation; tests substitute
//! a scripted one.

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::{BayeuxError, Result};

/// Status and body of a completed POST.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a Bayeux request body to the server.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POST `body` to `url` with the given content type.
    async fn post(&self, url: &str, content_type: &str, body: Vec<u8>) -> Result<HttpResponse>;
}

/// Transport backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Client with no request timeout. Long-polls are held as long as the
    /// server wants.
    pub fn new() -> Self {
        Self::with_timeout(None)
    }

    /// Client whose requests fail after `timeout`, if given.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        let mut builder = reqwest::Client::builder().user_agent("bayeux-client/0.1");
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            client: builder.build().unwrap_or_default(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post(&self, url: &str, content_type: &str, body: Vec<u8>) -> Result<HttpResponse> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| BayeuxError::Transport(format!("request failed: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| BayeuxError::Transport(format!("failed to read response body: {e}")))?;

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}
