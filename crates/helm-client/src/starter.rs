//! One-shot "begin session" request, outside the persistent channel.
//!
//! The outcome is never written into the store. A successful start shows
//! up later as a `state_snapshot` from the agent.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::SessionStartError;

/// Asks the agent process to begin a session.
#[async_trait]
pub trait SessionStarter: Send + Sync {
    /// Issue the start request.
    async fn start(&self) -> Result<(), SessionStartError>;
}

/// [`SessionStarter`] that sends `POST <start_url>` with no body.
#[derive(Clone, Debug)]
pub struct HttpSessionStarter {
    client: reqwest::Client,
    url: String,
}

impl HttpSessionStarter {
    /// Starter for `url` with a per-request `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SessionStartError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SessionStarter for HttpSessionStarter {
    async fn start(&self) -> Result<(), SessionStartError> {
        debug!(url = %self.url, "requesting session start");
        let response = self.client.post(&self.url).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SessionStartError::Status(status.as_u16()))
        }
    }
}
