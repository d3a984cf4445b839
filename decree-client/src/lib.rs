//! Client for the decree agreement service.
//!
//! Submits candidate values to proposers and reads accepted state from any
//! node.

#![warn(clippy::pedantic)]

use std::time::Duration;

use decree::{Accepted, AlivePeers};
use reqwest::StatusCode;
use thiserror::Error;

/// Default connection timeout for client requests.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default request timeout. Proposals can spend several backoff rounds
/// before committing, so this is generous.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed")]
    Http(#[from] reqwest::Error),

    #[error("got [{got}], but wanted [{want}]")]
    UnexpectedStatus { got: StatusCode, want: StatusCode },
}

/// Client bound to a single node address.
#[derive(Clone)]
pub struct DecreeClient {
    base_url: String,
    http: reqwest::Client,
}

impl DecreeClient {
    /// Create a client for the node at `host:port` with default timeouts.
    #[must_use]
    pub fn new(host: &str, port: u16) -> Self {
        Self::from_addr(&format!("{host}:{port}"))
    }

    /// Create a client for the node at `addr` (host:port).
    #[must_use]
    pub fn from_addr(addr: &str) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        DecreeClient {
            base_url: format!("http://{addr}"),
            http,
        }
    }

    /// Submit a candidate value to a proposer. Returns the committed view;
    /// note the chosen value may be a previously accepted one rather than
    /// the submitted candidate.
    ///
    /// # Errors
    ///
    /// Transport failures, or any status other than 201 (409 means the
    /// proposer exhausted its retries and the value may be resubmitted).
    pub async fn propose(&self, value: &str) -> Result<Accepted, ClientError> {
        let url = format!("{}/propose/{value}", self.base_url);
        let response = self.http.post(&url).send().await?;
        expect_status(response.status(), StatusCode::CREATED)?;
        Ok(response.json::<Accepted>().await?)
    }

    /// Read the node's accepted value and ballots.
    ///
    /// # Errors
    ///
    /// Transport failures or a non-200 status.
    pub async fn accepted(&self) -> Result<Accepted, ClientError> {
        let url = format!("{}/accepted", self.base_url);
        let response = self.http.get(&url).send().await?;
        expect_status(response.status(), StatusCode::OK)?;
        Ok(response.json::<Accepted>().await?)
    }

    /// Addresses of acceptors that answered the node's liveness probe.
    ///
    /// # Errors
    ///
    /// Transport failures or a non-200 status.
    pub async fn accepters(&self) -> Result<Vec<String>, ClientError> {
        self.alive_peers("accepters").await
    }

    /// Addresses of learners that answered the node's liveness probe.
    ///
    /// # Errors
    ///
    /// Transport failures or a non-200 status.
    pub async fn learners(&self) -> Result<Vec<String>, ClientError> {
        self.alive_peers("learners").await
    }

    /// Probe the node itself.
    ///
    /// # Errors
    ///
    /// Transport failures or a non-200 status.
    pub async fn alive(&self) -> Result<(), ClientError> {
        let url = format!("{}/alive", self.base_url);
        let response = self.http.get(&url).send().await?;
        expect_status(response.status(), StatusCode::OK)
    }

    async fn alive_peers(&self, endpoint: &str) -> Result<Vec<String>, ClientError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let response = self.http.get(&url).send().await?;
        expect_status(response.status(), StatusCode::OK)?;
        Ok(response.json::<AlivePeers>().await?.addrs)
    }
}

fn expect_status(got: StatusCode, want: StatusCode) -> Result<(), ClientError> {
    if got == want {
        Ok(())
    } else {
        Err(ClientError::UnexpectedStatus { got, want })
    }
}
