//! Outbound HTTP client for peer nodes.

use std::time::Duration;

use reqwest::StatusCode;

use crate::ballot::Ballot;
use crate::messages::Promise;

/// Default connection timeout for peer requests.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default request timeout for peer requests. Peers slower than this are
/// treated as silent.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Client for the protocol endpoints of peer nodes.
#[derive(Clone, Debug)]
pub(crate) struct PeerClient {
    http: reqwest::Client,
}

impl PeerClient {
    pub(crate) fn new() -> Self {
        Self::with_timeouts(DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT)
    }

    pub(crate) fn with_timeouts(connect: Duration, request: Duration) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(connect)
            .timeout(request)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        PeerClient { http }
    }

    /// Phase 1 request. Transport failures come back as an error-carrying
    /// promise so the collector can count replies uniformly.
    pub(crate) async fn prepare(&self, addr: &str, ballot: Ballot) -> Promise {
        let url = format!("http://{addr}/prepare/{}/{}", ballot.round, ballot.node);
        self.promise_request(addr, &url).await
    }

    /// Phase 2 request.
    pub(crate) async fn accept(&self, addr: &str, ballot: Ballot, value: &str) -> Promise {
        let url = format!(
            "http://{addr}/accept/{}/{}/{value}",
            ballot.round, ballot.node
        );
        self.promise_request(addr, &url).await
    }

    async fn promise_request(&self, addr: &str, url: &str) -> Promise {
        let response = match self.http.post(url).send().await {
            Ok(response) => response,
            Err(err) => return Promise::unreachable(addr, err.to_string()),
        };
        if response.status() != StatusCode::OK {
            return Promise::unreachable(addr, format!("status {}", response.status()));
        }
        match response.json::<Promise>().await {
            Ok(promise) => promise,
            Err(err) => Promise::unreachable(addr, err.to_string()),
        }
    }

    /// Liveness probe: any successful reply counts.
    pub(crate) async fn alive(&self, addr: &str) -> bool {
        let url = format!("http://{addr}/alive");
        match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
