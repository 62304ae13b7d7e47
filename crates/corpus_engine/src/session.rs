use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared HTTP session for one run.
///
/// Every request sent through the session holds one of `connection_limit`
/// permits until its response is dropped, so the limit bounds all in-flight
/// requests: metadata pages and both halves of every content fetch.
#[derive(Debug, Clone)]
pub struct TransportSession {
    client: reqwest::Client,
    permits: Arc<Semaphore>,
    connection_limit: usize,
}

/// A response together with the connection permit it occupies.
pub(crate) struct SessionResponse {
    pub(crate) response: reqwest::Response,
    _permit: OwnedSemaphorePermit,
}

#[derive(Debug)]
pub(crate) enum SendError {
    Closed,
    Http(reqwest::Error),
}

impl TransportSession {
    pub fn new(connection_limit: usize) -> Result<Self, reqwest::Error> {
        let connection_limit = connection_limit.max(1);
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(connection_limit)
            .build()?;
        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(connection_limit)),
            connection_limit,
        })
    }

    pub fn connection_limit(&self) -> usize {
        self.connection_limit
    }

    pub fn available_connections(&self) -> usize {
        self.permits.available_permits()
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<SessionResponse, SendError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SendError::Closed)?;
        let response = request.send().await.map_err(SendError::Http)?;
        Ok(SessionResponse {
            response,
            _permit: permit,
        })
    }
}
