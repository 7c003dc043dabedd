//! Rancher metadata service client

use super::engine::{ResourceUpdate, SchedulingEngine};
use super::helpers::Backoff;
use async_trait::async_trait;
use hyper::{
    body,
    client::HttpConnector,
    header::ACCEPT,
    http::uri::InvalidUri,
    Body, Client, Request, StatusCode, Uri,
};
use log::{debug, info, warn};
use std::{string::FromUtf8Error, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::time::sleep;

/// API version of the metadata service the scheduler talks to
pub const METADATA_API_VERSION: &str = "2015-12-19";

/// Failure while watching the metadata service
#[derive(Error, Debug)]
pub enum WatchError {
    /// Configured address does not form a valid URI
    #[error("invalid metadata url {url}")]
    InvalidUrl {
        /// Offending URL
        url: String,
        /// Parser error
        #[source]
        source: InvalidUri,
    },
    /// Request could not be built
    #[error("unable to build metadata request")]
    InvalidRequest(#[from] hyper::http::Error),
    /// Transport failure
    #[error("metadata request failed")]
    Request(#[from] hyper::Error),
    /// Metadata service responded with an unexpected status
    #[error("metadata service responded with status {0}")]
    Status(StatusCode),
    /// Version is not valid UTF-8
    #[error("metadata version is not valid utf-8")]
    Body(#[from] FromUtf8Error),
}

/// Client which watches the metadata service for changes
#[async_trait]
pub trait MetadataClient: Send + Sync {
    /// Watches the service and pushes changes into the sink until watching fails irrecoverably
    async fn watch(&self, sink: Arc<dyn SchedulingEngine>) -> Result<(), WatchError>;
}

/// Builds the versioned base URL of the metadata service running at `address`
pub fn metadata_url(address: &str) -> String {
    format!("http://{}/{}", address, METADATA_API_VERSION)
}

/// [`MetadataClient`] which polls the version endpoint of the metadata service over HTTP
///
/// Every time the reported version changes a [`ResourceUpdate::MetadataChanged`] is pushed.
/// Failing requests are retried according to the configured [`Backoff`], a successful
/// request resets it. Once the backoff is exhausted the last error is returned.
#[derive(Clone)]
pub struct HttpMetadataClient {
    client: Client<HttpConnector>,
    base_url: String,
    poll_interval: Duration,
    backoff: Backoff,
}

impl HttpMetadataClient {
    /// Creates a new client for the given base URL, see [`metadata_url`]
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            poll_interval: Duration::from_secs(5),
            backoff: Backoff::default(),
        }
    }

    /// Sets the delay between two version checks
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets the retry behaviour for failed version checks
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Fetches the current version of the metadata
    pub async fn version(&self) -> Result<String, WatchError> {
        let url = format!("{}/version", self.base_url.trim_end_matches('/'));
        let uri = url
            .parse::<Uri>()
            .map_err(|source| WatchError::InvalidUrl { url, source })?;

        let request = Request::get(uri)
            .header(ACCEPT, "application/json")
            .body(Body::empty())?;

        let response = self.client.request(request).await?;

        if response.status() != StatusCode::OK {
            return Err(WatchError::Status(response.status()));
        }

        let bytes = body::to_bytes(response.into_body()).await?;
        let version = String::from_utf8(bytes.to_vec())?;

        Ok(version.trim().trim_matches('"').to_owned())
    }
}

#[async_trait]
impl MetadataClient for HttpMetadataClient {
    async fn watch(&self, sink: Arc<dyn SchedulingEngine>) -> Result<(), WatchError> {
        let mut current_version: Option<String> = None;
        let mut backoff = self.backoff.clone();

        info!("Watching metadata at {}", self.base_url);

        loop {
            match self.version().await {
                Ok(version) => {
                    backoff = self.backoff.clone();

                    if current_version.as_ref() != Some(&version) {
                        debug!("Metadata version {:?} -> {}", current_version, version);
                        current_version = Some(version.clone());
                        sink.push(ResourceUpdate::MetadataChanged { version }).await;
                    }

                    sleep(self.poll_interval).await;
                }
                Err(error) => match backoff.next() {
                    Some(delay) => {
                        warn!(
                            "Unable to fetch metadata version, retrying in {:?}: {}",
                            delay, error
                        );
                        sleep(delay).await;
                    }
                    None => return Err(error),
                },
            }
        }
    }
}
