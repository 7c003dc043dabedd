//! Cattle event stream client
//!
//! Subscribes to the event stream exposed by the Cattle API and forwards every decoded
//! event to a [`SchedulingEngine`].

use super::engine::{ResourceUpdate, SchedulingEngine};
use async_trait::async_trait;
use hyper::{
    body::HttpBody,
    client::HttpConnector,
    header::{ACCEPT, AUTHORIZATION},
    http::uri::InvalidUri,
    Body, Client, Request, StatusCode, Uri,
};
use log::{debug, info, trace};
use serde::Deserialize;
use serde_json::Value;
use std::{fmt, sync::Arc};
use thiserror::Error;

/// Environment variable containing the Cattle API endpoint
pub const URL_ENV: &str = "CATTLE_URL";
/// Environment variable containing the Cattle access key
pub const ACCESS_KEY_ENV: &str = "CATTLE_ACCESS_KEY";
/// Environment variable containing the Cattle secret key
pub const SECRET_KEY_ENV: &str = "CATTLE_SECRET_KEY";

/// Events the scheduler subscribes to by default
pub const DEFAULT_EVENT_NAMES: [&str; 4] = [
    "scheduler.prioritize",
    "scheduler.reserve",
    "scheduler.release",
    "ping",
];

/// Largest event accepted from the stream before the subscription is aborted
pub const DEFAULT_MAX_EVENT_SIZE: usize = 1024 * 1024;

const PING_EVENT: &str = "ping";

/// Credentials and endpoint of the Cattle API
#[derive(Clone)]
pub struct CattleCredentials {
    /// Base URL of the API, e.g. `http://cattle:8080/v1`
    pub url: String,
    /// Access key used for authentication
    pub access_key: String,
    secret_key: String,
}

impl fmt::Debug for CattleCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CattleCredentials")
            .field("url", &self.url)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Raised when the Cattle connection details are incomplete
#[derive(Error, Debug)]
#[error("Cattle connection environment variables not available. URL: {url}, access key {access_key}, secret key redacted. Missing: {}", .missing.join(", "))]
pub struct CredentialsError {
    /// Names of the variables that were missing or empty
    pub missing: Vec<&'static str>,
    url: String,
    access_key: String,
}

impl CattleCredentials {
    /// Creates credentials from their individual parts
    pub fn new(url: String, access_key: String, secret_key: String) -> Self {
        Self {
            url,
            access_key,
            secret_key,
        }
    }

    /// Reads the credentials from the process environment
    pub fn from_env() -> Result<Self, CredentialsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the credentials using the given lookup function. Empty values are treated as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CredentialsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key| lookup(key).filter(|value| !value.is_empty());

        let url = read(URL_ENV);
        let access_key = read(ACCESS_KEY_ENV);
        let secret_key = read(SECRET_KEY_ENV);

        match (url, access_key, secret_key) {
            (Some(url), Some(access_key), Some(secret_key)) => {
                Ok(Self::new(url, access_key, secret_key))
            }
            (url, access_key, secret_key) => {
                let missing = [
                    (URL_ENV, url.is_none()),
                    (ACCESS_KEY_ENV, access_key.is_none()),
                    (SECRET_KEY_ENV, secret_key.is_none()),
                ]
                .iter()
                .filter(|(_, missing)| *missing)
                .map(|(key, _)| *key)
                .collect();

                Err(CredentialsError {
                    missing,
                    url: url.unwrap_or_default(),
                    access_key: access_key.unwrap_or_default(),
                })
            }
        }
    }

    fn authorization(&self) -> String {
        let token = base64::encode(format!("{}:{}", self.access_key, self.secret_key));
        format!("Basic {}", token)
    }
}

/// Single event received from the event stream
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Event name, e.g. `scheduler.reserve`
    pub name: String,
    /// Unique identifier of the event
    #[serde(default)]
    pub id: Option<String>,
    /// Type of the resource the event refers to
    #[serde(default)]
    pub resource_type: Option<String>,
    /// Identifier of the resource the event refers to
    #[serde(default)]
    pub resource_id: Option<String>,
    /// Event specific payload
    #[serde(default)]
    pub data: Value,
}

/// Failure while connecting to or consuming the event stream
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Configured URL does not form a valid subscription URI
    #[error("invalid event stream url {url}")]
    InvalidUrl {
        /// Offending URL
        url: String,
        /// Parser error
        #[source]
        source: InvalidUri,
    },
    /// Request could not be built
    #[error("unable to build subscription request")]
    InvalidRequest(#[from] hyper::http::Error),
    /// Transport failure while connecting or streaming
    #[error("event stream request failed")]
    Request(#[from] hyper::Error),
    /// Credentials have been rejected
    #[error("event stream rejected credentials with status {0}")]
    Unauthorized(StatusCode),
    /// Server responded with an unexpected status
    #[error("event stream responded with status {0}")]
    Rejected(StatusCode),
    /// Received data is not a valid event
    #[error("unable to decode event")]
    Decode(#[from] serde_json::Error),
    /// Pending event exceeds the configured size limit without being terminated
    #[error("event exceeds the maximum size of {0} bytes")]
    EventTooLarge(usize),
}

/// Client which connects to an event stream and feeds it into a [`SchedulingEngine`]
#[async_trait]
pub trait EventStreamClient: Send + Sync {
    /// Connects to the stream and consumes it until the session ends
    async fn connect_and_consume(
        &self,
        credentials: &CattleCredentials,
        sink: Arc<dyn SchedulingEngine>,
    ) -> Result<(), ConnectionError>;
}

/// [`EventStreamClient`] which reads newline delimited JSON events from an HTTP subscription
#[derive(Clone)]
pub struct HttpEventStreamClient {
    client: Client<HttpConnector>,
    event_names: Vec<String>,
    max_event_size: usize,
}

impl Default for HttpEventStreamClient {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_NAMES.iter().map(|name| name.to_string()).collect())
    }
}

impl HttpEventStreamClient {
    /// Creates a client subscribing to the given event names
    pub fn new(event_names: Vec<String>) -> Self {
        Self {
            client: Client::new(),
            event_names,
            max_event_size: DEFAULT_MAX_EVENT_SIZE,
        }
    }

    /// Sets the number of bytes a single event may occupy
    pub fn with_max_event_size(mut self, max_event_size: usize) -> Self {
        self.max_event_size = max_event_size;
        self
    }

    fn subscribe_uri(&self, base: &str) -> Result<Uri, ConnectionError> {
        let mut url = format!("{}/subscribe", base.trim_end_matches('/'));

        if !self.event_names.is_empty() {
            let query = self
                .event_names
                .iter()
                .map(|name| format!("eventNames={}", name))
                .collect::<Vec<_>>()
                .join("&");

            url = format!("{}?{}", url, query);
        }

        url.parse::<Uri>()
            .map_err(|source| ConnectionError::InvalidUrl { url, source })
    }

    async fn forward_line(
        line: &[u8],
        sink: &Arc<dyn SchedulingEngine>,
    ) -> Result<(), ConnectionError> {
        if line.iter().all(|byte| byte.is_ascii_whitespace()) {
            return Ok(());
        }

        let event: Event = serde_json::from_slice(line)?;

        if event.name == PING_EVENT {
            trace!("Received ping");
        } else {
            sink.push(ResourceUpdate::Event(event)).await;
        }

        Ok(())
    }
}

#[async_trait]
impl EventStreamClient for HttpEventStreamClient {
    async fn connect_and_consume(
        &self,
        credentials: &CattleCredentials,
        sink: Arc<dyn SchedulingEngine>,
    ) -> Result<(), ConnectionError> {
        let uri = self.subscribe_uri(&credentials.url)?;

        debug!("Subscribing to {}", uri);

        let request = Request::get(uri)
            .header(AUTHORIZATION, credentials.authorization())
            .header(ACCEPT, "application/json")
            .body(Body::empty())?;

        let response = self.client.request(request).await?;

        match response.status() {
            status if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN => {
                return Err(ConnectionError::Unauthorized(status))
            }
            status if !status.is_success() => return Err(ConnectionError::Rejected(status)),
            _ => {}
        }

        info!("Connected to event stream at {}", credentials.url);

        let mut body = response.into_body();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = body.data().await {
            buffer.extend_from_slice(&chunk?);

            while let Some(position) = buffer.iter().position(|byte| *byte == b'\n') {
                let line: Vec<u8> = buffer.drain(..=position).collect();
                Self::forward_line(&line, &sink).await?;
            }

            if buffer.len() > self.max_event_size {
                return Err(ConnectionError::EventTooLarge(self.max_event_size));
            }
        }

        Self::forward_line(&buffer, &sink).await?;

        info!("Event stream at {} ended", credentials.url);

        Ok(())
    }
}
