use super::health::ListenError;
use crate::library::{cattle::ConnectionError, metadata::WatchError};
use thiserror::Error;

/// Error returned by a worker, wrapped with the name of the subsystem that produced it
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Event stream subscriber failed
    #[error("event subscriber exited")]
    EventStream(#[source] ConnectionError),
    /// Metadata watcher failed
    #[error("metadata watcher exited")]
    Metadata(#[source] WatchError),
    /// Health check server failed
    #[error("healthcheck provider died")]
    HealthCheck(#[source] ListenError),
}
