use super::ShutdownSignal;
use crate::library::EmptyResult;
use async_trait::async_trait;
use futures::Future;
use std::fmt;

/// Identity of a supervised worker, used for attribution in log messages and termination causes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerId {
    /// Cattle event stream subscriber
    EventStream,
    /// Rancher metadata watcher
    MetadataWatcher,
    /// Liveness endpoint provider
    HealthCheck,
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerId::EventStream => write!(f, "event stream"),
            WorkerId::MetadataWatcher => write!(f, "metadata watcher"),
            WorkerId::HealthCheck => write!(f, "health check"),
        }
    }
}

/// Long running unit of work supervised by the [`Supervisor`](super::Supervisor)
///
/// A worker is expected to block for the lifetime of the process. Returning from `run`,
/// with or without an error, is treated as a termination of the whole service. Workers
/// should return promptly once the passed [`ShutdownSignal`] completes.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Runs the worker until it terminates or the shutdown signal completes
    async fn run(&self, shutdown: ShutdownSignal) -> EmptyResult;
}

#[async_trait]
impl<F, Fut> Worker for F
where
    F: Fn(ShutdownSignal) -> Fut + Send + Sync,
    Fut: Future<Output = EmptyResult> + Send + 'static,
{
    async fn run(&self, shutdown: ShutdownSignal) -> EmptyResult {
        (self)(shutdown).await
    }
}
