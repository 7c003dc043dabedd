use super::WorkerError;
use crate::harness::{ShutdownSignal, Worker};
use crate::library::{engine::SchedulingEngine, metadata::MetadataClient, EmptyResult};
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use tokio::select;

/// Worker watching the metadata service for resource changes
pub struct MetadataWatcher {
    client: Arc<dyn MetadataClient>,
    engine: Arc<dyn SchedulingEngine>,
}

impl MetadataWatcher {
    /// Creates a new worker which feeds changes observed through `client` into `engine`
    pub fn new(client: Arc<dyn MetadataClient>, engine: Arc<dyn SchedulingEngine>) -> Self {
        Self { client, engine }
    }
}

#[async_trait]
impl Worker for MetadataWatcher {
    async fn run(&self, shutdown: ShutdownSignal) -> EmptyResult {
        select! {
            result = self.client.watch(self.engine.clone()) => {
                result.map_err(|e| WorkerError::Metadata(e).into())
            }
            _ = shutdown.signal() => {
                debug!("Metadata watch cancelled");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::shutdown_channel;
    use crate::library::{engine::Scheduler, metadata::WatchError};
    use hyper::StatusCode;

    struct BrokenClient;

    #[async_trait]
    impl MetadataClient for BrokenClient {
        async fn watch(&self, _: Arc<dyn SchedulingEngine>) -> Result<(), WatchError> {
            Err(WatchError::Status(StatusCode::BAD_GATEWAY))
        }
    }

    struct FinishingClient;

    #[async_trait]
    impl MetadataClient for FinishingClient {
        async fn watch(&self, _: Arc<dyn SchedulingEngine>) -> Result<(), WatchError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn wraps_watch_errors() {
        let (_handle, signal) = shutdown_channel();
        let watcher = MetadataWatcher::new(Arc::new(BrokenClient), Arc::new(Scheduler::new()));

        let error = watcher.run(signal).await.unwrap_err();

        assert_eq!(error.to_string(), "metadata watcher exited");
        assert!(matches!(
            error.downcast_ref::<WorkerError>(),
            Some(WorkerError::Metadata(WatchError::Status(StatusCode::BAD_GATEWAY)))
        ));
    }

    #[tokio::test]
    async fn passes_clean_returns_through() {
        let (_handle, signal) = shutdown_channel();
        let watcher = MetadataWatcher::new(Arc::new(FinishingClient), Arc::new(Scheduler::new()));

        assert!(watcher.run(signal).await.is_ok());
    }
}
