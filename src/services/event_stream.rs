use super::WorkerError;
use crate::harness::{ShutdownSignal, Worker};
use crate::library::{
    cattle::{CattleCredentials, EventStreamClient},
    engine::SchedulingEngine,
    EmptyResult,
};
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use tokio::select;

/// Worker subscribing to the Cattle event stream
pub struct EventStreamWorker {
    client: Arc<dyn EventStreamClient>,
    credentials: CattleCredentials,
    engine: Arc<dyn SchedulingEngine>,
}

impl EventStreamWorker {
    /// Creates a new worker which feeds events received through `client` into `engine`
    pub fn new(
        client: Arc<dyn EventStreamClient>,
        credentials: CattleCredentials,
        engine: Arc<dyn SchedulingEngine>,
    ) -> Self {
        Self {
            client,
            credentials,
            engine,
        }
    }
}

#[async_trait]
impl Worker for EventStreamWorker {
    async fn run(&self, shutdown: ShutdownSignal) -> EmptyResult {
        let session = self
            .client
            .connect_and_consume(&self.credentials, self.engine.clone());

        select! {
            result = session => result.map_err(|e| WorkerError::EventStream(e).into()),
            _ = shutdown.signal() => {
                debug!("Event stream session cancelled");
                Ok(())
            }
        }
    }
}
