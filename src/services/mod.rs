//! Workers making up the scheduler process
//!
//! Each collaborator is adapted into a [`Worker`](crate::harness::Worker) which is then
//! handed to the [`Supervisor`]. The first worker to stop ends the process.

mod error;
mod event_stream;
mod health;
mod metadata_watcher;
mod options;

pub use error::WorkerError;
pub use event_stream::EventStreamWorker;
pub use health::{HealthCheckServer, ListenError};
pub use metadata_watcher::MetadataWatcher;
pub use options::Options;

use crate::harness::{Supervisor, WorkerId};
use crate::library::{
    cattle::{CattleCredentials, HttpEventStreamClient},
    engine::{Scheduler, SchedulingEngine},
    metadata::HttpMetadataClient,
};
use std::sync::Arc;

/// Wires the default collaborators into workers and registers them with a new [`Supervisor`]
///
/// Requiring the credentials up front guarantees that no worker is started when they are missing.
pub fn supervisor(options: &Options, credentials: CattleCredentials) -> Supervisor {
    let engine: Arc<dyn SchedulingEngine> = Arc::new(Scheduler::new());

    let metadata_client = HttpMetadataClient::new(options.metadata_url())
        .with_poll_interval(options.metadata_poll_interval());

    let event_stream = EventStreamWorker::new(
        Arc::new(HttpEventStreamClient::default()),
        credentials,
        engine.clone(),
    );
    let metadata_watcher = MetadataWatcher::new(Arc::new(metadata_client), engine);
    let health_check = HealthCheckServer::new(options.listen.clone());

    Supervisor::new()
        .with_worker(WorkerId::EventStream, event_stream)
        .with_worker(WorkerId::MetadataWatcher, metadata_watcher)
        .with_worker(WorkerId::HealthCheck, health_check)
}
