use super::{shutdown_channel, ShutdownSignal, Worker, WorkerId};
use crate::library::{helpers::error_chain, BoxedError};
use futures::FutureExt;
use log::{debug, error, info, warn};
use std::{any::Any, panic::AssertUnwindSafe, time::Duration};
use thiserror::Error;
use tokio::{
    sync::mpsc::{channel, Receiver, Sender},
    task::{self, JoinHandle},
    time::timeout,
};

/// Outcome reported by exactly one worker when its `run` method returned
#[derive(Debug)]
pub struct WorkerResult {
    source: WorkerId,
    error: Option<BoxedError>,
}

impl WorkerResult {
    /// Creates a new result for the given worker
    pub fn new(source: WorkerId, error: Option<BoxedError>) -> Self {
        Self { source, error }
    }

    /// Worker which produced this result
    pub fn source(&self) -> WorkerId {
        self.source
    }

    /// Error returned by the worker, `None` if it exited cleanly
    pub fn error(&self) -> Option<&BoxedError> {
        self.error.as_ref()
    }
}

/// Raised in place of a result when a worker panicked
#[derive(Error, Debug)]
#[error("worker panicked: {message}")]
pub struct WorkerPanicked {
    message: String,
}

impl WorkerPanicked {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            message.to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown cause".to_owned()
        };

        Self { message }
    }
}

/// Reason why the [`Supervisor`] stopped
///
/// Every variant is fatal for the service, including a worker returning cleanly.
#[derive(Error, Debug)]
pub enum TerminationCause {
    /// Worker returned an error or panicked
    #[error("{worker} terminated")]
    Failed {
        /// Worker which terminated first
        worker: WorkerId,
        /// Error returned by the worker
        #[source]
        error: BoxedError,
    },
    /// Worker returned without an error
    #[error("{worker} returned without an error")]
    CleanTermination {
        /// Worker which terminated first
        worker: WorkerId,
    },
    /// Supervisor has been started without any workers
    #[error("no workers have been supervised")]
    NoWorkers,
}

impl TerminationCause {
    /// Worker the termination is attributed to
    pub fn worker(&self) -> Option<WorkerId> {
        match self {
            TerminationCause::Failed { worker, .. } => Some(*worker),
            TerminationCause::CleanTermination { worker } => Some(*worker),
            TerminationCause::NoWorkers => None,
        }
    }
}

impl From<WorkerResult> for TerminationCause {
    fn from(result: WorkerResult) -> Self {
        match result.error {
            Some(error) => TerminationCause::Failed {
                worker: result.source,
                error,
            },
            None => TerminationCause::CleanTermination {
                worker: result.source,
            },
        }
    }
}

/// Runs a set of workers concurrently and reduces their lifetimes to a single [`TerminationCause`]
///
/// The first worker to return, regardless of whether it returned an error, determines the
/// outcome. Workers are never restarted. Once the outcome is known all remaining workers are
/// asked to shut down through their [`ShutdownSignal`]. Results reported during that phase
/// are discarded and workers which do not stop within the shutdown timeout are aborted.
pub struct Supervisor {
    workers: Vec<(WorkerId, Box<dyn Worker>)>,
    shutdown_timeout: Duration,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self {
            workers: Vec::new(),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl Supervisor {
    /// Creates a supervisor without any workers
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the time remaining workers are given to stop after the outcome has been determined
    pub fn with_shutdown_timeout(mut self, shutdown_timeout: Duration) -> Self {
        self.shutdown_timeout = shutdown_timeout;
        self
    }

    /// Registers a worker under the given identity
    pub fn with_worker<W: Worker + 'static>(mut self, id: WorkerId, worker: W) -> Self {
        self.workers.push((id, Box::new(worker)));
        self
    }

    /// Starts all workers and waits for the first one to terminate
    pub async fn run(self) -> TerminationCause {
        let Self {
            workers,
            shutdown_timeout,
        } = self;

        if workers.is_empty() {
            warn!("Supervisor started without any workers");
            return TerminationCause::NoWorkers;
        }

        let worker_count = workers.len();
        let (tx, mut rx) = channel(worker_count);
        let (shutdown_handle, shutdown_signal) = shutdown_channel();

        info!("Starting {} workers", worker_count);

        let tasks: Vec<JoinHandle<()>> = workers
            .into_iter()
            .map(|(id, worker)| {
                Self::spawn_worker(id, worker, shutdown_signal.clone(), tx.clone())
            })
            .collect();

        drop(tx);

        let cause = match rx.recv().await {
            Some(result) => TerminationCause::from(result),
            // Only reachable when every task has been dropped without reporting
            None => TerminationCause::NoWorkers,
        };

        error!("Exiting scheduler with error: {}", error_chain(&cause));

        debug!("Requesting shutdown of remaining workers");
        shutdown_handle.trigger();
        Self::discard_remaining(rx, worker_count - 1, shutdown_timeout).await;

        for task in tasks {
            task.abort();
        }

        cause
    }

    fn spawn_worker(
        id: WorkerId,
        worker: Box<dyn Worker>,
        shutdown: ShutdownSignal,
        tx: Sender<WorkerResult>,
    ) -> JoinHandle<()> {
        task::spawn(async move {
            debug!("Starting {}", id);

            let error = match AssertUnwindSafe(worker.run(shutdown)).catch_unwind().await {
                Ok(result) => result.err(),
                Err(payload) => Some(WorkerPanicked::from_payload(payload).into()),
            };

            debug!("{} returned", id);

            // Channel capacity equals the worker count, sending never waits
            tx.send(WorkerResult::new(id, error)).await.ok();
        })
    }

    async fn discard_remaining(
        mut rx: Receiver<WorkerResult>,
        remaining: usize,
        shutdown_timeout: Duration,
    ) {
        let drain = async {
            for _ in 0..remaining {
                match rx.recv().await {
                    Some(result) => debug!(
                        "Discarding result of {}: {}",
                        result.source(),
                        result
                            .error()
                            .map(|error| error_chain(&**error))
                            .unwrap_or_else(|| "exited cleanly".to_owned())
                    ),
                    None => break,
                }
            }
        };

        if timeout(shutdown_timeout, drain).await.is_err() {
            warn!(
                "Workers did not stop within {:?}, aborting them",
                shutdown_timeout
            );
        }
    }
}
