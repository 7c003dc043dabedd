//! Scheduling engine which receives resource updates from the workers

use super::cattle::Event;
use async_trait::async_trait;
use futures::lock::Mutex;
use log::{debug, info};
use std::collections::HashMap;

/// Change to the resource state known to the scheduler
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceUpdate {
    /// Event received from the Cattle event stream
    Event(Event),
    /// Metadata service reported a new version of its data
    MetadataChanged {
        /// Opaque version identifier reported by the metadata service
        version: String,
    },
}

/// Sink for resource updates
///
/// Implementations must accept updates without blocking indefinitely as they are called
/// from within the long running workers.
#[async_trait]
pub trait SchedulingEngine: Send + Sync {
    /// Hands a new update to the engine
    async fn push(&self, update: ResourceUpdate);
}

/// Bookkeeping state of the [`Scheduler`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerState {
    /// Most recent metadata version
    pub metadata_version: Option<String>,
    /// Number of received events keyed by event name
    pub events: HashMap<String, u64>,
}

/// In-memory [`SchedulingEngine`] tracking the latest known resource state
pub struct Scheduler {
    state: Mutex<SchedulerState>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Creates a scheduler without any known resources
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SchedulerState::default()),
        }
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> SchedulerState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl SchedulingEngine for Scheduler {
    async fn push(&self, update: ResourceUpdate) {
        let mut state = self.state.lock().await;

        match update {
            ResourceUpdate::Event(event) => {
                debug!("Received event {} ({:?})", event.name, event.id);
                *state.events.entry(event.name).or_insert(0) += 1;
            }
            ResourceUpdate::MetadataChanged { version } => {
                info!("Metadata changed to version {}", version);
                state.metadata_version = Some(version);
            }
        }
    }
}
