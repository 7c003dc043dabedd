use crate::library::metadata::metadata_url;
use std::time::Duration;
use structopt::StructOpt;

/// Command line options of the scheduler
#[derive(Debug, StructOpt)]
#[structopt(
    name = "scheduler",
    about = "An external resource based scheduler for Rancher."
)]
pub struct Options {
    /// The metadata service address
    #[structopt(
        long,
        env = "SCHEDULER_METADATA_ADDRESS",
        default_value = "rancher-metadata",
        value_name = "host"
    )]
    pub metadata_address: String,

    /// Listen on this address for healthchecks
    #[structopt(
        long,
        env = "SCHEDULER_LISTEN",
        default_value = ":80",
        value_name = "address"
    )]
    pub listen: String,

    /// Interval in seconds between two metadata version checks
    #[structopt(
        long,
        env = "SCHEDULER_METADATA_POLL_INTERVAL",
        default_value = "5",
        value_name = "seconds"
    )]
    pub metadata_poll_interval: u64,

    /// Log level, scopable to different modules
    ///
    /// Levels: trace, debug, info, warn, error
    #[structopt(
        short,
        long,
        default_value = "info",
        env = "RUST_LOG",
        value_name = "level"
    )]
    pub log: String,
}

impl Options {
    /// Versioned URL of the metadata service
    pub fn metadata_url(&self) -> String {
        metadata_url(&self.metadata_address)
    }

    /// Delay between two metadata version checks
    pub fn metadata_poll_interval(&self) -> Duration {
        Duration::from_secs(self.metadata_poll_interval)
    }
}
