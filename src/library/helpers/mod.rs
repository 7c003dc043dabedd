//! Various helper functions and structs

mod backoff;

pub use backoff::Backoff;

use anyhow::Chain;
use std::error::Error;

/// Renders an error and all of its sources into a single line
pub fn error_chain(error: &(dyn Error + 'static)) -> String {
    Chain::new(error)
        .map(|cause| cause.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}
