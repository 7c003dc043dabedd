//! Independent libraries powering the scheduler
//!
//! Everything in here is usable without the [`harness`](super::harness). The collaborators
//! consumed by the workers live in this module alongside small helpers.

pub mod cattle;
pub mod engine;
pub mod helpers;
pub mod metadata;

/// Generic error type
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result with no value and a [`BoxedError`]
pub type EmptyResult = Result<(), BoxedError>;
