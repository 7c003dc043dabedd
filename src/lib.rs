//! This library crate contains everything required to run the scheduler process.
//!
//! The crate is split into three layers: the project agnostic [`library`] containing the
//! collaborator clients and helpers, the [`harness`] which supervises long running workers,
//! and the [`services`] which adapt the collaborators into supervised workers.

#![deny(missing_docs)]

pub mod harness;
pub mod library;
pub mod services;
