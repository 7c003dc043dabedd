//! Runtime harness to supervise long running workers

mod shutdown;
mod supervisor;
mod worker;

pub use shutdown::*;
pub use supervisor::*;
pub use worker::*;
