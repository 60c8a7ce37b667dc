//! Desired-state units handed to the appliers: jobs and packages.

mod types;

pub use types::*;
