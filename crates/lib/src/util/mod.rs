//! Shared utilities.
//!
//! Digest helpers for content-addressed bundle paths and blob verification,
//! portable path cleaning, and test helpers.

pub mod hash;
pub mod path;

#[cfg(test)]
pub mod testutil;
