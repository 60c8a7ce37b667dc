//! steward-lib: bundle lifecycle and reconciliation for the on-VM agent
//!
//! This crate converges a VM's local filesystem to the jobs and packages a
//! director asks for:
//! - `Bundle`: a content-addressed, enable/disable-able unit (one version of a
//!   job template or package)
//! - `Applier`: drives bundles for jobs and packages, including `keep_only`
//!   reconciliation
//! - `Compiler`: turns a source package plus its dependencies into an
//!   uploadable compiled artifact

pub mod agent;
pub mod applier;
pub mod blob;
pub mod bundle;
pub mod compiler;
pub mod compress;
pub mod config;
pub mod consts;
pub mod models;
pub mod platform;
pub mod runner;
pub mod supervisor;
pub mod util;
