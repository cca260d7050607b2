//! Library entrypoint for projects-sync.
//!
//! The primary interface is the `projects-sync` binary, which reconciles the
//! repositories of the logged-in GitHub account with a local SQLite project
//! inventory. The lib target exposes the building blocks to integration tests.

pub mod config;
pub mod diff;
pub mod error;
pub mod git;
pub mod model;
pub mod output;
pub mod prompt;
pub mod reconcile;
pub mod remote;
pub mod resolve;
pub mod store;
