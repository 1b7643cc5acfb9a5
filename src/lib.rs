#![doc = "log-archiver: filters log files on a network share and archives the relevant lines to blob storage."]

//! One run lists the share, and for every `.log`/`.txt` file keeps the lines
//! mentioning `login`, `logout` or `fail`, uploads them as
//! `processed_<timestamp>_<name>` and deletes the original. A file that fails
//! is skipped and retried on the next run; a share that cannot be listed fails
//! the run.
//!
//! # Usage
//! Drive [`job::run_job`] with any [`contract::RemoteShare`] and
//! [`contract::BlobSink`], or use the `log-archiver` binary.

pub mod batch;
pub mod cli;
pub mod config;
pub mod contract;
pub mod error;
pub mod filter;
pub mod job;
pub mod load_config;
pub mod process;
pub mod secrets;
pub mod share;
pub mod upload;

pub use cli::{run, Cli, Commands};
