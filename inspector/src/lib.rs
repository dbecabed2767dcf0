//! Command-line inspector for browser add-on uploads.
//!
//! The binary is a thin wrapper over [`inspect::run`]: it parses arguments,
//! reads the locale override from the environment, and exits with the status
//! the run returns.
//!
//! # Modules
//!
//! - [`cli`] - Command-line argument definitions
//! - [`error`] - Failures and their exit statuses
//! - [`inspect`] - Loading, ingestion and reporting

pub mod cli;
pub mod error;
pub mod inspect;

pub use inspect::run;
