//! Shared test support utilities for the integration and behaviour suites.
//!
//! `locale` parses locale parameters in BDD steps; `packages` builds zip, tar,
//! and CRX uploads on disk, including hostile ones that library writers refuse
//! to produce through their safe APIs.
pub mod locale;
pub mod packages;
