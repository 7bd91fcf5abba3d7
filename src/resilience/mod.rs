//! Resilience subsystem.
//!
//! The gateway's only retrying component is the datasource watcher, which
//! reconnects forever with two fixed, jittered delays.

pub mod backoff;

pub use backoff::WatchBackoff;
