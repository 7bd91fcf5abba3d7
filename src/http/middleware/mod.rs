//! Router-wide middleware.

pub mod cache_control;
pub mod metrics;

pub use cache_control::no_cache_entrypoint;
pub use metrics::track_requests;
