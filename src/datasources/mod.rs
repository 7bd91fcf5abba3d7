//! Datasource discovery subsystem.
//!
//! # Data Flow
//! ```text
//! ConfigMap watch (configmaps.rs)
//!     → watcher.rs (decode dashboard-datasource.yaml, apply in order)
//!     → registry.rs (descriptor, trust override, cached proxy per name)
//!     → read by the proxy builder and the describe endpoint
//! ```

pub mod configmaps;
pub mod name;
pub mod registry;
pub mod types;
pub mod watcher;

pub use configmaps::KubeConfigMapSource;
pub use name::is_dns_name;
pub use registry::{DatasourceRegistry, Snapshot};
pub use types::{Datasource, DatasourceMetadata, DatasourcePlugin, DatasourceSpec, PluginSpec, ServiceReference};
pub use watcher::{ApplyOutcome, ConfigObject, DatasourceWatcher, WatchError, WatchEvent, WatchSource};
