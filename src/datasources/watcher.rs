//! Datasource watcher and reconciler.
//!
//! # Data Flow
//! ```text
//! Connecting ──watch() fails──▶ sleep(reconnect) ──▶ Connecting
//!     │
//!     ▼ ok
//! Streaming ──event──▶ decode ──▶ registry.upsert / set_trust / remove
//!     │
//!     ▼ stream ends or errors
//! sleep(resume) ──▶ Connecting
//! ```
//!
//! # Design Decisions
//! - Events are applied synchronously, one at a time, in stream order
//! - A payload that cannot be decoded is skipped; the previous state stays
//! - The loop never gives up; it runs for the lifetime of the process

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use thiserror::Error;

use crate::config::DatasourceConfig;
use crate::datasources::registry::DatasourceRegistry;
use crate::datasources::types::Datasource;
use crate::observability::metrics;
use crate::resilience::WatchBackoff;

/// Payload of a watched configuration object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigObject {
    /// Object name, used for logging only.
    pub name: String,
    pub data: BTreeMap<String, String>,
}

impl ConfigObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// A change notification from the configuration source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Added(ConfigObject),
    Modified(ConfigObject),
    Deleted(ConfigObject),
    /// Bookmarks and anything else the watcher does not act on.
    Other,
}

impl WatchEvent {
    fn label(&self) -> &'static str {
        match self {
            WatchEvent::Added(_) => "added",
            WatchEvent::Modified(_) => "modified",
            WatchEvent::Deleted(_) => "deleted",
            WatchEvent::Other => "other",
        }
    }
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("cannot establish watch: {0}")]
    Connect(String),

    #[error("watch stream failed: {0}")]
    Stream(String),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("key '{key}' not found in config object '{object}'")]
    MissingKey { key: String, object: String },

    #[error("cannot decode key '{key}' of config object '{object}': {source}")]
    Yaml {
        key: String,
        object: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("datasource in config object '{object}' has no metadata.name")]
    MissingName { object: String },
}

/// Events of one watch session; may borrow the source that opened it.
pub type EventStream<'a> = BoxStream<'a, Result<WatchEvent, WatchError>>;

/// An external source of datasource configuration changes.
#[async_trait]
pub trait WatchSource: Send + Sync {
    /// Open a new watch session.
    async fn watch<'a>(&'a self) -> Result<EventStream<'a>, WatchError>;
}

/// What applying one event did to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Upserted { name: String, trust_updated: bool },
    Removed { name: String },
    Skipped,
    Ignored,
}

impl ApplyOutcome {
    fn label(&self) -> &'static str {
        match self {
            ApplyOutcome::Upserted { .. } => "upserted",
            ApplyOutcome::Removed { .. } => "removed",
            ApplyOutcome::Skipped => "skipped",
            ApplyOutcome::Ignored => "ignored",
        }
    }
}

/// How a watch session finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The session could not be opened.
    ConnectFailed,
    /// The stream closed or broke after being established.
    StreamEnded,
}

/// Keeps the registry in sync with a [`WatchSource`].
pub struct DatasourceWatcher<S> {
    source: S,
    registry: Arc<DatasourceRegistry>,
    config_key: String,
    ca_key: String,
    backoff: WatchBackoff,
}

impl<S: WatchSource> DatasourceWatcher<S> {
    pub fn new(source: S, registry: Arc<DatasourceRegistry>, config: &DatasourceConfig) -> Self {
        Self {
            source,
            registry,
            config_key: config.config_key.clone(),
            ca_key: config.ca_key.clone(),
            backoff: WatchBackoff::from_config(config),
        }
    }

    pub fn with_backoff(mut self, backoff: WatchBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Watch forever, reconnecting with backoff.
    pub async fn run(self) {
        tracing::info!("Watching datasources");

        loop {
            let delay = match self.run_session().await {
                SessionEnd::ConnectFailed => {
                    let delay = self.backoff.after_connect_failure();
                    tracing::error!(retry_in = ?delay, "Unable to create datasources watcher");
                    delay
                }
                SessionEnd::StreamEnded => {
                    let delay = self.backoff.after_stream_end();
                    tracing::debug!(retry_in = ?delay, "Datasources watch ended, restarting");
                    delay
                }
            };
            tokio::time::sleep(delay).await;
        }
    }

    /// Run one Connecting → Streaming cycle.
    pub async fn run_session(&self) -> SessionEnd {
        let mut stream = match self.source.watch().await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(error = %e, "Datasources watch failed to start");
                return SessionEnd::ConnectFailed;
            }
        };

        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => {
                    self.apply(event);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Datasources watch stream broke");
                    break;
                }
            }
        }

        SessionEnd::StreamEnded
    }

    /// Apply a single event to the registry.
    pub fn apply(&self, event: WatchEvent) -> ApplyOutcome {
        let event_label = event.label();
        let outcome = match event {
            WatchEvent::Added(object) | WatchEvent::Modified(object) => self.apply_upsert(&object),
            WatchEvent::Deleted(object) => self.apply_delete(&object),
            WatchEvent::Other => ApplyOutcome::Ignored,
        };
        metrics::record_watch_event(event_label, outcome.label());
        outcome
    }

    fn apply_upsert(&self, object: &ConfigObject) -> ApplyOutcome {
        let datasource = match decode_datasource(object, &self.config_key) {
            Ok(ds) => ds,
            Err(e) => {
                tracing::error!(configmap = %object.name, error = %e, "Cannot load datasource");
                return ApplyOutcome::Skipped;
            }
        };

        let name = datasource.name().to_string();
        self.registry.upsert(&name, datasource);
        tracing::info!(datasource = %name, "Datasource loaded");

        let trust_updated = match object.data.get(&self.ca_key) {
            Some(bundle) if !bundle.trim().is_empty() => {
                self.registry.set_trust(&name, Some(bundle.clone()));
                tracing::info!(datasource = %name, "Datasource CA loaded");
                true
            }
            _ => false,
        };

        ApplyOutcome::Upserted { name, trust_updated }
    }

    fn apply_delete(&self, object: &ConfigObject) -> ApplyOutcome {
        match decode_datasource(object, &self.config_key) {
            Ok(datasource) => {
                let name = datasource.name().to_string();
                self.registry.remove(&name);
                tracing::info!(datasource = %name, "Datasource deleted");
                ApplyOutcome::Removed { name }
            }
            Err(e) => {
                tracing::error!(configmap = %object.name, error = %e, "Cannot decode datasource being deleted");
                ApplyOutcome::Skipped
            }
        }
    }
}

/// Decode the datasource document stored under `key`.
pub fn decode_datasource(object: &ConfigObject, key: &str) -> Result<Datasource, DecodeError> {
    let raw = object.data.get(key).ok_or_else(|| DecodeError::MissingKey {
        key: key.to_string(),
        object: object.name.clone(),
    })?;

    let datasource: Datasource = serde_yaml::from_str(raw).map_err(|source| DecodeError::Yaml {
        key: key.to_string(),
        object: object.name.clone(),
        source,
    })?;

    if datasource.name().is_empty() {
        return Err(DecodeError::MissingName {
            object: object.name.clone(),
        });
    }

    Ok(datasource)
}
