//! Datasource registry.
//!
//! # Responsibilities
//! - Map datasource names to descriptors, trust overrides and cached proxies
//! - Invalidate the cached proxy whenever its descriptor or trust changes
//! - Remove all state for a name in one step
//!
//! # Design Decisions
//! - One mutex guards all three maps, so a reader never sees a new
//!   descriptor next to a proxy built for the old one
//! - No I/O happens while the lock is held; proxies are built outside it
//! - Every descriptor or trust change bumps a per-name revision; a proxy is
//!   only cached if it was built from the current revision
//! - Owned by the server and shared via `Arc`, never global

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::datasources::types::Datasource;
use crate::observability::metrics;
use crate::proxy::DatasourceProxy;

#[derive(Default)]
struct RegistryState {
    descriptors: HashMap<String, Datasource>,
    trust: HashMap<String, String>,
    proxies: HashMap<String, Arc<DatasourceProxy>>,
    revisions: HashMap<String, u64>,
    next_revision: u64,
}

impl RegistryState {
    fn bump(&mut self, name: &str) {
        self.next_revision += 1;
        let revision = self.next_revision;
        self.revisions.insert(name.to_string(), revision);
        self.proxies.remove(name);
    }
}

/// Consistent view of one datasource, taken under a single lock.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub datasource: Datasource,
    pub trust: Option<String>,
    pub revision: u64,
}

/// Concurrency-safe store of known datasources.
#[derive(Default)]
pub struct DatasourceRegistry {
    state: Mutex<RegistryState>,
}

impl DatasourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // Every mutation leaves the maps consistent, so a poisoned lock is safe to reuse.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert or replace the descriptor for `name`, dropping any cached proxy.
    pub fn upsert(&self, name: &str, datasource: Datasource) {
        let mut state = self.lock();
        state.descriptors.insert(name.to_string(), datasource);
        state.bump(name);
        metrics::record_registry_size(state.descriptors.len());
    }

    /// Store or clear the trust override for `name`, dropping any cached proxy.
    ///
    /// `None` means "no override": the fallback bundle file is used.
    pub fn set_trust(&self, name: &str, bundle: Option<String>) {
        let mut state = self.lock();
        match bundle {
            Some(pem) => {
                state.trust.insert(name.to_string(), pem);
            }
            None => {
                state.trust.remove(name);
            }
        }
        state.bump(name);
    }

    pub fn get(&self, name: &str) -> Option<Datasource> {
        self.lock().descriptors.get(name).cloned()
    }

    pub fn get_trust(&self, name: &str) -> Option<String> {
        self.lock().trust.get(name).cloned()
    }

    /// Descriptor, trust override and revision for `name`.
    pub fn snapshot(&self, name: &str) -> Option<Snapshot> {
        let state = self.lock();
        let datasource = state.descriptors.get(name)?.clone();
        Some(Snapshot {
            datasource,
            trust: state.trust.get(name).cloned(),
            revision: state.revisions.get(name).copied().unwrap_or_default(),
        })
    }

    pub fn cached_proxy(&self, name: &str) -> Option<Arc<DatasourceProxy>> {
        self.lock().proxies.get(name).cloned()
    }

    /// Cache a freshly built proxy.
    ///
    /// Best effort: the proxy is dropped if `name` was removed while it was
    /// being built. Returns whether it was stored.
    pub fn set_cached_proxy(&self, name: &str, proxy: Arc<DatasourceProxy>) -> bool {
        let mut state = self.lock();
        if !state.descriptors.contains_key(name) {
            return false;
        }
        state.proxies.insert(name.to_string(), proxy);
        true
    }

    /// Cache `proxy` only if `name` is still at `revision`.
    pub fn cache_if_current(&self, name: &str, revision: u64, proxy: Arc<DatasourceProxy>) -> bool {
        let mut state = self.lock();
        if !state.descriptors.contains_key(name) || state.revisions.get(name) != Some(&revision) {
            return false;
        }
        state.proxies.insert(name.to_string(), proxy);
        true
    }

    /// Delete the descriptor, trust override and cached proxy for `name`.
    ///
    /// Returns whether a descriptor was present.
    pub fn remove(&self, name: &str) -> bool {
        let mut state = self.lock();
        state.proxies.remove(name);
        state.trust.remove(name);
        state.revisions.remove(name);
        let existed = state.descriptors.remove(name).is_some();
        metrics::record_registry_size(state.descriptors.len());
        existed
    }

    pub fn len(&self) -> usize {
        self.lock().descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().descriptors.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for DatasourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("DatasourceRegistry")
            .field("datasources", &state.descriptors.len())
            .field("trust_overrides", &state.trust.len())
            .field("cached_proxies", &state.proxies.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamConfig;
    use crate::datasources::types::DatasourceMetadata;
    use crate::proxy::tls::TrustBundle;

    const TEST_CA: &str = include_str!("../../tests/fixtures/test-ca.pem");

    fn datasource(name: &str, url: &str) -> Datasource {
        let mut ds = Datasource {
            kind: "Datasource".into(),
            metadata: DatasourceMetadata {
                name: name.into(),
                namespace: "ns".into(),
            },
            ..Default::default()
        };
        ds.spec.plugin.spec.direct_url = Some(url.into());
        ds
    }

    fn proxy_for(ds: &Datasource) -> Arc<DatasourceProxy> {
        let trust = TrustBundle::from_pem(TEST_CA).unwrap();
        let upstream = ds.target_url().unwrap();
        Arc::new(DatasourceProxy::new(ds.name(), upstream, &trust, &UpstreamConfig::default()).unwrap())
    }

    #[test]
    fn test_unknown_name_is_absent() {
        let registry = DatasourceRegistry::new();
        assert!(registry.get("foo").is_none());
        assert!(registry.get_trust("foo").is_none());
        assert!(registry.cached_proxy("foo").is_none());
        assert!(!registry.remove("foo"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_upsert_then_get() {
        let registry = DatasourceRegistry::new();
        let ds = datasource("foo", "https://foo.example.com");
        registry.upsert("foo", ds.clone());
        assert_eq!(registry.get("foo"), Some(ds.clone()));

        // Same descriptor twice is observably the same as once
        registry.upsert("foo", ds.clone());
        assert_eq!(registry.get("foo"), Some(ds));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_invalidates_cached_proxy() {
        let registry = DatasourceRegistry::new();
        let ds = datasource("foo", "https://foo.example.com");
        registry.upsert("foo", ds.clone());
        assert!(registry.set_cached_proxy("foo", proxy_for(&ds)));
        assert!(registry.cached_proxy("foo").is_some());

        registry.upsert("foo", datasource("foo", "https://bar.example.com"));
        assert!(registry.cached_proxy("foo").is_none());
    }

    #[tokio::test]
    async fn test_set_trust_invalidates_cached_proxy() {
        let registry = DatasourceRegistry::new();
        let ds = datasource("foo", "https://foo.example.com");
        registry.upsert("foo", ds.clone());
        registry.set_cached_proxy("foo", proxy_for(&ds));

        registry.set_trust("foo", Some(TEST_CA.to_string()));
        assert!(registry.cached_proxy("foo").is_none());
        assert_eq!(registry.get_trust("foo").as_deref(), Some(TEST_CA));

        registry.set_trust("foo", None);
        assert!(registry.get_trust("foo").is_none());
    }

    #[tokio::test]
    async fn test_remove_clears_everything() {
        let registry = DatasourceRegistry::new();
        let ds = datasource("foo", "https://foo.example.com");
        registry.upsert("foo", ds.clone());
        registry.set_trust("foo", Some(TEST_CA.to_string()));
        registry.set_cached_proxy("foo", proxy_for(&ds));

        assert!(registry.remove("foo"));
        assert!(registry.get("foo").is_none());
        assert!(registry.get_trust("foo").is_none());
        assert!(registry.cached_proxy("foo").is_none());
    }

    #[tokio::test]
    async fn test_cached_proxy_not_stored_after_remove() {
        let registry = DatasourceRegistry::new();
        let ds = datasource("foo", "https://foo.example.com");
        let proxy = proxy_for(&ds);
        assert!(!registry.set_cached_proxy("foo", proxy));
        assert!(registry.cached_proxy("foo").is_none());
    }

    #[tokio::test]
    async fn test_stale_build_is_not_cached() {
        let registry = DatasourceRegistry::new();
        let ds = datasource("foo", "https://foo.example.com");
        registry.upsert("foo", ds.clone());

        let snapshot = registry.snapshot("foo").unwrap();
        assert_eq!(snapshot.datasource, ds);
        assert!(snapshot.trust.is_none());

        // A change lands while the proxy is being built
        registry.upsert("foo", datasource("foo", "https://bar.example.com"));
        assert!(!registry.cache_if_current("foo", snapshot.revision, proxy_for(&ds)));
        assert!(registry.cached_proxy("foo").is_none());

        let fresh = registry.snapshot("foo").unwrap();
        assert!(fresh.revision > snapshot.revision);
        assert!(registry.cache_if_current("foo", fresh.revision, proxy_for(&fresh.datasource)));
        assert!(registry.cached_proxy("foo").is_some());
    }

    #[test]
    fn test_revision_not_reused_after_remove() {
        let registry = DatasourceRegistry::new();
        registry.upsert("foo", datasource("foo", "https://foo.example.com"));
        let first = registry.snapshot("foo").unwrap().revision;
        registry.remove("foo");
        assert!(registry.snapshot("foo").is_none());

        registry.upsert("foo", datasource("foo", "https://foo.example.com"));
        assert_ne!(registry.snapshot("foo").unwrap().revision, first);
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let registry = Arc::new(DatasourceRegistry::new());
        let writer = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    let name = format!("ds-{}", i % 10);
                    registry.upsert(&name, datasource(&name, "https://x.example.com"));
                    if i % 3 == 0 {
                        registry.remove(&name);
                    }
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let name = format!("ds-{}", i % 10);
                        if let Some(ds) = registry.get(&name) {
                            assert_eq!(ds.name(), name);
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert!(registry.len() <= 10);
        assert_eq!(registry.names().len(), registry.len());
    }
}
