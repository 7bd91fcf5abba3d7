//! Kubernetes ConfigMap watch source.
//!
//! Datasources are ConfigMaps in one namespace carrying the
//! `console.openshift.io/dashboard-datasource=true` label. Each watch session
//! is a single `watch` call; the API server rotates these streams
//! periodically, which the watcher treats as a normal stream end.

use async_trait::async_trait;
use futures_util::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, WatchEvent as KubeWatchEvent, WatchParams};
use kube::Client;

use crate::config::DatasourceConfig;
use crate::datasources::watcher::{ConfigObject, EventStream, WatchError, WatchEvent, WatchSource};

/// Watches labelled ConfigMaps in the dashboards namespace.
pub struct KubeConfigMapSource {
    api: Api<ConfigMap>,
    params: WatchParams,
    namespace: String,
}

impl KubeConfigMapSource {
    /// Connect using in-cluster configuration, falling back to the local kubeconfig.
    pub async fn connect(config: &DatasourceConfig) -> Result<Self, kube::Error> {
        let client = Client::try_default().await?;
        Ok(Self::new(client, config))
    }

    pub fn new(client: Client, config: &DatasourceConfig) -> Self {
        Self {
            api: Api::namespaced(client, &config.namespace),
            params: WatchParams::default().labels(&config.label_selector),
            namespace: config.namespace.clone(),
        }
    }
}

#[async_trait]
impl WatchSource for KubeConfigMapSource {
    async fn watch<'a>(&'a self) -> Result<EventStream<'a>, WatchError> {
        // "0" starts from any cached version and replays existing objects as ADDED.
        let stream = self
            .api
            .watch(&self.params, "0")
            .await
            .map_err(|e| WatchError::Connect(e.to_string()))?;

        tracing::debug!(namespace = %self.namespace, "ConfigMap watch established");

        Ok(stream
            .map(|item| match item {
                Ok(event) => convert_event(event),
                Err(e) => Err(WatchError::Stream(e.to_string())),
            })
            .boxed())
    }
}

fn convert_event(event: KubeWatchEvent<ConfigMap>) -> Result<WatchEvent, WatchError> {
    match event {
        KubeWatchEvent::Added(cm) => Ok(WatchEvent::Added(config_object(cm))),
        KubeWatchEvent::Modified(cm) => Ok(WatchEvent::Modified(config_object(cm))),
        KubeWatchEvent::Deleted(cm) => Ok(WatchEvent::Deleted(config_object(cm))),
        KubeWatchEvent::Bookmark(_) => Ok(WatchEvent::Other),
        KubeWatchEvent::Error(status) => Err(WatchError::Stream(format!(
            "{} ({}): {}",
            status.reason, status.code, status.message
        ))),
    }
}

fn config_object(cm: ConfigMap) -> ConfigObject {
    ConfigObject {
        name: cm.metadata.name.unwrap_or_default(),
        data: cm.data.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    #[test]
    fn test_config_object_from_configmap() {
        let mut data = BTreeMap::new();
        data.insert("dashboard-datasource.yaml".to_string(), "kind: Datasource".to_string());
        let cm = ConfigMap {
            metadata: ObjectMeta {
                name: Some("prometheus-ds".into()),
                ..Default::default()
            },
            data: Some(data.clone()),
            ..Default::default()
        };

        match convert_event(KubeWatchEvent::Modified(cm)).unwrap() {
            WatchEvent::Modified(object) => {
                assert_eq!(object.name, "prometheus-ds");
                assert_eq!(object.data, data);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_configmap_without_data() {
        let event = convert_event(KubeWatchEvent::Deleted(ConfigMap::default())).unwrap();
        assert_eq!(event, WatchEvent::Deleted(ConfigObject::default()));
    }
}
