//! Datasource descriptor definitions.
//!
//! These types mirror the `dashboard-datasource.yaml` document carried by a
//! watched ConfigMap. They derive Serde traits so the same shape is decoded
//! from YAML and served back as JSON by the describe endpoint.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

/// A named backend target the gateway can proxy to.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Datasource {
    /// Discriminator such as `Datasource` or `Prometheus`.
    #[serde(default)]
    pub kind: String,

    pub metadata: DatasourceMetadata,

    #[serde(default)]
    pub spec: DatasourceSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DatasourceMetadata {
    /// Registry key. Must be a DNS-style name to be reachable through the proxy.
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DatasourceSpec {
    #[serde(default)]
    pub plugin: DatasourcePlugin,
}

/// Plugin-backed datasource. This is the only kind the gateway understands.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DatasourcePlugin {
    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub spec: PluginSpec,
}

/// Where the plugin's upstream lives.
///
/// Either `direct_url` or `service` identifies the target; when both are
/// present the service reference wins. Any other keys are kept verbatim so
/// the describe endpoint returns them to the frontend.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PluginSpec {
    /// Legacy form: a full upstream URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceReference>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// In-cluster service reference, resolved to
/// `{scheme}://{host}.{namespace}.svc[:{port}]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServiceReference {
    /// Service name, or a fully qualified host when no namespace applies.
    pub host: String,

    /// Falls back to the datasource's own namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Defaults to `https`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
}

/// Errors resolving a datasource to an upstream URL.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("datasource has neither a service reference nor a direct URL")]
    Missing,

    #[error("cannot parse upstream URL '{url}': {source}")]
    Invalid {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported upstream scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("upstream URL '{0}' has no host")]
    MissingHost(String),
}

impl Datasource {
    /// The registry key.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Resolve the upstream this datasource proxies to.
    pub fn target_url(&self) -> Result<Url, TargetError> {
        let plugin_spec = &self.spec.plugin.spec;

        let raw = if let Some(service) = &plugin_spec.service {
            service.to_url_string(&self.metadata.namespace)
        } else if let Some(direct) = plugin_spec.direct_url.as_deref().filter(|u| !u.trim().is_empty()) {
            direct.trim().to_string()
        } else {
            return Err(TargetError::Missing);
        };

        let url = Url::parse(&raw).map_err(|source| TargetError::Invalid {
            url: raw.clone(),
            source,
        })?;

        match url.scheme() {
            "http" | "https" => {}
            other => return Err(TargetError::UnsupportedScheme(other.to_string())),
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(TargetError::MissingHost(raw));
        }

        Ok(url)
    }
}

impl ServiceReference {
    fn to_url_string(&self, default_namespace: &str) -> String {
        let scheme = self.scheme.as_deref().unwrap_or("https");
        let namespace = self
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(default_namespace);

        let host = if namespace.is_empty() {
            self.host.clone()
        } else {
            format!("{}.{}.svc", self.host, namespace)
        };

        match self.port {
            Some(port) => format!("{}://{}:{}", scheme, host, port),
            None => format!("{}://{}", scheme, host),
        }
    }
}
