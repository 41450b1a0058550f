//! Blocking [`ClusterReader`] over the Kubernetes API.
//!
//! Wraps an async [`kube::Client`] in a current-thread runtime. Resource
//! plurals and scopes come from API discovery and are cached per kind.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use kube::api::{Api, DynamicObject, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::{self, ApiResource, Scope};
use kube::{Client, Config};
use tokio::runtime::Runtime;

use keel_core::types::selector;
use keel_core::{ClusterError, ClusterReader, GroupVersionKind, Labels, Unstructured};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Client config for the current context of `kubeconfig`.
async fn load_config(kubeconfig: Kubeconfig) -> Result<Config> {
    let mut config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .context("failed to load kubeconfig")?;
    config.connect_timeout = Some(CONNECT_TIMEOUT);
    config.read_timeout = Some(READ_TIMEOUT);
    Ok(config)
}

/// Reads objects through the API server of a kubeconfig's current context.
pub struct KubeReader {
    runtime: Runtime,
    client: Client,
    server: String,
    resources: Mutex<HashMap<GroupVersionKind, (ApiResource, Scope)>>,
}

impl KubeReader {
    /// Connect with `path`, or with `$KUBECONFIG` / `~/.kube/config` when `None`.
    pub fn connect(path: Option<&Path>) -> Result<Self> {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        let kubeconfig = match path {
            Some(path) => Kubeconfig::read_from(path)
                .with_context(|| format!("failed to read kubeconfig {}", path.display()))?,
            None => Kubeconfig::read().context("failed to read kubeconfig")?,
        };
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start runtime")?;
        let config = runtime.block_on(load_config(kubeconfig))?;
        let server = config.cluster_url.to_string();
        let client = {
            let _guard = runtime.enter();
            Client::try_from(config).context("failed to create client")?
        };
        Ok(KubeReader {
            runtime,
            client,
            server,
            resources: Mutex::new(HashMap::new()),
        })
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Discovered resource and scope of `gvk`.
    fn resource(&self, gvk: &GroupVersionKind) -> Result<(ApiResource, Scope), ClusterError> {
        if let Some(found) = self.cached(gvk) {
            return Ok(found);
        }
        let target = kube::api::GroupVersionKind::gvk(&gvk.group, &gvk.version, &gvk.kind);
        let (resource, caps) = self
            .runtime
            .block_on(discovery::pinned_kind(&self.client, &target))
            .map_err(|e| ClusterError::Transport(format!("discovery of {gvk}: {e}")))?;
        tracing::debug!(%gvk, plural = %resource.plural, scope = ?caps.scope, "discovered resource");
        let found = (resource, caps.scope);
        if let Ok(mut cache) = self.resources.lock() {
            cache.insert(gvk.clone(), found.clone());
        }
        Ok(found)
    }

    fn cached(&self, gvk: &GroupVersionKind) -> Option<(ApiResource, Scope)> {
        self.resources.lock().ok()?.get(gvk).cloned()
    }

    fn api(&self, gvk: &GroupVersionKind, namespace: &str) -> Result<(Api<DynamicObject>, ApiResource), ClusterError> {
        let (resource, scope) = self.resource(gvk)?;
        Ok((scoped_api(self.client.clone(), &resource, &scope, namespace), resource))
    }
}

fn scoped_api(client: Client, resource: &ApiResource, scope: &Scope, namespace: &str) -> Api<DynamicObject> {
    match scope {
        Scope::Namespaced => Api::namespaced_with(client, namespace, resource),
        Scope::Cluster => Api::all_with(client, resource),
    }
}

/// List items carry no `apiVersion` or `kind`.
fn typed_item(resource: &ApiResource, object: &DynamicObject) -> Result<Unstructured, ClusterError> {
    let json = serde_json::to_value(object).map_err(|e| ClusterError::Decode(e.to_string()))?;
    let serde_json::Value::Object(mut map) = json else {
        return Err(ClusterError::Decode("object is not a map".to_string()));
    };
    map.entry("apiVersion")
        .or_insert_with(|| serde_json::Value::String(resource.api_version.clone()));
    map.entry("kind")
        .or_insert_with(|| serde_json::Value::String(resource.kind.clone()));
    Unstructured::from_json(serde_json::Value::Object(map)).map_err(|e| ClusterError::Decode(e.to_string()))
}

impl ClusterReader for KubeReader {
    fn get(&self, gvk: &GroupVersionKind, namespace: &str, name: &str) -> Result<Unstructured, ClusterError> {
        let (api, resource) = self.api(gvk, namespace)?;
        tracing::debug!(url = api.resource_url(), %name, "get");
        match self.runtime.block_on(api.get_opt(name)) {
            Ok(Some(object)) => typed_item(&resource, &object),
            Ok(None) => Err(ClusterError::NotFound {
                gvk: gvk.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
            Err(e) => Err(ClusterError::Transport(format!("get {gvk} {namespace}/{name}: {e}"))),
        }
    }

    fn list(&self, gvk: &GroupVersionKind, namespace: &str, labels: &Labels) -> Result<Vec<Unstructured>, ClusterError> {
        let (api, resource) = self.api(gvk, namespace)?;
        let label_selector = selector(labels);
        tracing::debug!(url = api.resource_url(), selector = %label_selector, "list");
        let params = ListParams::default().labels(&label_selector);
        let objects = self
            .runtime
            .block_on(api.list(&params))
            .map_err(|e| ClusterError::Transport(format!("list {gvk} in {namespace}: {e}")))?;
        objects.items.iter().map(|object| typed_item(&resource, object)).collect()
    }
}
