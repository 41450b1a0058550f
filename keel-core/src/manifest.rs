//! YAML definition and component files.
//!
//! # Layout
//!
//! ```yaml
//! # webservice.yaml
//! kind: workload
//! name: webservice
//! template: |
//!   output: { apiVersion: "apps/v1", kind: "Deployment", ... }
//!   parameter: { image: string }
//! healthPolicy: |
//!   isHealth: context.output.status.readyReplicas == context.output.spec.replicas
//! customStatus: |
//!   message: "ready: \(context.output.status.readyReplicas)"
//!
//! # component.yaml
//! name: frontend
//! appName: shop
//! namespace: default
//! workload:
//!   definition: webservice.yaml
//!   properties: { image: "nginx" }
//! traits:
//!   - definition: ingress.yaml
//!     properties: { domain: "shop.example.com" }
//! ```
//!
//! Definition paths are resolved relative to the component file.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cluster::DEFAULT_NAMESPACE;
use crate::error::ManifestError;
use crate::process::ProcessContext;
use crate::types::Labels;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionKind {
    Workload,
    Trait,
}

impl DefinitionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DefinitionKind::Workload => "workload",
            DefinitionKind::Trait => "trait",
        }
    }
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A workload or trait definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    pub kind: DefinitionKind,
    pub name: String,
    pub template: String,
    /// Template producing `isHealth`; empty means always healthy.
    #[serde(default)]
    pub health_policy: String,
    /// Template producing `message`; empty means no message.
    #[serde(default)]
    pub custom_status: String,
}

/// A reference from a component to a definition file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionRef {
    pub definition: PathBuf,
    /// Injected as `parameter: <properties>` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,
    pub app_name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Extra context labels.
    #[serde(default)]
    pub labels: Labels,
    pub workload: DefinitionRef,
    #[serde(default)]
    pub traits: Vec<DefinitionRef>,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl Component {
    /// A fresh execution context for this component.
    pub fn process_context(&self) -> ProcessContext {
        ProcessContext::new(&self.name, &self.app_name).with_labels(self.labels.clone())
    }
}

/// A definition paired with the properties a component gives it.
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    pub definition: Definition,
    pub properties: Option<serde_json::Value>,
}

/// A component with every definition it references loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    pub component: Component,
    pub workload: Bound,
    pub traits: Vec<Bound>,
}

fn read(path: &Path) -> Result<String, ManifestError> {
    std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ManifestError> {
    let contents = read(path)?;
    serde_yaml::from_str(&contents).map_err(|source| ManifestError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_definition(path: &Path) -> Result<Definition, ManifestError> {
    parse(path)
}

pub fn load_component(path: &Path) -> Result<Component, ManifestError> {
    parse(path)
}

/// Load a component and the definitions it references.
pub fn load_bundle(path: &Path) -> Result<Bundle, ManifestError> {
    let component = load_component(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let workload = bind(base_dir, &component.workload, DefinitionKind::Workload)?;
    let traits = component
        .traits
        .iter()
        .map(|r| bind(base_dir, r, DefinitionKind::Trait))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(
        component = %component.name,
        workload = %workload.definition.name,
        traits = traits.len(),
        "loaded component"
    );
    Ok(Bundle {
        component,
        workload,
        traits,
    })
}

fn bind(base_dir: &Path, reference: &DefinitionRef, expected: DefinitionKind) -> Result<Bound, ManifestError> {
    let path = base_dir.join(&reference.definition);
    let definition = load_definition(&path)?;
    if definition.kind != expected {
        return Err(ManifestError::KindMismatch {
            path,
            expected: expected.as_str(),
            found: definition.kind.as_str(),
        });
    }
    Ok(Bound {
        definition,
        properties: reference.properties.clone(),
    })
}
