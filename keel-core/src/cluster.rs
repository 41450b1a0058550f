//! Read access to live cluster objects.

use std::path::Path;

use serde::Deserialize;

use crate::error::{ClusterError, ManifestError};
use crate::types::{GroupVersionKind, Labels, Unstructured};

/// Namespace assumed for objects that do not declare one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Blocking, read-only view of a cluster. Shared across concurrent renders.
pub trait ClusterReader: Send + Sync {
    /// Fetch one object by kind and name.
    fn get(&self, gvk: &GroupVersionKind, namespace: &str, name: &str) -> Result<Unstructured, ClusterError>;

    /// Every object of `gvk` in `namespace` carrying all of `labels`.
    fn list(&self, gvk: &GroupVersionKind, namespace: &str, labels: &Labels) -> Result<Vec<Unstructured>, ClusterError>;
}

impl<R: ClusterReader + ?Sized> ClusterReader for &R {
    fn get(&self, gvk: &GroupVersionKind, namespace: &str, name: &str) -> Result<Unstructured, ClusterError> {
        (**self).get(gvk, namespace, name)
    }

    fn list(&self, gvk: &GroupVersionKind, namespace: &str, labels: &Labels) -> Result<Vec<Unstructured>, ClusterError> {
        (**self).list(gvk, namespace, labels)
    }
}

/// A fixed set of objects held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    objects: Vec<Unstructured>,
}

impl MemoryReader {
    pub fn new(objects: Vec<Unstructured>) -> Self {
        MemoryReader { objects }
    }

    pub fn insert(&mut self, object: Unstructured) {
        self.objects.push(object);
    }

    pub fn objects(&self) -> &[Unstructured] {
        &self.objects
    }

    /// Parse a multi-document YAML snapshot. Empty documents are skipped.
    pub fn from_yaml(path: &Path, text: &str) -> Result<Self, ManifestError> {
        let mut objects = Vec::new();
        for doc in serde_yaml::Deserializer::from_str(text) {
            let json = serde_json::Value::deserialize(doc).map_err(|source| ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
            if json.is_null() {
                continue;
            }
            let object = Unstructured::from_json(json).map_err(|source| ManifestError::Object {
                path: path.to_path_buf(),
                source,
            })?;
            objects.push(object);
        }
        tracing::debug!(path = %path.display(), objects = objects.len(), "loaded snapshot");
        Ok(MemoryReader { objects })
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(path, &text)
    }

    fn in_scope<'a>(&'a self, gvk: &'a GroupVersionKind, namespace: &'a str) -> impl Iterator<Item = &'a Unstructured> + 'a {
        self.objects.iter().filter(move |o| {
            let ns = match o.namespace() {
                "" => DEFAULT_NAMESPACE,
                ns => ns,
            };
            ns == namespace && o.gvk() == *gvk
        })
    }
}

impl ClusterReader for MemoryReader {
    fn get(&self, gvk: &GroupVersionKind, namespace: &str, name: &str) -> Result<Unstructured, ClusterError> {
        self.in_scope(gvk, namespace)
            .find(|o| o.name() == name)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound {
                gvk: gvk.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    fn list(&self, gvk: &GroupVersionKind, namespace: &str, labels: &Labels) -> Result<Vec<Unstructured>, ClusterError> {
        Ok(self
            .in_scope(gvk, namespace)
            .filter(|o| o.matches_labels(labels))
            .cloned()
            .collect())
    }
}
