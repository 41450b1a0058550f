//! Resource identity types and well-known labels.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::error::ModelError;
use crate::model::Object;

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// Application the resource belongs to.
pub const LABEL_APP_NAME: &str = "app.oam.dev/name";
/// Component the resource belongs to.
pub const LABEL_APP_COMPONENT: &str = "app.oam.dev/component";
/// Marks the main workload resource of a component.
pub const LABEL_RESOURCE_TYPE: &str = "app.oam.dev/resourceType";
pub const RESOURCE_TYPE_WORKLOAD: &str = "WORKLOAD";
/// Producer of an auxiliary resource (trait name or [`AUXILIARY_WORKLOAD`]).
pub const LABEL_TRAIT_TYPE: &str = "trait.oam.dev/type";
/// Name of the `outputs` entry an auxiliary resource was rendered from.
pub const LABEL_TRAIT_RESOURCE: &str = "trait.oam.dev/resource";

/// Producer identity of secondary outputs rendered by a workload definition.
pub const AUXILIARY_WORKLOAD: &str = "AuxiliaryWorkload";

/// Label map. Ordered, so selectors and error messages are stable.
pub type Labels = BTreeMap<String, String>;

/// `k=v,k2=v2`, the Kubernetes label-selector form.
pub fn selector(labels: &Labels) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

// ---------------------------------------------------------------------------
// GroupVersionKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    /// Split an `apiVersion` (`apps/v1`, or `v1` for the core group).
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        let (group, version) = match api_version.split_once('/') {
            Some((g, v)) => (g, v),
            None => ("", api_version),
        };
        GroupVersionKind {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
        }
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.api_version(), self.kind)
    }
}

// ---------------------------------------------------------------------------
// Unstructured
// ---------------------------------------------------------------------------

/// A resource as a plain JSON object, with accessors for the standard
/// `apiVersion` / `kind` / `metadata` fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Unstructured(Map<String, Json>);

impl Unstructured {
    pub fn from_json(json: Json) -> Result<Self, ModelError> {
        match json {
            Json::Object(map) => Ok(Unstructured(map)),
            Json::Null => Err(ModelError::NotAnObject("null")),
            Json::Bool(_) => Err(ModelError::NotAnObject("bool")),
            Json::Number(_) => Err(ModelError::NotAnObject("number")),
            Json::String(_) => Err(ModelError::NotAnObject("string")),
            Json::Array(_) => Err(ModelError::NotAnObject("array")),
        }
    }

    pub fn as_map(&self) -> &Map<String, Json> {
        &self.0
    }

    pub fn into_json(self) -> Json {
        Json::Object(self.0)
    }

    fn str_at(&self, path: &[&str]) -> Option<&str> {
        let (last, parents) = path.split_last()?;
        let mut cur = &self.0;
        for key in parents {
            cur = cur.get(*key)?.as_object()?;
        }
        cur.get(*last)?.as_str()
    }

    pub fn api_version(&self) -> &str {
        self.str_at(&["apiVersion"]).unwrap_or_default()
    }

    pub fn kind(&self) -> &str {
        self.str_at(&["kind"]).unwrap_or_default()
    }

    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::from_api_version(self.api_version(), self.kind())
    }

    /// `metadata.name`, or `""` when absent.
    pub fn name(&self) -> &str {
        self.str_at(&["metadata", "name"]).unwrap_or_default()
    }

    /// `metadata.namespace`, or `""` when absent.
    pub fn namespace(&self) -> &str {
        self.str_at(&["metadata", "namespace"]).unwrap_or_default()
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.str_at(&["metadata", "labels", key])
    }

    /// String-valued `metadata.labels`.
    pub fn labels(&self) -> Labels {
        self.0
            .get("metadata")
            .and_then(|m| m.get("labels"))
            .and_then(Json::as_object)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True when every entry of `selector` is present with the same value.
    pub fn matches_labels(&self, selector: &Labels) -> bool {
        selector
            .iter()
            .all(|(k, v)| self.label(k) == Some(v.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Auxiliary
// ---------------------------------------------------------------------------

/// A secondary rendered object tracked next to the Base.
#[derive(Debug, Clone, PartialEq)]
pub struct Auxiliary {
    pub instance: Object,
    /// Producer identity: the trait name, or [`AUXILIARY_WORKLOAD`].
    pub kind: String,
    /// The `outputs` field name; empty for a trait's singular `output`.
    pub name: String,
    pub is_outputs: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("v1", "Pod", "", "v1, Kind=Pod")]
    #[case("apps/v1", "Deployment", "apps", "apps/v1, Kind=Deployment")]
    #[case("networking.k8s.io/v1", "Ingress", "networking.k8s.io", "networking.k8s.io/v1, Kind=Ingress")]
    fn gvk_from_api_version(#[case] api_version: &str, #[case] kind: &str, #[case] group: &str, #[case] shown: &str) {
        let gvk = GroupVersionKind::from_api_version(api_version, kind);
        assert_eq!(gvk.group, group);
        assert_eq!(gvk.api_version(), api_version);
        assert_eq!(gvk.to_string(), shown);
    }

    #[test]
    fn unstructured_accessors() {
        let obj = Unstructured::from_json(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {
                "name": "web",
                "labels": {"app.oam.dev/name": "shop", "replicas": 3}
            }
        }))
        .unwrap();
        assert_eq!(obj.name(), "web");
        assert_eq!(obj.namespace(), "");
        assert_eq!(obj.gvk().kind, "Deployment");
        assert_eq!(obj.labels().len(), 1, "non-string labels are ignored");
        assert_eq!(obj.label(LABEL_APP_NAME), Some("shop"));
    }

    #[test]
    fn label_subset_matching() {
        let obj = Unstructured::from_json(json!({"metadata": {"labels": {"a": "1", "b": "2"}}})).unwrap();
        let mut sel = Labels::new();
        assert!(obj.matches_labels(&sel));
        sel.insert("a".into(), "1".into());
        assert!(obj.matches_labels(&sel));
        sel.insert("c".into(), "3".into());
        assert!(!obj.matches_labels(&sel));
    }

    #[test]
    fn non_objects_are_rejected() {
        assert_eq!(
            Unstructured::from_json(json!([1])).unwrap_err(),
            ModelError::NotAnObject("array")
        );
    }

    #[test]
    fn selector_is_sorted() {
        let labels: Labels = [("b", "2"), ("a", "1")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(selector(&labels), "a=1,b=2");
    }
}
