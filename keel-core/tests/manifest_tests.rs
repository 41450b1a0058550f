//! Component, definition and snapshot loading from disk.

use assert_fs::prelude::*;
use keel_core::{
    manifest, ClusterReader, DefinitionKind, GroupVersionKind, ManifestError, MemoryReader,
    DEFAULT_NAMESPACE,
};
use predicates::prelude::*;
use serde_json::json;

const WORKLOAD: &str = r#"kind: workload
name: webservice
template: |
  output: {
    apiVersion: "apps/v1"
    kind: "Deployment"
    metadata: name: context.name
  }
  parameter: image: string
healthPolicy: |
  isHealth: true
"#;

const TRAIT: &str = r#"kind: trait
name: scaler
template: |
  patch: spec: replicas: parameter.replicas
  parameter: replicas: *1 | int
"#;

const COMPONENT: &str = r#"name: frontend
appName: shop
labels:
  env: prod
workload:
  definition: defs/webservice.yaml
  properties:
    image: nginx
traits:
  - definition: defs/scaler.yaml
    properties: {replicas: 3}
"#;

// ---------------------------------------------------------------------------
// 1. Bundles
// ---------------------------------------------------------------------------

#[test]
fn bundle_resolves_definitions_relative_to_component() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    dir.child("defs/webservice.yaml").write_str(WORKLOAD).expect("write");
    dir.child("defs/scaler.yaml").write_str(TRAIT).expect("write");
    let component = dir.child("component.yaml");
    component.write_str(COMPONENT).expect("write");

    let bundle = manifest::load_bundle(component.path()).expect("load bundle");
    assert_eq!(bundle.component.namespace, DEFAULT_NAMESPACE);
    assert_eq!(bundle.component.labels["env"], "prod");
    assert_eq!(bundle.workload.definition.kind, DefinitionKind::Workload);
    assert_eq!(bundle.workload.properties, Some(json!({"image": "nginx"})));
    assert!(bundle.workload.definition.health_policy.contains("isHealth"));
    assert_eq!(bundle.traits.len(), 1);
    assert_eq!(bundle.traits[0].definition.name, "scaler");
    assert_eq!(bundle.traits[0].properties, Some(json!({"replicas": 3})));
}

#[test]
fn trait_used_as_workload_is_rejected() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    dir.child("defs/webservice.yaml").write_str(TRAIT).expect("write");
    dir.child("defs/scaler.yaml").write_str(TRAIT).expect("write");
    let component = dir.child("component.yaml");
    component.write_str(COMPONENT).expect("write");

    let err = manifest::load_bundle(component.path()).unwrap_err();
    assert!(matches!(err, ManifestError::KindMismatch { .. }), "got: {err}");
    assert_eq!(
        err.to_string(),
        format!(
            "{}: expected a workload definition, found trait",
            dir.path().join("defs/webservice.yaml").display()
        )
    );
}

// ---------------------------------------------------------------------------
// 2. Errors carry the file path
// ---------------------------------------------------------------------------

#[test]
fn missing_definition_reports_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let component = dir.child("component.yaml");
    component.write_str(COMPONENT).expect("write");

    let err = manifest::load_bundle(component.path()).unwrap_err();
    assert!(matches!(err, ManifestError::Io { .. }), "got: {err}");
    assert!(predicate::str::contains("webservice.yaml").eval(&err.to_string()));
}

#[test]
fn malformed_component_reports_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let component = dir.child("broken.yaml");
    component.write_str("name: [unclosed\n").expect("write");

    let err = manifest::load_component(component.path()).unwrap_err();
    assert!(matches!(err, ManifestError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("broken.yaml"));
}

#[test]
fn unknown_definition_kind_is_a_parse_error() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let def = dir.child("policy.yaml");
    def.write_str("kind: policy\nname: p\ntemplate: ''\n").expect("write");

    let err = manifest::load_definition(def.path()).unwrap_err();
    assert!(matches!(err, ManifestError::Parse { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// 3. Snapshots
// ---------------------------------------------------------------------------

#[test]
fn snapshot_file_feeds_memory_reader() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let snap = dir.child("objects.yaml");
    snap.write_str(
        "apiVersion: v1\nkind: Pod\nmetadata:\n  name: x\n---\napiVersion: v1\nkind: Pod\nmetadata:\n  name: y\n  namespace: other\n",
    )
    .expect("write");
    snap.assert(predicate::path::exists());

    let reader = MemoryReader::load(snap.path()).expect("load snapshot");
    let pod = GroupVersionKind::from_api_version("v1", "Pod");
    assert_eq!(reader.get(&pod, DEFAULT_NAMESPACE, "x").unwrap().name(), "x");
    assert!(reader.get(&pod, DEFAULT_NAMESPACE, "y").is_err());
    assert_eq!(reader.get(&pod, "other", "y").unwrap().namespace(), "other");
}
