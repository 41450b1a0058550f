use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn keel_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("keel"));
    cmd.env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

const WORKLOAD: &str = r#"
kind: workload
name: pod
template: |
  output: {
      apiVersion: "v1"
      kind:       "Pod"
      metadata: name: context.name
      spec: containers: [{name: "main", image: parameter.image}]
  }
  parameter: image: string
healthPolicy: |
  isHealth: context.output.status.phase == "Running"
customStatus: |
  message: "phase: \(context.output.status.phase)"
"#;

const EXPOSE: &str = r#"
kind: trait
name: expose
template: |
  outputs: service: {
      apiVersion: "v1"
      kind:       "Service"
      metadata: name: "\(context.name)-svc"
      spec: ports: [{port: parameter.port}]
  }
  patch: metadata: labels: exposed: "true"
  parameter: port: *80 | int
"#;

const COMPONENT: &str = r#"
name: x
appName: demo
workload:
  definition: defs/pod.yaml
  properties:
    image: busybox
traits:
  - definition: defs/expose.yaml
    properties:
      port: 8080
"#;

fn write_component(dir: &Path) -> std::path::PathBuf {
    fs::create_dir_all(dir.join("defs")).expect("defs dir");
    fs::write(dir.join("defs/pod.yaml"), WORKLOAD).expect("workload");
    fs::write(dir.join("defs/expose.yaml"), EXPOSE).expect("trait");
    let component = dir.join("component.yaml");
    fs::write(&component, COMPONENT).expect("component");
    component
}

fn write_snapshot(dir: &Path, phase: &str) -> std::path::PathBuf {
    let snapshot = dir.join("cluster.yaml");
    let text = format!(
        r#"
apiVersion: v1
kind: Pod
metadata:
  name: x
status:
  phase: {phase}
---
apiVersion: v1
kind: Service
metadata:
  name: x-svc
"#
    );
    fs::write(&snapshot, text).expect("snapshot");
    snapshot
}

// ---------------------------------------------------------------------------
// render
// ---------------------------------------------------------------------------

#[test]
fn render_prints_yaml_documents() {
    let dir = TempDir::new().expect("tempdir");
    let component = write_component(dir.path());

    keel_cmd()
        .arg("render")
        .arg(&component)
        .assert()
        .success()
        .stdout(contains("kind: Pod"))
        .stdout(contains("image: busybox"))
        .stdout(contains("exposed:"))
        .stdout(contains("name: x-svc"));
}

#[test]
fn render_json_lists_base_and_auxiliaries() {
    let dir = TempDir::new().expect("tempdir");
    let component = write_component(dir.path());

    let output = keel_cmd()
        .args(["render", "--json"])
        .arg(&component)
        .output()
        .expect("run keel");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(json["base"]["metadata"]["name"], "x");
    assert_eq!(json["base"]["metadata"]["labels"]["exposed"], "true");
    assert_eq!(json["auxiliaries"][0]["kind"], "expose");
    assert_eq!(json["auxiliaries"][0]["name"], "service");
    assert_eq!(json["auxiliaries"][0]["isOutputs"], true);
    assert_eq!(json["auxiliaries"][0]["object"]["spec"]["ports"][0]["port"], 8080);
}

#[test]
fn render_summary_is_a_table() {
    let dir = TempDir::new().expect("tempdir");
    let component = write_component(dir.path());

    keel_cmd()
        .args(["render", "--summary"])
        .arg(&component)
        .assert()
        .success()
        .stdout(contains("x: 2 object(s)"))
        .stdout(contains("outputs.service"))
        .stdout(contains("v1/Service"));
}

#[test]
fn render_reports_missing_parameter() {
    let dir = TempDir::new().expect("tempdir");
    let component = write_component(dir.path());
    fs::write(&component, COMPONENT.replace("    image: busybox\n", "    other: 1\n")).expect("component");

    keel_cmd()
        .arg("render")
        .arg(&component)
        .assert()
        .failure()
        .stderr(contains("workload output is not concrete"));
}

#[test]
fn render_reports_missing_component_path() {
    let dir = TempDir::new().expect("tempdir");
    let missing = dir.path().join("nope.yaml");

    keel_cmd()
        .arg("render")
        .arg(&missing)
        .assert()
        .failure()
        .stderr(contains("nope.yaml"));
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[test]
fn check_against_snapshot_reports_health() {
    let dir = TempDir::new().expect("tempdir");
    let component = write_component(dir.path());
    let snapshot = write_snapshot(dir.path(), "Running");

    keel_cmd()
        .arg("check")
        .arg(&component)
        .arg("--snapshot")
        .arg(&snapshot)
        .assert()
        .success()
        .stdout(contains("HEALTHY"))
        .stdout(contains("phase: Running"))
        .stdout(contains("expose"));
}

#[test]
fn check_unhealthy_is_not_a_failure() {
    let dir = TempDir::new().expect("tempdir");
    let component = write_component(dir.path());
    let snapshot = write_snapshot(dir.path(), "Pending");

    keel_cmd()
        .arg("check")
        .arg(&component)
        .arg("--snapshot")
        .arg(&snapshot)
        .assert()
        .success()
        .stdout(contains("UNHEALTHY"));
}

#[test]
fn check_json_has_timestamp_and_results() {
    let dir = TempDir::new().expect("tempdir");
    let component = write_component(dir.path());
    let snapshot = write_snapshot(dir.path(), "Running");

    let output = keel_cmd()
        .args(["check", "--json"])
        .arg(&component)
        .arg("--snapshot")
        .arg(&snapshot)
        .output()
        .expect("run keel");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert!(json["checkedAt"].as_str().is_some_and(|s| !s.is_empty()));
    assert_eq!(json["component"], "x");
    assert_eq!(json["namespace"], "default");
    assert_eq!(json["results"][0]["definition"], "pod");
    assert_eq!(json["results"][0]["healthy"], true);
    assert_eq!(json["results"][0]["message"], "phase: Running");
    assert_eq!(json["results"][1]["definition"], "expose");
    assert_eq!(json["results"][1]["healthy"], true);
}

#[test]
fn check_fails_when_live_object_is_missing() {
    let dir = TempDir::new().expect("tempdir");
    let component = write_component(dir.path());
    let snapshot = dir.path().join("empty.yaml");
    fs::write(&snapshot, "").expect("snapshot");

    keel_cmd()
        .arg("check")
        .arg(&component)
        .arg("--snapshot")
        .arg(&snapshot)
        .assert()
        .failure()
        .stdout(contains("ERROR"))
        .stdout(contains("not found"))
        .stderr(contains("could not be checked"));
}

#[test]
fn check_requires_a_cluster_source() {
    let dir = TempDir::new().expect("tempdir");
    let component = write_component(dir.path());

    keel_cmd()
        .arg("check")
        .arg(&component)
        .assert()
        .failure()
        .stderr(contains("--snapshot").or(contains("--kubeconfig")));
}
