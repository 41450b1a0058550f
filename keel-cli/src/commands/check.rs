//! `keel check`: health and custom status of a rendered component.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgGroup, Args};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use keel_core::{manifest, ClusterReader, MemoryReader, ProcessContext};

use crate::cluster::KubeReader;
use crate::pipeline::{self, Step};

/// Arguments for `keel check`.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["snapshot", "kubeconfig"])))]
pub struct CheckArgs {
    /// Component file referencing a workload and its traits.
    pub component: PathBuf,

    /// Multi-document YAML file standing in for the cluster.
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Read live objects from the cluster of this kubeconfig
    /// (default `$KUBECONFIG`, then `~/.kube/config`).
    #[arg(long, num_args = 0..=1)]
    pub kubeconfig: Option<Option<PathBuf>>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let reader = self.reader()?;
        let bundle = manifest::load_bundle(&self.component)
            .with_context(|| format!("failed to load component {}", self.component.display()))?;
        let steps = pipeline::steps(&bundle);
        let ctx = pipeline::render(&bundle, &steps)?;

        let report = CheckReport {
            component: bundle.component.name.clone(),
            namespace: bundle.component.namespace.clone(),
            checked_at: Utc::now(),
            results: steps
                .iter()
                .map(|step| check(step, &ctx, reader.as_ref(), &bundle.component.namespace))
                .collect(),
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize check JSON")?
            );
        } else {
            print_table(&report);
        }

        let failed = report.results.iter().filter(|r| r.error.is_some()).count();
        if failed > 0 {
            return Err(anyhow!("{failed} definition(s) could not be checked"));
        }
        Ok(())
    }

    fn reader(&self) -> Result<Box<dyn ClusterReader>> {
        if let Some(path) = &self.snapshot {
            let reader = MemoryReader::load(path)
                .with_context(|| format!("failed to load snapshot {}", path.display()))?;
            return Ok(Box::new(reader));
        }
        let path = self.kubeconfig.as_ref().and_then(|p| p.as_deref());
        let reader = KubeReader::connect(path)?;
        tracing::debug!(server = reader.server(), "reading live objects from cluster");
        Ok(Box::new(reader))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckReport {
    component: String,
    namespace: String,
    checked_at: DateTime<Utc>,
    results: Vec<CheckResult>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckResult {
    definition: String,
    kind: String,
    healthy: Option<bool>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Tabled)]
struct CheckTableRow {
    #[tabled(rename = "definition")]
    definition: String,
    #[tabled(rename = "kind")]
    kind: String,
    #[tabled(rename = "health")]
    health: String,
    #[tabled(rename = "message")]
    message: String,
}

fn check(step: &Step<'_>, ctx: &ProcessContext, reader: &dyn ClusterReader, namespace: &str) -> CheckResult {
    let definition = &step.bound.definition;
    let outcome = step
        .engine
        .health_check(ctx, reader, namespace, &definition.health_policy)
        .and_then(|healthy| {
            let message = step.engine.status(ctx, reader, namespace, &definition.custom_status)?;
            Ok((healthy, message))
        });
    match outcome {
        Ok((healthy, message)) => CheckResult {
            definition: step.name().to_string(),
            kind: step.kind().to_string(),
            healthy: Some(healthy),
            message,
            error: None,
        },
        Err(err) => {
            tracing::warn!(definition = step.name(), error = %err, "check failed");
            CheckResult {
                definition: step.name().to_string(),
                kind: step.kind().to_string(),
                healthy: None,
                message: String::new(),
                error: Some(err.to_string()),
            }
        }
    }
}

fn health_label(result: &CheckResult) -> String {
    match result.healthy {
        Some(true) => "HEALTHY".green().to_string(),
        Some(false) => "UNHEALTHY".yellow().to_string(),
        None => "ERROR".red().to_string(),
    }
}

fn print_table(report: &CheckReport) {
    println!(
        "{} | namespace {} | checked {}",
        report.component.bold(),
        report.namespace,
        report.checked_at.to_rfc3339(),
    );
    let rows: Vec<CheckTableRow> = report
        .results
        .iter()
        .map(|r| CheckTableRow {
            definition: r.definition.clone(),
            kind: r.kind.clone(),
            health: health_label(r),
            message: r.error.clone().unwrap_or_else(|| r.message.clone()),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
