//! `keel render`: print the objects a component renders to.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use keel_core::{manifest, ExecutionContext, Object, ProcessContext};

use crate::pipeline;

/// Arguments for `keel render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Component file referencing a workload and its traits.
    pub component: PathBuf,

    /// Emit machine-readable JSON.
    #[arg(long, conflicts_with = "summary")]
    pub json: bool,

    /// Print a table of rendered objects instead of the objects.
    #[arg(long)]
    pub summary: bool,
}

impl RenderArgs {
    pub fn run(self) -> Result<()> {
        let bundle = manifest::load_bundle(&self.component)
            .with_context(|| format!("failed to load component {}", self.component.display()))?;
        let steps = pipeline::steps(&bundle);
        let ctx = pipeline::render(&bundle, &steps)?;
        let rendered = collect(&ctx)?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&rendered).context("failed to serialize render JSON")?
            );
        } else if self.summary {
            print_summary(&bundle.component.name, &rendered);
        } else {
            print_yaml(&rendered)?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Rendered {
    base: Option<serde_json::Value>,
    auxiliaries: Vec<RenderedAuxiliary>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderedAuxiliary {
    kind: String,
    name: String,
    is_outputs: bool,
    object: serde_json::Value,
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "role")]
    role: String,
    #[tabled(rename = "producer")]
    producer: String,
    #[tabled(rename = "output")]
    output: String,
    #[tabled(rename = "resource")]
    resource: String,
    #[tabled(rename = "name")]
    name: String,
}

fn export(object: &Object, what: &str) -> Result<serde_json::Value> {
    let unstructured = object
        .to_unstructured()
        .with_context(|| format!("{what} is not concrete"))?;
    Ok(unstructured.into_json())
}

fn collect(ctx: &ProcessContext) -> Result<Rendered> {
    let (base, auxiliaries) = ctx.output();
    let base = base.map(|b| export(b, "workload output")).transpose()?;
    let auxiliaries = auxiliaries
        .iter()
        .map(|aux| {
            Ok(RenderedAuxiliary {
                kind: aux.kind.clone(),
                name: aux.name.clone(),
                is_outputs: aux.is_outputs,
                object: export(&aux.instance, &format!("output of {}", aux.kind))?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Rendered { base, auxiliaries })
}

fn print_yaml(rendered: &Rendered) -> Result<()> {
    let objects = rendered
        .base
        .iter()
        .chain(rendered.auxiliaries.iter().map(|a| &a.object));
    for object in objects {
        println!("---");
        print!("{}", serde_yaml::to_string(object).context("failed to serialize object YAML")?);
    }
    Ok(())
}

fn resource(object: &serde_json::Value) -> (String, String) {
    let field = |path: &str| object.pointer(path).and_then(|v| v.as_str()).unwrap_or_default();
    let resource = format!("{}/{}", field("/apiVersion"), field("/kind"));
    let name = match field("/metadata/name") {
        "" => "<by labels>".to_string(),
        name => name.to_string(),
    };
    (resource, name)
}

fn print_summary(component: &str, rendered: &Rendered) {
    let mut rows = Vec::new();
    if let Some(base) = &rendered.base {
        let (resource, name) = resource(base);
        rows.push(SummaryRow {
            role: "base".to_string(),
            producer: "workload".to_string(),
            output: "output".to_string(),
            resource,
            name,
        });
    }
    for aux in &rendered.auxiliaries {
        let (resource, name) = resource(&aux.object);
        rows.push(SummaryRow {
            role: "auxiliary".to_string(),
            producer: aux.kind.clone(),
            output: if aux.is_outputs {
                format!("outputs.{}", aux.name)
            } else {
                "output".to_string()
            },
            resource,
            name,
        });
    }

    println!("{component}: {} object(s)", rows.len());
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
