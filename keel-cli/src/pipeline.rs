//! Renders a loaded component bundle into a [`ProcessContext`].

use anyhow::{Context, Result};

use keel_core::{Bound, Bundle, DefinitionKind, ProcessContext};
use keel_renderer::{AbstractEngine, RenderRequest, TraitRenderer, WorkloadRenderer};

/// A definition together with the engine that renders it.
pub struct Step<'a> {
    pub bound: &'a Bound,
    pub engine: Box<dyn AbstractEngine>,
}

impl Step<'_> {
    pub fn kind(&self) -> DefinitionKind {
        self.bound.definition.kind
    }

    pub fn name(&self) -> &str {
        &self.bound.definition.name
    }
}

fn request(bound: &Bound) -> RenderRequest {
    let request = RenderRequest::new(bound.definition.template.clone());
    match &bound.properties {
        Some(params) => request.with_params(params.clone()),
        None => request,
    }
}

/// Workload first, then traits in declaration order.
pub fn steps(bundle: &Bundle) -> Vec<Step<'_>> {
    let workload = Step {
        bound: &bundle.workload,
        engine: Box::new(WorkloadRenderer::new(bundle.workload.definition.name.clone())),
    };
    std::iter::once(workload)
        .chain(bundle.traits.iter().map(|bound| Step {
            bound,
            engine: Box::new(TraitRenderer::new(bound.definition.name.clone())),
        }))
        .collect()
}

/// Render every step into a fresh context for the bundle's component.
pub fn render(bundle: &Bundle, steps: &[Step<'_>]) -> Result<ProcessContext> {
    let mut ctx = bundle.component.process_context();
    for step in steps {
        step.engine
            .complete(&mut ctx, &request(step.bound))
            .with_context(|| format!("failed to render {} '{}'", step.kind(), step.name()))?;
        tracing::debug!(kind = %step.kind(), definition = step.name(), "rendered");
    }
    Ok(ctx)
}
