//! The renderer interface and the evaluation-unit assembly both renderers
//! share.

use keel_core::{ClusterReader, ExecutionContext};
use keel_lang::{Builder, Instance};

use crate::error::{RenderError, Stage};
use crate::request::RenderRequest;

/// Main rendered object of a definition.
pub const OUTPUT_FIELD: &str = "output";
/// Named secondary objects of a definition.
pub const OUTPUTS_FIELD: &str = "outputs";
/// Trait patch unified into the workload output.
pub const PATCH_FIELD: &str = "patch";
/// Trait pre-processing block.
pub const PROCESSING_FIELD: &str = "processing";
/// Health policy result.
pub const HEALTH_FIELD: &str = "isHealth";
/// Custom status result.
pub const MESSAGE_FIELD: &str = "message";

/// Renders a definition and evaluates its health and status against live
/// objects. Implementations hold no per-render state.
pub trait AbstractEngine {
    /// Definition name.
    fn name(&self) -> &str;

    /// Render `request` and record its outputs in `ctx`.
    fn complete(&self, ctx: &mut dyn ExecutionContext, request: &RenderRequest) -> Result<(), RenderError>;

    /// Evaluate `isHealth` of `policy`. An empty policy is healthy without
    /// touching the cluster.
    fn health_check(
        &self,
        ctx: &dyn ExecutionContext,
        reader: &dyn ClusterReader,
        namespace: &str,
        policy: &str,
    ) -> Result<bool, RenderError>;

    /// Evaluate `message` of `template`. An empty template yields `""`
    /// without touching the cluster.
    fn status(
        &self,
        ctx: &dyn ExecutionContext,
        reader: &dyn ClusterReader,
        namespace: &str,
        template: &str,
    ) -> Result<String, RenderError>;
}

/// Template, optional `parameter` file and the context file, built as one
/// package.
pub(crate) fn build_instance(
    renderer: &str,
    request: &RenderRequest,
    ctx: &dyn ExecutionContext,
) -> Result<Instance, RenderError> {
    let build_err = |source| RenderError::Build {
        renderer: renderer.to_string(),
        source,
    };
    let mut builder = Builder::new().file("template", request.template()).map_err(build_err)?;
    if let Some(params) = request.params() {
        let json = serde_json::to_string(params)?;
        builder = builder
            .file("parameter", format!("parameter: {json}"))
            .map_err(build_err)?;
    }
    builder = builder.file("context", ctx.base_context_file()).map_err(build_err)?;
    builder.build().map_err(|source| RenderError::Eval {
        renderer: renderer.to_string(),
        stage: Stage::Eval,
        source,
    })
}
