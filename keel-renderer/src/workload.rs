//! Workload definitions: `output` becomes the Base, `outputs` become
//! workload auxiliaries.

use keel_core::{ClusterReader, ExecutionContext, Object, AUXILIARY_WORKLOAD};
use keel_lang::LangError;

use crate::context::workload_context;
use crate::engine::{build_instance, AbstractEngine, OUTPUTS_FIELD, OUTPUT_FIELD};
use crate::error::{RenderError, Stage};
use crate::evaluator::{check_health, status_message};
use crate::outputs::collect_outputs;
use crate::request::RenderRequest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadRenderer {
    name: String,
}

impl WorkloadRenderer {
    pub fn new(name: impl Into<String>) -> Self {
        WorkloadRenderer { name: name.into() }
    }
}

impl AbstractEngine for WorkloadRenderer {
    fn name(&self) -> &str {
        &self.name
    }

    fn complete(&self, ctx: &mut dyn ExecutionContext, request: &RenderRequest) -> Result<(), RenderError> {
        let inst = build_instance(&self.name, request, ctx)?;

        let output = inst.lookup(OUTPUT_FIELD).ok_or_else(|| RenderError::Eval {
            renderer: self.name.clone(),
            stage: Stage::Output,
            source: LangError::UndefinedField(OUTPUT_FIELD.to_string()),
        })?;
        let base = Object::new(output.clone()).map_err(|source| RenderError::Wrap {
            renderer: self.name.clone(),
            field: OUTPUT_FIELD.to_string(),
            source,
        })?;
        ctx.set_base(base);

        let auxiliaries = match inst.lookup(OUTPUTS_FIELD) {
            Some(outputs) => collect_outputs(&self.name, AUXILIARY_WORKLOAD, outputs, ctx)?,
            None => 0,
        };
        tracing::debug!(workload = %self.name, auxiliaries, "rendered workload");
        Ok(())
    }

    fn health_check(
        &self,
        ctx: &dyn ExecutionContext,
        reader: &dyn ClusterReader,
        namespace: &str,
        policy: &str,
    ) -> Result<bool, RenderError> {
        if policy.is_empty() {
            return Ok(true);
        }
        let root = workload_context(&self.name, ctx, reader, namespace)?;
        check_health(&self.name, &root, policy)
    }

    fn status(
        &self,
        ctx: &dyn ExecutionContext,
        reader: &dyn ClusterReader,
        namespace: &str,
        template: &str,
    ) -> Result<String, RenderError> {
        if template.is_empty() {
            return Ok(String::new());
        }
        let root = workload_context(&self.name, ctx, reader, namespace)?;
        status_message(&self.name, &root, template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::ProcessContext;
    use serde_json::json;

    const WEB: &str = r#"
output: {
    apiVersion: "apps/v1"
    kind:       "Deployment"
    metadata: name: context.name
    spec: {
        replicas: parameter.replicas
        template: spec: containers: [{name: context.name, image: parameter.image}]
    }
}
parameter: {
    image:    string
    replicas: *1 | int
}
"#;

    #[test]
    fn renders_base_from_parameters_and_context() {
        let mut ctx = ProcessContext::new("frontend", "shop");
        let request = RenderRequest::new(WEB).with_params(json!({"image": "nginx:1.25"}));
        WorkloadRenderer::new("webservice").complete(&mut ctx, &request).unwrap();

        let (base, aux) = ctx.output();
        let base = base.unwrap().to_unstructured().unwrap().into_json();
        assert_eq!(base["metadata"]["name"], "frontend");
        assert_eq!(base["spec"]["replicas"], 1);
        assert_eq!(base["spec"]["template"]["spec"]["containers"][0]["image"], "nginx:1.25");
        assert!(aux.is_empty());
    }

    #[test]
    fn parameter_type_violation_is_an_eval_error() {
        let mut ctx = ProcessContext::new("frontend", "shop");
        let request = RenderRequest::new(WEB).with_params(json!({"image": "nginx", "replicas": "two"}));
        let err = WorkloadRenderer::new("webservice").complete(&mut ctx, &request).unwrap_err();
        assert!(matches!(err, RenderError::Eval { stage: Stage::Eval, .. }), "got: {err}");
        assert!(err.to_string().contains("conflicting values"), "got: {err}");
    }

    #[test]
    fn syntax_error_is_a_build_error() {
        let mut ctx = ProcessContext::new("frontend", "shop");
        let err = WorkloadRenderer::new("webservice")
            .complete(&mut ctx, &RenderRequest::new("output: {"))
            .unwrap_err();
        assert!(matches!(err, RenderError::Build { ref renderer, .. } if renderer == "webservice"), "got: {err}");
    }

    #[test]
    fn missing_output_is_reported_with_stage() {
        let mut ctx = ProcessContext::new("frontend", "shop");
        let err = WorkloadRenderer::new("webservice")
            .complete(&mut ctx, &RenderRequest::new("outputs: {}"))
            .unwrap_err();
        assert!(matches!(err, RenderError::Eval { stage: Stage::Output, .. }), "got: {err}");
    }

    #[test]
    fn incomplete_output_still_becomes_base() {
        let mut ctx = ProcessContext::new("frontend", "shop");
        WorkloadRenderer::new("webservice")
            .complete(&mut ctx, &RenderRequest::new(WEB))
            .unwrap();
        let (base, _) = ctx.output();
        assert!(base.unwrap().to_unstructured().is_err(), "image has no value yet");
    }
}
