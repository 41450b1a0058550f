//! Trait definitions: optional `processing`, `output` and `outputs` become
//! auxiliaries, `patch` is unified into the Base.

use keel_core::{Auxiliary, ClusterReader, ExecutionContext, Object};

use crate::context::trait_context;
use crate::engine::{build_instance, AbstractEngine, OUTPUTS_FIELD, OUTPUT_FIELD, PATCH_FIELD, PROCESSING_FIELD};
use crate::error::RenderError;
use crate::evaluator::{check_health, status_message};
use crate::outputs::collect_outputs;
use crate::preprocess::{HttpProcessor, PreProcessor};
use crate::request::RenderRequest;

pub struct TraitRenderer {
    name: String,
    preprocessor: Box<dyn PreProcessor>,
}

impl TraitRenderer {
    /// A trait renderer whose `processing` stage performs HTTP calls.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_preprocessor(name, HttpProcessor::default())
    }

    pub fn with_preprocessor(name: impl Into<String>, preprocessor: impl PreProcessor + 'static) -> Self {
        TraitRenderer {
            name: name.into(),
            preprocessor: Box::new(preprocessor),
        }
    }

    fn wrap(&self, field: &str, value: &keel_lang::Value) -> Result<Object, RenderError> {
        Object::new(value.clone()).map_err(|source| RenderError::Wrap {
            renderer: self.name.clone(),
            field: field.to_string(),
            source,
        })
    }
}

impl std::fmt::Debug for TraitRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraitRenderer").field("name", &self.name).finish_non_exhaustive()
    }
}

impl AbstractEngine for TraitRenderer {
    fn name(&self) -> &str {
        &self.name
    }

    fn complete(&self, ctx: &mut dyn ExecutionContext, request: &RenderRequest) -> Result<(), RenderError> {
        let mut inst = build_instance(&self.name, request, ctx)?;

        if inst.exists(PROCESSING_FIELD) {
            inst = self
                .preprocessor
                .transform(inst)
                .map_err(|source| RenderError::PreProcess {
                    renderer: self.name.clone(),
                    source,
                })?;
        }

        if let Some(output) = inst.lookup(OUTPUT_FIELD) {
            let instance = self.wrap(OUTPUT_FIELD, output)?;
            ctx.put_auxiliary(Auxiliary {
                instance,
                kind: self.name.clone(),
                name: String::new(),
                is_outputs: false,
            });
        }

        if let Some(outputs) = inst.lookup(OUTPUTS_FIELD) {
            collect_outputs(&self.name, &self.name, outputs, ctx)?;
        }

        if let Some(patch) = inst.lookup(PATCH_FIELD) {
            let patch = self.wrap(PATCH_FIELD, patch)?;
            match ctx.base_mut() {
                Some(base) => base.unify(&patch).map_err(|source| RenderError::Patch {
                    renderer: self.name.clone(),
                    source,
                })?,
                None => tracing::warn!(trait_name = %self.name, "no workload output to patch, patch ignored"),
            }
        }
        tracing::debug!(trait_name = %self.name, "rendered trait");
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
        let root = trait_context(&self.name, ctx, reader, namespace)?;
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
        let root = trait_context(&self.name, ctx, reader, namespace)?;
        status_message(&self.name, &root, template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PreProcessError;
    use crate::preprocess::NoopProcessor;
    use crate::workload::WorkloadRenderer;
    use keel_core::ProcessContext;
    use keel_lang::Instance;
    use serde_json::json;

    const POD: &str = r#"output: {apiVersion: "v1", kind: "Pod", metadata: name: context.name, spec: {}}"#;

    fn with_workload() -> ProcessContext {
        let mut ctx = ProcessContext::new("web", "shop");
        WorkloadRenderer::new("pod").complete(&mut ctx, &RenderRequest::new(POD)).unwrap();
        ctx
    }

    #[test]
    fn singular_output_is_an_unnamed_auxiliary() {
        let mut ctx = with_workload();
        let tpl = r#"output: {apiVersion: "v1", kind: "Service", metadata: name: "\(context.name)-svc"}"#;
        TraitRenderer::with_preprocessor("expose", NoopProcessor)
            .complete(&mut ctx, &RenderRequest::new(tpl))
            .unwrap();
        let (base, aux) = ctx.output();
        assert_eq!(base.unwrap().lookup("kind").unwrap().as_str().unwrap(), "Pod");
        assert_eq!(aux.len(), 1);
        assert_eq!(aux[0].kind, "expose");
        assert_eq!(aux[0].name, "");
        assert!(!aux[0].is_outputs);
        assert_eq!(aux[0].instance.to_unstructured().unwrap().name(), "web-svc");
    }

    #[test]
    fn patch_reads_the_base_through_context() {
        let mut ctx = with_workload();
        let tpl = r#"
patch: spec: {
    hostname: "\(context.output.metadata.name)-host"
    priority: parameter.priority
}
parameter: priority: *0 | int
"#;
        TraitRenderer::with_preprocessor("tune", NoopProcessor)
            .complete(&mut ctx, &RenderRequest::new(tpl).with_params(json!({"priority": 7})))
            .unwrap();
        let base = ctx.output().0.unwrap().to_unstructured().unwrap().into_json();
        assert_eq!(base["spec"], json!({"hostname": "web-host", "priority": 7}));
        assert!(ctx.output().1.is_empty(), "a pure patch registers no auxiliary");
    }

    #[test]
    fn conflicting_patch_is_a_patch_error() {
        let mut ctx = with_workload();
        let err = TraitRenderer::with_preprocessor("rename", NoopProcessor)
            .complete(&mut ctx, &RenderRequest::new(r#"patch: metadata: name: "other""#))
            .unwrap_err();
        assert!(matches!(err, RenderError::Patch { .. }), "got: {err}");
    }

    #[test]
    fn patch_without_base_is_ignored() {
        let mut ctx = ProcessContext::new("web", "shop");
        TraitRenderer::with_preprocessor("tune", NoopProcessor)
            .complete(&mut ctx, &RenderRequest::new("patch: spec: x: 1"))
            .unwrap();
        assert!(ctx.output().0.is_none());
    }

    struct Canned;

    impl PreProcessor for Canned {
        fn transform(&self, instance: Instance) -> Result<Instance, PreProcessError> {
            instance
                .with_file("processing", r#"processing: output: {"token": "s3cr3t"}"#)
                .map_err(PreProcessError::Rebuild)
        }
    }

    #[test]
    fn processing_output_feeds_the_template() {
        let mut ctx = with_workload();
        let tpl = r#"
processing: {
    output: token?: string
    http: url: "http://auth.local/token"
}
output: {
    apiVersion: "v1"
    kind: "Secret"
    metadata: name: "auth"
    stringData: token: processing.output.token
}
"#;
        TraitRenderer::with_preprocessor("auth", Canned)
            .complete(&mut ctx, &RenderRequest::new(tpl))
            .unwrap();
        let aux = &ctx.output().1[0];
        let secret = aux.instance.to_unstructured().unwrap().into_json();
        assert_eq!(secret["stringData"]["token"], "s3cr3t");
    }

    struct Failing;

    impl PreProcessor for Failing {
        fn transform(&self, _: Instance) -> Result<Instance, PreProcessError> {
            Err(PreProcessError::Spec("boom".into()))
        }
    }

    #[test]
    fn processing_failure_aborts() {
        let mut ctx = with_workload();
        let err = TraitRenderer::with_preprocessor("auth", Failing)
            .complete(&mut ctx, &RenderRequest::new("processing: {}\noutput: {kind: \"X\"}"))
            .unwrap_err();
        assert!(matches!(err, RenderError::PreProcess { .. }), "got: {err}");
        assert!(ctx.output().1.is_empty());
    }
}
