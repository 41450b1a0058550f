//! Template context fed to health and status templates: context labels plus
//! the live objects behind a definition's outputs.

use keel_core::types::{
    LABEL_APP_COMPONENT, LABEL_APP_NAME, LABEL_RESOURCE_TYPE, LABEL_TRAIT_TYPE, RESOURCE_TYPE_WORKLOAD,
};
use keel_core::{Auxiliary, ClusterReader, ExecutionContext, Labels, Object, Unstructured, AUXILIARY_WORKLOAD};
use serde_json::{Map, Value as Json};

use crate::engine::{OUTPUTS_FIELD, OUTPUT_FIELD};
use crate::error::RenderError;
use crate::resolver::resolve;

/// JSON root exposed to templates as `context`.
pub type TemplateContext = Map<String, Json>;

/// Resource labels derived from the context's `appName` and `name`.
pub fn common_labels(context_labels: &Labels) -> Labels {
    let mut common = Labels::new();
    for (key, value) in context_labels {
        match key.as_str() {
            "appName" => {
                common.insert(LABEL_APP_NAME.to_string(), value.clone());
            }
            "name" => {
                common.insert(LABEL_APP_COMPONENT.to_string(), value.clone());
            }
            _ => {}
        }
    }
    common
}

fn root_with_labels(ctx: &dyn ExecutionContext) -> (TemplateContext, Labels) {
    let labels = ctx.base_context_labels();
    let root = labels
        .iter()
        .map(|(k, v)| (k.clone(), Json::String(v.clone())))
        .collect();
    (root, common_labels(&labels))
}

fn selector(key: &str, value: &str, common: &Labels) -> Labels {
    let mut labels = Labels::new();
    labels.insert(key.to_string(), value.to_string());
    labels.extend(common.iter().map(|(k, v)| (k.clone(), v.clone())));
    labels
}

fn symbolic(renderer: &str, field: &str, object: &Object) -> Result<Unstructured, RenderError> {
    object.to_unstructured().map_err(|source| RenderError::Wrap {
        renderer: renderer.to_string(),
        field: field.to_string(),
        source,
    })
}

fn aux_field(aux: &Auxiliary) -> String {
    if aux.is_outputs {
        format!("{OUTPUTS_FIELD}.{}", aux.name)
    } else {
        OUTPUT_FIELD.to_string()
    }
}

/// Context for a workload: `output` is its live main resource, `outputs`
/// the live object of a workload auxiliary.
///
/// `outputs` is replaced for every workload auxiliary, so with several only
/// the last one is visible to templates.
pub fn workload_context(
    renderer: &str,
    ctx: &dyn ExecutionContext,
    reader: &dyn ClusterReader,
    namespace: &str,
) -> Result<TemplateContext, RenderError> {
    let (mut root, common) = root_with_labels(ctx);
    let (base, auxiliaries) = ctx.output();
    let base = base.ok_or_else(|| RenderError::Config(format!("workload {renderer} has no rendered output")))?;

    let labels = selector(LABEL_RESOURCE_TYPE, RESOURCE_TYPE_WORKLOAD, &common);
    let live = resolve(&symbolic(renderer, OUTPUT_FIELD, base)?, reader, namespace, &labels, "")?;
    root.insert(OUTPUT_FIELD.to_string(), live.into_json());

    for aux in auxiliaries.iter().filter(|a| a.kind == AUXILIARY_WORKLOAD) {
        if aux.name.is_empty() {
            return Err(RenderError::Config(
                "the auxiliary of workload must have a name with format 'outputs.<my-name>'".to_string(),
            ));
        }
        let labels = selector(LABEL_TRAIT_TYPE, AUXILIARY_WORKLOAD, &common);
        let live = resolve(&symbolic(renderer, &aux_field(aux), &aux.instance)?, reader, namespace, &labels, &aux.name)?;
        let mut outputs = Map::new();
        outputs.insert(aux.name.clone(), live.into_json());
        root.insert(OUTPUTS_FIELD.to_string(), Json::Object(outputs));
    }
    Ok(root)
}

/// Context for a trait: its singular output as `output`, a named output as
/// `outputs`, replaced per auxiliary like [`workload_context`].
pub fn trait_context(
    trait_name: &str,
    ctx: &dyn ExecutionContext,
    reader: &dyn ClusterReader,
    namespace: &str,
) -> Result<TemplateContext, RenderError> {
    let (mut root, common) = root_with_labels(ctx);
    let (_, auxiliaries) = ctx.output();

    for aux in auxiliaries.iter().filter(|a| a.kind == trait_name) {
        if aux.is_outputs && aux.name.is_empty() {
            return Err(RenderError::Config(format!(
                "auxiliary of trait {trait_name} is marked as outputs but has no name"
            )));
        }
        let labels = selector(LABEL_TRAIT_TYPE, &aux.kind, &common);
        let qualifier = if aux.is_outputs { aux.name.as_str() } else { "" };
        let live = resolve(
            &symbolic(trait_name, &aux_field(aux), &aux.instance)?,
            reader,
            namespace,
            &labels,
            qualifier,
        )?;
        if aux.is_outputs {
            let mut outputs = Map::new();
            outputs.insert(aux.name.clone(), live.into_json());
            root.insert(OUTPUTS_FIELD.to_string(), Json::Object(outputs));
        } else {
            root.insert(OUTPUT_FIELD.to_string(), live.into_json());
        }
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::{MemoryReader, ProcessContext};
    use keel_lang::compile;
    use serde_json::json;

    fn object(src: &str) -> Object {
        let inst = compile("-", &format!("o: {src}")).unwrap();
        Object::new(inst.lookup("o").unwrap().clone()).unwrap()
    }

    #[test]
    fn only_app_name_and_name_become_resource_labels() {
        let mut labels = Labels::new();
        labels.insert("appName".into(), "shop".into());
        labels.insert("name".into(), "web".into());
        labels.insert("env".into(), "prod".into());
        let common = common_labels(&labels);
        assert_eq!(common.len(), 2);
        assert_eq!(common[LABEL_APP_NAME], "shop");
        assert_eq!(common[LABEL_APP_COMPONENT], "web");
    }

    #[test]
    fn workload_without_base_is_a_config_error() {
        let ctx = ProcessContext::new("web", "shop");
        let err = workload_context("webservice", &ctx, &MemoryReader::default(), "default").unwrap_err();
        assert!(matches!(err, RenderError::Config(_)), "got: {err}");
    }

    #[test]
    fn unnamed_workload_auxiliary_is_a_config_error() {
        let mut ctx = ProcessContext::new("web", "shop");
        ctx.set_base(object(r#"{apiVersion: "v1", kind: "Pod", metadata: name: "web"}"#));
        ctx.put_auxiliary(Auxiliary {
            instance: object(r#"{apiVersion: "v1", kind: "Service"}"#),
            kind: AUXILIARY_WORKLOAD.into(),
            name: String::new(),
            is_outputs: true,
        });
        let reader = MemoryReader::new(vec![Unstructured::from_json(
            json!({"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "web"}}),
        )
        .unwrap()]);
        let err = workload_context("webservice", &ctx, &reader, "default").unwrap_err();
        assert!(matches!(err, RenderError::Config(ref m) if m.contains("must have a name")), "got: {err}");
    }

    #[test]
    fn trait_context_copies_labels_and_resolves_singular_output() {
        let mut ctx = ProcessContext::new("web", "shop");
        ctx.put_auxiliary(Auxiliary {
            instance: object(r#"{apiVersion: "networking.k8s.io/v1", kind: "Ingress"}"#),
            kind: "gateway".into(),
            name: String::new(),
            is_outputs: false,
        });
        let live = Unstructured::from_json(json!({
            "apiVersion": "networking.k8s.io/v1",
            "kind": "Ingress",
            "metadata": {"name": "web-gw", "labels": {
                "trait.oam.dev/type": "gateway",
                "app.oam.dev/name": "shop",
                "app.oam.dev/component": "web"
            }}
        }))
        .unwrap();
        let reader = MemoryReader::new(vec![live]);
        let root = trait_context("gateway", &ctx, &reader, "default").unwrap();
        assert_eq!(root["name"], "web");
        assert_eq!(root["appName"], "shop");
        assert_eq!(root["output"]["metadata"]["name"], "web-gw");
        assert!(!root.contains_key("outputs"));
    }
}
