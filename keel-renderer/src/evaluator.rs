//! Evaluation of health and status templates against a [`TemplateContext`].

use keel_lang::{LangError, Value};

use crate::context::TemplateContext;
use crate::engine::{HEALTH_FIELD, MESSAGE_FIELD};
use crate::error::{RenderError, Stage};

/// A result kind a template field can be read as.
pub trait FieldKind: Sized {
    fn extract(value: &Value) -> Result<Self, LangError>;
}

impl FieldKind for bool {
    fn extract(value: &Value) -> Result<Self, LangError> {
        value.as_bool()
    }
}

impl FieldKind for String {
    fn extract(value: &Value) -> Result<Self, LangError> {
        value.as_str().map(str::to_string)
    }
}

/// Compile `context: <json>` followed by `template` and read `field` as `T`.
pub fn evaluate<T: FieldKind>(
    renderer: &str,
    stage: Stage,
    context: &TemplateContext,
    template: &str,
    field: &str,
) -> Result<T, RenderError> {
    let eval_err = |source| RenderError::Eval {
        renderer: renderer.to_string(),
        stage,
        source,
    };
    let json = serde_json::to_string(context)?;
    let source = format!("context: {json}\n{template}");
    let inst = keel_lang::compile("-", &source).map_err(eval_err)?;
    let value = inst
        .lookup(field)
        .ok_or_else(|| eval_err(LangError::UndefinedField(field.to_string())))?;
    T::extract(value).map_err(|e| eval_err(e.at(field)))
}

/// `isHealth` of `policy`; an empty policy is healthy.
pub fn check_health(renderer: &str, context: &TemplateContext, policy: &str) -> Result<bool, RenderError> {
    if policy.is_empty() {
        return Ok(true);
    }
    evaluate(renderer, Stage::Health, context, policy, HEALTH_FIELD)
}

/// `message` of `template`; an empty template yields `""`.
pub fn status_message(renderer: &str, context: &TemplateContext, template: &str) -> Result<String, RenderError> {
    if template.is_empty() {
        return Ok(String::new());
    }
    evaluate(renderer, Stage::Status, context, template, MESSAGE_FIELD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn ctx(v: serde_json::Value) -> TemplateContext {
        match v {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn deployment(ready: i64) -> TemplateContext {
        ctx(json!({
            "name": "web",
            "output": {"spec": {"replicas": 3}, "status": {"readyReplicas": ready}}
        }))
    }

    #[rstest]
    #[case(3, true)]
    #[case(1, false)]
    fn health_compares_live_fields(#[case] ready: i64, #[case] expected: bool) {
        let policy = "isHealth: context.output.status.readyReplicas == context.output.spec.replicas";
        assert_eq!(check_health("webservice", &deployment(ready), policy).unwrap(), expected);
    }

    #[test]
    fn status_interpolates_context() {
        let tpl = "message: \"\\(context.name): \\(context.output.status.readyReplicas)/\\(context.output.spec.replicas) ready\"";
        assert_eq!(status_message("webservice", &deployment(2), tpl).unwrap(), "web: 2/3 ready");
    }

    #[test]
    fn empty_templates_short_circuit() {
        let empty = TemplateContext::new();
        assert!(check_health("x", &empty, "").unwrap());
        assert_eq!(status_message("x", &empty, "").unwrap(), "");
    }

    #[test]
    fn missing_field_is_an_eval_error() {
        let err = check_health("webservice", &deployment(3), "healthy: true").unwrap_err();
        assert!(
            matches!(err, RenderError::Eval { stage: Stage::Health, ref source, .. } if *source == LangError::UndefinedField("isHealth".into())),
            "got: {err}"
        );
    }

    #[test]
    fn wrong_kind_is_an_eval_error() {
        let err = status_message("webservice", &deployment(3), "message: 42").unwrap_err();
        assert!(matches!(err, RenderError::Eval { stage: Stage::Status, .. }), "got: {err}");
        assert!(err.to_string().contains("expected string, found int"), "got: {err}");
    }

    #[test]
    fn live_integers_beyond_i64_still_compile() {
        let live = ctx(json!({
            "output": {
                "metadata": {"generation": 18446744073709551615u64},
                "status": {"readyReplicas": 3}
            }
        }));
        let policy = "isHealth: context.output.status.readyReplicas == 3";
        assert!(check_health("webservice", &live, policy).unwrap());
    }

    #[test]
    fn missing_live_field_fails_on_read() {
        let policy = "isHealth: context.output.status.phase == \"Running\"";
        let err = check_health("webservice", &deployment(3), policy).unwrap_err();
        assert!(matches!(err, RenderError::Eval { stage: Stage::Health, .. }), "got: {err}");
    }
}
