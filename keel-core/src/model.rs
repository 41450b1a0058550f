//! Evaluated struct values wrapped as resource objects.

use keel_lang::Value;

use crate::error::ModelError;
use crate::types::Unstructured;

/// A rendered resource: a struct value that can be exported, patched and
/// written back out as source.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    value: Value,
}

impl Object {
    pub fn new(value: Value) -> Result<Self, ModelError> {
        match value.resolve_default() {
            Value::Struct(_) => Ok(Object {
                value: value.resolve_default().clone(),
            }),
            other => Err(ModelError::NotAStruct {
                found: other.kind_name(),
            }),
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn lookup(&self, path: &str) -> Option<&Value> {
        self.value.lookup(path)
    }

    /// Export to JSON. Fails while any regular field is still incomplete.
    pub fn to_unstructured(&self) -> Result<Unstructured, ModelError> {
        let json = self.value.to_json().map_err(ModelError::Export)?;
        Unstructured::from_json(json)
    }

    /// Unify `patch` into this object in place. On conflict the object is
    /// left unchanged.
    pub fn unify(&mut self, patch: &Object) -> Result<(), ModelError> {
        self.value = self.value.unify(&patch.value).map_err(ModelError::Conflict)?;
        Ok(())
    }

    /// The object as source text, for embedding into other templates.
    pub fn to_source(&self) -> String {
        self.value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_lang::compile;
    use serde_json::json;

    fn object(src: &str) -> Object {
        let inst = compile("-", &format!("o: {src}")).unwrap();
        Object::new(inst.lookup("o").unwrap().clone()).unwrap()
    }

    #[test]
    fn only_structs_wrap() {
        let err = Object::new(Value::String("x".into())).unwrap_err();
        assert_eq!(err, ModelError::NotAStruct { found: "string" });
    }

    #[test]
    fn patch_merges_fields() {
        let mut base = object(r#"{kind: "Deployment", spec: replicas: 1}"#);
        base.unify(&object(r#"{spec: template: metadata: labels: app: "web"}"#)).unwrap();
        assert_eq!(
            base.to_unstructured().unwrap().into_json(),
            json!({"kind": "Deployment", "spec": {"replicas": 1, "template": {"metadata": {"labels": {"app": "web"}}}}})
        );
    }

    #[test]
    fn conflicting_patch_leaves_object_untouched() {
        let mut base = object("{spec: replicas: 1}");
        let before = base.clone();
        let err = base.unify(&object("{spec: replicas: 3}")).unwrap_err();
        assert!(matches!(err, ModelError::Conflict(_)));
        assert_eq!(base, before);
    }

    #[test]
    fn incomplete_objects_do_not_export() {
        let base = object("{image: string}");
        assert!(matches!(base.to_unstructured(), Err(ModelError::Export(_))));
    }

    #[test]
    fn source_reparses_to_the_same_value() {
        let base = object(r#"{kind: "Pod", "metadata": {name: "x", labels: {"app.oam.dev/name": "a"}}}"#);
        let again = object(&base.to_source());
        assert_eq!(again, base);
    }
}
