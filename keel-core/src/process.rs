//! Per-component execution context threaded through a render pipeline.

use crate::model::Object;
use crate::types::{Auxiliary, Labels};

/// Carries the Base and Auxiliaries of one component across renders.
pub trait ExecutionContext {
    /// Source text injected into every template as the `context` field.
    fn base_context_file(&self) -> String;

    /// Flat labels copied into health and status contexts.
    fn base_context_labels(&self) -> Labels;

    /// Install the Base, replacing any previous one.
    fn set_base(&mut self, base: Object);

    fn base_mut(&mut self) -> Option<&mut Object>;

    fn output(&self) -> (Option<&Object>, &[Auxiliary]);

    fn put_auxiliary(&mut self, auxiliary: Auxiliary);
}

/// In-memory [`ExecutionContext`] for a single component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessContext {
    name: String,
    app_name: String,
    labels: Labels,
    base: Option<Object>,
    auxiliaries: Vec<Auxiliary>,
}

impl ProcessContext {
    pub fn new(name: impl Into<String>, app_name: impl Into<String>) -> Self {
        ProcessContext {
            name: name.into(),
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    /// Extra context labels. `name` and `appName` always win over these.
    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }
}

fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

impl ExecutionContext for ProcessContext {
    /// ```text
    /// context: {
    ///     "name": "<component>"
    ///     "appName": "<app>"
    ///     output: <base>
    ///     outputs: "<aux name>": <aux>
    /// }
    /// ```
    fn base_context_file(&self) -> String {
        let mut out = String::from("context: {\n");
        for (k, v) in self.base_context_labels() {
            out.push_str(&format!("\t{}: {}\n", quote(&k), quote(&v)));
        }
        if let Some(base) = &self.base {
            out.push_str(&format!("\toutput: {}\n", base.to_source()));
        }
        let mut named: Vec<&Auxiliary> = Vec::new();
        for aux in self.auxiliaries.iter().filter(|a| !a.name.is_empty()) {
            match named.iter_mut().find(|n| n.name == aux.name) {
                Some(slot) => *slot = aux,
                None => named.push(aux),
            }
        }
        if !named.is_empty() {
            out.push_str("\toutputs: {\n");
            for aux in named {
                out.push_str(&format!("\t\t{}: {}\n", quote(&aux.name), aux.instance.to_source()));
            }
            out.push_str("\t}\n");
        }
        out.push_str("}\n");
        out
    }

    fn base_context_labels(&self) -> Labels {
        let mut labels = self.labels.clone();
        labels.insert("name".to_string(), self.name.clone());
        labels.insert("appName".to_string(), self.app_name.clone());
        labels
    }

    fn set_base(&mut self, base: Object) {
        self.base = Some(base);
    }

    fn base_mut(&mut self) -> Option<&mut Object> {
        self.base.as_mut()
    }

    fn output(&self) -> (Option<&Object>, &[Auxiliary]) {
        (self.base.as_ref(), &self.auxiliaries)
    }

    fn put_auxiliary(&mut self, auxiliary: Auxiliary) {
        self.auxiliaries.push(auxiliary);
    }
}
