//! Immutable render input.

use serde_json::Value as Json;

/// Template text plus optional parameters for one render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderRequest {
    template: String,
    params: Option<Json>,
}

impl RenderRequest {
    pub fn new(template: impl Into<String>) -> Self {
        RenderRequest {
            template: template.into(),
            params: None,
        }
    }

    /// The same request with `params` injected as `parameter: <params>`.
    pub fn with_params(self, params: Json) -> Self {
        RenderRequest {
            params: Some(params),
            ..self
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn params(&self) -> Option<&Json> {
        self.params.as_ref()
    }
}
