//! The `processing` stage of trait templates.
//!
//! A trait may declare
//!
//! ```text
//! processing: {
//!     output: { token?: string }
//!     http: {
//!         method: *"GET" | string
//!         url:    "http://auth.example.com/token"
//!         request?: { body: string, header: {"Authorization": "..."} }
//!     }
//! }
//! ```
//!
//! and refer to `processing.output` elsewhere in the template. The
//! pre-processor performs the call and re-evaluates the template with the
//! response unified into `processing.output`.

use std::time::Duration;

use keel_lang::Instance;

use crate::engine::PROCESSING_FIELD;
use crate::error::PreProcessError;

/// Transforms an evaluated trait instance before its outputs are read.
pub trait PreProcessor: Send + Sync {
    fn transform(&self, instance: Instance) -> Result<Instance, PreProcessError>;
}

/// Leaves the instance untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProcessor;

impl PreProcessor for NoopProcessor {
    fn transform(&self, instance: Instance) -> Result<Instance, PreProcessError> {
        Ok(instance)
    }
}

/// Performs the blocking HTTP call described by `processing.http`.
#[derive(Debug, Clone)]
pub struct HttpProcessor {
    agent: ureq::Agent,
}

impl Default for HttpProcessor {
    fn default() -> Self {
        Self::with_timeout(Duration::from_secs(10))
    }
}

impl HttpProcessor {
    pub fn with_timeout(timeout: Duration) -> Self {
        HttpProcessor {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

/// What `processing.http` asks for.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpCall {
    pub method: String,
    pub url: String,
    pub body: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl HttpCall {
    pub fn from_instance(instance: &Instance) -> Result<Self, PreProcessError> {
        let path = |p: &str| format!("{PROCESSING_FIELD}.http.{p}");
        let url = instance
            .lookup(&path("url"))
            .ok_or_else(|| PreProcessError::Spec(format!("{} is required", path("url"))))?
            .as_str()
            .map_err(|e| PreProcessError::Spec(format!("{}: {e}", path("url"))))?
            .to_string();
        let method = match instance.lookup(&path("method")) {
            Some(v) => v
                .as_str()
                .map_err(|e| PreProcessError::Spec(format!("{}: {e}", path("method"))))?
                .to_ascii_uppercase(),
            None => "GET".to_string(),
        };
        let body = instance
            .lookup(&path("request.body"))
            .and_then(|v| v.as_str().ok())
            .map(str::to_string);
        let headers = instance
            .lookup(&path("request.header"))
            .and_then(|v| v.as_struct().ok())
            .map(|s| {
                s.regular()
                    .filter_map(|f| Some((f.name.clone(), f.value.as_str().ok()?.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        Ok(HttpCall {
            method,
            url,
            body,
            headers,
        })
    }
}

impl PreProcessor for HttpProcessor {
    fn transform(&self, instance: Instance) -> Result<Instance, PreProcessError> {
        let call = HttpCall::from_instance(&instance)?;
        tracing::debug!(method = %call.method, url = %call.url, "processing request");
        let http_err = |message: String| PreProcessError::Http {
            method: call.method.clone(),
            url: call.url.clone(),
            message,
        };

        let mut request = self.agent.request(&call.method, &call.url);
        for (name, value) in &call.headers {
            request = request.set(name, value);
        }
        let response = match &call.body {
            Some(body) => request.send_string(body),
            None => request.call(),
        }
        .map_err(|e| http_err(e.to_string()))?;

        let json: serde_json::Value = response.into_json().map_err(|source| PreProcessError::Decode {
            url: call.url.clone(),
            source,
        })?;
        instance
            .with_file("processing", format!("{PROCESSING_FIELD}: output: {json}"))
            .map_err(PreProcessError::Rebuild)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_lang::compile;

    #[test]
    fn call_defaults_to_get() {
        let inst = compile("-", r#"processing: http: url: "http://localhost/x""#).unwrap();
        let call = HttpCall::from_instance(&inst).unwrap();
        assert_eq!(call.method, "GET");
        assert_eq!(call.url, "http://localhost/x");
        assert!(call.body.is_none());
        assert!(call.headers.is_empty());
    }

    #[test]
    fn call_reads_request_block() {
        let src = r#"
processing: http: {
    method: *"post" | string
    url: "http://localhost/token"
    request: {
        body: "{\"user\": \"\(parameter.user)\"}"
        header: {"Content-Type": "application/json"}
    }
}
parameter: user: "ops"
"#;
        let call = HttpCall::from_instance(&compile("-", src).unwrap()).unwrap();
        assert_eq!(call.method, "POST");
        assert_eq!(call.body.as_deref(), Some(r#"{"user": "ops"}"#));
        assert_eq!(call.headers, vec![("Content-Type".to_string(), "application/json".to_string())]);
    }

    #[test]
    fn missing_url_is_a_spec_error() {
        let inst = compile("-", "processing: http: method: \"GET\"").unwrap();
        assert!(matches!(HttpCall::from_instance(&inst), Err(PreProcessError::Spec(_))));
    }

    #[test]
    fn noop_passes_through() {
        let inst = compile("-", "processing: {}\noutput: {a: 1}").unwrap();
        let out = NoopProcessor.transform(inst.clone()).unwrap();
        assert_eq!(out, inst);
    }
}
