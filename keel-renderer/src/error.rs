//! Error types for keel-renderer.

use std::fmt;

use keel_core::types::selector;
use keel_core::{ClusterError, GroupVersionKind, Labels, ModelError};
use keel_lang::LangError;
use thiserror::Error;

/// Pipeline step an evaluation error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Evaluating the assembled template.
    Eval,
    /// Looking up the `output` field.
    Output,
    /// Evaluating a health policy.
    Health,
    /// Evaluating a custom status template.
    Status,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Eval => "eval",
            Stage::Output => "output",
            Stage::Health => "health",
            Stage::Status => "status",
        })
    }
}

/// All errors that can arise from rendering or evaluating a definition.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Malformed template, parameter or context source.
    #[error("{renderer}: build: {source}")]
    Build {
        renderer: String,
        #[source]
        source: LangError,
    },

    /// Evaluation failed, or a required field is missing or ill-typed.
    #[error("{renderer} {stage}: {source}")]
    Eval {
        renderer: String,
        stage: Stage,
        #[source]
        source: LangError,
    },

    /// A field could not be turned into an object.
    #[error("{renderer}: cannot wrap {field}: {source}")]
    Wrap {
        renderer: String,
        field: String,
        #[source]
        source: ModelError,
    },

    /// The live object behind a rendered output could not be found.
    #[error("resolve live resource: {0}")]
    Resolve(#[from] ResolveError),

    /// A trait patch conflicts with the workload output.
    #[error("{renderer}: patch: {source}")]
    Patch {
        renderer: String,
        #[source]
        source: ModelError,
    },

    /// The execution context holds outputs that cannot be evaluated.
    #[error("{0}")]
    Config(String),

    /// The `processing` stage of a trait failed.
    #[error("{renderer}: processing: {source}")]
    PreProcess {
        renderer: String,
        #[source]
        source: PreProcessError,
    },

    /// JSON serialization of parameters or a template context.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures mapping a rendered object to its live counterpart.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// No object of the kind carries the label set.
    #[error("no resources found gvk({gvk}) labels({})", selector(.labels))]
    NotFound { gvk: GroupVersionKind, labels: Labels },

    /// Several objects carry the label set and none is labeled with the
    /// requested outputs name.
    #[error(
        "{candidates} resources found gvk({gvk}) labels({}), none labeled trait.oam.dev/resource={qualifier:?}",
        selector(.labels)
    )]
    Ambiguous {
        gvk: GroupVersionKind,
        labels: Labels,
        qualifier: String,
        candidates: usize,
    },

    /// The reader failed; a named object that does not exist surfaces here
    /// as [`ClusterError::NotFound`].
    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

impl ResolveError {
    /// True for every flavor of "the object does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ResolveError::NotFound { .. } | ResolveError::Cluster(ClusterError::NotFound { .. })
        )
    }
}

/// Failures of a trait's `processing` stage.
#[derive(Debug, Error)]
pub enum PreProcessError {
    /// `processing` is missing required settings.
    #[error("invalid processing block: {0}")]
    Spec(String),

    /// The HTTP call failed or returned an error status.
    #[error("{method} {url}: {message}")]
    Http {
        method: String,
        url: String,
        message: String,
    },

    /// The response body is not JSON.
    #[error("decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// The template does not accept the processing result.
    #[error("apply processing output: {0}")]
    Rebuild(#[source] LangError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_errors_name_gvk_and_labels() {
        let mut labels = Labels::new();
        labels.insert("trait.oam.dev/type".into(), "AuxiliaryWorkload".into());
        labels.insert("app.oam.dev/name".into(), "shop".into());
        let err = ResolveError::NotFound {
            gvk: GroupVersionKind::from_api_version("v1", "Service"),
            labels,
        };
        assert_eq!(
            err.to_string(),
            "no resources found gvk(v1, Kind=Service) labels(app.oam.dev/name=shop,trait.oam.dev/type=AuxiliaryWorkload)"
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn eval_error_carries_stage() {
        let err = RenderError::Eval {
            renderer: "webservice".into(),
            stage: Stage::Output,
            source: LangError::UndefinedField("output".into()),
        };
        assert_eq!(err.to_string(), "webservice output: undefined field: output");
    }
}
