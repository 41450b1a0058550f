//! Error types for keel-lang.

use thiserror::Error;

/// All errors that can arise while parsing or evaluating template source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LangError {
    /// Malformed source text. Carries the file name and 1-based position.
    #[error("{file}:{line}:{col}: {message}")]
    Syntax {
        file: String,
        line: usize,
        col: usize,
        message: String,
    },

    /// Two concrete values (or a value and a type) could not be unified.
    #[error("conflicting values {left} and {right}")]
    Conflict { left: String, right: String },

    /// An identifier did not resolve in any enclosing scope.
    #[error("reference \"{0}\" not found")]
    UndefinedReference(String),

    /// A selector or index named a field that does not exist.
    #[error("undefined field: {0}")]
    UndefinedField(String),

    /// A field depends on itself.
    #[error("structural cycle evaluating \"{0}\"")]
    Cycle(String),

    /// An operation needed a concrete value but found a type or constraint.
    #[error("incomplete value: {0}")]
    Incomplete(String),

    /// Operator applied to operands of the wrong kind, division by zero, etc.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Typed accessor found a different kind of value.
    #[error("expected {expected}, found {found}")]
    KindMismatch {
        expected: &'static str,
        found: String,
    },

    /// Error raised while evaluating a nested field.
    #[error("{path}: {source}")]
    AtField {
        path: String,
        #[source]
        source: Box<LangError>,
    },
}

impl LangError {
    /// Prefix the error with a field label, joining nested labels with `.`.
    pub fn at(self, label: &str) -> Self {
        match self {
            LangError::AtField { path, source } => LangError::AtField {
                path: format!("{label}.{path}"),
                source,
            },
            other => LangError::AtField {
                path: label.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// True when the root cause is a non-concrete value rather than a conflict.
    pub fn is_incomplete(&self) -> bool {
        match self {
            LangError::Incomplete(_) => true,
            LangError::AtField { source, .. } => source.is_incomplete(),
            _ => false,
        }
    }

    /// The innermost error, with any field path stripped.
    pub fn root_cause(&self) -> &LangError {
        match self {
            LangError::AtField { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub(crate) fn conflict(left: impl ToString, right: impl ToString) -> Self {
        LangError::Conflict {
            left: left.to_string(),
            right: right.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_paths_are_joined() {
        let err = LangError::UndefinedField("replicas".into())
            .at("spec")
            .at("output");
        assert_eq!(err.to_string(), "output.spec: undefined field: replicas");
        assert!(matches!(err.root_cause(), LangError::UndefinedField(_)));
    }

    #[test]
    fn incomplete_survives_wrapping() {
        let err = LangError::Incomplete("string".into()).at("image");
        assert!(err.is_incomplete());
        assert!(!LangError::conflict(1, 2).is_incomplete());
    }
}
