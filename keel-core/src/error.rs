//! Error types for keel-core.

use std::path::PathBuf;

use keel_lang::LangError;
use thiserror::Error;

/// Errors converting between evaluated values and the object model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// Only struct values can become objects.
    #[error("value is not an object (found {found})")]
    NotAStruct { found: &'static str },

    /// The value still holds non-concrete fields.
    #[error("cannot export object: {0}")]
    Export(#[source] LangError),

    /// A patch could not be unified into the object.
    #[error("cannot unify patch: {0}")]
    Conflict(#[source] LangError),

    /// A JSON document used as an object is not a JSON object.
    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
}

/// Errors returned by a [`ClusterReader`](crate::cluster::ClusterReader).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusterError {
    /// No object of that kind and name exists in the namespace.
    #[error("{gvk} {namespace}/{name} not found")]
    NotFound {
        gvk: String,
        namespace: String,
        name: String,
    },

    /// The reader could not reach its backing store.
    #[error("cluster read failed: {0}")]
    Transport(String),

    /// The backing store answered with something that is not an object.
    #[error("cannot decode cluster object: {0}")]
    Decode(String),
}

/// Errors loading definition, component and snapshot files.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Filesystem failure reading a manifest.
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error, with the file path and serde_yaml's line context.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A component referenced a definition of the wrong kind.
    #[error("{path}: expected a {expected} definition, found {found}")]
    KindMismatch {
        path: PathBuf,
        expected: &'static str,
        found: &'static str,
    },

    /// A snapshot document is not a usable object.
    #[error("invalid object in {path}: {source}")]
    Object {
        path: PathBuf,
        #[source]
        source: ModelError,
    },
}
