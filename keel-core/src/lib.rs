//! keel core library: object model, execution context, cluster readers and
//! manifest loading.
//!
//! - [`types`]: resource identity, labels, [`Auxiliary`]
//! - [`model`]: [`Object`], evaluated values as resources
//! - [`process`]: [`ExecutionContext`] and [`ProcessContext`]
//! - [`cluster`]: [`ClusterReader`] and [`MemoryReader`]
//! - [`manifest`]: definition and component YAML files
//! - [`error`]: error enums

pub mod cluster;
pub mod error;
pub mod manifest;
pub mod model;
pub mod process;
pub mod types;

pub use cluster::{ClusterReader, MemoryReader, DEFAULT_NAMESPACE};
pub use error::{ClusterError, ManifestError, ModelError};
pub use manifest::{Bound, Bundle, Component, Definition, DefinitionKind, DefinitionRef};
pub use model::Object;
pub use process::{ExecutionContext, ProcessContext};
pub use types::{Auxiliary, GroupVersionKind, Labels, Unstructured, AUXILIARY_WORKLOAD};
