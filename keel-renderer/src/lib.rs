//! # keel-renderer
//!
//! Renders workload and trait definitions into Kubernetes objects and
//! evaluates their health and status templates against the live objects.
//!
//! ## Usage
//!
//! ```rust
//! use keel_core::{MemoryReader, ProcessContext, Unstructured};
//! use keel_renderer::{AbstractEngine, RenderRequest, WorkloadRenderer};
//! use serde_json::json;
//!
//! let template = r#"
//! output: {
//!     apiVersion: "v1"
//!     kind:       "Pod"
//!     metadata: name: context.name
//!     spec: containers: [{name: "main", image: parameter.image}]
//! }
//! parameter: image: string
//! "#;
//!
//! let engine = WorkloadRenderer::new("pod");
//! let mut ctx = ProcessContext::new("x", "demo");
//! let request = RenderRequest::new(template).with_params(json!({"image": "busybox"}));
//! engine.complete(&mut ctx, &request).unwrap();
//!
//! let live = Unstructured::from_json(json!({
//!     "apiVersion": "v1",
//!     "kind": "Pod",
//!     "metadata": {"name": "x", "namespace": "default"},
//!     "status": {"phase": "Running"}
//! }))
//! .unwrap();
//! let reader = MemoryReader::new(vec![live]);
//!
//! let policy = r#"isHealth: context.output.status.phase == "Running""#;
//! assert!(engine.health_check(&ctx, &reader, "default", policy).unwrap());
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod outputs;
pub mod preprocess;
pub mod request;
pub mod resolver;
pub mod traits;
pub mod workload;

pub use context::{common_labels, trait_context, workload_context, TemplateContext};
pub use engine::AbstractEngine;
pub use error::{PreProcessError, RenderError, ResolveError, Stage};
pub use evaluator::{check_health, evaluate, status_message, FieldKind};
pub use preprocess::{HttpProcessor, NoopProcessor, PreProcessor};
pub use request::RenderRequest;
pub use resolver::resolve;
pub use traits::TraitRenderer;
pub use workload::WorkloadRenderer;
