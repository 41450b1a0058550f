//! # keel-lang
//!
//! A small constraint language for definition templates: structs that unify
//! field-wise, basic type constraints, disjunctions with defaults, lexical
//! references with late binding, string interpolation, conditional fields,
//! pattern constraints (`env: [string]: string`) and list comprehensions.
//! JSON documents are valid source.
//!
//! ## Usage
//!
//! ```rust
//! use keel_lang::Builder;
//!
//! let inst = Builder::new()
//!     .file("template", r#"
//!         output: {
//!             kind: "Deployment"
//!             metadata: name: "\(parameter.name)-web"
//!             spec: replicas: parameter.replicas
//!         }
//!         parameter: {name: string, replicas: *1 | int}
//!     "#)?
//!     .file("parameter", r#"parameter: {"name": "shop"}"#)?
//!     .build()?;
//!
//! let output = inst.lookup("output").expect("output field").to_json()?;
//! assert_eq!(output["metadata"]["name"], "shop-web");
//! assert_eq!(output["spec"]["replicas"], 1);
//! # Ok::<(), keel_lang::LangError>(())
//! ```

mod ast;
pub mod error;
mod eval;
mod lexer;
mod parser;
pub mod value;

use std::rc::Rc;

pub use error::LangError;
pub use value::{BasicKind, Disjunction, Field, FieldAttrs, Struct, Value};

/// A named piece of source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    pub text: String,
}

/// Collects source files into one package and evaluates them together.
///
/// Files are parsed as they are added, so syntax errors surface from
/// [`Builder::file`] with the offending file name.
#[derive(Debug, Default)]
pub struct Builder {
    sources: Vec<Source>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file. Declarations with the same label across files unify.
    pub fn file(mut self, name: impl Into<String>, text: impl Into<String>) -> Result<Self, LangError> {
        let source = Source {
            name: name.into(),
            text: text.into(),
        };
        parser::parse_file(&source.name, &source.text)?;
        self.sources.push(source);
        Ok(self)
    }

    /// Evaluate every field of the package. Conflicts and cycles anywhere
    /// fail the build; merely incomplete fields do not.
    pub fn build(self) -> Result<Instance, LangError> {
        Instance::evaluate(self.sources)
    }
}

/// The evaluated result of a package.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    sources: Vec<Source>,
    root: Value,
}

impl Instance {
    fn evaluate(sources: Vec<Source>) -> Result<Instance, LangError> {
        let mut files: Vec<Rc<[ast::Decl]>> = Vec::with_capacity(sources.len());
        for source in &sources {
            files.push(parser::parse_file(&source.name, &source.text)?.into());
        }
        tracing::trace!(files = files.len(), "evaluating package");
        let root = eval::eval_package(files)?;
        Ok(Instance { sources, root })
    }

    /// The root struct.
    pub fn value(&self) -> &Value {
        &self.root
    }

    /// Look up a dotted field path.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        self.root.lookup(path)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Re-evaluate the package with one more file appended.
    pub fn with_file(&self, name: impl Into<String>, text: impl Into<String>) -> Result<Instance, LangError> {
        let mut builder = Builder {
            sources: self.sources.clone(),
        };
        builder = builder.file(name, text)?;
        builder.build()
    }
}

/// Compile a single source text.
pub fn compile(name: &str, text: &str) -> Result<Instance, LangError> {
    Builder::new().file(name, text)?.build()
}
