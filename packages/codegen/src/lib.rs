//! # treeform codegen
//!
//! The schema compiler: turns a resolved [`SchemaSet`](treeform_schema::SchemaSet)
//! into handle declarations and renders them as Rust source or a JSON
//! manifest.
//!
//! ## Features
//!
//! - **Deterministic output**: declaration order everywhere, byte-identical
//!   across runs so generated files can be checked in and diffed
//! - **Annotated-only mode**: emit just the types marked `@include`
//! - **Plugin-based generators**: [`RustGenerator`], [`ManifestGenerator`]
//! - **Skew detection**: [`HandleDeclarations::bind`] checks declarations
//!   against a live [`TypeRegistry`](treeform_dom::TypeRegistry)
//!
//! ## Example
//!
//! ```rust
//! use treeform_codegen::{compile, CodeGenerator, CompileOptions, RustGenerator};
//! use treeform_schema::load_sources;
//!
//! let schemas = load_sources(&[("notes.tfs", r#"
//!     namespace "urn:notes" as notes;
//!     type noteType { attr text: string; }
//! "#)]).unwrap();
//!
//! let decls = compile(&schemas, &CompileOptions::default());
//! let source = RustGenerator::new().generate(&decls).unwrap();
//! assert!(source.contains("pub struct NoteType"));
//! ```

pub mod bind;
pub mod context;
pub mod decls;
pub mod error;
pub mod generator;
pub mod naming;
pub mod options;

pub use bind::{BoundHandles, BoundType};
pub use context::CodeWriter;
pub use decls::{compile, HandleDeclarations, MemberDecl, MemberKind, NamespaceDecl, RootDecl, TypeDecl};
pub use error::{CodegenError, CodegenResult};
pub use generator::{manifest::ManifestGenerator, rust::RustGenerator, CodeGenerator};
pub use options::CompileOptions;
