//! # treeform codec
//!
//! Reads and writes treeform trees as schema-conformant XML, resolving
//! element and attribute names through a [`TypeRegistry`].
//!
//! ## Features
//!
//! - **Round-trips**: loading a saved tree yields the same types, attribute
//!   values and child order
//! - **Derived types**: `xsi:type` marks children whose type is not the
//!   slot's declared type
//! - **Lenient on unknown content**: skipped elements and attributes are
//!   reported in a [`LoadReport`] instead of failing the load
//!
//! ## Example
//!
//! ```rust
//! use treeform_codec::DocumentCodec;
//! use treeform_dom::{Node, TypeRegistry, Value};
//!
//! let types = TypeRegistry::from_sources(&[("notes.tfs", r#"
//!     namespace "urn:notes" as n;
//!     type noteType { attr text: string = ""; child reply: noteType*; }
//!     root note: noteType;
//! "#)]).unwrap();
//!
//! let root = Node::new_root(&types.resolve_root("urn:notes", "note").unwrap()).unwrap();
//! let text = types.resolve("urn:notes", "noteType").unwrap().attribute("text").unwrap().clone();
//! root.set_attribute(&text, "hello").unwrap();
//!
//! let codec = DocumentCodec::new(types);
//! let xml = codec.save_to_string(&root).unwrap();
//! let loaded = codec.load_str(&xml).unwrap();
//! assert_eq!(loaded.get_attribute(&text).unwrap(), Value::from("hello"));
//! ```

pub mod error;
pub mod options;
pub mod reader;
pub mod writer;

pub use error::{SerializationError, SerializationResult};
pub use options::WriteOptions;
pub use reader::{LoadReport, LoadWarning};

use reader::DocumentReader;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use treeform_dom::{Node, TypeRegistry};
use writer::DocumentWriter;

/// Namespace of the `xsi:type` attribute
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Saves and loads documents for one type registry
#[derive(Debug, Clone)]
pub struct DocumentCodec {
    registry: TypeRegistry,
    options: WriteOptions,
}

impl DocumentCodec {
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            registry,
            options: WriteOptions::default(),
        }
    }

    pub fn with_options(mut self, options: WriteOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    /// Write a document root and its subtree
    pub fn save<W: Write>(&self, root: &Node, out: W) -> SerializationResult<()> {
        let mut out = DocumentWriter::new(&self.registry, &self.options, out).write_document(root)?;
        out.flush()?;
        Ok(())
    }

    pub fn save_to_string(&self, root: &Node) -> SerializationResult<String> {
        let bytes = DocumentWriter::new(&self.registry, &self.options, Vec::new())
            .write_document(root)?;
        String::from_utf8(bytes).map_err(|e| SerializationError::xml(0, e))
    }

    pub fn save_to_path(&self, root: &Node, path: impl AsRef<Path>) -> SerializationResult<()> {
        fs::write(path, self.save_to_string(root)?)?;
        Ok(())
    }

    pub fn load<R: Read>(&self, mut input: R) -> SerializationResult<Node> {
        let mut text = String::new();
        input.read_to_string(&mut text)?;
        self.load_str(&text)
    }

    pub fn load_str(&self, text: &str) -> SerializationResult<Node> {
        self.load_with_report(text).map(|(root, _)| root)
    }

    /// Load a document and return the content that was skipped
    pub fn load_with_report(&self, text: &str) -> SerializationResult<(Node, LoadReport)> {
        DocumentReader::new(&self.registry, text).read_document()
    }

    pub fn load_path(&self, path: impl AsRef<Path>) -> SerializationResult<(Node, LoadReport)> {
        let text = fs::read_to_string(path)?;
        self.load_with_report(&text)
    }
}
