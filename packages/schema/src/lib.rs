//! # treeform schema
//!
//! Schema model for treeform documents: named node types with typed
//! attributes, ordered child slots, single inheritance, and root elements.
//!
//! Schemas are written in the `.tfs` description language (or the equivalent
//! JSON shape), parsed into [`SchemaDocument`]s, and resolved into a
//! [`SchemaSet`] with inheritance flattened.
//!
//! ```
//! use treeform_schema::{parse, resolve};
//!
//! let doc = parse(r#"
//!     namespace "urn:example" as ex;
//!     type itemType { attr label: string = "untitled"; child item: itemType*; }
//!     root item: itemType;
//! "#).unwrap();
//! let schemas = resolve(&[doc]).unwrap();
//! assert!(schemas.lookup("urn:example", "itemType").is_some());
//! ```

pub mod ast;
pub mod error;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod resolve;
pub mod value;

pub use ast::{Annotation, SchemaDocument, TypeRef};
pub use error::{format_error, ParseError, ParseResult, SchemaError, SchemaResult};
pub use model::{
    AttributeDef, ChildDef, NamespaceSchema, Occurs, QualifiedName, RootDef, SchemaSet, TypeDef,
};
pub use parser::parse;
pub use resolve::resolve;
pub use value::{NumericRange, PrimitiveKind, Value, ValueError, ValueKind};

/// Parse a schema source, choosing JSON when the text is a JSON object
pub fn parse_source(source: &str) -> ParseResult<SchemaDocument> {
    if source.trim_start().starts_with('{') {
        SchemaDocument::from_json(source)
    } else {
        parse(source)
    }
}

/// Parse and resolve several named sources. Parse errors are tagged with
/// the source name.
pub fn load_sources<N: AsRef<str>, S: AsRef<str>>(sources: &[(N, S)]) -> SchemaResult<SchemaSet> {
    let documents = sources
        .iter()
        .map(|(name, source)| {
            parse_source(source.as_ref()).map_err(|error| SchemaError::Parse {
                file: name.as_ref().to_string(),
                error,
            })
        })
        .collect::<SchemaResult<Vec<_>>>()?;
    resolve(&documents)
}
