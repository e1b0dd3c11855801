//! # treeform dom
//!
//! Runtime half of treeform: a [`TypeRegistry`] binds resolved schemas into
//! node types and handles, and [`Node`] stores attribute values and child
//! lists against those handles.
//!
//! ```
//! use treeform_dom::{Node, TypeRegistry};
//!
//! let types = TypeRegistry::from_sources(&[("notes.tfs", r#"
//!     namespace "urn:notes" as n;
//!     type noteType { attr text: string = ""; child reply: noteType*; }
//!     root note: noteType;
//! "#)]).unwrap();
//!
//! let note_type = types.resolve("urn:notes", "noteType").unwrap();
//! let text = note_type.attribute("text").unwrap().clone();
//! let reply = note_type.child("reply").unwrap().clone();
//!
//! let root = Node::new_root(&types.resolve_root("urn:notes", "note").unwrap()).unwrap();
//! let answer = Node::new(&note_type).unwrap();
//! answer.set_attribute(&text, "agreed").unwrap();
//! root.append_child(&reply, &answer).unwrap();
//!
//! assert_eq!(root.children(&reply).unwrap().len(), 1);
//! ```
//!
//! Trees follow a single-writer model: a tree and its observers belong to
//! one thread. Registries and handles are immutable and may be shared
//! across threads freely.

pub mod adapters;
pub mod error;
pub mod events;
pub mod node;
pub mod registry;
pub mod validators;

pub use adapters::{AdapterPolicy, AdapterRegistry};
pub use error::{
    BindingError, DomError, DomResult, StructuralError, TypeMismatchError, ValidationError,
};
pub use events::{ChangeEvent, ChangeRecorder, ChildLocation, Observer, SubscriptionId};
pub use node::{ChildIter, ChildList, Lineage, Node, WeakNode};
pub use registry::{
    AttributeHandle, ChildHandle, NodeType, RegistryBuilder, RegistryId, TypeRegistry,
};
pub use validators::{
    IntegrityKind, IntegrityWarning, ReferenceValidator, UniquenessValidator, WarningLevel,
};

pub use treeform_schema::{QualifiedName, Value, ValueKind};
