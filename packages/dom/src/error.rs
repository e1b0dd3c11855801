//! Error types for the document object model

use thiserror::Error;
use treeform_schema::ValueError;

/// Result type for node operations
pub type DomResult<T> = Result<T, DomError>;

/// Handle declarations out of sync with the bound schema
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindingError {
    #[error("Namespace \"{namespace}\" is not loaded")]
    UnknownNamespace { namespace: String },

    #[error("Type \"{name}\" not found in namespace \"{namespace}\"")]
    UnknownType { namespace: String, name: String },

    #[error("Attribute \"{attribute}\" not found on type {type_name}")]
    UnknownAttribute {
        type_name: String,
        attribute: String,
    },

    #[error("Child slot \"{child}\" not found on type {type_name}")]
    UnknownChild { type_name: String, child: String },

    #[error("Root element \"{name}\" not found in namespace \"{namespace}\"")]
    UnknownRoot { namespace: String, name: String },

    #[error("Attribute \"{attribute}\" of type {type_name} is declared as {expected} but the schema says {found}")]
    AttributeKindSkew {
        type_name: String,
        attribute: String,
        expected: String,
        found: String,
    },

    #[error("Root element \"{name}\" is declared with type {expected} but the schema says {found}")]
    RootTypeSkew {
        name: String,
        expected: String,
        found: String,
    },
}

/// A handle used against a node it does not belong to
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TypeMismatchError {
    #[error("{handle} belongs to a different type registry than node type {node_type}")]
    ForeignRegistry { handle: String, node_type: String },

    #[error("{handle} is not declared on node type {node_type} or its bases")]
    UnrelatedType { handle: String, node_type: String },

    #[error("Root element handle {handle} cannot be used as a child slot")]
    RootHandle { handle: String },
}

/// An attribute value rejected by its declared kind or constraint
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid value for attribute \"{attribute}\" of {type_name}: {source}")]
pub struct ValidationError {
    pub attribute: String,
    pub type_name: String,
    #[source]
    pub source: ValueError,
}

/// A child-list mutation that would break slot cardinality, allowed types,
/// or the tree shape
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuralError {
    #[error("Type {child_type} is not allowed in slot \"{slot}\" (allowed: {})", allowed.join(", "))]
    TypeNotAllowed {
        slot: String,
        child_type: String,
        allowed: Vec<String>,
    },

    #[error("Node already has a parent; remove or move it instead")]
    AlreadyParented,

    #[error("Node has no parent")]
    NotParented,

    #[error("Inserting a node beneath itself would create a cycle")]
    Cycle,

    #[error("Index {index} out of bounds for slot \"{slot}\" of length {len}")]
    IndexOutOfBounds {
        slot: String,
        index: usize,
        len: usize,
    },

    #[error("Slot \"{slot}\" allows at most {max} children")]
    MaxOccursExceeded { slot: String, max: u32 },

    #[error("Slot \"{slot}\" requires at least {min} children")]
    MinOccursViolated { slot: String, min: u32 },

    #[error("Cannot instantiate abstract type {type_name}")]
    AbstractType { type_name: String },

    #[error("Slot \"{slot}\" holds more than one child")]
    NotSingleSlot { slot: String },

    #[error("{handle} is not a root element handle")]
    NotARootElement { handle: String },
}

/// Any error raised by a node operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomError {
    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatchError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Structural(#[from] StructuralError),
}
