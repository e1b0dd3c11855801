use thiserror::Error;
use treeform_dom::DomError;
use treeform_schema::ValueError;

pub type SerializationResult<T> = Result<T, SerializationError>;

/// A document that cannot be written or read back
///
/// `path` fields name the offending element as a slash-separated list of
/// element names from the document root.
#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("Malformed XML at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("Unexpected end of document inside {path}")]
    UnexpectedEof { path: String },

    #[error("Document has no root element")]
    EmptyDocument,

    #[error("Unknown root element \"{name}\"{}", namespace.as_ref().map(|ns| format!(" in namespace \"{}\"", ns)).unwrap_or_default())]
    UnknownRoot {
        namespace: Option<String>,
        name: String,
    },

    #[error("Only document roots can be saved; node of type {type_name} has no root element")]
    NotARoot { type_name: String },

    #[error("{path}: unknown type \"{type_name}\"")]
    UnknownType { path: String, type_name: String },

    #[error("{path}: type {type_name} is not allowed in slot \"{slot}\"")]
    TypeNotAllowed {
        path: String,
        type_name: String,
        slot: String,
    },

    #[error("{path}: abstract type {type_name} needs an xsi:type naming a concrete type")]
    AbstractType { path: String, type_name: String },

    #[error("{path}: cannot read attribute \"{attribute}\": {source}")]
    InvalidValue {
        path: String,
        attribute: String,
        #[source]
        source: ValueError,
    },

    #[error("{path}: {source}")]
    Rejected {
        path: String,
        #[source]
        source: DomError,
    },

    #[error("{path}: missing required attribute \"{attribute}\"")]
    MissingAttribute { path: String, attribute: String },

    #[error("{path}: slot \"{slot}\" needs at least {min} children, found {found}")]
    MissingChildren {
        path: String,
        slot: String,
        min: u32,
        found: usize,
    },

    #[error("{path}: slot \"{slot}\" allows at most {max} children")]
    TooManyChildren { path: String, slot: String, max: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SerializationError {
    pub(crate) fn xml(position: u64, error: impl std::fmt::Display) -> Self {
        SerializationError::Xml {
            position,
            message: error.to_string(),
        }
    }
}
