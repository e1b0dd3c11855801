//! Parsed schema descriptions
//!
//! A [`SchemaDocument`] is the interchange form the rest of the workspace
//! consumes. It is produced by the `.tfs` parser or deserialized from JSON
//! with the same shape; spans are optional in JSON.

use crate::model::Occurs;
use crate::value::PrimitiveKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Byte range in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// One schema file: a single target namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDocument {
    pub namespace: String,
    pub prefix: String,
    #[serde(default)]
    pub imports: Vec<Import>,
    #[serde(default)]
    pub types: Vec<TypeDecl>,
    #[serde(default)]
    pub roots: Vec<RootDecl>,
}

impl SchemaDocument {
    pub fn new(namespace: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            prefix: prefix.into(),
            imports: Vec::new(),
            types: Vec::new(),
            roots: Vec::new(),
        }
    }

    pub fn from_json(source: &str) -> crate::ParseResult<Self> {
        serde_json::from_str(source).map_err(|e| crate::ParseError::Json(e.to_string()))
    }

    pub fn to_json(&self) -> String {
        // Plain data with string keys always serializes
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    pub namespace: String,
    pub prefix: String,
    #[serde(default)]
    pub span: Span,
}

/// Inclusion marker consumed by the schema compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Annotation {
    Include,
    Exclude,
}

impl Annotation {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "include" => Some(Self::Include),
            "exclude" => Some(Self::Exclude),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDecl {
    pub name: String,
    #[serde(default)]
    pub base: Option<TypeRef>,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub annotation: Option<Annotation>,
    #[serde(default)]
    pub attributes: Vec<AttributeDecl>,
    #[serde(default)]
    pub children: Vec<ChildDecl>,
    #[serde(default)]
    pub span: Span,
}

impl TypeDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
            is_abstract: false,
            annotation: None,
            attributes: Vec::new(),
            children: Vec::new(),
            span: Span::default(),
        }
    }
}

/// `name` or `prefix:name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TypeRef {
    pub prefix: Option<String>,
    pub name: String,
}

impl TypeRef {
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            prefix: None,
            name: name.into(),
        }
    }

    pub fn prefixed(prefix: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{}:{}", prefix, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl FromStr for TypeRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = |part: &str| !part.is_empty() && !part.contains(char::is_whitespace);
        match s.split_once(':') {
            Some((prefix, name)) if valid(prefix) && valid(name) => {
                Ok(TypeRef::prefixed(prefix, name))
            }
            None if valid(s) => Ok(TypeRef::local(s)),
            _ => Err(format!("invalid type reference '{}'", s)),
        }
    }
}

impl TryFrom<String> for TypeRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AttributeKindDecl {
    String,
    Int,
    Float,
    Bool,
    Enum { values: Vec<String> },
    Ref { target: Option<TypeRef> },
    List { item: PrimitiveKind },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Literal>),
}

impl Literal {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Literal::Bool(_) => "bool",
            Literal::Int(_) => "int",
            Literal::Float(_) => "float",
            Literal::String(_) => "string",
            Literal::List(_) => "list",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Literal::Int(i) => Some(*i as f64),
            Literal::Float(f) => Some(*f),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeDecl {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDecl {
    pub name: String,
    pub kind: AttributeKindDecl,
    #[serde(default)]
    pub default: Option<Literal>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub id: bool,
    #[serde(default)]
    pub range: Option<RangeDecl>,
    #[serde(default)]
    pub annotation: Option<Annotation>,
    #[serde(default)]
    pub span: Span,
}

impl AttributeDecl {
    pub fn new(name: impl Into<String>, kind: AttributeKindDecl) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            required: false,
            id: false,
            range: None,
            annotation: None,
            span: Span::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildDecl {
    pub name: String,
    pub types: Vec<TypeRef>,
    #[serde(default)]
    pub occurs: Occurs,
    #[serde(default)]
    pub annotation: Option<Annotation>,
    #[serde(default)]
    pub span: Span,
}

impl ChildDecl {
    pub fn new(name: impl Into<String>, types: Vec<TypeRef>, occurs: Occurs) -> Self {
        Self {
            name: name.into(),
            types,
            occurs,
            annotation: None,
            span: Span::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(default)]
    pub span: Span,
}
