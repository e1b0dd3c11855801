//! Attribute values, value kinds and their constraints

use crate::ast::Literal;
use crate::model::QualifiedName;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Item kind of a list-valued attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    String,
    Int,
    Float,
    Bool,
}

impl PrimitiveKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "bool" => Some(Self::Bool),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
        }
    }

    fn check(&self, value: &Value) -> Result<(), ValueError> {
        let ok = matches!(
            (self, value),
            (Self::String, Value::String(_))
                | (Self::Int, Value::Int(_))
                | (Self::Float, Value::Float(_))
                | (Self::Bool, Value::Bool(_))
        );
        if ok {
            Ok(())
        } else {
            Err(ValueError::KindMismatch {
                expected: self.name().to_string(),
                found: value.kind_name().to_string(),
            })
        }
    }

    fn parse_text(&self, text: &str) -> Result<Value, ValueError> {
        let parse_err = || ValueError::Unparseable {
            kind: self.name().to_string(),
            text: text.to_string(),
        };
        match self {
            Self::String => Ok(Value::String(text.to_string())),
            Self::Int => text.parse().map(Value::Int).map_err(|_| parse_err()),
            Self::Float => text
                .parse::<f64>()
                .map(Value::float)
                .map_err(|_| parse_err()),
            Self::Bool => match text {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(parse_err()),
            },
        }
    }
}

/// A runtime attribute value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Value {
    /// An unset reference
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    String(String),
    /// Identifier of the referenced node
    Reference(String),
    List(Vec<Value>),
}

impl Value {
    pub fn float(value: f64) -> Self {
        Value::Float(OrderedFloat(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    pub fn reference(id: impl Into<String>) -> Self {
        Value::Reference(id.into())
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Reference(_) => "reference",
            Value::List(_) => "list",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Reference(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(f.0),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Textual form used by the document codec. Floats use the shortest
    /// representation that parses back to the same value.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.0.to_string(),
            Value::String(s) | Value::Reference(s) => s.clone(),
            Value::List(items) => items
                .iter()
                .map(Value::to_text)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Null => write!(f, "null"),
            other => write!(f, "{}", other.to_text()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

/// Inclusive numeric bounds; `None` is an open bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: Option<OrderedFloat<f64>>,
    pub max: Option<OrderedFloat<f64>>,
}

impl NumericRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            min: min.map(OrderedFloat),
            max: max.map(OrderedFloat),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min.0) && self.max.map_or(true, |max| value <= max.0)
    }

    /// Integer check without rounding `value` to `f64`
    pub fn contains_int(&self, value: i64) -> bool {
        let above = self.min.map_or(true, |min| match exact_int(min.0.ceil()) {
            Some(min) => value >= min,
            None => value as f64 >= min.0,
        });
        let below = self.max.map_or(true, |max| match exact_int(max.0.floor()) {
            Some(max) => value <= max,
            None => value as f64 <= max.0,
        });
        above && below
    }
}

fn exact_int(bound: f64) -> Option<i64> {
    (bound.is_finite() && bound >= i64::MIN as f64 && bound < i64::MAX as f64)
        .then_some(bound as i64)
}

impl fmt::Display for NumericRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |b: Option<OrderedFloat<f64>>| b.map_or("_".to_string(), |v| v.0.to_string());
        write!(f, "range({}, {})", bound(self.min), bound(self.max))
    }
}

/// The declared kind of an attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Int,
    Float,
    Bool,
    Enum { values: Vec<String> },
    /// Reference to another node by id, optionally restricted to a target type
    Reference { target: Option<QualifiedName> },
    List { item: PrimitiveKind },
}

impl ValueKind {
    pub fn name(&self) -> String {
        match self {
            ValueKind::String => "string".to_string(),
            ValueKind::Int => "int".to_string(),
            ValueKind::Float => "float".to_string(),
            ValueKind::Bool => "bool".to_string(),
            ValueKind::Enum { values } => format!("enum({})", values.join(", ")),
            ValueKind::Reference { target: Some(t) } => format!("ref({})", t),
            ValueKind::Reference { target: None } => "ref".to_string(),
            ValueKind::List { item } => format!("list<{}>", item.name()),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueKind::Int | ValueKind::Float)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, ValueKind::Reference { .. })
    }

    /// Implicit default when a schema declares none
    pub fn default_value(&self) -> Value {
        match self {
            ValueKind::String => Value::String(String::new()),
            ValueKind::Int => Value::Int(0),
            ValueKind::Float => Value::float(0.0),
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Enum { values } => {
                Value::String(values.first().cloned().unwrap_or_default())
            }
            ValueKind::Reference { .. } => Value::Null,
            ValueKind::List { .. } => Value::List(Vec::new()),
        }
    }

    /// Check a value against this kind and an optional numeric range
    pub fn check(&self, value: &Value, range: Option<&NumericRange>) -> Result<(), ValueError> {
        let mismatch = || ValueError::KindMismatch {
            expected: self.name(),
            found: value.kind_name().to_string(),
        };

        match (self, value) {
            (ValueKind::String, Value::String(_)) | (ValueKind::Bool, Value::Bool(_)) => {}
            (ValueKind::Int, Value::Int(_)) | (ValueKind::Float, Value::Float(_)) => {}
            (ValueKind::Enum { values }, Value::String(s)) => {
                if !values.iter().any(|v| v == s) {
                    return Err(ValueError::NotInEnum {
                        value: s.clone(),
                        allowed: values.clone(),
                    });
                }
            }
            (ValueKind::Reference { .. }, Value::Null) => {}
            (ValueKind::Reference { .. }, Value::Reference(id)) => {
                if id.is_empty() {
                    return Err(ValueError::EmptyReference);
                }
            }
            (ValueKind::List { item }, Value::List(items)) => {
                for entry in items {
                    item.check(entry)?;
                    if let Value::String(s) = entry {
                        if s.is_empty() || s.chars().any(char::is_whitespace) {
                            return Err(ValueError::ListItemWhitespace { item: s.clone() });
                        }
                    }
                }
            }
            _ => return Err(mismatch()),
        }

        if let Some(range) = range {
            let inside = match value {
                Value::Int(number) => range.contains_int(*number),
                other => other.as_float().map_or(true, |number| range.contains(number)),
            };
            if !inside {
                return Err(ValueError::OutOfRange {
                    value: value.to_text(),
                    range: *range,
                });
            }
        }

        Ok(())
    }

    /// Parse the codec's textual form of a value of this kind
    pub fn parse_text(&self, text: &str) -> Result<Value, ValueError> {
        match self {
            ValueKind::String => PrimitiveKind::String.parse_text(text),
            ValueKind::Int => PrimitiveKind::Int.parse_text(text.trim()),
            ValueKind::Float => PrimitiveKind::Float.parse_text(text.trim()),
            ValueKind::Bool => PrimitiveKind::Bool.parse_text(text.trim()),
            ValueKind::Enum { .. } => Ok(Value::String(text.to_string())),
            ValueKind::Reference { .. } => {
                if text.is_empty() {
                    Ok(Value::Null)
                } else {
                    Ok(Value::Reference(text.to_string()))
                }
            }
            ValueKind::List { item } => text
                .split_whitespace()
                .map(|part| item.parse_text(part))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
        }
    }

    /// Convert a schema literal into a value of this kind
    pub fn value_from_literal(&self, literal: &Literal) -> Result<Value, ValueError> {
        let mismatch = || ValueError::KindMismatch {
            expected: self.name(),
            found: literal.kind_name().to_string(),
        };

        match (self, literal) {
            (ValueKind::String | ValueKind::Enum { .. }, Literal::String(s)) => {
                Ok(Value::String(s.clone()))
            }
            (ValueKind::Int, Literal::Int(i)) => Ok(Value::Int(*i)),
            (ValueKind::Float, Literal::Int(i)) => Ok(Value::float(*i as f64)),
            (ValueKind::Float, Literal::Float(f)) => Ok(Value::float(*f)),
            (ValueKind::Bool, Literal::Bool(b)) => Ok(Value::Bool(*b)),
            (ValueKind::Reference { .. }, Literal::String(s)) => Ok(Value::Reference(s.clone())),
            (ValueKind::List { item }, Literal::List(items)) => items
                .iter()
                .map(|entry| primitive_from_literal(*item, entry))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            _ => Err(mismatch()),
        }
    }
}

fn primitive_from_literal(kind: PrimitiveKind, literal: &Literal) -> Result<Value, ValueError> {
    match (kind, literal) {
        (PrimitiveKind::String, Literal::String(s)) => Ok(Value::String(s.clone())),
        (PrimitiveKind::Int, Literal::Int(i)) => Ok(Value::Int(*i)),
        (PrimitiveKind::Float, Literal::Int(i)) => Ok(Value::float(*i as f64)),
        (PrimitiveKind::Float, Literal::Float(f)) => Ok(Value::float(*f)),
        (PrimitiveKind::Bool, Literal::Bool(b)) => Ok(Value::Bool(*b)),
        _ => Err(ValueError::KindMismatch {
            expected: kind.name().to_string(),
            found: literal.kind_name().to_string(),
        }),
    }
}

/// A value that violates its attribute's declared kind or constraint
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("expected a {expected} value, found {found}")]
    KindMismatch { expected: String, found: String },

    #[error("\"{value}\" is not one of {allowed:?}")]
    NotInEnum { value: String, allowed: Vec<String> },

    #[error("{value} is outside {range}")]
    OutOfRange { value: String, range: NumericRange },

    #[error("list item \"{item}\" must be non-empty and contain no whitespace")]
    ListItemWhitespace { item: String },

    #[error("reference ids must not be empty")]
    EmptyReference,

    #[error("cannot parse \"{text}\" as {kind}")]
    Unparseable { kind: String, text: String },
}
