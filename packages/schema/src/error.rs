//! Error types for schema parsing and resolution

use crate::lexer::TokenSpan;
use crate::value::ValueError;
use thiserror::Error;

/// Result type for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type for schema resolution
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Parse error with location and context
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("Unexpected token at {span:?}: expected {expected}, found {found}")]
    UnexpectedToken {
        span: TokenSpan,
        expected: String,
        found: String,
    },

    #[error("Unexpected end of input: expected {expected}")]
    UnexpectedEof { expected: String },

    #[error("Invalid syntax at {span:?}: {message}")]
    InvalidSyntax { span: TokenSpan, message: String },

    #[error("Lexer error at {span:?}: {message}")]
    LexError { span: TokenSpan, message: String },

    #[error("Invalid JSON schema document: {0}")]
    Json(String),
}

impl ParseError {
    pub fn unexpected_token(
        span: TokenSpan,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::UnexpectedToken {
            span,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn invalid_syntax(span: TokenSpan, message: impl Into<String>) -> Self {
        Self::InvalidSyntax {
            span,
            message: message.into(),
        }
    }

    pub fn span(&self) -> Option<TokenSpan> {
        match self {
            ParseError::UnexpectedToken { span, .. } => Some(*span),
            ParseError::InvalidSyntax { span, .. } => Some(*span),
            ParseError::LexError { span, .. } => Some(*span),
            ParseError::UnexpectedEof { .. } | ParseError::Json(_) => None,
        }
    }
}

/// A malformed or unresolvable schema. Fatal to the load that produced it.
///
/// `construct` fields name the offending schema construct, e.g.
/// `child "resource" of type "eventType"`.
#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    #[error("{file}: {error}")]
    Parse { file: String, error: ParseError },

    #[error("Namespace \"{uri}\" is declared more than once")]
    DuplicateNamespace { uri: String },

    #[error("Unknown namespace prefix '{prefix}' in {construct}")]
    UnknownPrefix { prefix: String, construct: String },

    #[error("Type \"{name}\" is declared more than once in namespace \"{namespace}\"")]
    DuplicateType { namespace: String, name: String },

    #[error("Unresolved type reference '{reference}' in {construct}")]
    UnresolvedType { reference: String, construct: String },

    #[error("Cyclic inheritance: {}", chain.join(" -> "))]
    CyclicInheritance { chain: Vec<String> },

    #[error("Member \"{member}\" is declared more than once in {construct}")]
    DuplicateMember { member: String, construct: String },

    #[error("Attribute \"{attribute}\" of type \"{type_name}\" overrides an inherited attribute of kind {base_kind} with kind {kind}")]
    IncompatibleOverride {
        type_name: String,
        attribute: String,
        base_kind: String,
        kind: String,
    },

    #[error("Child slot \"{child}\" of type \"{type_name}\" redeclares an inherited child slot")]
    ChildOverride { type_name: String, child: String },

    #[error("Root element \"{name}\" is declared more than once in namespace \"{namespace}\"")]
    DuplicateRoot { namespace: String, name: String },

    #[error("Root element \"{root}\" uses abstract type \"{type_name}\"")]
    AbstractRoot { root: String, type_name: String },

    #[error("Invalid default for {construct}: {error}")]
    InvalidDefault { construct: String, error: ValueError },

    #[error("Invalid occurrence bounds [{min}..{max}] for {construct}")]
    InvalidOccurs {
        construct: String,
        min: u32,
        max: String,
    },

    #[error("Type \"{type_name}\" has more than one id attribute (\"{first}\" and \"{second}\")")]
    MultipleIds {
        type_name: String,
        first: String,
        second: String,
    },

    #[error("Invalid constraint on {construct}: {message}")]
    InvalidConstraint { construct: String, message: String },
}

/// Pretty-print a parse error with source context using ariadne
#[cfg(feature = "pretty-errors")]
pub fn format_error(source: &str, filename: &str, error: &ParseError) -> String {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let span = error.span().unwrap_or(TokenSpan {
        start: source.len().saturating_sub(1),
        end: source.len(),
    });

    let label = match error {
        ParseError::UnexpectedToken { expected, .. } | ParseError::UnexpectedEof { expected } => {
            format!("expected {}", expected)
        }
        ParseError::InvalidSyntax { message, .. } | ParseError::LexError { message, .. } => {
            message.clone()
        }
        ParseError::Json(message) => message.clone(),
    };

    let mut output = Vec::new();
    let report = Report::build(ReportKind::Error, filename, span.start)
        .with_message(error.to_string())
        .with_label(
            Label::new((filename, span.start..span.end))
                .with_color(Color::Red)
                .with_message(label),
        )
        .finish();

    if report
        .write((filename, Source::from(source)), &mut output)
        .is_err()
    {
        return error.to_string();
    }

    String::from_utf8(output).unwrap_or_else(|_| error.to_string())
}

/// Plain rendering used when ariadne is disabled
#[cfg(not(feature = "pretty-errors"))]
pub fn format_error(_source: &str, filename: &str, error: &ParseError) -> String {
    format!("{}: {}", filename, error)
}
