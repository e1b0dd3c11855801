//! Lexer for `.tfs` schema descriptions using logos

use logos::Logos;

/// Token types for the schema description language
#[derive(Logos, Debug, Clone, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*[^*]*\*+(?:[^/*][^*]*\*+)*/")]
pub enum Token<'src> {
    // Keywords
    #[token("namespace")]
    Namespace,
    #[token("import")]
    Import,
    #[token("as")]
    As,
    #[token("type")]
    Type,
    #[token("abstract")]
    Abstract,
    #[token("extends")]
    Extends,
    #[token("attr")]
    Attr,
    #[token("child")]
    Child,
    #[token("root")]
    Root,
    #[token("required")]
    Required,
    #[token("id")]
    Id,
    #[token("range")]
    Range,
    #[token("enum")]
    Enum,
    #[token("ref")]
    Ref,
    #[token("list")]
    List,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // Identifiers
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_\-]*", |lex| lex.slice())]
    Ident(&'src str),

    // Literals
    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        &s[1..s.len()-1]
    })]
    String(&'src str),

    #[regex(r"-?[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice())]
    Number(&'src str),

    // Punctuation
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,
    #[token("=")]
    Eq,
    #[token("|")]
    Pipe,
    #[token("?")]
    Question,
    #[token("*")]
    Star,
    #[token("+")]
    Plus,
    #[token("@")]
    At,
    #[token("..")]
    DotDot,
}

impl<'src> Token<'src> {
    /// Source text of keyword tokens. Keywords double as member names
    /// (`attr type: string;` is legal), so the parser needs their spelling.
    pub fn keyword_text(&self) -> Option<&'static str> {
        let text = match self {
            Token::Namespace => "namespace",
            Token::Import => "import",
            Token::As => "as",
            Token::Type => "type",
            Token::Abstract => "abstract",
            Token::Extends => "extends",
            Token::Attr => "attr",
            Token::Child => "child",
            Token::Root => "root",
            Token::Required => "required",
            Token::Id => "id",
            Token::Range => "range",
            Token::Enum => "enum",
            Token::Ref => "ref",
            Token::List => "list",
            Token::True => "true",
            Token::False => "false",
            _ => return None,
        };
        Some(text)
    }
}

/// Span information for a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenSpan {
    pub start: usize,
    pub end: usize,
}

impl From<std::ops::Range<usize>> for TokenSpan {
    fn from(range: std::ops::Range<usize>) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }
}

/// A token with its span
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken<'src> {
    pub token: Token<'src>,
    pub span: TokenSpan,
}

/// Lex source code into tokens with spans
pub fn lex(source: &str) -> impl Iterator<Item = Result<SpannedToken<'_>, LexError>> + '_ {
    Token::lexer(source)
        .spanned()
        .map(|(result, span)| match result {
            Ok(token) => Ok(SpannedToken {
                token,
                span: span.into(),
            }),
            Err(_) => Err(LexError {
                span: span.into(),
                message: "Unexpected character".to_string(),
            }),
        })
}

#[derive(Debug, Clone)]
pub struct LexError {
    pub span: TokenSpan,
    pub message: String,
}
