//! Recursive-descent parser for `.tfs` schema descriptions

use crate::ast::*;
use crate::error::{ParseError, ParseResult};
use crate::lexer::{lex, SpannedToken, Token, TokenSpan};
use crate::model::Occurs;
use crate::value::PrimitiveKind;

/// Parse a schema description into a [`SchemaDocument`]
pub fn parse(source: &str) -> ParseResult<SchemaDocument> {
    let tokens = lex(source)
        .map(|result| {
            result.map_err(|e| ParseError::LexError {
                span: e.span,
                message: e.message,
            })
        })
        .collect::<ParseResult<Vec<_>>>()?;

    Parser::new(tokens).parse_document()
}

struct Parser<'src> {
    tokens: Vec<SpannedToken<'src>>,
    pos: usize,
}

impl<'src> Parser<'src> {
    fn new(tokens: Vec<SpannedToken<'src>>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn parse_document(&mut self) -> ParseResult<SchemaDocument> {
        self.expect(Token::Namespace)?;
        let namespace = self.expect_string()?;
        self.expect(Token::As)?;
        let prefix = self.expect_ident()?;
        self.expect(Token::Semi)?;

        let mut doc = SchemaDocument::new(namespace, prefix);

        while !self.is_at_end() {
            let annotation = self.parse_annotation()?;
            match self.peek() {
                Some(Token::Import) if annotation.is_none() => {
                    doc.imports.push(self.parse_import()?);
                }
                Some(Token::Type) | Some(Token::Abstract) => {
                    doc.types.push(self.parse_type(annotation)?);
                }
                Some(Token::Root) if annotation.is_none() => {
                    doc.roots.push(self.parse_root()?);
                }
                _ => {
                    return Err(ParseError::unexpected_token(
                        self.peek_span(),
                        "'import', 'type', 'abstract' or 'root'",
                        self.format_token(),
                    ));
                }
            }
        }

        Ok(doc)
    }

    fn parse_annotation(&mut self) -> ParseResult<Option<Annotation>> {
        if !self.check(&Token::At) {
            return Ok(None);
        }
        self.advance();
        let span = self.peek_span();
        let name = self.expect_ident()?;
        Annotation::from_name(&name).map(Some).ok_or_else(|| {
            ParseError::invalid_syntax(
                span,
                format!("Unknown annotation '@{}', expected @include or @exclude", name),
            )
        })
    }

    fn parse_import(&mut self) -> ParseResult<Import> {
        let start = self.current_pos();
        self.expect(Token::Import)?;
        let namespace = self.expect_string()?;
        self.expect(Token::As)?;
        let prefix = self.expect_ident()?;
        self.expect(Token::Semi)?;

        Ok(Import {
            namespace,
            prefix,
            span: Span::new(start, self.previous_end()),
        })
    }

    fn parse_type(&mut self, annotation: Option<Annotation>) -> ParseResult<TypeDecl> {
        let start = self.current_pos();
        let is_abstract = self.match_token(&Token::Abstract);
        self.expect(Token::Type)?;

        let mut decl = TypeDecl::new(self.expect_name()?);
        decl.is_abstract = is_abstract;
        decl.annotation = annotation;

        if self.match_token(&Token::Extends) {
            decl.base = Some(self.parse_type_ref()?);
        }

        self.expect(Token::LBrace)?;
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            let annotation = self.parse_annotation()?;
            match self.peek() {
                Some(Token::Attr) => decl.attributes.push(self.parse_attribute(annotation)?),
                Some(Token::Child) => decl.children.push(self.parse_child(annotation)?),
                _ => {
                    return Err(ParseError::unexpected_token(
                        self.peek_span(),
                        "'attr', 'child' or '}'",
                        self.format_token(),
                    ));
                }
            }
        }
        self.expect(Token::RBrace)?;

        decl.span = Span::new(start, self.previous_end());
        Ok(decl)
    }

    fn parse_attribute(&mut self, annotation: Option<Annotation>) -> ParseResult<AttributeDecl> {
        let start = self.current_pos();
        self.expect(Token::Attr)?;
        let name = self.expect_name()?;
        self.expect(Token::Colon)?;
        let kind = self.parse_attribute_kind()?;

        let mut decl = AttributeDecl::new(name, kind);
        decl.annotation = annotation;

        loop {
            match self.peek() {
                Some(Token::Eq) => {
                    self.advance();
                    decl.default = Some(self.parse_literal()?);
                }
                Some(Token::Required) => {
                    self.advance();
                    decl.required = true;
                }
                Some(Token::Id) => {
                    self.advance();
                    decl.id = true;
                }
                Some(Token::Range) => {
                    self.advance();
                    decl.range = Some(self.parse_range()?);
                }
                _ => break,
            }
        }
        self.expect(Token::Semi)?;

        decl.span = Span::new(start, self.previous_end());
        Ok(decl)
    }

    fn parse_attribute_kind(&mut self) -> ParseResult<AttributeKindDecl> {
        let span = self.peek_span();
        match self.peek() {
            Some(Token::Enum) => {
                self.advance();
                self.expect(Token::LParen)?;
                let mut values = vec![self.expect_string()?];
                while self.match_token(&Token::Comma) {
                    values.push(self.expect_string()?);
                }
                self.expect(Token::RParen)?;
                Ok(AttributeKindDecl::Enum { values })
            }
            Some(Token::Ref) => {
                self.advance();
                let target = if self.match_token(&Token::LParen) {
                    let target = self.parse_type_ref()?;
                    self.expect(Token::RParen)?;
                    Some(target)
                } else {
                    None
                };
                Ok(AttributeKindDecl::Ref { target })
            }
            Some(Token::List) => {
                self.advance();
                self.expect(Token::Lt)?;
                let item_span = self.peek_span();
                let item = self.expect_ident()?;
                self.expect(Token::Gt)?;
                let item = PrimitiveKind::from_name(&item).ok_or_else(|| {
                    ParseError::invalid_syntax(
                        item_span,
                        format!("List items must be string, int, float or bool, found '{}'", item),
                    )
                })?;
                Ok(AttributeKindDecl::List { item })
            }
            Some(Token::Ident(name)) => {
                let kind = match *name {
                    "string" => AttributeKindDecl::String,
                    "int" => AttributeKindDecl::Int,
                    "float" => AttributeKindDecl::Float,
                    "bool" => AttributeKindDecl::Bool,
                    other => {
                        return Err(ParseError::invalid_syntax(
                            span,
                            format!("Unknown attribute kind '{}'", other),
                        ))
                    }
                };
                self.advance();
                Ok(kind)
            }
            _ => Err(ParseError::unexpected_token(
                span,
                "attribute kind",
                self.format_token(),
            )),
        }
    }

    fn parse_range(&mut self) -> ParseResult<RangeDecl> {
        self.expect(Token::LParen)?;
        let min = self.parse_bound()?;
        self.expect(Token::Comma)?;
        let max = self.parse_bound()?;
        self.expect(Token::RParen)?;
        Ok(RangeDecl { min, max })
    }

    fn parse_bound(&mut self) -> ParseResult<Option<f64>> {
        let span = self.peek_span();
        match self.peek() {
            Some(Token::Ident("_")) => {
                self.advance();
                Ok(None)
            }
            Some(Token::Number(text)) => {
                let value = text
                    .parse::<f64>()
                    .map_err(|_| ParseError::invalid_syntax(span, "Invalid number"))?;
                self.advance();
                Ok(Some(value))
            }
            _ => Err(ParseError::unexpected_token(
                span,
                "number or '_'",
                self.format_token(),
            )),
        }
    }

    fn parse_literal(&mut self) -> ParseResult<Literal> {
        let span = self.peek_span();
        let literal = match self.peek() {
            Some(Token::String(s)) => Literal::String(unescape(s)),
            Some(Token::True) => Literal::Bool(true),
            Some(Token::False) => Literal::Bool(false),
            Some(Token::Number(text)) => parse_number(text)
                .ok_or_else(|| ParseError::invalid_syntax(span, "Invalid number"))?,
            Some(Token::LBracket) => {
                self.advance();
                let mut items = Vec::new();
                while !self.check(&Token::RBracket) && !self.is_at_end() {
                    items.push(self.parse_literal()?);
                    if !self.match_token(&Token::Comma) {
                        break;
                    }
                }
                self.expect(Token::RBracket)?;
                return Ok(Literal::List(items));
            }
            _ => {
                return Err(ParseError::unexpected_token(
                    span,
                    "literal",
                    self.format_token(),
                ))
            }
        };
        self.advance();
        Ok(literal)
    }

    fn parse_child(&mut self, annotation: Option<Annotation>) -> ParseResult<ChildDecl> {
        let start = self.current_pos();
        self.expect(Token::Child)?;
        let name = self.expect_name()?;
        self.expect(Token::Colon)?;

        let mut types = vec![self.parse_type_ref()?];
        while self.match_token(&Token::Pipe) {
            types.push(self.parse_type_ref()?);
        }

        let occurs = self.parse_occurs()?;
        self.expect(Token::Semi)?;

        let mut decl = ChildDecl::new(name, types, occurs);
        decl.annotation = annotation;
        decl.span = Span::new(start, self.previous_end());
        Ok(decl)
    }

    fn parse_occurs(&mut self) -> ParseResult<Occurs> {
        let occurs = match self.peek() {
            Some(Token::Question) => Occurs::OPTIONAL,
            Some(Token::Star) => Occurs::MANY,
            Some(Token::Plus) => Occurs::AT_LEAST_ONE,
            Some(Token::LBracket) => {
                self.advance();
                let min = self.expect_count()?;
                self.expect(Token::DotDot)?;
                let max = if self.match_token(&Token::Star) {
                    None
                } else {
                    Some(self.expect_count()?)
                };
                self.expect(Token::RBracket)?;
                return Ok(Occurs::new(min, max));
            }
            _ => return Ok(Occurs::ONE),
        };
        self.advance();
        Ok(occurs)
    }

    fn expect_count(&mut self) -> ParseResult<u32> {
        let span = self.peek_span();
        match self.peek() {
            Some(Token::Number(text)) => {
                let count = text.parse::<u32>().map_err(|_| {
                    ParseError::invalid_syntax(span, "Occurrence bounds must be non-negative integers")
                })?;
                self.advance();
                Ok(count)
            }
            _ => Err(ParseError::unexpected_token(
                span,
                "occurrence count",
                self.format_token(),
            )),
        }
    }

    fn parse_root(&mut self) -> ParseResult<RootDecl> {
        let start = self.current_pos();
        self.expect(Token::Root)?;
        let name = self.expect_name()?;
        self.expect(Token::Colon)?;
        let type_ref = self.parse_type_ref()?;
        self.expect(Token::Semi)?;

        Ok(RootDecl {
            name,
            type_ref,
            span: Span::new(start, self.previous_end()),
        })
    }

    fn parse_type_ref(&mut self) -> ParseResult<TypeRef> {
        let first = self.expect_name()?;
        if self.match_token(&Token::Colon) {
            let name = self.expect_name()?;
            Ok(TypeRef::prefixed(first, name))
        } else {
            Ok(TypeRef::local(first))
        }
    }

    // Helper methods

    fn peek(&self) -> Option<&Token<'src>> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn advance(&mut self) -> Option<&SpannedToken<'src>> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check(&self, token: &Token) -> bool {
        self.peek()
            .map_or(false, |t| std::mem::discriminant(t) == std::mem::discriminant(token))
    }

    fn match_token(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> ParseResult<()> {
        if self.check(&token) {
            self.advance();
            Ok(())
        } else if self.is_at_end() {
            Err(ParseError::UnexpectedEof {
                expected: Self::describe(&token),
            })
        } else {
            Err(ParseError::unexpected_token(
                self.peek_span(),
                Self::describe(&token),
                self.format_token(),
            ))
        }
    }

    fn expect_ident(&mut self) -> ParseResult<String> {
        match self.peek() {
            Some(Token::Ident(s)) => {
                let val = s.to_string();
                self.advance();
                Ok(val)
            }
            _ => Err(ParseError::unexpected_token(
                self.peek_span(),
                "identifier",
                self.format_token(),
            )),
        }
    }

    /// Identifier or keyword used as a type or member name
    fn expect_name(&mut self) -> ParseResult<String> {
        if let Some(text) = self.peek().and_then(Token::keyword_text) {
            self.advance();
            return Ok(text.to_string());
        }
        self.expect_ident()
    }

    fn expect_string(&mut self) -> ParseResult<String> {
        match self.peek() {
            Some(Token::String(s)) => {
                let val = unescape(s);
                self.advance();
                Ok(val)
            }
            _ => Err(ParseError::unexpected_token(
                self.peek_span(),
                "string literal",
                self.format_token(),
            )),
        }
    }

    fn current_pos(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|t| t.span.start)
            .unwrap_or_else(|| self.previous_end())
    }

    fn previous_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span.end)
            .unwrap_or(0)
    }

    fn peek_span(&self) -> TokenSpan {
        self.tokens.get(self.pos).map(|t| t.span).unwrap_or_else(|| {
            // At EOF, point just past the last token
            let end = self.tokens.last().map(|t| t.span.end).unwrap_or(0);
            TokenSpan { start: end, end }
        })
    }

    /// Format the current token for display in error messages
    fn format_token(&self) -> String {
        match self.peek() {
            None => "end of file".to_string(),
            Some(Token::Ident(s)) => format!("identifier '{}'", s),
            Some(Token::String(s)) => format!("string \"{}\"", s),
            Some(Token::Number(n)) => format!("number {}", n),
            Some(token) => Self::describe(token),
        }
    }

    fn describe(token: &Token) -> String {
        if let Some(keyword) = token.keyword_text() {
            return format!("'{}'", keyword);
        }
        let text = match token {
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Semi => ";",
            Token::Eq => "=",
            Token::Pipe => "|",
            Token::Question => "?",
            Token::Star => "*",
            Token::Plus => "+",
            Token::At => "@",
            Token::DotDot => "..",
            Token::Ident(_) => return "identifier".to_string(),
            Token::String(_) => return "string literal".to_string(),
            Token::Number(_) => return "number".to_string(),
            _ => return format!("{:?}", token),
        };
        format!("'{}'", text)
    }
}

fn parse_number(text: &str) -> Option<Literal> {
    if text.contains(['.', 'e', 'E']) {
        text.parse().ok().map(Literal::Float)
    } else {
        text.parse().ok().map(Literal::Int)
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
