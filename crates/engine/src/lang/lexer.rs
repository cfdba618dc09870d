//! Lexer for the vibe-code language.
//!
//! Template literals are lexed with a mode stack: inside backticks the
//! lexer emits raw text chunks until it sees `${`, switches back to normal
//! tokenization until the matching `}`, then resumes text mode. Brace depth
//! is tracked per interpolation so object literals inside `${...}` work.

use super::ast::Span;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Number(f64),
    Str(String),

    TemplateStart,
    TemplateChunk(String),
    InterpStart,
    InterpEnd,
    TemplateEnd,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Semi,
    Colon,
    Question,
    Arrow,

    Assign,
    PlusAssign,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
    Not,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Lexing failure with the offending location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at {line}:{column}")]
pub struct LexError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

enum Mode {
    Normal,
    Template,
    Interp { brace_depth: u32 },
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
    column: u32,
    modes: Vec<Mode>,
}

/// Tokenize the whole source text.
///
/// # Errors
///
/// Returns the first [`LexError`] encountered: unterminated strings or
/// template literals, or characters outside the language.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer {
        chars: source.chars().peekable(),
        line: 1,
        column: 1,
        modes: vec![Mode::Normal],
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            break;
        }
    }
    Ok(tokens)
}

impl Lexer<'_> {
    fn span(&self) -> Span {
        Span::new(self.line, self.column)
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            message: message.into(),
            line: self.line,
            column: self.column,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        if matches!(self.modes.last(), Some(Mode::Template)) {
            return self.next_template_token();
        }
        self.skip_trivia()?;
        let span = self.span();
        let Some(c) = self.bump() else {
            if self.modes.len() > 1 {
                return Err(self.error("unterminated template literal"));
            }
            return Ok(Token {
                kind: TokenKind::Eof,
                span,
            });
        };

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ';' => TokenKind::Semi,
            ':' => TokenKind::Colon,
            '?' => TokenKind::Question,
            '{' => {
                if let Some(Mode::Interp { brace_depth }) = self.modes.last_mut() {
                    *brace_depth += 1;
                }
                TokenKind::LBrace
            }
            '}' => match self.modes.last_mut() {
                Some(Mode::Interp { brace_depth }) if *brace_depth == 0 => {
                    self.modes.pop();
                    TokenKind::InterpEnd
                }
                Some(Mode::Interp { brace_depth }) => {
                    *brace_depth -= 1;
                    TokenKind::RBrace
                }
                _ => TokenKind::RBrace,
            },
            '+' => {
                if self.eat('=') {
                    TokenKind::PlusAssign
                } else {
                    TokenKind::Plus
                }
            }
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '=' => {
                if self.eat('=') {
                    // Treat strict and loose equality identically; the
                    // language has no coercing comparison.
                    self.eat('=');
                    TokenKind::EqEq
                } else if self.eat('>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.eat('=') {
                    self.eat('=');
                    TokenKind::NotEq
                } else {
                    TokenKind::Not
                }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                if self.eat('&') {
                    TokenKind::AndAnd
                } else {
                    return Err(self.error("bitwise operators are not supported"));
                }
            }
            '|' => {
                if self.eat('|') {
                    TokenKind::OrOr
                } else {
                    return Err(self.error("bitwise operators are not supported"));
                }
            }
            '`' => {
                self.modes.push(Mode::Template);
                TokenKind::TemplateStart
            }
            '"' | '\'' => TokenKind::Str(self.lex_string(c)?),
            c if c.is_ascii_digit() => TokenKind::Number(self.lex_number(c)?),
            c if is_ident_start(c) => TokenKind::Ident(self.lex_ident(c)),
            other => return Err(self.error(format!("unexpected character '{other}'"))),
        };
        Ok(Token { kind, span })
    }

    /// Lex inside a template literal: a raw text chunk, `${`, or the
    /// closing backtick. The backtick and `${` delimiters are left
    /// unconsumed when a non-empty chunk is pending, so the next call
    /// emits the delimiter token.
    fn next_template_token(&mut self) -> Result<Token, LexError> {
        let span = self.span();
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated template literal")),
                Some('`') => {
                    if text.is_empty() {
                        self.bump();
                        self.modes.pop();
                        return Ok(Token {
                            kind: TokenKind::TemplateEnd,
                            span,
                        });
                    }
                    return Ok(Token {
                        kind: TokenKind::TemplateChunk(text),
                        span,
                    });
                }
                Some('$') => {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    if lookahead.peek() == Some(&'{') {
                        if text.is_empty() {
                            self.bump();
                            self.bump();
                            self.modes.push(Mode::Interp { brace_depth: 0 });
                            return Ok(Token {
                                kind: TokenKind::InterpStart,
                                span,
                            });
                        }
                        return Ok(Token {
                            kind: TokenKind::TemplateChunk(text),
                            span,
                        });
                    }
                    self.bump();
                    text.push('$');
                }
                Some('\\') => {
                    self.bump();
                    match self.bump() {
                        Some('n') => text.push('\n'),
                        Some('t') => text.push('\t'),
                        Some('`') => text.push('`'),
                        Some('$') => text.push('$'),
                        Some('\\') => text.push('\\'),
                        Some(other) => {
                            text.push('\\');
                            text.push(other);
                        }
                        None => return Err(self.error("unterminated template literal")),
                    }
                }
                Some(_) => {
                    if let Some(c) = self.bump() {
                        text.push(c);
                    }
                }
            }
        }
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    // Comment or division: only consume on `//` or `/*`.
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    match lookahead.peek() {
                        Some('/') => {
                            while let Some(c) = self.peek() {
                                if c == '\n' {
                                    break;
                                }
                                self.bump();
                            }
                        }
                        Some('*') => {
                            self.bump();
                            self.bump();
                            loop {
                                match self.bump() {
                                    Some('*') if self.peek() == Some('/') => {
                                        self.bump();
                                        break;
                                    }
                                    Some(_) => {}
                                    None => return Err(self.error("unterminated block comment")),
                                }
                            }
                        }
                        _ => return Ok(()),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn lex_string(&mut self, quote: char) -> Result<String, LexError> {
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string literal")),
                Some(c) if c == quote => return Ok(value),
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('\\') => value.push('\\'),
                    Some(c) if c == quote => value.push(c),
                    Some(other) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => return Err(self.error("unterminated string literal")),
                },
                Some('\n') => return Err(self.error("unterminated string literal")),
                Some(c) => value.push(c),
            }
        }
    }

    fn lex_number(&mut self, first: char) -> Result<f64, LexError> {
        let mut text = String::from(first);
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else if c == '.' {
                // Only part of the number if a digit follows; `1.toString`
                // style member access is not in the language anyway.
                let mut lookahead = self.chars.clone();
                lookahead.next();
                if lookahead.peek().is_some_and(char::is_ascii_digit) {
                    text.push('.');
                    self.bump();
                } else {
                    break;
                }
            } else {
                break;
            }
        }
        text.parse::<f64>()
            .map_err(|_| self.error(format!("invalid number literal '{text}'")))
    }

    fn lex_ident(&mut self, first: char) -> String {
        let mut text = String::from(first);
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        text
    }
}

const fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

const fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            kinds("(a, b) => a + b"),
            vec![
                TokenKind::LParen,
                TokenKind::Ident("a".into()),
                TokenKind::Comma,
                TokenKind::Ident("b".into()),
                TokenKind::RParen,
                TokenKind::Arrow,
                TokenKind::Ident("a".into()),
                TokenKind::Plus,
                TokenKind::Ident("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_template_literal_with_interpolation() {
        assert_eq!(
            kinds("`a${x}b`"),
            vec![
                TokenKind::TemplateStart,
                TokenKind::TemplateChunk("a".into()),
                TokenKind::InterpStart,
                TokenKind::Ident("x".into()),
                TokenKind::InterpEnd,
                TokenKind::TemplateChunk("b".into()),
                TokenKind::TemplateEnd,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_nested_braces_inside_interpolation() {
        // Object literal inside an interpolation must not terminate it.
        assert_eq!(
            kinds("`${f({k: 1})}`"),
            vec![
                TokenKind::TemplateStart,
                TokenKind::InterpStart,
                TokenKind::Ident("f".into()),
                TokenKind::LParen,
                TokenKind::LBrace,
                TokenKind::Ident("k".into()),
                TokenKind::Colon,
                TokenKind::Number(1.0),
                TokenKind::RBrace,
                TokenKind::RParen,
                TokenKind::InterpEnd,
                TokenKind::TemplateEnd,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_strict_equality_collapses() {
        assert_eq!(
            kinds("a === b !== c"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::EqEq,
                TokenKind::Ident("b".into()),
                TokenKind::NotEq,
                TokenKind::Ident("c".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_and_spans() {
        let tokens = tokenize("// hi\nlet x = 1 /* mid */ + 2").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Ident("let".into()));
        assert_eq!(tokens[0].span.line, 2);
        assert_eq!(tokens[0].span.column, 1);
    }

    #[test]
    fn test_unterminated_template_is_error() {
        assert!(tokenize("`abc").is_err());
        assert!(tokenize("`a${x").is_err());
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\"b\n""#),
            vec![TokenKind::Str("a\"b\n".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_dollar_without_brace_is_text() {
        assert_eq!(
            kinds("`price: $5`"),
            vec![
                TokenKind::TemplateStart,
                TokenKind::TemplateChunk("price: $5".into()),
                TokenKind::TemplateEnd,
                TokenKind::Eof,
            ]
        );
    }
}
