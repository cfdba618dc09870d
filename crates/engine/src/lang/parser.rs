//! Recursive-descent parser for the vibe-code language.
//!
//! The grammar admits exactly one top-level function (arrow form or
//! `function` declaration). Constructs outside the subset fail with a
//! [`ParseError`] carrying the offending location; the Code Validator
//! reports that as a fatal finding.

use thiserror::Error;

use super::ast::{
    AssignOp, BinaryOp, Expr, ExprKind, Function, FunctionBody, Span, Stmt, StmtKind, TemplatePart,
    UnaryOp,
};
use super::lexer::{LexError, Token, TokenKind, tokenize};

/// Parse failure with the offending location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at {line}:{column}")]
pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        Self {
            message: e.message,
            line: e.line,
            column: e.column,
        }
    }
}

/// Words with reserved meaning; none may be used as a binding name.
pub const RESERVED_WORDS: &[&str] = &[
    "let", "const", "var", "if", "else", "while", "for", "of", "in", "return", "function", "true",
    "false", "null", "undefined", "new", "class", "this", "import", "export", "async", "await",
    "yield", "typeof", "delete", "throw", "try", "catch", "finally", "do", "switch", "case",
];

/// Parse a complete vibe-code source text into its single top-level
/// function.
///
/// # Errors
///
/// Returns a [`ParseError`] for any source outside the language subset,
/// including trailing content after the function.
pub fn parse(source: &str) -> Result<Function, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let function = parser.parse_function()?;
    // Allow a trailing semicolon, then require EOF.
    parser.eat(&TokenKind::Semi);
    parser.expect_eof()?;
    Ok(function)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .unwrap_or_else(|| self.tokens.last().expect("token stream ends with Eof"))
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_span(&self) -> Span {
        self.peek().span
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token, ParseError> {
        if self.peek_kind() == kind {
            Ok(self.bump())
        } else {
            Err(self.error_here(format!("expected {what}")))
        }
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        if matches!(self.peek_kind(), TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.error_here(
                "source must contain exactly one top-level function".to_string(),
            ))
        }
    }

    fn error_here(&self, message: String) -> ParseError {
        let span = self.peek_span();
        ParseError {
            message,
            line: span.line,
            column: span.column,
        }
    }

    fn peek_ident(&self) -> Option<&str> {
        match self.peek_kind() {
            TokenKind::Ident(name) => Some(name.as_str()),
            _ => None,
        }
    }

    fn expect_binding_name(&mut self) -> Result<String, ParseError> {
        let span = self.peek_span();
        match self.bump().kind {
            TokenKind::Ident(name) => {
                if RESERVED_WORDS.contains(&name.as_str()) {
                    Err(ParseError {
                        message: format!("'{name}' cannot be used as a name"),
                        line: span.line,
                        column: span.column,
                    })
                } else {
                    Ok(name)
                }
            }
            _ => Err(ParseError {
                message: "expected a name".to_string(),
                line: span.line,
                column: span.column,
            }),
        }
    }

    // =========================================================================
    // Function
    // =========================================================================

    fn parse_function(&mut self) -> Result<Function, ParseError> {
        let span = self.peek_span();
        if self.peek_ident() == Some("function") {
            self.bump();
            let name = if matches!(self.peek_kind(), TokenKind::Ident(_)) {
                Some(self.expect_binding_name()?)
            } else {
                None
            };
            let params = self.parse_params()?;
            self.expect(&TokenKind::LBrace, "'{'")?;
            let body = self.parse_block()?;
            return Ok(Function {
                name,
                params,
                body: FunctionBody::Block(body),
                span,
            });
        }

        // Arrow form: `(a, b) => expr` or `(a, b) => { ... }`.
        let params = self.parse_params()?;
        self.expect(&TokenKind::Arrow, "'=>'")?;
        if self.eat(&TokenKind::LBrace) {
            let body = self.parse_block()?;
            Ok(Function {
                name: None,
                params,
                body: FunctionBody::Block(body),
                span,
            })
        } else {
            let expr = self.parse_expr()?;
            Ok(Function {
                name: None,
                params,
                body: FunctionBody::Expr(Box::new(expr)),
                span,
            })
        }
    }

    fn parse_params(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(&TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.eat(&TokenKind::RParen) {
            loop {
                params.push(self.expect_binding_name()?);
                if self.eat(&TokenKind::RParen) {
                    break;
                }
                self.expect(&TokenKind::Comma, "','")?;
            }
        }
        Ok(params)
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// Parse statements up to (and consuming) the closing `}`.
    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        while !self.eat(&TokenKind::RBrace) {
            if matches!(self.peek_kind(), TokenKind::Eof) {
                return Err(self.error_here("expected '}'".to_string()));
            }
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let span = self.peek_span();
        let kind = match self.peek_ident() {
            Some("let" | "const" | "var") => self.parse_declare()?,
            Some("if") => self.parse_if()?,
            Some("while") => self.parse_while()?,
            Some("for") => self.parse_for_of()?,
            Some("return") => {
                self.bump();
                let value = if self.eat(&TokenKind::Semi) {
                    None
                } else {
                    let expr = self.parse_expr()?;
                    self.eat(&TokenKind::Semi);
                    Some(expr)
                };
                StmtKind::Return(value)
            }
            Some("function") => {
                return Err(self.error_here(
                    "nested function definitions are not supported".to_string(),
                ));
            }
            _ => self.parse_assign_or_expr()?,
        };
        Ok(Stmt { kind, span })
    }

    fn parse_declare(&mut self) -> Result<StmtKind, ParseError> {
        let keyword = self.bump();
        if matches!(&keyword.kind, TokenKind::Ident(k) if k == "var") {
            return Err(ParseError {
                message: "'var' is not supported; use 'let' or 'const'".to_string(),
                line: keyword.span.line,
                column: keyword.span.column,
            });
        }
        let mutable = matches!(&keyword.kind, TokenKind::Ident(k) if k == "let");
        let name = self.expect_binding_name()?;
        self.expect(&TokenKind::Assign, "'='")?;
        let value = self.parse_expr()?;
        self.eat(&TokenKind::Semi);
        Ok(StmtKind::Declare {
            name,
            mutable,
            value,
        })
    }

    fn parse_if(&mut self) -> Result<StmtKind, ParseError> {
        self.bump();
        self.expect(&TokenKind::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "')'")?;
        let then_branch = self.parse_branch()?;
        let else_branch = if self.peek_ident() == Some("else") {
            self.bump();
            if self.peek_ident() == Some("if") {
                let span = self.peek_span();
                let nested = self.parse_if()?;
                Some(vec![Stmt { kind: nested, span }])
            } else {
                Some(self.parse_branch()?)
            }
        } else {
            None
        };
        Ok(StmtKind::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    fn parse_while(&mut self) -> Result<StmtKind, ParseError> {
        self.bump();
        self.expect(&TokenKind::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "')'")?;
        let body = self.parse_branch()?;
        Ok(StmtKind::While { cond, body })
    }

    fn parse_for_of(&mut self) -> Result<StmtKind, ParseError> {
        self.bump();
        self.expect(&TokenKind::LParen, "'('")?;
        match self.peek_ident() {
            Some("const" | "let") => {
                self.bump();
            }
            _ => return Err(self.error_here("expected 'const' or 'let'".to_string())),
        }
        let var = self.expect_binding_name()?;
        if self.peek_ident() == Some("of") {
            self.bump();
        } else {
            return Err(self.error_here(
                "only 'for (const x of iterable)' loops are supported".to_string(),
            ));
        }
        let iterable = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "')'")?;
        let body = self.parse_branch()?;
        Ok(StmtKind::ForOf {
            var,
            iterable,
            body,
        })
    }

    /// A `{ ... }` block or a single statement.
    fn parse_branch(&mut self) -> Result<Vec<Stmt>, ParseError> {
        if self.eat(&TokenKind::LBrace) {
            self.parse_block()
        } else {
            Ok(vec![self.parse_stmt()?])
        }
    }

    fn parse_assign_or_expr(&mut self) -> Result<StmtKind, ParseError> {
        // Assignment only targets plain identifiers; look ahead one token.
        if let TokenKind::Ident(name) = self.peek_kind().clone() {
            let next = self.tokens.get(self.pos + 1).map(|t| &t.kind);
            let op = match next {
                Some(TokenKind::Assign) => Some(AssignOp::Set),
                Some(TokenKind::PlusAssign) => Some(AssignOp::Add),
                _ => None,
            };
            if let Some(op) = op {
                self.bump();
                self.bump();
                let value = self.parse_expr()?;
                self.eat(&TokenKind::Semi);
                return Ok(StmtKind::Assign { name, op, value });
            }
        }
        let expr = self.parse_expr()?;
        self.eat(&TokenKind::Semi);
        Ok(StmtKind::Expr(expr))
    }

    // =========================================================================
    // Expressions (precedence climbing)
    // =========================================================================

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_conditional()
    }

    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let cond = self.parse_or()?;
        if self.eat(&TokenKind::Question) {
            let span = cond.span;
            let then_branch = self.parse_conditional()?;
            self.expect(&TokenKind::Colon, "':'")?;
            let else_branch = self.parse_conditional()?;
            return Ok(Expr {
                kind: ExprKind::Conditional {
                    cond: Box::new(cond),
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                },
                span,
            });
        }
        Ok(cond)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::OrOr) {
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;
        while self.eat(&TokenKind::AndAnd) {
            let right = self.parse_equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                _ => break,
            };
            self.bump();
            let right = self.parse_relational()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::LtEq => BinaryOp::LtEq,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::GtEq => BinaryOp::GtEq,
                _ => break,
            };
            self.bump();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.bump();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.bump();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let span = self.peek_span();
        let op = match self.peek_kind() {
            TokenKind::Not => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Neg),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let operand = self.parse_unary()?;
            return Ok(Expr {
                kind: ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                span,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            let span = self.peek_span();
            if self.eat(&TokenKind::Dot) {
                let property = match self.bump().kind {
                    TokenKind::Ident(name) => name,
                    _ => return Err(self.error_here("expected property name".to_string())),
                };
                expr = Expr {
                    kind: ExprKind::Member {
                        object: Box::new(expr),
                        property,
                    },
                    span,
                };
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.parse_expr()?;
                self.expect(&TokenKind::RBracket, "']'")?;
                expr = Expr {
                    kind: ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                    span,
                };
            } else if self.eat(&TokenKind::LParen) {
                let mut args = Vec::new();
                if !self.eat(&TokenKind::RParen) {
                    loop {
                        args.push(self.parse_expr()?);
                        if self.eat(&TokenKind::RParen) {
                            break;
                        }
                        self.expect(&TokenKind::Comma, "','")?;
                    }
                }
                expr = Expr {
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    span,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.peek_span();
        let token = self.bump();
        let kind = match token.kind {
            TokenKind::Number(n) => ExprKind::Number(n),
            TokenKind::Str(s) => ExprKind::Str(s),
            TokenKind::TemplateStart => return self.parse_template(span),
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "')'")?;
                return Ok(inner);
            }
            TokenKind::LBracket => {
                let mut items = Vec::new();
                if !self.eat(&TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        if self.eat(&TokenKind::RBracket) {
                            break;
                        }
                        self.expect(&TokenKind::Comma, "','")?;
                        // Allow a trailing comma.
                        if self.eat(&TokenKind::RBracket) {
                            break;
                        }
                    }
                }
                ExprKind::Array(items)
            }
            TokenKind::LBrace => return self.parse_object(span),
            TokenKind::Ident(name) => match name.as_str() {
                "true" => ExprKind::Bool(true),
                "false" => ExprKind::Bool(false),
                "null" | "undefined" => ExprKind::Null,
                _ => ExprKind::Ident(name),
            },
            _ => {
                return Err(ParseError {
                    message: "expected an expression".to_string(),
                    line: span.line,
                    column: span.column,
                });
            }
        };
        Ok(Expr { kind, span })
    }

    fn parse_template(&mut self, span: Span) -> Result<Expr, ParseError> {
        let mut parts = Vec::new();
        loop {
            let token = self.bump();
            match token.kind {
                TokenKind::TemplateChunk(text) => parts.push(TemplatePart::Text(text)),
                TokenKind::InterpStart => {
                    let expr = self.parse_expr()?;
                    self.expect(&TokenKind::InterpEnd, "'}'")?;
                    parts.push(TemplatePart::Interpolation(expr));
                }
                TokenKind::TemplateEnd => break,
                _ => {
                    return Err(ParseError {
                        message: "malformed template literal".to_string(),
                        line: token.span.line,
                        column: token.span.column,
                    });
                }
            }
        }
        Ok(Expr {
            kind: ExprKind::Template(parts),
            span,
        })
    }

    fn parse_object(&mut self, span: Span) -> Result<Expr, ParseError> {
        let mut entries = Vec::new();
        if !self.eat(&TokenKind::RBrace) {
            loop {
                let key = match self.bump().kind {
                    TokenKind::Ident(name) => name,
                    TokenKind::Str(s) => s,
                    _ => return Err(self.error_here("expected object key".to_string())),
                };
                self.expect(&TokenKind::Colon, "':'")?;
                let value = self.parse_expr()?;
                entries.push((key, value));
                if self.eat(&TokenKind::RBrace) {
                    break;
                }
                self.expect(&TokenKind::Comma, "','")?;
                if self.eat(&TokenKind::RBrace) {
                    break;
                }
            }
        }
        Ok(Expr {
            kind: ExprKind::Object(entries),
            span,
        })
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let span = left.span;
    Expr {
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrow_expression_body() {
        let f = parse("(data, helpers) => `hi`").unwrap();
        assert_eq!(f.params, vec!["data", "helpers"]);
        assert!(matches!(f.body, FunctionBody::Expr(_)));
    }

    #[test]
    fn test_function_declaration() {
        let f = parse("function render(data, helpers) { return `x`; }").unwrap();
        assert_eq!(f.name.as_deref(), Some("render"));
        assert!(matches!(f.body, FunctionBody::Block(ref b) if b.len() == 1));
    }

    #[test]
    fn test_precedence() {
        let f = parse("(a, b) => 1 + 2 * 3 == 7 && true").unwrap();
        let FunctionBody::Expr(expr) = f.body else {
            panic!("expected expression body");
        };
        // Top node must be `&&`.
        assert!(matches!(
            expr.kind,
            ExprKind::Binary {
                op: BinaryOp::And,
                ..
            }
        ));
    }

    #[test]
    fn test_for_of_and_while() {
        let src = "function f(data, helpers) {
            let out = '';
            for (const p of data.getProducts({})) {
                out += p.title;
            }
            while (false) { out += 'x'; }
            return out;
        }";
        let f = parse(src).unwrap();
        let FunctionBody::Block(body) = f.body else {
            panic!("expected block body");
        };
        assert_eq!(body.len(), 4);
        assert!(matches!(body[1].kind, StmtKind::ForOf { .. }));
        assert!(matches!(body[2].kind, StmtKind::While { .. }));
    }

    #[test]
    fn test_trailing_content_rejected() {
        let err = parse("(a, b) => `x`; let y = 1;").unwrap_err();
        assert!(err.message.contains("exactly one top-level function"));
    }

    #[test]
    fn test_nested_function_rejected() {
        let err =
            parse("function f(a, b) { function g() { return `x`; } return `y`; }").unwrap_err();
        assert!(err.message.contains("nested function"));
    }

    #[test]
    fn test_var_rejected() {
        let err = parse("function f(a, b) { var x = 1; return `x`; }").unwrap_err();
        assert!(err.message.contains("'var'"));
    }

    #[test]
    fn test_reserved_word_as_binding_rejected() {
        assert!(parse("(this, helpers) => `x`").is_err());
        assert!(parse("function f(a, b) { let class = 1; return `x`; }").is_err());
    }

    #[test]
    fn test_template_with_nested_call() {
        let f = parse("(data, helpers) => `<h1>${helpers.escapeHtml(data.storefront.name)}</h1>`")
            .unwrap();
        let FunctionBody::Expr(expr) = f.body else {
            panic!("expected expression body");
        };
        let ExprKind::Template(parts) = &expr.kind else {
            panic!("expected template literal");
        };
        assert_eq!(parts.len(), 3);
    }

    #[test]
    fn test_conditional_expression() {
        let f = parse("(a, b) => a.x ? `yes` : `no`").unwrap();
        let FunctionBody::Expr(expr) = f.body else {
            panic!("expected expression body");
        };
        assert!(matches!(expr.kind, ExprKind::Conditional { .. }));
    }
}
