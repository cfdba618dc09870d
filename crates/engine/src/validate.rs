//! Code Validator: static analysis run at save time, before any execution.
//!
//! Validation is deterministic for identical input. Fatal findings (errors
//! and security issues) make the result non-passing; warnings never block
//! execution. The executor only runs code whose latest validation passed
//! at the block's current code version.

use vibefront_core::block::Block;
use vibefront_core::validation::{RuleId, ValidationIssue, ValidationResult};

use super::lang::ast::{Expr, ExprKind, Function, FunctionBody, Span, Stmt, StmtKind, TemplatePart};
use super::lang::lexer::{self, TokenKind};
use super::lang::parser;

/// Soft source-length threshold; exceeding it warns but never fails.
pub const SOURCE_LENGTH_SOFT_LIMIT: usize = 16 * 1024;

/// Identifiers whose mere appearance is a security finding, with the rule
/// each one maps to.
const BANNED_IDENTIFIERS: &[(&str, RuleId)] = &[
    ("eval", RuleId::DynamicEval),
    ("Function", RuleId::DynamicFunction),
    ("require", RuleId::ModuleImport),
    ("process", RuleId::HostAccess),
    ("globalThis", RuleId::HostAccess),
    ("window", RuleId::HostAccess),
    ("global", RuleId::HostAccess),
    ("document", RuleId::HostAccess),
    ("navigator", RuleId::HostAccess),
    ("fetch", RuleId::HostAccess),
    ("XMLHttpRequest", RuleId::HostAccess),
    ("WebSocket", RuleId::HostAccess),
    ("setTimeout", RuleId::HostAccess),
    ("setInterval", RuleId::HostAccess),
    ("fs", RuleId::HostAccess),
    ("child_process", RuleId::HostAccess),
    ("Deno", RuleId::HostAccess),
    ("Bun", RuleId::HostAccess),
];

/// Validate one source text.
#[must_use]
pub fn validate(source: &str) -> ValidationResult {
    let mut report = Report::default();

    if source.len() > SOURCE_LENGTH_SOFT_LIMIT {
        report.warn(
            RuleId::SourceLength,
            format!(
                "source is {} bytes; consider staying under {SOURCE_LENGTH_SOFT_LIMIT}",
                source.len()
            ),
            Span::new(1, 1),
        );
    }

    // Reserved words like `import` and `new` never parse as expressions,
    // so the token stream is scanned first to attribute them to the right
    // rule instead of a bare parse error. Property and object-key
    // positions are data, not code: `data.config.new` stays legal.
    if let Ok(tokens) = lexer::tokenize(source) {
        for (i, token) in tokens.iter().enumerate() {
            if let TokenKind::Ident(name) = &token.kind {
                let after_dot = i
                    .checked_sub(1)
                    .and_then(|prev| tokens.get(prev))
                    .is_some_and(|t| matches!(t.kind, TokenKind::Dot));
                let object_key = tokens
                    .get(i + 1)
                    .is_some_and(|t| matches!(t.kind, TokenKind::Colon));
                if after_dot || object_key {
                    continue;
                }
                match name.as_str() {
                    "import" | "export" => report.security(
                        RuleId::ModuleImport,
                        format!("'{name}' is not available in block code"),
                        token.span,
                    ),
                    "new" => report.security(
                        RuleId::DynamicFunction,
                        "'new' is not available in block code".to_string(),
                        token.span,
                    ),
                    _ => {}
                }
            }
        }
    }

    match parser::parse(source) {
        Ok(function) => analyze(&function, &mut report),
        Err(err) => report.error(
            RuleId::ParseError,
            err.message,
            Span::new(err.line, err.column),
        ),
    }

    report.finish()
}

/// Validate a block: its source (when present) plus its declared
/// dependencies against the allow-list. The safe default allow-list is
/// empty, so any declared dependency fails.
#[must_use]
pub fn validate_block(block: &Block, allow_list: &[String]) -> ValidationResult {
    let mut result = match &block.vibe_code {
        Some(source) => validate(source),
        None if block.uses_vibe_code() => {
            let mut report = Report::default();
            report.error(
                RuleId::FunctionShape,
                "vibe-code block has no source".to_string(),
                Span::new(1, 1),
            );
            report.finish()
        }
        None => ValidationResult::passing(),
    };

    for issue in check_dependencies(&block.dependencies, allow_list) {
        result.errors.push(issue);
        result.is_valid = false;
    }
    result
}

/// One [`RuleId::DisallowedDependency`] finding per declared dependency
/// missing from the allow-list. The store's save path runs this on every
/// code update, so the check holds regardless of the caller.
#[must_use]
pub fn check_dependencies(dependencies: &[String], allow_list: &[String]) -> Vec<ValidationIssue> {
    dependencies
        .iter()
        .filter(|dep| !allow_list.contains(dep))
        .map(|dep| ValidationIssue {
            rule: RuleId::DisallowedDependency,
            message: format!("dependency '{dep}' is not on the allow-list"),
            line: 1,
            column: 1,
        })
        .collect()
}

#[derive(Default)]
struct Report {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
    security_issues: Vec<ValidationIssue>,
}

impl Report {
    fn error(&mut self, rule: RuleId, message: String, span: Span) {
        self.errors.push(issue(rule, message, span));
    }

    fn warn(&mut self, rule: RuleId, message: String, span: Span) {
        self.warnings.push(issue(rule, message, span));
    }

    fn security(&mut self, rule: RuleId, message: String, span: Span) {
        self.security_issues.push(issue(rule, message, span));
    }

    fn finish(self) -> ValidationResult {
        ValidationResult {
            is_valid: self.errors.is_empty() && self.security_issues.is_empty(),
            errors: self.errors,
            warnings: self.warnings,
            security_issues: self.security_issues,
        }
    }
}

fn issue(rule: RuleId, message: String, span: Span) -> ValidationIssue {
    ValidationIssue {
        rule,
        message,
        line: span.line,
        column: span.column,
    }
}

fn analyze(function: &Function, report: &mut Report) {
    if function.params.len() != 2 {
        report.error(
            RuleId::FunctionShape,
            format!(
                "render function must take exactly two parameters (data, helpers), found {}",
                function.params.len()
            ),
            function.span,
        );
    }

    let mut walker = Walker {
        scopes: vec![function.params.iter().cloned().collect()],
        report,
    };

    match &function.body {
        FunctionBody::Expr(expr) => {
            walker.expr(expr);
            check_return_expr(expr, walker.report);
        }
        FunctionBody::Block(stmts) => {
            walker.block(stmts);
            if !always_returns(stmts) {
                walker.report.error(
                    RuleId::ReturnPath,
                    "not every path through the function returns a value".to_string(),
                    function.span,
                );
            }
            collect_return_checks(stmts, walker.report);
        }
    }
}

struct Walker<'a> {
    scopes: Vec<std::collections::HashSet<String>>,
    report: &'a mut Report,
}

impl Walker<'_> {
    fn block(&mut self, stmts: &[Stmt]) {
        let mut returned_at: Option<Span> = None;
        for stmt in stmts {
            if let Some(ret_span) = returned_at.take() {
                self.report.warn(
                    RuleId::UnreachableCode,
                    format!(
                        "statement can never execute; the function returns at {}:{}",
                        ret_span.line, ret_span.column
                    ),
                    stmt.span,
                );
                // keep analyzing for other findings, but only warn once per block
            }
            self.stmt(stmt);
            if matches!(stmt.kind, StmtKind::Return(_)) {
                returned_at = Some(stmt.span);
            }
        }
    }

    fn scoped_block(&mut self, stmts: &[Stmt]) {
        self.scopes.push(std::collections::HashSet::new());
        self.block(stmts);
        self.scopes.pop();
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Declare { name, value, .. } => {
                self.expr(value);
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(name.clone());
                }
            }
            StmtKind::Assign { name, value, .. } => {
                self.check_ident(name, stmt.span);
                self.expr(value);
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.expr(cond);
                self.scoped_block(then_branch);
                if let Some(else_branch) = else_branch {
                    self.scoped_block(else_branch);
                }
            }
            StmtKind::While { cond, body } => {
                self.expr(cond);
                self.scoped_block(body);
            }
            StmtKind::ForOf {
                var,
                iterable,
                body,
            } => {
                self.expr(iterable);
                self.scopes.push(std::collections::HashSet::new());
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(var.clone());
                }
                self.block(body);
                self.scopes.pop();
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.expr(value);
                }
            }
            StmtKind::Expr(expr) => self.expr(expr),
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Ident(name) => self.check_ident(name, expr.span),
            ExprKind::Template(parts) => {
                for part in parts {
                    if let TemplatePart::Interpolation(inner) = part {
                        self.expr(inner);
                        if !interpolation_is_safe(inner) {
                            self.report.warn(
                                RuleId::UnescapedInterpolation,
                                "interpolated value is not passed through an escaping helper"
                                    .to_string(),
                                inner.span,
                            );
                        }
                    }
                }
            }
            ExprKind::Array(items) => {
                for item in items {
                    self.expr(item);
                }
            }
            ExprKind::Object(entries) => {
                for (_, value) in entries {
                    self.expr(value);
                }
            }
            ExprKind::Member { object, .. } => self.expr(object),
            ExprKind::Index { object, index } => {
                self.expr(object);
                self.expr(index);
            }
            ExprKind::Call { callee, args } => {
                self.expr(callee);
                for arg in args {
                    self.expr(arg);
                }
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Binary { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            ExprKind::Conditional {
                cond,
                then_branch,
                else_branch,
            } => {
                self.expr(cond);
                self.expr(then_branch);
                self.expr(else_branch);
            }
            ExprKind::Null | ExprKind::Bool(_) | ExprKind::Number(_) | ExprKind::Str(_) => {}
        }
    }

    fn check_ident(&mut self, name: &str, span: Span) {
        if let Some((_, rule)) = BANNED_IDENTIFIERS.iter().find(|(banned, _)| *banned == name) {
            self.report.security(
                *rule,
                format!("'{name}' is not available in block code"),
                span,
            );
            return;
        }
        if !self.scopes.iter().any(|scope| scope.contains(name)) {
            self.report.error(
                RuleId::UnknownIdentifier,
                format!("'{name}' is not defined; only the function parameters are in scope"),
                span,
            );
        }
    }
}

/// Whether every path through `stmts` is guaranteed to return.
fn always_returns(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|stmt| match &stmt.kind {
        StmtKind::Return(_) => true,
        StmtKind::If {
            then_branch,
            else_branch: Some(else_branch),
            ..
        } => always_returns(then_branch) && always_returns(else_branch),
        _ => false,
    })
}

/// Warn on `return` expressions that are provably not strings.
fn collect_return_checks(stmts: &[Stmt], report: &mut Report) {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Return(Some(expr)) => check_return_expr(expr, report),
            StmtKind::Return(None) => report.warn(
                RuleId::ReturnPath,
                "bare return produces no fragment; return a string".to_string(),
                stmt.span,
            ),
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                collect_return_checks(then_branch, report);
                if let Some(else_branch) = else_branch {
                    collect_return_checks(else_branch, report);
                }
            }
            StmtKind::While { body, .. } | StmtKind::ForOf { body, .. } => {
                collect_return_checks(body, report);
            }
            _ => {}
        }
    }
}

fn check_return_expr(expr: &Expr, report: &mut Report) {
    if definitely_not_string(expr) {
        report.warn(
            RuleId::ReturnPath,
            "returned value is not a string; the function must return an HTML fragment"
                .to_string(),
            expr.span,
        );
    }
}

/// Conservative: only flags literals and operations that can never yield a
/// string. Identifiers and calls pass, since their type is unknown here.
fn definitely_not_string(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Null
        | ExprKind::Bool(_)
        | ExprKind::Number(_)
        | ExprKind::Array(_)
        | ExprKind::Object(_)
        | ExprKind::Unary { .. } => true,
        ExprKind::Binary { op, left, right } => {
            use super::lang::ast::BinaryOp;
            match op {
                BinaryOp::Add => definitely_not_string(left) && definitely_not_string(right),
                _ => true,
            }
        }
        ExprKind::Conditional {
            then_branch,
            else_branch,
            ..
        } => definitely_not_string(then_branch) || definitely_not_string(else_branch),
        _ => false,
    }
}

/// Whether an interpolated expression is trusted as already-safe markup:
/// a literal, or a call through the `helpers` namespace.
fn interpolation_is_safe(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Str(_) | ExprKind::Number(_) | ExprKind::Bool(_) | ExprKind::Template(_) => true,
        ExprKind::Call { callee, .. } => matches!(
            &callee.kind,
            ExprKind::Member { object, .. }
                if matches!(&object.kind, ExprKind::Ident(name) if name == "helpers")
        ),
        ExprKind::Conditional {
            then_branch,
            else_branch,
            ..
        } => interpolation_is_safe(then_branch) && interpolation_is_safe(else_branch),
        _ => false,
    }
}
