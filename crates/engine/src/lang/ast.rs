//! Syntax tree for the vibe-code language.
//!
//! Vibe code is a small, deterministic JavaScript subset: one top-level
//! function over `(data, helpers)` built from expressions, template
//! literals, and structured control flow. There are no closures, classes,
//! prototypes, or ambient globals.

/// A 1-based source location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// The single top-level render function.
#[derive(Debug, Clone)]
pub struct Function {
    /// Present for `function name(...)`, absent for arrow form.
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: FunctionBody,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    /// Arrow shorthand: `(data, helpers) => expr`.
    Expr(Box<Expr>),
    /// Block body with statements.
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    /// `let` / `const` binding.
    Declare {
        name: String,
        mutable: bool,
        value: Expr,
    },
    /// `name = expr` or `name += expr`.
    Assign {
        name: String,
        op: AssignOp,
        value: Expr,
    },
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    /// `for (const x of iterable) { ... }`
    ForOf {
        var: String,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    /// Backtick template literal.
    Template(Vec<TemplatePart>),
    Ident(String),
    Array(Vec<Expr>),
    /// Object literal with string/identifier keys.
    Object(Vec<(String, Expr)>),
    /// `object.property`
    Member {
        object: Box<Expr>,
        property: String,
    },
    /// `object[index]`
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `cond ? then : alt`
    Conditional {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

/// One segment of a template literal.
#[derive(Debug, Clone)]
pub enum TemplatePart {
    Text(String),
    /// `${expr}` interpolation.
    Interpolation(Expr),
}
