//! Tree-walking interpreter for validated vibe code.
//!
//! Every evaluation step burns fuel; fuel exhaustion, the wall-clock
//! deadline, and the cooperative cancel flag all surface as a timeout.
//! Allocation is accounted against the memory limit as a cumulative
//! conservative bound. A fresh interpreter is built per invocation, so no
//! state survives across blocks or requests.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rand::Rng;
use rand::rngs::StdRng;
use serde_json::Value as Json;

use crate::facade::{Facade, ProductFilters};
use crate::helpers;
use crate::sandbox::ExecLimits;

use super::ast::{
    AssignOp, BinaryOp, Expr, ExprKind, Function, FunctionBody, Stmt, StmtKind, TemplatePart,
    UnaryOp,
};

/// How often (in fuel units) the deadline and cancel flag are polled.
const CHECK_INTERVAL: u64 = 1024;

/// A runtime value. Strings and containers are reference-counted so that
/// cloning during evaluation stays cheap; the interpreter is confined to
/// one thread per invocation.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(Rc<Vec<Value>>),
    Object(Rc<BTreeMap<String, Value>>),
    Native(Native),
}

/// Built-in functions reachable through `data` and `helpers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Native {
    EscapeHtml,
    FormatPrice,
    FormatDate,
    Slugify,
    Truncate,
    UrlEncode,
    Join,
    Uid,
    SeededRandom,
    GetProducts,
    GetCollections,
    GetCart,
}

impl Native {
    const fn name(self) -> &'static str {
        match self {
            Self::EscapeHtml => "escapeHtml",
            Self::FormatPrice => "formatPrice",
            Self::FormatDate => "formatDate",
            Self::Slugify => "slugify",
            Self::Truncate => "truncate",
            Self::UrlEncode => "urlEncode",
            Self::Join => "join",
            Self::Uid => "uid",
            Self::SeededRandom => "seededRandom",
            Self::GetProducts => "getProducts",
            Self::GetCollections => "getCollections",
            Self::GetCart => "getCart",
        }
    }
}

/// Why an evaluation stopped abnormally. Mapped onto the public
/// `ExecutionFailure` taxonomy by the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpError {
    /// Fuel exhausted, deadline passed, or cancellation requested.
    Timeout,
    Memory,
    Output,
    Runtime(String),
}

enum Flow {
    Normal,
    Return(Value),
}

struct Binding {
    value: Value,
    mutable: bool,
}

struct Interp<'a> {
    scopes: Vec<HashMap<String, Binding>>,
    fuel: u64,
    mem_used: u64,
    limits: &'a ExecLimits,
    deadline: Instant,
    cancel: &'a AtomicBool,
    facade: Facade<'a>,
    uid_counter: u64,
    rng: StdRng,
}

/// Execute a parsed render function against the given context.
///
/// `config` is the block's free-form config record, exposed as
/// `data.config`. The returned string is the block's HTML fragment.
///
/// # Errors
///
/// Returns [`InterpError`] when a limit is hit or the code faults. Never
/// returns a partial fragment.
pub fn run(
    function: &Function,
    config: &Json,
    facade: Facade<'_>,
    seed: u64,
    limits: &ExecLimits,
    cancel: &AtomicBool,
) -> Result<String, InterpError> {
    if function.params.len() != 2 {
        return Err(InterpError::Runtime(
            "render function must take exactly (data, helpers)".to_string(),
        ));
    }

    let mut interp = Interp {
        scopes: vec![HashMap::new()],
        fuel: limits.max_fuel,
        mem_used: 0,
        limits,
        deadline: Instant::now() + limits.max_duration,
        cancel,
        facade,
        uid_counter: 0,
        rng: helpers::seeded_rng(seed),
    };

    let data = interp.build_data(config)?;
    let helpers_ns = Interp::build_helpers();
    let params: Vec<String> = function.params.clone();
    interp.declare(&params[0], data, false)?;
    interp.declare(&params[1], helpers_ns, false)?;

    let result = match &function.body {
        FunctionBody::Expr(expr) => interp.eval(expr)?,
        FunctionBody::Block(stmts) => match interp.exec_block(stmts)? {
            Flow::Return(value) => value,
            Flow::Normal => {
                return Err(InterpError::Runtime(
                    "render function finished without returning".to_string(),
                ));
            }
        },
    };

    match result {
        Value::Str(s) => {
            if s.len() as u64 > limits.max_output_bytes {
                Err(InterpError::Output)
            } else {
                Ok(s.to_string())
            }
        }
        other => Err(InterpError::Runtime(format!(
            "render function must return a string, got {}",
            type_name(&other)
        ))),
    }
}

impl Interp<'_> {
    // =========================================================================
    // Accounting
    // =========================================================================

    fn step(&mut self) -> Result<(), InterpError> {
        if self.fuel == 0 {
            return Err(InterpError::Timeout);
        }
        self.fuel -= 1;
        if self.fuel % CHECK_INTERVAL == 0 {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(InterpError::Timeout);
            }
            if Instant::now() >= self.deadline {
                return Err(InterpError::Timeout);
            }
        }
        Ok(())
    }

    fn charge(&mut self, bytes: u64) -> Result<(), InterpError> {
        self.mem_used = self.mem_used.saturating_add(bytes);
        if self.mem_used > self.limits.max_memory_bytes {
            Err(InterpError::Memory)
        } else {
            Ok(())
        }
    }

    fn alloc_str(&mut self, s: String) -> Result<Value, InterpError> {
        self.charge(16 + s.len() as u64)?;
        Ok(Value::Str(Rc::from(s)))
    }

    // =========================================================================
    // Scopes
    // =========================================================================

    fn declare(&mut self, name: &str, value: Value, mutable: bool) -> Result<(), InterpError> {
        let scope = self.scopes.last_mut().ok_or_else(|| {
            InterpError::Runtime("internal: empty scope stack".to_string())
        })?;
        if scope.contains_key(name) {
            return Err(InterpError::Runtime(format!(
                "'{name}' is already declared in this scope"
            )));
        }
        scope.insert(name.to_string(), Binding { value, mutable });
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn assign(&mut self, name: &str, value: Value) -> Result<(), InterpError> {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(binding) = scope.get_mut(name) {
                if !binding.mutable {
                    return Err(InterpError::Runtime(format!(
                        "assignment to constant '{name}'"
                    )));
                }
                binding.value = value;
                return Ok(());
            }
        }
        Err(InterpError::Runtime(format!(
            "assignment to undeclared name '{name}'"
        )))
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Flow, InterpError> {
        for stmt in stmts {
            if let Flow::Return(value) = self.exec_stmt(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_scoped_block(&mut self, stmts: &[Stmt]) -> Result<Flow, InterpError> {
        self.scopes.push(HashMap::new());
        let flow = self.exec_block(stmts);
        self.scopes.pop();
        flow
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow, InterpError> {
        self.step()?;
        match &stmt.kind {
            StmtKind::Declare {
                name,
                mutable,
                value,
            } => {
                let value = self.eval(value)?;
                self.declare(name, value, *mutable)?;
                Ok(Flow::Normal)
            }
            StmtKind::Assign { name, op, value } => {
                let rhs = self.eval(value)?;
                let new_value = match op {
                    AssignOp::Set => rhs,
                    AssignOp::Add => {
                        let current = self
                            .lookup(name)
                            .map(|b| b.value.clone())
                            .ok_or_else(|| {
                                InterpError::Runtime(format!(
                                    "assignment to undeclared name '{name}'"
                                ))
                            })?;
                        self.binary_add(&current, &rhs)?
                    }
                };
                self.assign(name, new_value)?;
                Ok(Flow::Normal)
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if truthy(&self.eval(cond)?) {
                    self.exec_scoped_block(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.exec_scoped_block(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }
            StmtKind::While { cond, body } => {
                while truthy(&self.eval(cond)?) {
                    if let Flow::Return(value) = self.exec_scoped_block(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::ForOf {
                var,
                iterable,
                body,
            } => {
                let Value::Array(items) = self.eval(iterable)? else {
                    return Err(InterpError::Runtime(
                        "for..of requires an array".to_string(),
                    ));
                };
                for item in items.iter() {
                    self.scopes.push(HashMap::new());
                    self.declare(var, item.clone(), false)?;
                    let flow = self.exec_block(body);
                    self.scopes.pop();
                    if let Flow::Return(value) = flow? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
                Ok(Flow::Normal)
            }
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn eval(&mut self, expr: &Expr) -> Result<Value, InterpError> {
        self.step()?;
        match &expr.kind {
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::Str(s) => self.alloc_str(s.clone()),
            ExprKind::Template(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => out.push_str(text),
                        TemplatePart::Interpolation(inner) => {
                            let value = self.eval(inner)?;
                            out.push_str(&self.display(&value)?);
                        }
                    }
                    self.charge(0)?;
                }
                self.alloc_str(out)
            }
            ExprKind::Ident(name) => self.lookup(name).map_or_else(
                || {
                    Err(InterpError::Runtime(format!(
                        "'{name}' is not defined"
                    )))
                },
                |binding| Ok(binding.value.clone()),
            ),
            ExprKind::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                self.charge(16 * (values.len() as u64 + 1))?;
                Ok(Value::Array(Rc::new(values)))
            }
            ExprKind::Object(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    let value = self.eval(value)?;
                    map.insert(key.clone(), value);
                }
                self.charge(32 * (map.len() as u64 + 1))?;
                Ok(Value::Object(Rc::new(map)))
            }
            ExprKind::Member { object, property } => {
                let object = self.eval(object)?;
                self.member(&object, property)
            }
            ExprKind::Index { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                self.index(&object, &index)
            }
            ExprKind::Call { callee, args } => {
                let callee_value = self.eval(callee)?;
                let Value::Native(native) = callee_value else {
                    return Err(InterpError::Runtime(format!(
                        "{} is not a function",
                        type_name(&callee_value)
                    )));
                };
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.eval(arg)?);
                }
                self.call_native(native, &arg_values)
            }
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!truthy(&value))),
                    UnaryOp::Neg => match value {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        other => Err(InterpError::Runtime(format!(
                            "cannot negate {}",
                            type_name(&other)
                        ))),
                    },
                }
            }
            ExprKind::Binary { op, left, right } => {
                // Short-circuit logic evaluates lazily.
                match op {
                    BinaryOp::And => {
                        let left = self.eval(left)?;
                        if truthy(&left) {
                            self.eval(right)
                        } else {
                            Ok(left)
                        }
                    }
                    BinaryOp::Or => {
                        let left = self.eval(left)?;
                        if truthy(&left) {
                            Ok(left)
                        } else {
                            self.eval(right)
                        }
                    }
                    _ => {
                        let left = self.eval(left)?;
                        let right = self.eval(right)?;
                        self.binary(*op, &left, &right)
                    }
                }
            }
            ExprKind::Conditional {
                cond,
                then_branch,
                else_branch,
            } => {
                if truthy(&self.eval(cond)?) {
                    self.eval(then_branch)
                } else {
                    self.eval(else_branch)
                }
            }
        }
    }

    fn member(&mut self, object: &Value, property: &str) -> Result<Value, InterpError> {
        match object {
            Value::Object(map) => Ok(map.get(property).cloned().unwrap_or(Value::Null)),
            #[allow(clippy::cast_precision_loss)]
            Value::Array(items) if property == "length" => {
                Ok(Value::Number(items.len() as f64))
            }
            #[allow(clippy::cast_precision_loss)]
            Value::Str(s) if property == "length" => {
                Ok(Value::Number(s.chars().count() as f64))
            }
            Value::Null => Err(InterpError::Runtime(format!(
                "cannot read property '{property}' of null"
            ))),
            other => Err(InterpError::Runtime(format!(
                "cannot read property '{property}' of {}",
                type_name(other)
            ))),
        }
    }

    fn index(&mut self, object: &Value, index: &Value) -> Result<Value, InterpError> {
        match (object, index) {
            (Value::Array(items), Value::Number(n)) => {
                if n.fract() != 0.0 || *n < 0.0 {
                    return Ok(Value::Null);
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                Ok(items.get(*n as usize).cloned().unwrap_or(Value::Null))
            }
            (Value::Object(map), Value::Str(key)) => {
                Ok(map.get(key.as_ref()).cloned().unwrap_or(Value::Null))
            }
            (object, index) => Err(InterpError::Runtime(format!(
                "cannot index {} with {}",
                type_name(object),
                type_name(index)
            ))),
        }
    }

    fn binary(&mut self, op: BinaryOp, left: &Value, right: &Value) -> Result<Value, InterpError> {
        match op {
            BinaryOp::Add => self.binary_add(left, right),
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                let (Value::Number(l), Value::Number(r)) = (left, right) else {
                    return Err(InterpError::Runtime(format!(
                        "arithmetic requires numbers, got {} and {}",
                        type_name(left),
                        type_name(right)
                    )));
                };
                let result = match op {
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => l / r,
                    BinaryOp::Rem => l % r,
                    _ => unreachable!(),
                };
                Ok(Value::Number(result))
            }
            BinaryOp::Eq => Ok(Value::Bool(values_equal(left, right))),
            BinaryOp::NotEq => Ok(Value::Bool(!values_equal(left, right))),
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                let ordering = match (left, right) {
                    (Value::Number(l), Value::Number(r)) => l.partial_cmp(r),
                    (Value::Str(l), Value::Str(r)) => Some(l.cmp(r)),
                    _ => None,
                };
                let Some(ordering) = ordering else {
                    return Err(InterpError::Runtime(format!(
                        "cannot compare {} with {}",
                        type_name(left),
                        type_name(right)
                    )));
                };
                let result = match op {
                    BinaryOp::Lt => ordering == std::cmp::Ordering::Less,
                    BinaryOp::LtEq => ordering != std::cmp::Ordering::Greater,
                    BinaryOp::Gt => ordering == std::cmp::Ordering::Greater,
                    BinaryOp::GtEq => ordering != std::cmp::Ordering::Less,
                    _ => unreachable!(),
                };
                Ok(Value::Bool(result))
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("short-circuit ops handled in eval"),
        }
    }

    fn binary_add(&mut self, left: &Value, right: &Value) -> Result<Value, InterpError> {
        match (left, right) {
            (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
            (Value::Str(_), _) | (_, Value::Str(_)) => {
                let mut out = self.display(left)?;
                out.push_str(&self.display(right)?);
                self.alloc_str(out)
            }
            _ => Err(InterpError::Runtime(format!(
                "cannot add {} and {}",
                type_name(left),
                type_name(right)
            ))),
        }
    }

    /// Render a value for interpolation or concatenation. Objects are
    /// rejected so broken markup like `[object Object]` never ships.
    fn display(&mut self, value: &Value) -> Result<String, InterpError> {
        match value {
            Value::Null => Ok(String::new()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Number(n) => Ok(display_number(*n)),
            Value::Str(s) => Ok(s.to_string()),
            Value::Array(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items.iter() {
                    self.step()?;
                    parts.push(self.display(item)?);
                }
                Ok(parts.join(","))
            }
            Value::Object(_) => Err(InterpError::Runtime(
                "cannot render an object directly; use its properties".to_string(),
            )),
            Value::Native(native) => Err(InterpError::Runtime(format!(
                "cannot render function {}",
                native.name()
            ))),
        }
    }

    // =========================================================================
    // Injected bindings
    // =========================================================================

    fn build_data(&mut self, config: &Json) -> Result<Value, InterpError> {
        let storefront = self.facade.storefront_view();
        let (user, device) = self.facade.visitor_view();
        let mut map = BTreeMap::new();
        map.insert("storefront".to_string(), self.json_to_value(&storefront)?);
        map.insert("user".to_string(), self.json_to_value(&user)?);
        map.insert("device".to_string(), self.json_to_value(&device)?);
        map.insert("config".to_string(), self.json_to_value(config)?);
        map.insert("getProducts".to_string(), Value::Native(Native::GetProducts));
        map.insert(
            "getCollections".to_string(),
            Value::Native(Native::GetCollections),
        );
        map.insert("getCart".to_string(), Value::Native(Native::GetCart));
        Ok(Value::Object(Rc::new(map)))
    }

    fn build_helpers() -> Value {
        let natives = [
            Native::EscapeHtml,
            Native::FormatPrice,
            Native::FormatDate,
            Native::Slugify,
            Native::Truncate,
            Native::UrlEncode,
            Native::Join,
            Native::Uid,
            Native::SeededRandom,
        ];
        let map: BTreeMap<String, Value> = natives
            .into_iter()
            .map(|n| (n.name().to_string(), Value::Native(n)))
            .collect();
        Value::Object(Rc::new(map))
    }

    fn json_to_value(&mut self, json: &Json) -> Result<Value, InterpError> {
        match json {
            Json::Null => Ok(Value::Null),
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::Number(n) => Ok(Value::Number(n.as_f64().unwrap_or(f64::NAN))),
            Json::String(s) => self.alloc_str(s.clone()),
            Json::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.json_to_value(item)?);
                }
                self.charge(16 * (values.len() as u64 + 1))?;
                Ok(Value::Array(Rc::new(values)))
            }
            Json::Object(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    map.insert(key.clone(), self.json_to_value(value)?);
                }
                self.charge(32 * (map.len() as u64 + 1))?;
                Ok(Value::Object(Rc::new(map)))
            }
        }
    }

    // =========================================================================
    // Native dispatch
    // =========================================================================

    fn call_native(&mut self, native: Native, args: &[Value]) -> Result<Value, InterpError> {
        match native {
            Native::EscapeHtml => {
                let input = self.display(args.first().unwrap_or(&Value::Null))?;
                let escaped = helpers::escape_html(&input);
                self.alloc_str(escaped)
            }
            Native::FormatPrice => {
                let amount = match args.first() {
                    Some(Value::Number(n)) => *n,
                    other => {
                        return Err(InterpError::Runtime(format!(
                            "formatPrice expects a number, got {}",
                            type_name(other.unwrap_or(&Value::Null))
                        )));
                    }
                };
                let currency = match args.get(1) {
                    Some(Value::Str(s)) => s.to_string(),
                    _ => "USD".to_string(),
                };
                let formatted = helpers::format_price(amount, &currency);
                self.alloc_str(formatted)
            }
            Native::FormatDate => {
                let iso = self.str_arg(args, 0, "formatDate")?;
                let pattern = match args.get(1) {
                    Some(Value::Str(s)) => s.to_string(),
                    _ => helpers::DEFAULT_DATE_PATTERN.to_string(),
                };
                let formatted = helpers::format_date(&iso, &pattern);
                self.alloc_str(formatted)
            }
            Native::Slugify => {
                let input = self.display(args.first().unwrap_or(&Value::Null))?;
                let slug = helpers::slugify(&input);
                self.alloc_str(slug)
            }
            Native::Truncate => {
                let input = self.str_arg(args, 0, "truncate")?;
                let max = match args.get(1) {
                    Some(Value::Number(n)) if *n >= 0.0 => {
                        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                        {
                            *n as usize
                        }
                    }
                    _ => {
                        return Err(InterpError::Runtime(
                            "truncate expects (string, maxChars)".to_string(),
                        ));
                    }
                };
                let truncated = helpers::truncate(&input, max);
                self.alloc_str(truncated)
            }
            Native::UrlEncode => {
                let input = self.display(args.first().unwrap_or(&Value::Null))?;
                let encoded = helpers::url_encode(&input);
                self.alloc_str(encoded)
            }
            Native::Join => {
                let Some(Value::Array(items)) = args.first() else {
                    return Err(InterpError::Runtime(
                        "join expects (array, separator)".to_string(),
                    ));
                };
                let separator = match args.get(1) {
                    Some(Value::Str(s)) => s.to_string(),
                    _ => ",".to_string(),
                };
                let items = items.clone();
                let mut parts = Vec::with_capacity(items.len());
                for item in items.iter() {
                    self.step()?;
                    parts.push(self.display(item)?);
                }
                let joined = parts.join(&separator);
                self.alloc_str(joined)
            }
            Native::Uid => {
                let prefix = match args.first() {
                    Some(Value::Str(s)) => s.to_string(),
                    _ => "vf".to_string(),
                };
                self.uid_counter += 1;
                let id = format!("{prefix}-{}", self.uid_counter);
                self.alloc_str(id)
            }
            Native::SeededRandom => Ok(Value::Number(self.rng.random::<f64>())),
            Native::GetProducts => {
                let filters = self.product_filters(args.first())?;
                let products = self
                    .facade
                    .get_products(&filters)
                    .map_err(|e| InterpError::Runtime(e.to_string()))?;
                let mut values = Vec::with_capacity(products.len());
                for product in &products {
                    values.push(self.json_to_value(product)?);
                }
                self.charge(16 * (values.len() as u64 + 1))?;
                Ok(Value::Array(Rc::new(values)))
            }
            Native::GetCollections => {
                let collections = self
                    .facade
                    .get_collections()
                    .map_err(|e| InterpError::Runtime(e.to_string()))?;
                let mut values = Vec::with_capacity(collections.len());
                for collection in &collections {
                    values.push(self.json_to_value(collection)?);
                }
                self.charge(16 * (values.len() as u64 + 1))?;
                Ok(Value::Array(Rc::new(values)))
            }
            Native::GetCart => {
                let cart = self
                    .facade
                    .get_cart()
                    .map_err(|e| InterpError::Runtime(e.to_string()))?;
                self.json_to_value(&cart)
            }
        }
    }

    fn str_arg(&mut self, args: &[Value], i: usize, fn_name: &str) -> Result<String, InterpError> {
        match args.get(i) {
            Some(Value::Str(s)) => Ok(s.to_string()),
            other => Err(InterpError::Runtime(format!(
                "{fn_name} expects a string, got {}",
                type_name(other.unwrap_or(&Value::Null))
            ))),
        }
    }

    fn product_filters(&mut self, arg: Option<&Value>) -> Result<ProductFilters, InterpError> {
        let mut filters = ProductFilters::default();
        let Some(value) = arg else {
            return Ok(filters);
        };
        match value {
            Value::Null => Ok(filters),
            Value::Object(map) => {
                if let Some(Value::Str(handle)) = map.get("collection") {
                    filters.collection = Some(handle.to_string());
                }
                if let Some(Value::Str(tag)) = map.get("tag") {
                    filters.tag = Some(tag.to_string());
                }
                if let Some(Value::Bool(true)) = map.get("available") {
                    filters.available_only = true;
                }
                if let Some(Value::Number(limit)) = map.get("limit") {
                    if *limit >= 0.0 && limit.fract() == 0.0 {
                        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                        {
                            filters.limit = Some(*limit as usize);
                        }
                    }
                }
                Ok(filters)
            }
            other => Err(InterpError::Runtime(format!(
                "getProducts expects a filter object, got {}",
                type_name(other)
            ))),
        }
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0 && !n.is_nan(),
        Value::Str(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) | Value::Native(_) => true,
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(l), Value::Bool(r)) => l == r,
        (Value::Number(l), Value::Number(r)) => l == r,
        (Value::Str(l), Value::Str(r)) => l == r,
        (Value::Array(l), Value::Array(r)) => {
            l.len() == r.len() && l.iter().zip(r.iter()).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(l), Value::Object(r)) => {
            l.len() == r.len()
                && l.iter()
                    .zip(r.iter())
                    .all(|((lk, lv), (rk, rv))| lk == rk && values_equal(lv, rv))
        }
        (Value::Native(l), Value::Native(r)) => l == r,
        _ => false,
    }
}

fn display_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        #[allow(clippy::cast_possible_truncation)]
        let as_int = n as i64;
        as_int.to_string()
    } else {
        n.to_string()
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::Str(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        Value::Native(_) => "function",
    }
}
