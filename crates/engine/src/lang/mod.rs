//! The vibe-code language: syntax tree, lexer, parser, and interpreter.
//!
//! Block code is data, not a language plugin: the parser admits a small
//! deterministic JavaScript subset, and the interpreter evaluates it in a
//! scope where only the two injected bindings (`data`, `helpers`) are
//! reachable. Resource limits are enforced inside the evaluation loop.

pub mod ast;
pub mod interp;
pub mod lexer;
pub mod parser;

pub use ast::{Function, Span};
pub use interp::{InterpError, Value, run};
pub use lexer::LexError;
pub use parser::{ParseError, parse};
