//! Python-subset syntax model: lexer, parser, AST, and source printer.
//!
//! The subset covers the statement and expression forms mutation operators
//! target (comparisons, arithmetic, boolean logic, literals, returns) plus
//! enough surrounding grammar to parse ordinary library modules: functions,
//! classes, control flow, assignments, imports, asserts. Files using grammar
//! outside the subset fail to parse and are skipped with a warning upstream.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod printer;

pub use ast::{
    BinOpKind, BoolOpKind, CmpOpKind, ExceptHandler, Expr, ImportName, Loc, Module, Param,
    ParamKind, Stmt, UnaryOpKind, WithItem,
};
pub use parser::parse_module;
pub use printer::{print_expr, print_module, print_stmt};

use thiserror::Error;

/// A lexing or parsing failure with its source position.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message} at line {line}, column {col}")]
pub struct SyntaxError {
    pub message: String,
    pub line: u32,
    pub col: u32,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: u32, col: u32) -> Self {
        Self {
            message: message.into(),
            line,
            col,
        }
    }
}
