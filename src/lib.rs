//! An embeddable interpreter for a small dynamically typed scripting
//! language.
//!
//! Source text runs through a pattern-driven lexer and a combinator-built
//! parser into a concrete syntax tree, which a tree-walking evaluator
//! executes against a registry of host and script-defined functions.
//! Values are boxed with their run-time type, and calls resolve by
//! multi-signature dispatch over that registry.
//!
//! # Examples
//!
//! See [`Interpreter`].

mod builtin;
mod context;
mod dispatch;
mod error;
mod eval;
mod grammar;
mod lexer;
mod parser;
mod scope;
mod token;
mod value;

#[cfg(test)]
mod test_utils;

pub use context::{Interpreter, EVAL_FILENAME};
pub use dispatch::{dispatch, fn0, fn1, fn2, try_fn2, FnEntry, Registry};
pub use error::{EvalError, NewtError, ParseError};
pub use eval::Interrupt;
pub use grammar::{build_grammar, build_lexer};
pub use lexer::{Lexer, Pattern};
pub use parser::{parse, Rule};
pub use token::{Position, Span, Token, TokenKind, TokenPtr};
pub use value::{BoxedValue, CastError, TypeInfo};
