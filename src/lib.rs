//! `rillc`: the front-end and code generator for the Rill systems language.
//!
//! Pipeline: `lexer` + `parser` produce an `ast::Unit`; `cg::Cg` drives the
//! const evaluator (`eval`) and type cache (`tc`) to lower it through a
//! `backend::Backend` implementation. `driver` wires the pieces together for
//! the `rillc` binary.

pub mod arena;
pub mod ast;
pub mod backend;
pub mod cg;
pub mod cv;
pub mod diag;
pub mod driver;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod source;
pub mod symbol;
pub mod tc;
