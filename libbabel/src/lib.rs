//
// lib.rs
// The Babel Compiler
//

//! This library provides the programmatic interface for the Babel
//! compiler. The crate is composed of several modules, each of which
//! roughly corresponds to a single step in the compilation pipeline:
//!
//! * `lexer` performs lexical analysis, tokenization, and the token
//!   rewriting passes (comment elision and semicolon insertion).
//! * `grammar` parses a textual grammar description and computes the
//!   FIRST and FOLLOW sets of its symbols.
//! * `lrtable` builds the canonical LR(1) item collection and the
//!   ACTION/GOTO tables out of a `Grammar`.
//! * `parser` is the shift-reduce driver. It produces a concrete
//!   syntax tree and, via `astgen`, a typed…
//! * `ast`, the Abstract Syntax Tree of a Babel program.
//! * `typing` defines the type universe: primitives, arrays, pointers,
//!   and the implicit coercion rules.
//! * `symbols` holds the local, global, task and label tables.
//! * `ir` is the typed SSA intermediate representation that Babel
//!   programs are lowered to.
//! * `codegen` walks the AST and emits `ir`, synthesizing the program
//!   entry point.
//! * `util` contains miscellaneous helper types and functions.
//! * `error` contains type definitions for uniformly describing
//!   syntactic, semantic, and internal compiler errors.

#![crate_name = "babel"]
#![deny(missing_debug_implementations,
        trivial_numeric_casts,
        unsafe_code,
        unused_import_braces, unused_qualifications)]

#[macro_use]
extern crate lazy_static;
extern crate regex;
extern crate unicode_segmentation;

pub mod util;
#[macro_use]
pub mod error;
pub mod lexer;
pub mod grammar;
pub mod lrtable;
pub mod parser;
pub mod typing;
pub mod symbols;
pub mod ast;
pub mod astgen;
pub mod ir;
pub mod codegen;
