//! Unit source front end: lexing, parsing and type checking.

mod ast;
mod check;
mod lexer;
pub mod naming;
mod parser;

use adhesive_core::Diagnostic;

use crate::expr::Program;

pub use check::CheckOptions;
pub use parser::{MAX_EXPR_DEPTH, MAX_NESTING};

/// Result of compiling one source text.
#[derive(Debug, Clone)]
pub struct Compilation {
    /// Present only when no error diagnostic was produced.
    pub program: Option<Program>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Compilation {
    fn failed(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            program: None,
            diagnostics,
        }
    }
}

/// Compiles `source` as the definition of the unit named `qualified_name`.
///
/// Lexical and semantic errors are collected in full; parsing stops at the
/// first syntax error.
pub fn compile(qualified_name: &str, source: &str, options: &CheckOptions) -> Compilation {
    let (tokens, lex_diagnostics) = lexer::tokenize(source);
    if !lex_diagnostics.is_empty() {
        return Compilation::failed(lex_diagnostics);
    }
    let file = match parser::parse(&tokens) {
        Ok(file) => file,
        Err(diagnostic) => return Compilation::failed(vec![diagnostic]),
    };
    let (program, diagnostics) = check::check(&file, qualified_name, options);
    Compilation {
        program,
        diagnostics,
    }
}
