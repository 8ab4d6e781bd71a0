//! Test fixtures for adhesive-compiler.

use crate::expr::Program;
use crate::front::{compile, CheckOptions};

/// Compiles a source text that declares `package t; unit T`.
///
/// # Panics
///
/// Panics with the diagnostics if compilation fails.
pub fn program(source: &str) -> Program {
    let compilation = compile("t.T", source, &CheckOptions::default());
    match compilation.program {
        Some(program) => program,
        None => panic!("compile failed: {:?}", compilation.diagnostics),
    }
}

/// Shorthand for a `package t; unit T -> <result> { <body> }` program.
pub fn unit(result: &str, body: &str) -> Program {
    program(&format!("package t; unit T -> {result} {{ {body} }}"))
}

/// Slot and null buffers for one row, in slot order.
#[derive(Debug, Clone, Default)]
pub struct Row {
    pub slots: Vec<i64>,
    pub nulls: Vec<u8>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn int(mut self, v: i64) -> Self {
        self.slots.push(v);
        self.nulls.push(0);
        self
    }

    pub fn float(mut self, v: f64) -> Self {
        self.slots.push(v.to_bits() as i64);
        self.nulls.push(0);
        self
    }

    pub fn bool(mut self, v: bool) -> Self {
        self.slots.push(v as i64);
        self.nulls.push(0);
        self
    }

    pub fn null(mut self) -> Self {
        self.slots.push(0);
        self.nulls.push(1);
        self
    }
}
