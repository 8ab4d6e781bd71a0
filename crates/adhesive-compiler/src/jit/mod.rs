//! JIT compilation of unit programs to native machine code via Cranelift.
//!
//! A loaded unit runs once per input row, so tree walking dominates the cost
//! of large batches; this backend removes it.
//!
//! # Row Layout
//!
//! Each column slot the unit reads occupies one i64 in a flat buffer, next to
//! a parallel byte buffer of null flags. See [`compiler`] for the calling
//! convention.


mod compiler;

pub use compiler::{compile_program, CodegenError, JitFn};
