//! Adhesive - runtime-compiled row computations over Arrow
//!
//! Unit source text is compiled at runtime into a [`ComputationUnit`], which
//! the bridge applies to every row of a batch handed over through the Arrow
//! C Data Interface.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use adhesive::{AdhesiveContext, FunctionDefinition};
//! use arrow::array::{ArrayRef, AsArray, Int64Array};
//! use arrow::datatypes::{DataType, Int64Type};
//!
//! let context = AdhesiveContext::new();
//! let function = context
//!     .create_function(
//!         FunctionDefinition::Source(
//!             "unit Sum -> i64 { row.i64(0) + row.i64(1) }".to_string(),
//!         ),
//!         vec![DataType::Int64, DataType::Int64],
//!         DataType::Int64,
//!     )
//!     .unwrap();
//!
//! let a: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3]));
//! let b: ArrayRef = Arc::new(Int64Array::from(vec![10, 20, 30]));
//! let result = function.invoke(&[a, b]).unwrap();
//! assert_eq!(
//!     result.as_primitive::<Int64Type>(),
//!     &Int64Array::from(vec![11, 22, 33])
//! );
//! ```
//!
//! Foreign callers use the `extern "C"` API in [`ffi`] instead.

pub mod context;
pub mod ffi;
pub mod function;
pub mod logging;

pub use context::AdhesiveContext;
pub use function::{AdhesiveFunction, FunctionDefinition};

// Shared types
pub use adhesive_core::{
    AdhesiveError, ComputationUnit, Diagnostic, FnUnit, Position, Result, RowSource, RowView,
    Scalar, ScalarType, Severity,
};

// Configuration
pub use adhesive_config::{AdhesiveConfig, CompilerConfig, ExecutionMode, OptLevel};

// Bridge entry points
pub use adhesive_bridge::{EntryPoint, FfiAddresses, Nullability};
