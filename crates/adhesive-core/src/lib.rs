//! Adhesive Core - shared types for dynamically compiled row computations
//!
//! This crate provides the pieces every other adhesive crate agrees on:
//! - [`ComputationUnit`], the per-row compute contract
//! - [`RowSource`] and [`RowView`] for row-wise access to Arrow columns
//! - [`Scalar`] results and the fixed set of [`ScalarType`]s
//! - [`Diagnostic`]s and the [`AdhesiveError`] type

pub mod diagnostic;
pub mod error;
pub mod row;
pub mod scalar;
pub mod unit;

pub use diagnostic::{has_errors, Diagnostic, Position, Severity};
pub use error::{AdhesiveError, Result};
pub use row::{RowSource, RowView};
pub use scalar::{Scalar, ScalarType};
pub use unit::{ComputationUnit, FnUnit};
