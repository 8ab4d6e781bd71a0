//! Adhesive Bridge - columnar exchange across the Arrow C Data Interface
//!
//! A bridge call receives four raw addresses: the input schema and array a
//! foreign caller exported, and two caller-allocated output structs. The
//! input is imported, every row is handed to a [`ComputationUnit`], and the
//! results are exported as a new primitive array named `result`.
//!
//! One typed entry point exists per result type:
//!
//! | Entry point | Result | Absent value |
//! |---|---|---|
//! | [`compute_int64`] | `Int64` | null cell |
//! | [`compute_int64_non_null`] | `Int64` | contract violation |
//! | [`compute_int32`] | `Int32` | null cell |
//! | [`compute_float32`] | `Float32` | null cell |
//! | [`compute_float64`] | `Float64` | null cell |
//!
//! Errors returned by the unit are passed through unchanged and leave the
//! output addresses untouched.
//!
//! [`ComputationUnit`]: adhesive_core::ComputationUnit

mod bridge;
mod entry;

pub use bridge::{
    compute_batch, compute_float32, compute_float64, compute_int32, compute_int64,
    compute_int64_non_null, export_output, import_input, FfiAddresses, Nullability,
};
pub use entry::EntryPoint;
