//! C ABI for foreign hosts.
//!
//! # Design
//!
//! - **Opaque handles**: contexts and units are boxed and passed as pointers;
//!   each has a matching `*_free` function
//! - **Status codes**: every fallible function returns `i32`, `ADHESIVE_OK`
//!   (0) on success
//! - **Thread-local errors**: `adhesive_last_error()` returns the message of
//!   the last failed call on the calling thread
//! - **No unwinding**: panics are caught at the boundary and reported as
//!   `ADHESIVE_ERR_INTERNAL`
//!
//! # Example (C)
//!
//! ```c
//! AdhesiveContext* ctx = NULL;
//! AdhesiveUnit* unit = NULL;
//! adhesive_context_new(NULL, &ctx);
//! if (adhesive_compile(ctx, "demo.Double",
//!         "package demo; unit Double -> i64 { row.i64(0) * 2 }", &unit) != ADHESIVE_OK) {
//!     printf("%s\n", adhesive_last_error());
//! }
//!
//! struct ArrowSchema out_schema;
//! struct ArrowArray out_array;
//! adhesive_compute_int64(unit, &in_schema, &in_array, &out_schema, &out_array);
//!
//! adhesive_unit_free(unit);
//! adhesive_context_free(ctx);
//! ```

mod compute;
mod context;
mod error;

pub use compute::*;
pub use context::*;
pub use error::*;
