//! Typed compute entry points.
//!
//! Each takes a unit handle and the four Arrow C Data Interface addresses.
//! The input pair is consumed once the addresses pass the null checks. The
//! output pair is written only when the call returns `ADHESIVE_OK`; the
//! caller then owns it and must invoke both release callbacks.

use arrow::ffi::{FFI_ArrowArray, FFI_ArrowSchema};

use adhesive_bridge::{EntryPoint, FfiAddresses};

use super::context::{handle_arg, AdhesiveUnit};
use super::error::guard;

unsafe fn compute(
    entry: EntryPoint,
    unit: *const AdhesiveUnit,
    addresses: FfiAddresses,
) -> i32 {
    guard(|| {
        // SAFETY: caller contract.
        let unit = unsafe { handle_arg(unit, "unit") }?;
        // SAFETY: caller contract, forwarded to the bridge.
        unsafe { entry.invoke(unit.unit(), addresses) }?;
        Ok(())
    })
}

/// Computes an `Int64` column; absent results become nulls.
///
/// # Safety
///
/// * `unit` must be a live unit handle
/// * the input pointers must reference an exported, unreleased schema and
///   array
/// * the output pointers must reference writable `ArrowSchema` and
///   `ArrowArray` structs
#[no_mangle]
pub unsafe extern "C" fn adhesive_compute_int64(
    unit: *const AdhesiveUnit,
    input_schema: *mut FFI_ArrowSchema,
    input_array: *mut FFI_ArrowArray,
    output_schema: *mut FFI_ArrowSchema,
    output_array: *mut FFI_ArrowArray,
) -> i32 {
    let addresses = FfiAddresses::new(input_schema, input_array, output_schema, output_array);
    compute(EntryPoint::Int64, unit, addresses)
}

/// Computes an `Int64` column without nulls; an absent result fails the
/// call with `ADHESIVE_ERR_CONTRACT`.
///
/// # Safety
///
/// Same as `adhesive_compute_int64`.
#[no_mangle]
pub unsafe extern "C" fn adhesive_compute_int64_non_null(
    unit: *const AdhesiveUnit,
    input_schema: *mut FFI_ArrowSchema,
    input_array: *mut FFI_ArrowArray,
    output_schema: *mut FFI_ArrowSchema,
    output_array: *mut FFI_ArrowArray,
) -> i32 {
    let addresses = FfiAddresses::new(input_schema, input_array, output_schema, output_array);
    compute(EntryPoint::Int64NonNull, unit, addresses)
}

/// Computes an `Int32` column; absent results become nulls.
///
/// # Safety
///
/// Same as `adhesive_compute_int64`.
#[no_mangle]
pub unsafe extern "C" fn adhesive_compute_int32(
    unit: *const AdhesiveUnit,
    input_schema: *mut FFI_ArrowSchema,
    input_array: *mut FFI_ArrowArray,
    output_schema: *mut FFI_ArrowSchema,
    output_array: *mut FFI_ArrowArray,
) -> i32 {
    let addresses = FfiAddresses::new(input_schema, input_array, output_schema, output_array);
    compute(EntryPoint::Int32, unit, addresses)
}

/// Computes a `Float32` column; absent results become nulls.
///
/// # Safety
///
/// Same as `adhesive_compute_int64`.
#[no_mangle]
pub unsafe extern "C" fn adhesive_compute_float32(
    unit: *const AdhesiveUnit,
    input_schema: *mut FFI_ArrowSchema,
    input_array: *mut FFI_ArrowArray,
    output_schema: *mut FFI_ArrowSchema,
    output_array: *mut FFI_ArrowArray,
) -> i32 {
    let addresses = FfiAddresses::new(input_schema, input_array, output_schema, output_array);
    compute(EntryPoint::Float32, unit, addresses)
}

/// Computes a `Float64` column; absent results become nulls.
///
/// # Safety
///
/// Same as `adhesive_compute_int64`.
#[no_mangle]
pub unsafe extern "C" fn adhesive_compute_float64(
    unit: *const AdhesiveUnit,
    input_schema: *mut FFI_ArrowSchema,
    input_array: *mut FFI_ArrowArray,
    output_schema: *mut FFI_ArrowSchema,
    output_array: *mut FFI_ArrowArray,
) -> i32 {
    let addresses = FfiAddresses::new(input_schema, input_array, output_schema, output_array);
    compute(EntryPoint::Float64, unit, addresses)
}
