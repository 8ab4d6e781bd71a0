//! Import, row iteration and export for one batch.

use std::ptr;

use arrow::array::{make_array, Array, ArrayRef, PrimitiveArray, PrimitiveBuilder};
use arrow::datatypes::{ArrowPrimitiveType, Field};
use arrow::ffi::{from_ffi, FFI_ArrowArray, FFI_ArrowSchema};
use num_traits::NumCast;
use tracing::debug;

use adhesive_core::{AdhesiveError, ComputationUnit, Result, RowSource, Scalar, ScalarType};

use crate::entry::EntryPoint;

/// What an entry point does with an absent result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nullability {
    /// Absent results become null cells.
    Nullable,
    /// Absent results are a contract violation.
    NonNull,
}

impl Nullability {
    pub fn is_nullable(&self) -> bool {
        matches!(self, Nullability::Nullable)
    }
}

/// The four raw addresses of one bridge call.
///
/// # Safety contract
///
/// Every entry point taking `FfiAddresses` requires that:
/// - the input pointers reference a live, exported Arrow C Data Interface
///   schema and array; both are moved out and left released
/// - the output pointers reference writable, suitably aligned storage for one
///   `FFI_ArrowSchema` and one `FFI_ArrowArray`; anything stored there is
///   overwritten without being released
/// - no other thread touches the four structs during the call
#[derive(Debug, Clone, Copy)]
pub struct FfiAddresses {
    pub input_schema: *mut FFI_ArrowSchema,
    pub input_array: *mut FFI_ArrowArray,
    pub output_schema: *mut FFI_ArrowSchema,
    pub output_array: *mut FFI_ArrowArray,
}

impl FfiAddresses {
    pub fn new(
        input_schema: *mut FFI_ArrowSchema,
        input_array: *mut FFI_ArrowArray,
        output_schema: *mut FFI_ArrowSchema,
        output_array: *mut FFI_ArrowArray,
    ) -> Self {
        Self {
            input_schema,
            input_array,
            output_schema,
            output_array,
        }
    }

    /// Builds the addresses from plain machine words.
    pub fn from_raw(
        input_schema: usize,
        input_array: usize,
        output_schema: usize,
        output_array: usize,
    ) -> Self {
        Self::new(
            input_schema as *mut _,
            input_array as *mut _,
            output_schema as *mut _,
            output_array as *mut _,
        )
    }

    fn check(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("input schema", self.input_schema.is_null()),
            ("input array", self.input_array.is_null()),
            ("output schema", self.output_schema.is_null()),
            ("output array", self.output_array.is_null()),
        ]
        .into_iter()
        .filter_map(|(name, is_null)| is_null.then_some(name))
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AdhesiveError::ContractViolation(format!(
                "null address for {}",
                missing.join(", ")
            )))
        }
    }
}

/// Takes ownership of an exported input and imports it.
///
/// Both structs are moved out of their addresses, leaving released markers
/// behind. The imported buffers are released when the returned array and
/// everything derived from it is dropped, on every path.
///
/// # Safety
///
/// `schema` and `array` must satisfy the input half of the
/// [`FfiAddresses`] contract.
pub unsafe fn import_input(
    schema: *mut FFI_ArrowSchema,
    array: *mut FFI_ArrowArray,
) -> Result<ArrayRef> {
    if schema.is_null() || array.is_null() {
        return Err(AdhesiveError::ContractViolation(
            "null input address".to_string(),
        ));
    }
    let ffi_schema = FFI_ArrowSchema::from_raw(schema);
    let ffi_array = FFI_ArrowArray::from_raw(array);
    if ffi_array.is_released() {
        return Err(AdhesiveError::ContractViolation(
            "input array has already been released".to_string(),
        ));
    }
    let data = from_ffi(ffi_array, &ffi_schema)?;
    Ok(make_array(data))
}

/// Exports `array` as a column named `result`.
///
/// # Safety
///
/// `schema` and `out` must satisfy the output half of the [`FfiAddresses`]
/// contract. Ownership of the exported buffers passes to the caller, who must
/// eventually invoke both release callbacks.
pub unsafe fn export_output(
    array: &dyn Array,
    nullable: bool,
    schema: *mut FFI_ArrowSchema,
    out: *mut FFI_ArrowArray,
) -> Result<()> {
    if schema.is_null() || out.is_null() {
        return Err(AdhesiveError::ContractViolation(
            "null output address".to_string(),
        ));
    }
    let field = Field::new("result", array.data_type().clone(), nullable);
    let ffi_schema = FFI_ArrowSchema::try_from(&field)?;
    let ffi_array = FFI_ArrowArray::new(&array.to_data());

    ptr::write(schema, ffi_schema);
    ptr::write(out, ffi_array);
    Ok(())
}

/// Applies `unit` to every row of `source`.
///
/// The output has exactly one cell per input row. Present values are
/// converted to `T::Native`; a float value for an integer type, or a value
/// the target type cannot represent, is a contract violation, as is an
/// absent value under [`Nullability::NonNull`].
/// Errors from the unit are returned unchanged.
pub fn compute_batch<T>(
    unit: &dyn ComputationUnit,
    source: &RowSource,
    nullability: Nullability,
) -> Result<PrimitiveArray<T>>
where
    T: ArrowPrimitiveType,
    T::Native: NumCast,
{
    unit.check_input(source.data_types())?;

    let mut builder = PrimitiveBuilder::<T>::with_capacity(source.num_rows());
    for row in source.rows() {
        match unit.compute(&row)? {
            Some(value) => builder.append_value(narrow::<T>(unit, row.index(), value)?),
            None if nullability.is_nullable() => builder.append_null(),
            None => {
                return Err(AdhesiveError::ContractViolation(format!(
                    "unit `{}` returned no value for row {} of a non-null entry point",
                    unit.name(),
                    row.index()
                )))
            }
        }
    }
    Ok(builder.finish())
}

fn narrow<T>(unit: &dyn ComputationUnit, row: usize, value: Scalar) -> Result<T::Native>
where
    T: ArrowPrimitiveType,
    T::Native: NumCast,
{
    if let Some(target) = ScalarType::from_data_type(&T::DATA_TYPE) {
        if !value.scalar_type().converts_to(target) {
            return Err(AdhesiveError::ContractViolation(format!(
                "unit `{}` returned {value} for row {row}, but {} entry points take integer results",
                unit.name(),
                T::DATA_TYPE
            )));
        }
    }
    value.cast::<T::Native>().ok_or_else(|| {
        AdhesiveError::ContractViolation(format!(
            "unit `{}` returned {value} for row {row}, which is not representable as {}",
            unit.name(),
            T::DATA_TYPE
        ))
    })
}

/// One complete bridge call for `entry`.
pub(crate) unsafe fn run<T>(
    entry: EntryPoint,
    unit: &dyn ComputationUnit,
    addresses: FfiAddresses,
) -> Result<()>
where
    T: ArrowPrimitiveType,
    T::Native: NumCast,
{
    addresses.check()?;
    let input = import_input(addresses.input_schema, addresses.input_array)?;
    let source = RowSource::from_array(&input)?;
    debug!(
        event = "batch_start",
        entry = entry.name(),
        unit = unit.name(),
        rows = source.num_rows(),
        columns = source.num_columns(),
    );

    let output = compute_batch::<T>(unit, &source, entry.nullability()).inspect_err(|err| {
        debug!(
            event = "batch_failed",
            entry = entry.name(),
            unit = unit.name(),
            error = %err,
        );
    })?;
    export_output(
        &output,
        entry.is_nullable(),
        addresses.output_schema,
        addresses.output_array,
    )?;

    debug!(
        event = "batch_end",
        entry = entry.name(),
        unit = unit.name(),
        rows = output.len(),
        nulls = output.null_count(),
    );
    Ok(())
}

/// Computes an `Int64` column; absent results become nulls.
///
/// # Safety
///
/// `addresses` must satisfy the [`FfiAddresses`] contract.
pub unsafe fn compute_int64(unit: &dyn ComputationUnit, addresses: FfiAddresses) -> Result<()> {
    EntryPoint::Int64.invoke(unit, addresses)
}

/// Computes an `Int64` column that may not contain nulls.
///
/// # Safety
///
/// `addresses` must satisfy the [`FfiAddresses`] contract.
pub unsafe fn compute_int64_non_null(
    unit: &dyn ComputationUnit,
    addresses: FfiAddresses,
) -> Result<()> {
    EntryPoint::Int64NonNull.invoke(unit, addresses)
}

/// Computes an `Int32` column; absent results become nulls.
///
/// # Safety
///
/// `addresses` must satisfy the [`FfiAddresses`] contract.
pub unsafe fn compute_int32(unit: &dyn ComputationUnit, addresses: FfiAddresses) -> Result<()> {
    EntryPoint::Int32.invoke(unit, addresses)
}

/// Computes a `Float32` column; absent results become nulls.
///
/// # Safety
///
/// `addresses` must satisfy the [`FfiAddresses`] contract.
pub unsafe fn compute_float32(unit: &dyn ComputationUnit, addresses: FfiAddresses) -> Result<()> {
    EntryPoint::Float32.invoke(unit, addresses)
}

/// Computes a `Float64` column; absent results become nulls.
///
/// # Safety
///
/// `addresses` must satisfy the [`FfiAddresses`] contract.
pub unsafe fn compute_float64(unit: &dyn ComputationUnit, addresses: FfiAddresses) -> Result<()> {
    EntryPoint::Float64.invoke(unit, addresses)
}

#[cfg(test)]
mod tests;
