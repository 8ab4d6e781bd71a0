//! Host-side function wrapper driving the bridge through raw addresses.

use std::fmt;
use std::sync::Arc;

use arrow::array::{make_array, Array, ArrayRef, RecordBatch, StructArray};
use arrow::datatypes::{DataType, Field, Fields};
use arrow::ffi::{from_ffi, to_ffi, FFI_ArrowArray, FFI_ArrowSchema};

use adhesive_bridge::{EntryPoint, FfiAddresses};
use adhesive_core::{AdhesiveError, ComputationUnit, Result};

/// How the unit behind a function is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionDefinition {
    /// Unit source text, compiled under a generated package.
    Source(String),
    /// Name of a unit already compiled or registered natively.
    Name(String),
}

/// A unit bound to fixed input types and a result type.
///
/// Every call exports the input columns, runs the matching entry point on
/// the exported addresses and imports the result, exactly as a foreign
/// caller would.
#[derive(Clone)]
pub struct AdhesiveFunction {
    unit: Arc<dyn ComputationUnit>,
    input_types: Vec<DataType>,
    entry: EntryPoint,
}

impl AdhesiveFunction {
    pub fn new(
        unit: Arc<dyn ComputationUnit>,
        input_types: Vec<DataType>,
        return_type: DataType,
    ) -> Result<Self> {
        if input_types.is_empty() {
            return Err(AdhesiveError::SchemaMismatch(
                "a function needs at least one input column".to_string(),
            ));
        }
        let entry = EntryPoint::for_data_type(&return_type, true).ok_or_else(|| {
            AdhesiveError::SchemaMismatch(format!(
                "return type {return_type} is not supported; expected Int32, Int64, Float32 or Float64"
            ))
        })?;
        if let Some(declared) = unit.result_type() {
            if !declared.converts_to(entry.result_type()) {
                return Err(AdhesiveError::SchemaMismatch(format!(
                    "unit `{}` returns {declared}, which cannot be delivered as {return_type}",
                    unit.name()
                )));
            }
        }
        unit.check_input(&input_types)?;
        Ok(Self {
            unit,
            input_types,
            entry,
        })
    }

    pub fn unit(&self) -> &Arc<dyn ComputationUnit> {
        &self.unit
    }

    pub fn input_types(&self) -> &[DataType] {
        &self.input_types
    }

    pub fn return_type(&self) -> DataType {
        self.entry.data_type()
    }

    pub fn entry_point(&self) -> EntryPoint {
        self.entry
    }

    /// Computes one result per row of `columns`.
    pub fn invoke(&self, columns: &[ArrayRef]) -> Result<ArrayRef> {
        self.check_columns(columns)?;

        let fields: Fields = columns
            .iter()
            .enumerate()
            .map(|(i, column)| Field::new(format!("_c{i}"), column.data_type().clone(), true))
            .collect();
        let input = StructArray::try_new(fields, columns.to_vec(), None)?;
        let (mut input_array, mut input_schema) = to_ffi(&input.to_data())?;
        let mut output_schema = FFI_ArrowSchema::empty();
        let mut output_array = FFI_ArrowArray::empty();

        let addresses = FfiAddresses::new(
            &mut input_schema,
            &mut input_array,
            &mut output_schema,
            &mut output_array,
        );
        // SAFETY: all four structs are live locals for the whole call; the
        // input pair was just exported and the output pair is empty.
        unsafe { self.entry.invoke(self.unit.as_ref(), addresses)? };

        // SAFETY: the entry point succeeded, so the output pair holds an
        // exported array whose ownership now returns to us.
        let data = unsafe { from_ffi(output_array, &output_schema)? };
        Ok(make_array(data))
    }

    /// Computes one result per row of `batch`.
    pub fn invoke_batch(&self, batch: &RecordBatch) -> Result<ArrayRef> {
        self.invoke(batch.columns())
    }

    fn check_columns(&self, columns: &[ArrayRef]) -> Result<()> {
        if columns.len() != self.input_types.len() {
            return Err(AdhesiveError::SchemaMismatch(format!(
                "function `{}` takes {} columns, got {}",
                self.unit.name(),
                self.input_types.len(),
                columns.len()
            )));
        }
        for (index, (column, expected)) in columns.iter().zip(&self.input_types).enumerate() {
            if column.data_type() != expected {
                return Err(AdhesiveError::SchemaMismatch(format!(
                    "function `{}` expects column {index} as {expected}, got {}",
                    self.unit.name(),
                    column.data_type()
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for AdhesiveFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdhesiveFunction")
            .field("unit", &self.unit.name())
            .field("input_types", &self.input_types)
            .field("entry", &self.entry)
            .finish()
    }
}
