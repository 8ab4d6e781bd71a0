//! Entry point selection by result type.

use std::fmt;
use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};

use adhesive_core::{ComputationUnit, Result, RowSource, ScalarType};

use crate::bridge::{compute_batch, run, FfiAddresses, Nullability};

/// One typed bridge entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPoint {
    Int64,
    Int64NonNull,
    Int32,
    Float32,
    Float64,
}

impl EntryPoint {
    pub const ALL: [EntryPoint; 5] = [
        EntryPoint::Int64,
        EntryPoint::Int64NonNull,
        EntryPoint::Int32,
        EntryPoint::Float32,
        EntryPoint::Float64,
    ];

    /// Picks the entry point producing `data_type`.
    ///
    /// Only `Int64` has a non-null variant; other types always use their
    /// nullable entry point.
    pub fn for_data_type(data_type: &DataType, nullable: bool) -> Option<Self> {
        let entry = match ScalarType::from_data_type(data_type)? {
            ScalarType::Int64 if !nullable => EntryPoint::Int64NonNull,
            ScalarType::Int64 => EntryPoint::Int64,
            ScalarType::Int32 => EntryPoint::Int32,
            ScalarType::Float32 => EntryPoint::Float32,
            ScalarType::Float64 => EntryPoint::Float64,
        };
        Some(entry)
    }

    pub fn result_type(&self) -> ScalarType {
        match self {
            EntryPoint::Int64 | EntryPoint::Int64NonNull => ScalarType::Int64,
            EntryPoint::Int32 => ScalarType::Int32,
            EntryPoint::Float32 => ScalarType::Float32,
            EntryPoint::Float64 => ScalarType::Float64,
        }
    }

    pub fn data_type(&self) -> DataType {
        self.result_type().data_type()
    }

    pub fn nullability(&self) -> Nullability {
        match self {
            EntryPoint::Int64NonNull => Nullability::NonNull,
            _ => Nullability::Nullable,
        }
    }

    pub fn is_nullable(&self) -> bool {
        self.nullability().is_nullable()
    }

    pub fn name(&self) -> &'static str {
        match self {
            EntryPoint::Int64 => "compute_int64",
            EntryPoint::Int64NonNull => "compute_int64_non_null",
            EntryPoint::Int32 => "compute_int32",
            EntryPoint::Float32 => "compute_float32",
            EntryPoint::Float64 => "compute_float64",
        }
    }

    /// Runs the entry point in process, without crossing the C interface.
    pub fn compute(&self, unit: &dyn ComputationUnit, source: &RowSource) -> Result<ArrayRef> {
        let nullability = self.nullability();
        let array: ArrayRef = match self {
            EntryPoint::Int64 | EntryPoint::Int64NonNull => {
                Arc::new(compute_batch::<Int64Type>(unit, source, nullability)?)
            }
            EntryPoint::Int32 => Arc::new(compute_batch::<Int32Type>(unit, source, nullability)?),
            EntryPoint::Float32 => {
                Arc::new(compute_batch::<Float32Type>(unit, source, nullability)?)
            }
            EntryPoint::Float64 => {
                Arc::new(compute_batch::<Float64Type>(unit, source, nullability)?)
            }
        };
        Ok(array)
    }

    /// Runs the entry point against raw addresses.
    ///
    /// # Safety
    ///
    /// `addresses` must satisfy the [`FfiAddresses`] contract.
    pub unsafe fn invoke(&self, unit: &dyn ComputationUnit, addresses: FfiAddresses) -> Result<()> {
        match self {
            EntryPoint::Int64 | EntryPoint::Int64NonNull => run::<Int64Type>(*self, unit, addresses),
            EntryPoint::Int32 => run::<Int32Type>(*self, unit, addresses),
            EntryPoint::Float32 => run::<Float32Type>(*self, unit, addresses),
            EntryPoint::Float64 => run::<Float64Type>(*self, unit, addresses),
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests;
