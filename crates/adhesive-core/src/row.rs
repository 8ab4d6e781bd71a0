//! Row-wise views over imported Arrow columns.
//!
//! A [`RowSource`] is built once per batch from the input columns; it checks
//! every column type up front and keeps a typed handle per column so that
//! [`RowView`] accessors are a match and an index, no downcasting per row.

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, PrimitiveArray, StructArray};
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type,
    UInt32Type, UInt8Type,
};

use crate::error::{AdhesiveError, Result};

#[derive(Debug, Clone)]
enum TypedColumn {
    Int8(PrimitiveArray<Int8Type>),
    Int16(PrimitiveArray<Int16Type>),
    Int32(PrimitiveArray<Int32Type>),
    Int64(PrimitiveArray<Int64Type>),
    UInt8(PrimitiveArray<UInt8Type>),
    UInt16(PrimitiveArray<UInt16Type>),
    UInt32(PrimitiveArray<UInt32Type>),
    Float32(PrimitiveArray<Float32Type>),
    Float64(PrimitiveArray<Float64Type>),
    Boolean(BooleanArray),
}

impl TypedColumn {
    fn try_new(index: usize, array: &ArrayRef) -> Result<Self> {
        let column = match array.data_type() {
            DataType::Int8 => TypedColumn::Int8(array.as_primitive::<Int8Type>().clone()),
            DataType::Int16 => TypedColumn::Int16(array.as_primitive::<Int16Type>().clone()),
            DataType::Int32 => TypedColumn::Int32(array.as_primitive::<Int32Type>().clone()),
            DataType::Int64 => TypedColumn::Int64(array.as_primitive::<Int64Type>().clone()),
            DataType::UInt8 => TypedColumn::UInt8(array.as_primitive::<UInt8Type>().clone()),
            DataType::UInt16 => TypedColumn::UInt16(array.as_primitive::<UInt16Type>().clone()),
            DataType::UInt32 => TypedColumn::UInt32(array.as_primitive::<UInt32Type>().clone()),
            DataType::Float32 => TypedColumn::Float32(array.as_primitive::<Float32Type>().clone()),
            DataType::Float64 => TypedColumn::Float64(array.as_primitive::<Float64Type>().clone()),
            DataType::Boolean => TypedColumn::Boolean(array.as_boolean().clone()),
            other => {
                return Err(AdhesiveError::SchemaMismatch(format!(
                    "column {index} has unsupported type {other}"
                )))
            }
        };
        Ok(column)
    }

    fn array(&self) -> &dyn Array {
        match self {
            TypedColumn::Int8(a) => a,
            TypedColumn::Int16(a) => a,
            TypedColumn::Int32(a) => a,
            TypedColumn::Int64(a) => a,
            TypedColumn::UInt8(a) => a,
            TypedColumn::UInt16(a) => a,
            TypedColumn::UInt32(a) => a,
            TypedColumn::Float32(a) => a,
            TypedColumn::Float64(a) => a,
            TypedColumn::Boolean(a) => a,
        }
    }
}

/// The columns of one imported batch, ready for row iteration.
#[derive(Debug, Clone)]
pub struct RowSource {
    columns: Vec<TypedColumn>,
    data_types: Vec<DataType>,
    num_rows: usize,
}

impl RowSource {
    /// Builds a source from equally long columns.
    pub fn try_new(columns: &[ArrayRef]) -> Result<Self> {
        let num_rows = columns.first().map(|c| c.len()).unwrap_or(0);
        Self::with_row_count(columns, num_rows)
    }

    /// Builds a source from the children of a struct array.
    ///
    /// Struct-level validity is ignored; each child's own validity decides
    /// whether a cell is null.
    pub fn from_struct(array: &StructArray) -> Result<Self> {
        Self::with_row_count(array.columns(), array.len())
    }

    /// Builds a source from any array: struct arrays contribute their
    /// children, other arrays become a single column.
    pub fn from_array(array: &ArrayRef) -> Result<Self> {
        match array.as_struct_opt() {
            Some(structs) => Self::from_struct(structs),
            None => Self::try_new(std::slice::from_ref(array)),
        }
    }

    fn with_row_count(columns: &[ArrayRef], num_rows: usize) -> Result<Self> {
        let mut typed = Vec::with_capacity(columns.len());
        for (index, column) in columns.iter().enumerate() {
            if column.len() != num_rows {
                return Err(AdhesiveError::SchemaMismatch(format!(
                    "column {index} has {} rows, expected {num_rows}",
                    column.len()
                )));
            }
            typed.push(TypedColumn::try_new(index, column)?);
        }
        Ok(Self {
            data_types: columns.iter().map(|c| c.data_type().clone()).collect(),
            columns: typed,
            num_rows,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn data_types(&self) -> &[DataType] {
        &self.data_types
    }

    /// Returns the view of row `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`num_rows`](Self::num_rows).
    pub fn row(&self, index: usize) -> RowView<'_> {
        assert!(
            index < self.num_rows,
            "row index {index} out of bounds for {} rows",
            self.num_rows
        );
        RowView {
            source: self,
            index,
        }
    }

    /// Iterates rows in order.
    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> + '_ {
        (0..self.num_rows).map(move |index| RowView {
            source: self,
            index,
        })
    }
}

/// Read-only projection of every column at one row index.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    source: &'a RowSource,
    index: usize,
}

impl<'a> RowView<'a> {
    /// Position of this row within its batch.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn num_columns(&self) -> usize {
        self.source.num_columns()
    }

    pub fn data_type(&self, column: usize) -> Result<&'a DataType> {
        self.source
            .data_types
            .get(column)
            .ok_or_else(|| self.out_of_range(column))
    }

    pub fn is_null(&self, column: usize) -> Result<bool> {
        Ok(self.column(column)?.array().is_null(self.index))
    }

    /// Reads any integer column, widened to 64 bits.
    pub fn get_i64(&self, column: usize) -> Result<Option<i64>> {
        let i = self.index;
        let value = match self.column(column)? {
            TypedColumn::Int8(a) => a.is_valid(i).then(|| a.value(i) as i64),
            TypedColumn::Int16(a) => a.is_valid(i).then(|| a.value(i) as i64),
            TypedColumn::Int32(a) => a.is_valid(i).then(|| a.value(i) as i64),
            TypedColumn::Int64(a) => a.is_valid(i).then(|| a.value(i)),
            TypedColumn::UInt8(a) => a.is_valid(i).then(|| a.value(i) as i64),
            TypedColumn::UInt16(a) => a.is_valid(i).then(|| a.value(i) as i64),
            TypedColumn::UInt32(a) => a.is_valid(i).then(|| a.value(i) as i64),
            _ => return Err(self.mismatch(column, "i64")),
        };
        Ok(value)
    }

    /// Reads an integer column that fits 32 bits.
    pub fn get_i32(&self, column: usize) -> Result<Option<i32>> {
        let i = self.index;
        let value = match self.column(column)? {
            TypedColumn::Int8(a) => a.is_valid(i).then(|| a.value(i) as i32),
            TypedColumn::Int16(a) => a.is_valid(i).then(|| a.value(i) as i32),
            TypedColumn::Int32(a) => a.is_valid(i).then(|| a.value(i)),
            TypedColumn::UInt8(a) => a.is_valid(i).then(|| a.value(i) as i32),
            TypedColumn::UInt16(a) => a.is_valid(i).then(|| a.value(i) as i32),
            _ => return Err(self.mismatch(column, "i32")),
        };
        Ok(value)
    }

    /// Reads a floating point column, widened to 64 bits.
    pub fn get_f64(&self, column: usize) -> Result<Option<f64>> {
        let i = self.index;
        let value = match self.column(column)? {
            TypedColumn::Float32(a) => a.is_valid(i).then(|| a.value(i) as f64),
            TypedColumn::Float64(a) => a.is_valid(i).then(|| a.value(i)),
            _ => return Err(self.mismatch(column, "f64")),
        };
        Ok(value)
    }

    pub fn get_f32(&self, column: usize) -> Result<Option<f32>> {
        let i = self.index;
        match self.column(column)? {
            TypedColumn::Float32(a) => Ok(a.is_valid(i).then(|| a.value(i))),
            _ => Err(self.mismatch(column, "f32")),
        }
    }

    pub fn get_bool(&self, column: usize) -> Result<Option<bool>> {
        let i = self.index;
        match self.column(column)? {
            TypedColumn::Boolean(a) => Ok(a.is_valid(i).then(|| a.value(i))),
            _ => Err(self.mismatch(column, "bool")),
        }
    }

    fn column(&self, column: usize) -> Result<&'a TypedColumn> {
        self.source
            .columns
            .get(column)
            .ok_or_else(|| self.out_of_range(column))
    }

    fn out_of_range(&self, column: usize) -> AdhesiveError {
        AdhesiveError::SchemaMismatch(format!(
            "column {column} out of range, row has {} columns",
            self.source.num_columns()
        ))
    }

    fn mismatch(&self, column: usize, requested: &str) -> AdhesiveError {
        AdhesiveError::SchemaMismatch(format!(
            "column {column} of type {} cannot be read as {requested}",
            self.source.data_types[column]
        ))
    }
}
