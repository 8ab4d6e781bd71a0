//! The computation unit contract.

use std::fmt;

use arrow::datatypes::DataType;

use crate::error::Result;
use crate::row::RowView;
use crate::scalar::{Scalar, ScalarType};

/// A loaded piece of logic computing one optional scalar per row.
///
/// Instances are created once and invoked for many batches. Implementations
/// must not depend on the order in which rows are presented; a unit shared
/// between threads must also be free of interior mutation.
pub trait ComputationUnit: Send + Sync + fmt::Debug {
    /// Fully qualified name of the unit.
    fn name(&self) -> &str;

    /// Computes the result for one row. `Ok(None)` is an absent result.
    ///
    /// Errors are returned unchanged to the caller of the bridge.
    fn compute(&self, row: &RowView<'_>) -> Result<Option<Scalar>>;

    /// The result type the unit declares, if it declares one.
    fn result_type(&self) -> Option<ScalarType> {
        None
    }

    /// Validates the input column types before any row is computed.
    fn check_input(&self, _data_types: &[DataType]) -> Result<()> {
        Ok(())
    }
}

/// Adapts a closure into a [`ComputationUnit`].
///
/// ```
/// use adhesive_core::{ComputationUnit, FnUnit, Scalar};
///
/// let unit = FnUnit::new("demo.Sum", |row| {
///     let a = row.get_i64(0)?;
///     let b = row.get_i64(1)?;
///     Ok(a.zip(b).map(|(a, b)| Scalar::Int64(a + b)))
/// });
/// assert_eq!(unit.name(), "demo.Sum");
/// ```
pub struct FnUnit<F> {
    name: String,
    result_type: Option<ScalarType>,
    f: F,
}

impl<F> FnUnit<F>
where
    F: Fn(&RowView<'_>) -> Result<Option<Scalar>> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            result_type: None,
            f,
        }
    }

    pub fn with_result_type(mut self, result_type: ScalarType) -> Self {
        self.result_type = Some(result_type);
        self
    }
}

impl<F> fmt::Debug for FnUnit<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnUnit")
            .field("name", &self.name)
            .field("result_type", &self.result_type)
            .finish_non_exhaustive()
    }
}

impl<F> ComputationUnit for FnUnit<F>
where
    F: Fn(&RowView<'_>) -> Result<Option<Scalar>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn compute(&self, row: &RowView<'_>) -> Result<Option<Scalar>> {
        (self.f)(row)
    }

    fn result_type(&self) -> Option<ScalarType> {
        self.result_type
    }
}
