//! Scalar values returned by computation units.

use std::fmt;

use arrow::datatypes::DataType;
use num_traits::NumCast;
use serde::{Deserialize, Serialize};

/// The fixed set of result element types a unit may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Int32,
    Int64,
    Float32,
    Float64,
}

impl ScalarType {
    /// Arrow data type of an output column of this type.
    pub fn data_type(&self) -> DataType {
        match self {
            ScalarType::Int32 => DataType::Int32,
            ScalarType::Int64 => DataType::Int64,
            ScalarType::Float32 => DataType::Float32,
            ScalarType::Float64 => DataType::Float64,
        }
    }

    pub fn from_data_type(data_type: &DataType) -> Option<Self> {
        match data_type {
            DataType::Int32 => Some(ScalarType::Int32),
            DataType::Int64 => Some(ScalarType::Int64),
            DataType::Float32 => Some(ScalarType::Float32),
            DataType::Float64 => Some(ScalarType::Float64),
            _ => None,
        }
    }

    /// Source-language spelling (`i32`, `i64`, `f32`, `f64`).
    pub fn keyword(&self) -> &'static str {
        match self {
            ScalarType::Int32 => "i32",
            ScalarType::Int64 => "i64",
            ScalarType::Float32 => "f32",
            ScalarType::Float64 => "f64",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "i32" => Some(ScalarType::Int32),
            "i64" => Some(ScalarType::Int64),
            "f32" => Some(ScalarType::Float32),
            "f64" => Some(ScalarType::Float64),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, ScalarType::Int32 | ScalarType::Int64)
    }

    /// Whether results of this type may be delivered as `target`.
    ///
    /// Integers go to any type, subject to range. Floats never go to an
    /// integer type.
    pub fn converts_to(&self, target: ScalarType) -> bool {
        self.is_integer() || !target.is_integer()
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A present result value. Absence is expressed as `Option::None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
}

impl Scalar {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Scalar::Int32(_) => ScalarType::Int32,
            Scalar::Int64(_) => ScalarType::Int64,
            Scalar::Float32(_) => ScalarType::Float32,
            Scalar::Float64(_) => ScalarType::Float64,
        }
    }

    /// Narrows the value to `T`, or `None` when it cannot be represented.
    ///
    /// Integer targets reject out-of-range and non-finite values; float to
    /// integer conversion truncates toward zero.
    pub fn cast<T: NumCast>(self) -> Option<T> {
        match self {
            Scalar::Int32(v) => <T as NumCast>::from(v),
            Scalar::Int64(v) => <T as NumCast>::from(v),
            Scalar::Float32(v) => <T as NumCast>::from(v),
            Scalar::Float64(v) => <T as NumCast>::from(v),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int32(v) => write!(f, "{v}i32"),
            Scalar::Int64(v) => write!(f, "{v}i64"),
            Scalar::Float32(v) => write!(f, "{v}f32"),
            Scalar::Float64(v) => write!(f, "{v}f64"),
        }
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int32(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int64(v)
    }
}

impl From<f32> for Scalar {
    fn from(v: f32) -> Self {
        Scalar::Float32(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float64(v)
    }
}
