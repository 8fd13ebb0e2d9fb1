//! Single cell values exchanged between records and columns

use crate::error::{Error, Result};
use crate::schema::DataType;

/// One cell of a row: what a record getter produces and a record setter consumes
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean value
    Boolean(bool),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 32-bit float
    Float32(f32),
    /// 64-bit float
    Float64(f64),
    /// UTF-8 string
    String(String),
    /// Fixed-size float vector
    Vector(Vec<f32>),
}

impl Value {
    /// The column type this value naturally belongs to
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Boolean(_) => DataType::Boolean,
            Value::Int32(_) => DataType::Int32,
            Value::Int64(_) => DataType::Int64,
            Value::Float32(_) => DataType::Float32,
            Value::Float64(_) => DataType::Float64,
            Value::String(_) => DataType::String,
            Value::Vector(v) => DataType::float_vector(v.len()),
        }
    }

    /// Read a numeric value as `f32`
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn as_f32(&self) -> Result<f32> {
        match self {
            Value::Float32(v) => Ok(*v),
            Value::Float64(v) => Ok(*v as f32),
            Value::Int32(v) => Ok(*v as f32),
            Value::Int64(v) => Ok(*v as f32),
            other => Err(mismatch("Float32", other)),
        }
    }

    /// Read a numeric value as `f64`
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Value::Float32(v) => Ok(f64::from(*v)),
            Value::Float64(v) => Ok(*v),
            Value::Int32(v) => Ok(f64::from(*v)),
            Value::Int64(v) => Ok(*v as f64),
            other => Err(mismatch("Float64", other)),
        }
    }

    /// Read an integer value as `i32`
    pub fn as_i32(&self) -> Result<i32> {
        match self {
            Value::Int32(v) => Ok(*v),
            Value::Int64(v) => i32::try_from(*v)
                .map_err(|_| Error::TypeMismatch(format!("{v} does not fit in Int32"))),
            other => Err(mismatch("Int32", other)),
        }
    }

    /// Read an integer value as `i64`
    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Value::Int32(v) => Ok(i64::from(*v)),
            Value::Int64(v) => Ok(*v),
            other => Err(mismatch("Int64", other)),
        }
    }

    /// Read a boolean value
    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Boolean(v) => Ok(*v),
            other => Err(mismatch("Boolean", other)),
        }
    }

    /// Borrow a string value
    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::String(v) => Ok(v),
            other => Err(mismatch("String", other)),
        }
    }

    /// Borrow a vector value
    pub fn as_vector(&self) -> Result<&[f32]> {
        match self {
            Value::Vector(v) => Ok(v),
            other => Err(mismatch("FixedSizeList(Float32)", other)),
        }
    }

    /// Take ownership of a vector value
    pub fn into_vector(self) -> Result<Vec<f32>> {
        match self {
            Value::Vector(v) => Ok(v),
            other => Err(mismatch("FixedSizeList(Float32)", &other)),
        }
    }
}

fn mismatch(expected: &str, actual: &Value) -> Error {
    Error::TypeMismatch(format!("expected {expected}, got {}", actual.data_type()))
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<f32>> for Value {
    fn from(v: Vec<f32>) -> Self {
        Value::Vector(v)
    }
}
