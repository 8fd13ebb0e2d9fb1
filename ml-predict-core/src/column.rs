//! Column implementation for storing typed vectors of data

use crate::error::{Error, Result};
use crate::schema::DataType;
use crate::value::Value;

/// Typed storage backing a column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// Boolean values
    Boolean(Vec<bool>),
    /// 32-bit integers
    Int32(Vec<i32>),
    /// 64-bit integers
    Int64(Vec<i64>),
    /// 32-bit floats
    Float32(Vec<f32>),
    /// 64-bit floats
    Float64(Vec<f64>),
    /// Strings
    String(Vec<String>),
    /// Row-major fixed-size float vectors, `width` slots per row
    FloatVector {
        /// Flattened slots
        values: Vec<f32>,
        /// Slots per row
        width: usize,
    },
}

impl ColumnData {
    fn data_type(&self) -> DataType {
        match self {
            ColumnData::Boolean(_) => DataType::Boolean,
            ColumnData::Int32(_) => DataType::Int32,
            ColumnData::Int64(_) => DataType::Int64,
            ColumnData::Float32(_) => DataType::Float32,
            ColumnData::Float64(_) => DataType::Float64,
            ColumnData::String(_) => DataType::String,
            ColumnData::FloatVector { width, .. } => DataType::float_vector(*width),
        }
    }

    fn len(&self) -> usize {
        match self {
            ColumnData::Boolean(v) => v.len(),
            ColumnData::Int32(v) => v.len(),
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float32(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::String(v) => v.len(),
            ColumnData::FloatVector { values, width } => values.len() / width,
        }
    }
}

/// A named column of data with a specific type
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Name of the column
    name: String,

    /// Data type of the column
    data_type: DataType,

    /// The actual data values
    data: ColumnData,

    /// Number of logical values in this column
    length: usize,
}

impl Column {
    /// Create a new column with the given name and data
    pub fn new(name: &str, data: ColumnData) -> Result<Self> {
        if let ColumnData::FloatVector { values, width } = &data {
            if *width == 0 {
                return Err(Error::InvalidArgument(format!(
                    "Vector column '{name}' must have a non-zero width"
                )));
            }
            if values.len() % width != 0 {
                return Err(Error::InvalidArgument(format!(
                    "Vector column '{name}' has {} slots, not a multiple of width {width}",
                    values.len()
                )));
            }
        }

        Ok(Self {
            name: name.to_string(),
            data_type: data.data_type(),
            length: data.len(),
            data,
        })
    }

    /// Create a `Float32` column
    pub fn from_f32(name: &str, values: Vec<f32>) -> Self {
        let length = values.len();
        Self {
            name: name.to_string(),
            data_type: DataType::Float32,
            data: ColumnData::Float32(values),
            length,
        }
    }

    /// Create a vector column from one vector per row
    pub fn from_vectors(name: &str, width: usize, rows: &[Vec<f32>]) -> Result<Self> {
        let mut values = Vec::with_capacity(rows.len() * width);
        for (row, vector) in rows.iter().enumerate() {
            if vector.len() != width {
                return Err(Error::TypeMismatch(format!(
                    "row {row} of '{name}' has {} values, expected {width}",
                    vector.len()
                )));
            }
            values.extend_from_slice(vector);
        }
        Self::new(name, ColumnData::FloatVector { values, width })
    }

    /// Get the name of this column
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the data type of this column
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Get the typed storage of this column
    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    /// Get the number of values in this column
    pub fn len(&self) -> usize {
        self.length
    }

    /// Check if this column is empty
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Borrow the values of a `Float32` column
    pub fn f32_values(&self) -> Option<&[f32]> {
        match &self.data {
            ColumnData::Float32(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow one row of a vector column
    pub fn vector(&self, row: usize) -> Option<&[f32]> {
        match &self.data {
            ColumnData::FloatVector { values, width } if row < self.length => {
                Some(&values[row * width..(row + 1) * width])
            }
            _ => None,
        }
    }

    /// Materialize the value at `row`
    pub fn value(&self, row: usize) -> Result<Value> {
        if row >= self.length {
            return Err(Error::IndexOutOfBounds);
        }

        Ok(match &self.data {
            ColumnData::Boolean(v) => Value::Boolean(v[row]),
            ColumnData::Int32(v) => Value::Int32(v[row]),
            ColumnData::Int64(v) => Value::Int64(v[row]),
            ColumnData::Float32(v) => Value::Float32(v[row]),
            ColumnData::Float64(v) => Value::Float64(v[row]),
            ColumnData::String(v) => Value::String(v[row].clone()),
            ColumnData::FloatVector { values, width } => {
                Value::Vector(values[row * width..(row + 1) * width].to_vec())
            }
        })
    }

    /// Return a copy of this column under a different name
    pub fn renamed(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }

    /// Slice this column to a range of rows
    pub fn slice(&self, offset: usize, length: usize) -> Result<Self> {
        if offset + length > self.length {
            return Err(Error::IndexOutOfBounds);
        }
        let range = offset..offset + length;

        let data = match &self.data {
            ColumnData::Boolean(v) => ColumnData::Boolean(v[range].to_vec()),
            ColumnData::Int32(v) => ColumnData::Int32(v[range].to_vec()),
            ColumnData::Int64(v) => ColumnData::Int64(v[range].to_vec()),
            ColumnData::Float32(v) => ColumnData::Float32(v[range].to_vec()),
            ColumnData::Float64(v) => ColumnData::Float64(v[range].to_vec()),
            ColumnData::String(v) => ColumnData::String(v[range].to_vec()),
            ColumnData::FloatVector { values, width } => ColumnData::FloatVector {
                values: values[offset * width..(offset + length) * width].to_vec(),
                width: *width,
            },
        };

        Ok(Self {
            name: self.name.clone(),
            data_type: self.data_type.clone(),
            data,
            length,
        })
    }

    /// Gather the given rows, in the given order; indices may repeat
    pub fn take(&self, indices: &[usize]) -> Result<Self> {
        if indices.iter().any(|&i| i >= self.length) {
            return Err(Error::IndexOutOfBounds);
        }

        fn gather<T: Clone>(v: &[T], indices: &[usize]) -> Vec<T> {
            indices.iter().map(|&i| v[i].clone()).collect()
        }

        let data = match &self.data {
            ColumnData::Boolean(v) => ColumnData::Boolean(gather(v, indices)),
            ColumnData::Int32(v) => ColumnData::Int32(gather(v, indices)),
            ColumnData::Int64(v) => ColumnData::Int64(gather(v, indices)),
            ColumnData::Float32(v) => ColumnData::Float32(gather(v, indices)),
            ColumnData::Float64(v) => ColumnData::Float64(gather(v, indices)),
            ColumnData::String(v) => ColumnData::String(gather(v, indices)),
            ColumnData::FloatVector { values, width } => {
                let mut out = Vec::with_capacity(indices.len() * width);
                for &i in indices {
                    out.extend_from_slice(&values[i * width..(i + 1) * width]);
                }
                ColumnData::FloatVector { values: out, width: *width }
            }
        };

        Ok(Self {
            name: self.name.clone(),
            data_type: self.data_type.clone(),
            data,
            length: indices.len(),
        })
    }
}

/// Accumulates values for one column, checking each against the column type
#[derive(Debug)]
pub struct ColumnBuilder {
    name: String,
    data: ColumnData,
}

impl ColumnBuilder {
    /// Create a builder for a column of `data_type` with room for `capacity` rows
    pub fn new(name: &str, data_type: &DataType, capacity: usize) -> Result<Self> {
        let data = match data_type {
            DataType::Boolean => ColumnData::Boolean(Vec::with_capacity(capacity)),
            DataType::Int32 => ColumnData::Int32(Vec::with_capacity(capacity)),
            DataType::Int64 => ColumnData::Int64(Vec::with_capacity(capacity)),
            DataType::Float32 => ColumnData::Float32(Vec::with_capacity(capacity)),
            DataType::Float64 => ColumnData::Float64(Vec::with_capacity(capacity)),
            DataType::String => ColumnData::String(Vec::with_capacity(capacity)),
            DataType::FixedSizeList(item, width) if **item == DataType::Float32 && *width > 0 => {
                ColumnData::FloatVector {
                    values: Vec::with_capacity(capacity * width),
                    width: *width,
                }
            }
            other => {
                return Err(Error::NotImplemented(format!(
                    "column '{name}' of type {other} is not supported"
                )))
            }
        };

        Ok(Self {
            name: name.to_string(),
            data,
        })
    }

    /// Append one value, converting between numeric types where lossless enough
    pub fn push(&mut self, value: &Value) -> Result<()> {
        let name = &self.name;
        match &mut self.data {
            ColumnData::Boolean(v) => v.push(value.as_bool()?),
            ColumnData::Int32(v) => v.push(value.as_i32()?),
            ColumnData::Int64(v) => v.push(value.as_i64()?),
            ColumnData::Float32(v) => v.push(value.as_f32()?),
            ColumnData::Float64(v) => v.push(value.as_f64()?),
            ColumnData::String(v) => v.push(value.as_str()?.to_string()),
            ColumnData::FloatVector { values, width } => {
                let vector = value.as_vector()?;
                if vector.len() != *width {
                    return Err(Error::TypeMismatch(format!(
                        "'{name}' expects {width} values, got {}",
                        vector.len()
                    )));
                }
                values.extend_from_slice(vector);
            }
        }
        Ok(())
    }

    /// Finish the column
    pub fn finish(self) -> Result<Column> {
        Column::new(&self.name, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vectors() -> Column {
        Column::from_vectors("Features", 2, &[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap()
    }

    #[test]
    fn test_vector_column_rows() {
        let column = vectors();
        assert_eq!(column.len(), 3);
        assert_eq!(column.data_type(), &DataType::float_vector(2));
        assert_eq!(column.vector(1), Some(&[3.0, 4.0][..]));
        assert_eq!(column.value(2).unwrap(), Value::Vector(vec![5.0, 6.0]));
        assert!(matches!(column.value(3), Err(Error::IndexOutOfBounds)));
    }

    #[test]
    fn test_take_repeats_and_reorders() {
        let taken = vectors().take(&[2, 0, 0]).unwrap();
        assert_eq!(taken.len(), 3);
        assert_eq!(taken.vector(0), Some(&[5.0, 6.0][..]));
        assert_eq!(taken.vector(2), Some(&[1.0, 2.0][..]));
    }

    #[test]
    fn test_slice_out_of_bounds() {
        assert!(matches!(vectors().slice(2, 2), Err(Error::IndexOutOfBounds)));
        assert_eq!(vectors().slice(1, 2).unwrap().vector(0), Some(&[3.0, 4.0][..]));
    }

    #[test]
    fn test_builder_checks_vector_width() {
        let mut builder = ColumnBuilder::new("Features", &DataType::float_vector(3), 1).unwrap();
        builder.push(&Value::Vector(vec![1.0, 2.0, 3.0])).unwrap();
        let err = builder.push(&Value::Vector(vec![1.0])).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(_)));
        assert_eq!(builder.finish().unwrap().len(), 1);
    }

    #[test]
    fn test_builder_converts_numeric_values() {
        let mut builder = ColumnBuilder::new("x", &DataType::Float64, 2).unwrap();
        builder.push(&Value::Int32(2)).unwrap();
        builder.push(&Value::Float32(0.5)).unwrap();
        let column = builder.finish().unwrap();
        assert_eq!(column.value(0).unwrap(), Value::Float64(2.0));
        assert_eq!(column.value(1).unwrap(), Value::Float64(0.5));
    }

    #[test]
    fn test_zero_width_vector_rejected() {
        let data = ColumnData::FloatVector { values: Vec::new(), width: 0 };
        assert!(matches!(Column::new("v", data), Err(Error::InvalidArgument(_))));
    }
}
