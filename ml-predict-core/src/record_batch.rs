//! Record batch implementation for columnar data processing

use std::sync::Arc;

use crate::column::Column;
use crate::error::{Error, Result};
use crate::schema::{Field, Schema};

/// A collection of columns representing a batch of records in columnar format
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    /// Schema describing the data
    schema: Arc<Schema>,

    /// Columns in this batch
    columns: Vec<Column>,

    /// Number of rows in this batch
    row_count: usize,
}

impl RecordBatch {
    /// Create a new record batch with the given schema and columns
    pub fn new(schema: Arc<Schema>, columns: Vec<Column>) -> Result<Self> {
        if columns.len() != schema.fields().len() {
            return Err(Error::InvalidArgument(
                "Number of columns does not match schema".into()
            ));
        }

        // Verify columns match schema
        for (field, column) in schema.fields().iter().zip(&columns) {
            if column.name() != field.name() {
                return Err(Error::InvalidArgument(format!(
                    "Column name mismatch: expected '{}', got '{}'",
                    field.name(), column.name()
                )));
            }

            if column.data_type() != field.data_type() {
                return Err(Error::SchemaMismatch(format!(
                    "Column type mismatch for '{}': expected {}, got {}",
                    field.name(), field.data_type(), column.data_type()
                )));
            }
        }

        // Verify all columns have the same length
        let row_count = columns.first().map_or(0, Column::len);
        if columns.iter().any(|c| c.len() != row_count) {
            return Err(Error::InvalidArgument(
                "All columns must have the same length".into()
            ));
        }

        Ok(Self {
            schema,
            columns,
            row_count,
        })
    }

    /// Create a record batch from columns, deriving the schema from them
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let fields = columns
            .iter()
            .map(|c| Field::new(c.name(), c.data_type().clone()))
            .collect();
        Self::new(Arc::new(Schema::new(fields)), columns)
    }

    /// Get the schema of this batch
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Get the number of rows in this batch
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Get the number of columns in this batch
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Check if this batch is empty
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Get a reference to a column by index
    pub fn column(&self, index: usize) -> Result<&Column> {
        self.columns.get(index).ok_or(Error::IndexOutOfBounds)
    }

    /// Get a reference to a column by name
    pub fn column_by_name(&self, name: &str) -> Result<&Column> {
        let index = self.schema.index_of(name)?;
        self.column(index)
    }

    /// Get all columns
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Slice this batch to a range of rows
    pub fn slice(&self, offset: usize, length: usize) -> Result<Self> {
        if offset + length > self.row_count {
            return Err(Error::IndexOutOfBounds);
        }

        let columns = self
            .columns
            .iter()
            .map(|c| c.slice(offset, length))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            schema: self.schema.clone(),
            columns,
            row_count: length,
        })
    }

    /// Gather rows by index; used by row filters and row expanders
    pub fn take(&self, indices: &[usize]) -> Result<Self> {
        let columns = self
            .columns
            .iter()
            .map(|c| c.take(indices))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            schema: self.schema.clone(),
            columns,
            row_count: indices.len(),
        })
    }

    /// Return a batch with `column` appended, replacing any column of the same name
    pub fn with_column(&self, column: Column) -> Result<Self> {
        if !self.columns.is_empty() && column.len() != self.row_count {
            return Err(Error::InvalidArgument(format!(
                "Column '{}' has {} rows, batch has {}",
                column.name(),
                column.len(),
                self.row_count
            )));
        }

        let row_count = column.len();
        let schema = Arc::new(
            self.schema
                .with_field(Field::new(column.name(), column.data_type().clone())),
        );
        let mut columns = self.columns.clone();
        match self.schema.find(column.name()) {
            Some(index) => columns[index] = column,
            None => columns.push(column),
        }

        Ok(Self {
            schema,
            columns,
            row_count,
        })
    }

    /// Return a batch without the named columns; unknown names are ignored
    pub fn without_columns(&self, names: &[String]) -> Self {
        let columns: Vec<Column> = self
            .columns
            .iter()
            .filter(|c| !names.iter().any(|n| n == c.name()))
            .cloned()
            .collect();

        Self {
            schema: Arc::new(self.schema.without(names)),
            row_count: if columns.is_empty() { 0 } else { self.row_count },
            columns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DataType;
    use crate::value::Value;

    fn batch() -> RecordBatch {
        RecordBatch::from_columns(vec![
            Column::from_vectors("Features", 2, &[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap(),
            Column::from_f32("Label", vec![0.0, 1.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_rejects_ragged_columns() {
        let err = RecordBatch::from_columns(vec![
            Column::from_f32("a", vec![1.0, 2.0]),
            Column::from_f32("b", vec![1.0]),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_rejects_type_mismatch_against_schema() {
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int32)]));
        let err = RecordBatch::new(schema, vec![Column::from_f32("a", vec![1.0])]).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
    }

    #[test]
    fn test_with_column_appends_and_replaces() {
        let with_score = batch().with_column(Column::from_f32("Score", vec![0.5, 0.25])).unwrap();
        assert_eq!(with_score.column_count(), 3);
        assert_eq!(with_score.column_by_name("Score").unwrap().value(1).unwrap(), Value::Float32(0.25));

        let replaced = with_score.with_column(Column::from_f32("Label", vec![7.0, 8.0])).unwrap();
        assert_eq!(replaced.column_count(), 3);
        assert_eq!(replaced.column_by_name("Label").unwrap().value(0).unwrap(), Value::Float32(7.0));
    }

    #[test]
    fn test_with_column_length_checked() {
        let err = batch().with_column(Column::from_f32("Score", vec![0.5])).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_take_and_slice_keep_schema() {
        let b = batch();
        let taken = b.take(&[1, 1, 0]).unwrap();
        assert_eq!(taken.row_count(), 3);
        assert_eq!(taken.schema(), b.schema());

        let sliced = b.slice(1, 1).unwrap();
        assert_eq!(sliced.row_count(), 1);
        assert_eq!(sliced.column_by_name("Label").unwrap().value(0).unwrap(), Value::Float32(1.0));
    }
}
