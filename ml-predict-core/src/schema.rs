//! Schema definition for pipeline columns

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Data type for column values
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Boolean type
    Boolean,

    /// 32-bit signed integer
    Int32,

    /// 64-bit signed integer
    Int64,

    /// 32-bit floating point
    Float32,

    /// 64-bit floating point
    Float64,

    /// UTF-8 encoded string
    String,

    /// Fixed-size list of values with a given type
    FixedSizeList(Box<DataType>, usize),
}

impl DataType {
    /// Fixed-size vector of `f32`, the shape used for feature columns
    pub fn float_vector(width: usize) -> Self {
        DataType::FixedSizeList(Box::new(DataType::Float32), width)
    }

    /// Check if this type is a numeric scalar type
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Int32 | DataType::Int64 | DataType::Float32 | DataType::Float64
        )
    }

    /// Width of this type if it is a fixed-size list
    pub fn vector_width(&self) -> Option<usize> {
        match self {
            DataType::FixedSizeList(_, width) => Some(*width),
            _ => None,
        }
    }

    /// Check if values of `other` can be read as values of this type
    ///
    /// Integers widen to wider integers and to floats. Floats never narrow to
    /// integers.
    pub fn compatible_with(&self, other: &DataType) -> bool {
        if self == other {
            return true;
        }

        match (self, other) {
            (DataType::Float32 | DataType::Float64, b) => b.is_numeric(),
            (DataType::Int64, DataType::Int32) => true,
            (DataType::FixedSizeList(a_type, a_len), DataType::FixedSizeList(b_type, b_len)) => {
                a_len == b_len && a_type.compatible_with(b_type)
            }
            _ => false,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "Boolean"),
            DataType::Int32 => write!(f, "Int32"),
            DataType::Int64 => write!(f, "Int64"),
            DataType::Float32 => write!(f, "Float32"),
            DataType::Float64 => write!(f, "Float64"),
            DataType::String => write!(f, "String"),
            DataType::FixedSizeList(item_type, size) => write!(f, "FixedSizeList({item_type}, {size})"),
        }
    }
}

/// A field in a schema, with a name and data type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// Name of the field
    pub name: String,

    /// Data type of the field
    pub data_type: DataType,
}

impl Field {
    /// Create a new field
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
        }
    }

    /// Get the name of this field
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the data type of this field
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.data_type)
    }
}

/// A schema describing the columns flowing through a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Fields in this schema
    fields: Vec<Field>,

    /// Field indices by name for faster lookup
    field_indices: HashMap<String, usize>,
}

impl Schema {
    /// Create a new schema with the given fields
    ///
    /// When two fields share a name the later one wins lookups, matching how
    /// transforms shadow columns they overwrite.
    pub fn new(fields: Vec<Field>) -> Self {
        let mut field_indices = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            field_indices.insert(field.name.clone(), i);
        }

        Self {
            fields,
            field_indices,
        }
    }

    /// Get all fields in this schema
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Get a field by index
    pub fn field(&self, index: usize) -> &Field {
        &self.fields[index]
    }

    /// Get a field by name
    pub fn field_by_name(&self, name: &str) -> Result<&Field> {
        let index = self.index_of(name)?;
        Ok(&self.fields[index])
    }

    /// Get the index of a field by name
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.field_indices
            .get(name)
            .copied()
            .ok_or_else(|| Error::SchemaMismatch(format!("Field not found: {name}")))
    }

    /// Look up the index of a field, returning `None` if absent
    pub fn find(&self, name: &str) -> Option<usize> {
        self.field_indices.get(name).copied()
    }

    /// Check whether a field with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.field_indices.contains_key(name)
    }

    /// Get the number of fields in this schema
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if this schema is empty
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Return a schema with `field` appended, replacing any field of the same name
    pub fn with_field(&self, field: Field) -> Self {
        let mut fields = self.fields.clone();
        match self.find(&field.name) {
            Some(index) => fields[index] = field,
            None => fields.push(field),
        }
        Self::new(fields)
    }

    /// Return a schema without the named fields; unknown names are ignored
    pub fn without(&self, names: &[String]) -> Self {
        let fields = self
            .fields
            .iter()
            .filter(|f| !names.iter().any(|n| n == &f.name))
            .cloned()
            .collect();
        Self::new(fields)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Schema: {} fields", self.fields.len())?;
        for field in &self.fields {
            writeln!(f, "  {field}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(DataType::Float32, DataType::Int64, true; "integers widen to floats")]
    #[test_case(DataType::Float32, DataType::Float64, true; "floats read floats")]
    #[test_case(DataType::Int64, DataType::Int32, true; "integers widen")]
    #[test_case(DataType::Int32, DataType::Int64, false; "integers do not narrow")]
    #[test_case(DataType::Int64, DataType::Float32, false; "floats do not narrow to integers")]
    #[test_case(DataType::float_vector(3), DataType::float_vector(3), true; "same vector")]
    #[test_case(DataType::float_vector(3), DataType::float_vector(4), false; "vector width differs")]
    #[test_case(DataType::Float32, DataType::float_vector(1), false; "scalar vs vector")]
    #[test_case(DataType::String, DataType::Boolean, false; "string vs bool")]
    fn test_compatibility(a: DataType, b: DataType, expected: bool) {
        assert_eq!(a.compatible_with(&b), expected);
    }

    #[test]
    fn test_with_field_replaces_by_name() {
        let schema = Schema::new(vec![
            Field::new("Features", DataType::float_vector(2)),
            Field::new("Label", DataType::Boolean),
        ]);

        let replaced = schema.with_field(Field::new("Label", DataType::Float32));
        assert_eq!(replaced.len(), 2);
        assert_eq!(replaced.field_by_name("Label").unwrap().data_type(), &DataType::Float32);

        let appended = schema.with_field(Field::new("Score", DataType::Float32));
        assert_eq!(appended.len(), 3);
        assert_eq!(appended.index_of("Score").unwrap(), 2);
    }

    #[test]
    fn test_missing_field_is_schema_mismatch() {
        let schema = Schema::new(vec![Field::new("a", DataType::Int32)]);
        assert!(matches!(schema.index_of("b"), Err(Error::SchemaMismatch(_))));
        assert!(schema.find("b").is_none());
    }

    #[test]
    fn test_without_ignores_unknown_names() {
        let schema = Schema::new(vec![
            Field::new("a", DataType::Int32),
            Field::new("b", DataType::Int32),
        ]);
        let trimmed = schema.without(&["a".to_string(), "zzz".to_string()]);
        assert_eq!(trimmed.len(), 1);
        assert_eq!(trimmed.field(0).name(), "b");
    }
}
