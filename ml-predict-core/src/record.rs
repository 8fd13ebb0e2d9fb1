//! Typed records and their binding to pipeline columns
//!
//! A record type describes its members once through [`RecordShape`] and hands
//! out plain function pointers for reading ([`SourceRecord`]) or writing
//! ([`DestinationRecord`]) each member. Engines resolve those pointers against
//! column indices a single time at construction, so per-row work is an indexed
//! call rather than a name lookup.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::{DataType, Field, Schema};
use crate::value::Value;

/// Reads one member of a source record
pub type FieldGetter<T> = fn(&T) -> Value;

/// Writes one member of a destination record
pub type FieldSetter<T> = fn(&mut T, Value) -> Result<()>;

/// A named member of a record and the column type it maps to by default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Member name, also the default column name
    pub name: &'static str,

    /// Default column type. A float vector of width 0 is unsized: its width
    /// comes from a [`SchemaDefinition`] (source side) or from whatever vector
    /// column it binds to (destination side).
    pub data_type: DataType,
}

impl Member {
    /// Create a new member
    pub const fn new(name: &'static str, data_type: DataType) -> Self {
        Self { name, data_type }
    }

    /// An unsized float vector member
    pub fn vector(name: &'static str) -> Self {
        Self::new(name, DataType::float_vector(0))
    }

    fn is_unsized_vector(&self) -> bool {
        self.data_type.vector_width() == Some(0)
    }

    /// Whether a column of `column_type` can back this member
    pub fn accepts(&self, column_type: &DataType) -> bool {
        if self.is_unsized_vector() {
            return column_type.vector_width().is_some();
        }
        self.data_type.compatible_with(column_type)
    }

    /// Whether values of this member can be written into a column of `column_type`
    pub fn feeds(&self, column_type: &DataType) -> bool {
        if self.is_unsized_vector() {
            return column_type.vector_width().is_some();
        }
        column_type.compatible_with(&self.data_type)
    }
}

/// The member layout of a record type
pub trait RecordShape {
    /// Members in declaration order
    fn members() -> Vec<Member>;
}

/// A record that can be written into the source of a pipeline
pub trait SourceRecord: RecordShape + Sized {
    /// Getter for the named member
    fn getter(member: &str) -> Option<FieldGetter<Self>>;
}

/// A record that pipeline rows are materialized into
pub trait DestinationRecord: RecordShape + Default + Clone {
    /// Setter for the named member
    fn setter(member: &str) -> Option<FieldSetter<Self>>;
}

/// Mapping of one record member onto a column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Record member name
    pub member: String,

    /// Column name in the pipeline
    pub column: String,

    /// Column type override, e.g. to size a vector member
    pub data_type: Option<DataType>,
}

/// Optional overrides of the default member-to-column conventions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    mappings: Vec<ColumnMapping>,
}

/// A member after applying a [`SchemaDefinition`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMember {
    /// Record member name
    pub member: &'static str,

    /// Column name it binds to
    pub column: String,

    /// Column type it binds to
    pub data_type: DataType,
}

impl SchemaDefinition {
    /// Create an empty definition
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `member` onto a column with a different name
    #[must_use]
    pub fn map(mut self, member: &str, column: &str) -> Self {
        self.mappings.push(ColumnMapping {
            member: member.to_string(),
            column: column.to_string(),
            data_type: None,
        });
        self
    }

    /// Map `member` onto a column with a different name and type
    #[must_use]
    pub fn map_typed(mut self, member: &str, column: &str, data_type: DataType) -> Self {
        self.mappings.push(ColumnMapping {
            member: member.to_string(),
            column: column.to_string(),
            data_type: Some(data_type),
        });
        self
    }

    /// Get the mapping for a member, if any
    pub fn mapping(&self, member: &str) -> Option<&ColumnMapping> {
        self.mappings.iter().rev().find(|m| m.member == member)
    }

    /// Get all mappings
    pub fn mappings(&self) -> &[ColumnMapping] {
        &self.mappings
    }

    /// Apply `definition` (if any) to the members of `R`
    pub fn resolve<R: RecordShape>(definition: Option<&Self>) -> Result<Vec<ResolvedMember>> {
        let members = R::members();

        if let Some(definition) = definition {
            if let Some(unknown) = definition
                .mappings
                .iter()
                .find(|m| !members.iter().any(|member| member.name == m.member))
            {
                return Err(Error::SchemaMismatch(format!(
                    "schema definition maps unknown member '{}'",
                    unknown.member
                )));
            }
        }

        members
            .into_iter()
            .map(|member| {
                let mapping = definition.and_then(|d| d.mapping(member.name));
                let column = mapping.map_or(member.name, |m| m.column.as_str());
                if column.is_empty() {
                    return Err(Error::InvalidArgument(format!(
                        "member '{}' is mapped to an empty column name",
                        member.name
                    )));
                }

                let data_type = match mapping.and_then(|m| m.data_type.clone()) {
                    Some(data_type) if member.accepts(&data_type) || member.feeds(&data_type) => {
                        data_type
                    }
                    Some(data_type) => {
                        return Err(Error::SchemaMismatch(format!(
                            "member '{}' of type {} cannot be mapped as {}",
                            member.name, member.data_type, data_type
                        )))
                    }
                    None => member.data_type.clone(),
                };

                Ok(ResolvedMember {
                    member: member.name,
                    column: column.to_string(),
                    data_type,
                })
            })
            .collect()
    }

    /// Schema of the columns a source record type produces
    ///
    /// Every member must have a concrete type here; unsized vectors need a
    /// typed mapping.
    pub fn source_schema<R: RecordShape>(definition: Option<&Self>) -> Result<Schema> {
        let resolved = Self::resolve::<R>(definition)?;
        let mut fields = Vec::with_capacity(resolved.len());
        for member in resolved {
            if member.data_type.vector_width() == Some(0) {
                return Err(Error::SchemaMismatch(format!(
                    "member '{}' needs a vector width from a schema definition",
                    member.member
                )));
            }
            fields.push(Field::new(&member.column, member.data_type));
        }
        Ok(Schema::new(fields))
    }
}
