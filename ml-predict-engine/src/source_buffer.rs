//! Typed front of the rebindable in-memory source

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use ml_predict_core::{
    ColumnBuilder, DataType, Error, FieldGetter, InMemorySource, RecordBatch, Result, Schema,
    SchemaDefinition, SourceRecord,
};

/// Writes batches of `S` records into an [`InMemorySource`]
///
/// Getters are resolved against the source schema once, at construction.
pub struct SourceBuffer<S> {
    source: Arc<InMemorySource>,
    getters: Vec<(String, DataType, FieldGetter<S>)>,
}

impl<S: SourceRecord> SourceBuffer<S> {
    /// Create an unbound buffer for records of type `S`
    pub fn new(definition: Option<&SchemaDefinition>) -> Result<Self> {
        let schema = SchemaDefinition::source_schema::<S>(definition)?;
        let resolved = SchemaDefinition::resolve::<S>(definition)?;

        let members = S::members();
        if members.is_empty() {
            return Err(Error::SchemaMismatch(
                "source record has no members to bind".into(),
            ));
        }

        let mut getters = Vec::with_capacity(resolved.len());
        for ((field, member), declared) in schema.fields().iter().zip(&resolved).zip(&members) {
            if !declared.feeds(field.data_type()) {
                return Err(Error::SchemaMismatch(format!(
                    "member '{}' of type {} cannot be written to column '{}' of type {}",
                    member.member,
                    declared.data_type,
                    field.name(),
                    field.data_type()
                )));
            }
            let getter = S::getter(member.member).ok_or_else(|| {
                Error::SchemaMismatch(format!("source member '{}' has no getter", member.member))
            })?;
            getters.push((field.name().to_string(), field.data_type().clone(), getter));
        }

        Ok(Self {
            source: Arc::new(InMemorySource::new(Arc::new(schema))),
            getters,
        })
    }

    /// Replace the buffer contents with `examples`
    ///
    /// The examples are enumerated exactly once. Returns the number of rows
    /// bound.
    pub fn set_data<I>(&self, examples: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: Borrow<S>,
    {
        let examples = examples.into_iter();
        let capacity = examples.size_hint().0;

        let mut builders = self
            .getters
            .iter()
            .map(|(name, data_type, _)| ColumnBuilder::new(name, data_type, capacity))
            .collect::<Result<Vec<_>>>()?;

        let mut rows = 0;
        for example in examples {
            let example = example.borrow();
            for ((_, _, getter), builder) in self.getters.iter().zip(builders.iter_mut()) {
                builder.push(&getter(example))?;
            }
            rows += 1;
        }

        let columns = builders
            .into_iter()
            .map(ColumnBuilder::finish)
            .collect::<Result<Vec<_>>>()?;
        self.source
            .set_batch(RecordBatch::new(Arc::clone(self.source.schema()), columns)?)?;

        debug!(rows, "source buffer rebound");
        Ok(rows)
    }

    /// The source pipelines read from
    pub fn source(&self) -> &Arc<InMemorySource> {
        &self.source
    }

    /// Schema of the bound columns
    pub fn schema(&self) -> &Arc<Schema> {
        self.source.schema()
    }
}

impl<S> fmt::Debug for SourceBuffer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceBuffer")
            .field("schema", &self.source.schema().to_string())
            .field("bound", &self.source.is_bound())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_predict_core::{Member, RecordShape, Value};

    #[derive(Debug, Clone)]
    struct Reading {
        sensor: String,
        values: Vec<f32>,
    }

    impl RecordShape for Reading {
        fn members() -> Vec<Member> {
            vec![Member::new("sensor", DataType::String), Member::vector("values")]
        }
    }

    impl SourceRecord for Reading {
        fn getter(member: &str) -> Option<FieldGetter<Self>> {
            match member {
                "sensor" => Some(|r: &Self| Value::from(r.sensor.as_str())),
                "values" => Some(|r: &Self| Value::from(r.values.clone())),
                _ => None,
            }
        }
    }

    fn definition() -> SchemaDefinition {
        SchemaDefinition::new().map_typed("values", "Values", DataType::float_vector(2))
    }

    fn reading(sensor: &str, values: [f32; 2]) -> Reading {
        Reading {
            sensor: sensor.to_string(),
            values: values.to_vec(),
        }
    }

    #[test]
    fn test_unsized_member_without_definition_rejected() {
        assert!(matches!(SourceBuffer::<Reading>::new(None), Err(Error::SchemaMismatch(_))));
    }

    #[test]
    fn test_set_data_replaces_contents() {
        let buffer = SourceBuffer::<Reading>::new(Some(&definition())).unwrap();
        assert!(!buffer.source().is_bound());

        let first = vec![reading("a", [1.0, 2.0]), reading("b", [3.0, 4.0])];
        assert_eq!(buffer.set_data(&first).unwrap(), 2);

        assert_eq!(buffer.set_data([reading("c", [5.0, 6.0])]).unwrap(), 1);
        let batch = buffer.source().snapshot().unwrap().unwrap();
        assert_eq!(batch.row_count(), 1);
        assert_eq!(batch.column_by_name("sensor").unwrap().value(0).unwrap(), Value::from("c"));
        assert_eq!(batch.column_by_name("Values").unwrap().vector(0).unwrap(), &[5.0, 6.0]);
    }

    #[test]
    fn test_empty_input_binds_zero_rows() {
        let buffer = SourceBuffer::<Reading>::new(Some(&definition())).unwrap();
        assert_eq!(buffer.set_data(Vec::<Reading>::new()).unwrap(), 0);
        assert!(buffer.source().is_bound());
    }

    #[test]
    fn test_wrong_vector_width_is_type_mismatch() {
        let buffer = SourceBuffer::<Reading>::new(Some(&definition())).unwrap();
        let bad = Reading {
            sensor: "x".into(),
            values: vec![1.0],
        };
        assert!(matches!(buffer.set_data([bad]), Err(Error::TypeMismatch(_))));
    }

    struct Tick {
        value: f32,
    }

    impl RecordShape for Tick {
        fn members() -> Vec<Member> {
            vec![Member::new("value", DataType::Float32)]
        }
    }

    impl SourceRecord for Tick {
        fn getter(member: &str) -> Option<FieldGetter<Self>> {
            match member {
                "value" => Some(|r: &Self| Value::from(r.value)),
                _ => None,
            }
        }
    }

    struct Unit;

    impl RecordShape for Unit {
        fn members() -> Vec<Member> {
            Vec::new()
        }
    }

    impl SourceRecord for Unit {
        fn getter(_member: &str) -> Option<FieldGetter<Self>> {
            None
        }
    }

    #[test]
    fn test_float_member_into_integer_column_rejected() {
        let definition = SchemaDefinition::new().map_typed("value", "value", DataType::Int64);
        assert!(matches!(
            SourceBuffer::<Tick>::new(Some(&definition)),
            Err(Error::SchemaMismatch(_))
        ));

        let widened = SchemaDefinition::new().map_typed("value", "value", DataType::Float64);
        let buffer = SourceBuffer::<Tick>::new(Some(&widened)).unwrap();
        assert_eq!(buffer.set_data([Tick { value: 0.5 }]).unwrap(), 1);
    }

    #[test]
    fn test_record_without_members_rejected() {
        assert!(matches!(SourceBuffer::<Unit>::new(None), Err(Error::SchemaMismatch(_))));
    }
}
