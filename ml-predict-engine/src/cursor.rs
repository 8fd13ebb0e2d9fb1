//! Row cursor over a pipeline, filling typed destination records

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use ml_predict_core::{
    DestinationRecord, Error, FieldSetter, RecordBatch, Result, SchemaDefinition,
};

use crate::pipeline::{BatchStream, Pipeline};

/// A destination member resolved to its column
struct Binding<D> {
    member: &'static str,
    column: usize,
    setter: FieldSetter<D>,
}

/// A pipeline bound to destination records of type `D`
///
/// Member-to-column resolution happens once, here; cursors only index.
pub struct CursorableAdapter<D> {
    pipeline: Arc<Pipeline>,
    bindings: Vec<Binding<D>>,
}

impl<D: DestinationRecord> CursorableAdapter<D> {
    /// Resolve the members of `D` against the pipeline's output schema
    ///
    /// A member without a column is a schema mismatch unless
    /// `ignore_missing_columns` is set, in which case the cursor never writes
    /// it. A column whose type cannot back its member is always a mismatch.
    pub fn new(
        pipeline: Arc<Pipeline>,
        ignore_missing_columns: bool,
        definition: Option<&SchemaDefinition>,
    ) -> Result<Self> {
        let schema = Arc::clone(pipeline.output_schema());
        let members = D::members();
        let resolved = SchemaDefinition::resolve::<D>(definition)?;

        let mut bindings = Vec::with_capacity(resolved.len());
        for (member, resolved) in members.iter().zip(resolved) {
            let Some(column) = schema.find(&resolved.column) else {
                if ignore_missing_columns {
                    warn!(
                        member = member.name,
                        column = %resolved.column,
                        "no column for destination member, leaving it untouched"
                    );
                    continue;
                }
                return Err(Error::SchemaMismatch(format!(
                    "no column '{}' for destination member '{}'",
                    resolved.column, member.name
                )));
            };

            let column_type = schema.field(column).data_type();
            let compatible = member.accepts(column_type)
                && (resolved.data_type.vector_width() == Some(0)
                    || resolved.data_type.compatible_with(column_type));
            if !compatible {
                return Err(Error::SchemaMismatch(format!(
                    "column '{}' of type {} cannot fill member '{}' of type {}",
                    resolved.column, column_type, member.name, resolved.data_type
                )));
            }

            let setter = D::setter(member.name).ok_or_else(|| {
                Error::SchemaMismatch(format!("destination member '{}' has no setter", member.name))
            })?;
            bindings.push(Binding {
                member: member.name,
                column,
                setter,
            });
        }

        Ok(Self { pipeline, bindings })
    }

    /// The pipeline this adapter reads
    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Members the cursor writes, in member order
    pub fn bound_members(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.bindings.iter().map(|b| b.member)
    }

    /// Open a cursor over the pipeline's current source contents
    pub fn get_cursor(&self) -> Result<RowCursor<'_, D>> {
        Ok(RowCursor {
            stream: Some(self.pipeline.open()?),
            bindings: &self.bindings,
            current: None,
            row: 0,
            state: CursorState::BeforeFirst,
        })
    }
}

impl<D> fmt::Debug for CursorableAdapter<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorableAdapter")
            .field("pipeline", &self.pipeline.id())
            .field("members", &self.bindings.iter().map(|b| b.member).collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    BeforeFirst,
    OnRow,
    Done,
}

/// A forward-only cursor over pipeline rows
///
/// The underlying stream is released as soon as the cursor is exhausted or
/// fails, and in any case when the cursor is dropped.
pub struct RowCursor<'a, D> {
    stream: Option<BatchStream<'a>>,
    bindings: &'a [Binding<D>],
    current: Option<RecordBatch>,
    row: usize,
    state: CursorState,
}

impl<D> RowCursor<'_, D> {
    /// Advance to the next row; `false` once the rows are exhausted
    pub fn move_next(&mut self) -> Result<bool> {
        if self.state == CursorState::Done {
            return Ok(false);
        }

        if let Some(batch) = &self.current {
            if self.state == CursorState::OnRow && self.row + 1 < batch.row_count() {
                self.row += 1;
                return Ok(true);
            }
        }

        loop {
            let Some(stream) = self.stream.as_mut() else {
                self.finish();
                return Ok(false);
            };
            match stream.next_transformed() {
                Ok(Some(batch)) if batch.is_empty() => continue,
                Ok(Some(batch)) => {
                    self.current = Some(batch);
                    self.row = 0;
                    self.state = CursorState::OnRow;
                    return Ok(true);
                }
                Ok(None) => {
                    self.finish();
                    return Ok(false);
                }
                Err(e) => {
                    self.finish();
                    return Err(e);
                }
            }
        }
    }

    /// Write the current row's bound columns into `destination`
    ///
    /// Members without a bound column keep whatever value they had.
    pub fn fill(&self, destination: &mut D) -> Result<()> {
        let batch = match (&self.current, self.state) {
            (Some(batch), CursorState::OnRow) => batch,
            _ => {
                return Err(Error::InvalidOperation(
                    "cursor is not positioned on a row".into(),
                ))
            }
        };

        for binding in self.bindings {
            let value = batch.column(binding.column)?.value(self.row)?;
            (binding.setter)(destination, value)?;
        }
        Ok(())
    }

    /// Whether the cursor has been exhausted or failed
    pub fn is_done(&self) -> bool {
        self.state == CursorState::Done
    }

    fn finish(&mut self) {
        self.state = CursorState::Done;
        self.current = None;
        self.stream = None;
    }
}
