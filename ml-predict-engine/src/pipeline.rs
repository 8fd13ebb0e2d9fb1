//! A composed prediction pipeline: in-memory source, transform chain, scorer

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};
use uuid::Uuid;

use ml_predict_core::{
    BatchScanner, DestinationRecord, Error, InMemorySource, RecordBatch, RecordBatchSource,
    RecordBatchTransform, Result, Schema, SchemaDefinition, TransformChain,
};

use crate::context::ExecutionContext;
use crate::cursor::CursorableAdapter;

/// A source with a transform chain composed over it
pub struct Pipeline {
    /// Identifier used to correlate log lines
    id: Uuid,

    /// The rebindable source rows are read from
    source: Arc<InMemorySource>,

    /// Transforms (and the scorer, if any) applied to each chunk
    transforms: TransformChain,

    /// Schema of the rows the pipeline produces
    output_schema: Arc<Schema>,

    /// Concurrency for chunk transforms
    context: ExecutionContext,

    /// Rows pulled from the source per chunk
    batch_size: usize,

    /// Number of cursors currently open over this pipeline
    open_cursors: Arc<AtomicUsize>,
}

impl Pipeline {
    /// Compose `transforms` over `source`
    ///
    /// Fails with a schema mismatch if any transform cannot be applied to the
    /// columns produced before it.
    pub fn new(
        source: Arc<InMemorySource>,
        transforms: TransformChain,
        context: ExecutionContext,
        batch_size: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidArgument("batch size must be greater than 0".into()));
        }

        let output_schema = transforms.output_schema(source.schema())?;
        let id = Uuid::new_v4();
        debug!(
            pipeline = %id,
            transforms = ?transforms,
            concurrency = context.concurrency(),
            "composed pipeline"
        );

        Ok(Self {
            id,
            source,
            transforms,
            output_schema,
            context,
            batch_size,
            open_cursors: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Identifier of this pipeline
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The source this pipeline reads
    pub fn source(&self) -> &Arc<InMemorySource> {
        &self.source
    }

    /// The composed transform chain
    pub fn transforms(&self) -> &TransformChain {
        &self.transforms
    }

    /// Schema of the produced rows
    pub fn output_schema(&self) -> &Arc<Schema> {
        &self.output_schema
    }

    /// Execution context of this pipeline
    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    /// Rows pulled from the source per chunk
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of cursors currently open
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::Acquire)
    }

    /// Bind destination records of type `D` to this pipeline's output
    pub fn as_cursorable<D: DestinationRecord>(
        self: &Arc<Self>,
        ignore_missing_columns: bool,
        definition: Option<&SchemaDefinition>,
    ) -> Result<CursorableAdapter<D>> {
        CursorableAdapter::new(Arc::clone(self), ignore_missing_columns, definition)
    }

    /// Open a stream of transformed chunks over the current source contents
    pub fn open(&self) -> Result<BatchStream<'_>> {
        let scanner = self.source.scan()?;
        let guard = CursorGuard::acquire(self.id, &self.open_cursors);
        Ok(BatchStream {
            pipeline: self,
            scanner,
            ready: VecDeque::new(),
            _guard: guard,
        })
    }

    fn transform_chunks(&self, chunks: Vec<RecordBatch>) -> Result<Vec<RecordBatch>> {
        #[cfg(feature = "parallel")]
        if chunks.len() > 1 {
            use rayon::prelude::*;
            return chunks
                .into_par_iter()
                .map(|chunk| self.transforms.transform(chunk))
                .collect();
        }

        chunks
            .into_iter()
            .map(|chunk| self.transforms.transform(chunk))
            .collect()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("transforms", &self.transforms)
            .field("context", &self.context)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

/// Registers an open cursor for as long as it lives
struct CursorGuard {
    pipeline: Uuid,
    open: Arc<AtomicUsize>,
}

impl CursorGuard {
    fn acquire(pipeline: Uuid, open: &Arc<AtomicUsize>) -> Self {
        let count = open.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(pipeline = %pipeline, open = count, "cursor opened");
        Self {
            pipeline,
            open: Arc::clone(open),
        }
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        let count = self.open.fetch_sub(1, Ordering::AcqRel) - 1;
        debug!(pipeline = %self.pipeline, open = count, "cursor released");
    }
}

/// Transformed chunks of a pipeline, in source order
///
/// Holds one registration in the pipeline's open cursor count until dropped.
pub struct BatchStream<'a> {
    pipeline: &'a Pipeline,
    scanner: BatchScanner,
    ready: VecDeque<RecordBatch>,
    _guard: CursorGuard,
}

impl BatchStream<'_> {
    /// Next transformed chunk, or `None` once the source is exhausted
    ///
    /// Up to `concurrency` source chunks are pulled and transformed together;
    /// they are handed out in the order they were read.
    pub fn next_transformed(&mut self) -> Result<Option<RecordBatch>> {
        if let Some(batch) = self.ready.pop_front() {
            return Ok(Some(batch));
        }

        let mut chunks = Vec::with_capacity(self.pipeline.context.concurrency());
        while chunks.len() < self.pipeline.context.concurrency() {
            match self.scanner.next_batch(self.pipeline.batch_size)? {
                Some(chunk) => chunks.push(chunk),
                None => break,
            }
        }
        if chunks.is_empty() {
            return Ok(None);
        }

        let transformed = self.pipeline.transform_chunks(chunks)?;
        for batch in &transformed {
            if batch.schema().as_ref() != self.pipeline.output_schema.as_ref() {
                return Err(Error::SchemaMismatch(format!(
                    "pipeline {} produced a chunk whose schema differs from its declared output",
                    self.pipeline.id
                )));
            }
            trace!(pipeline = %self.pipeline.id, rows = batch.row_count(), "chunk transformed");
        }
        self.ready.extend(transformed);

        Ok(self.ready.pop_front())
    }
}
