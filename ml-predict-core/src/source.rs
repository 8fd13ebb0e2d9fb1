//! Record batch sources feeding a pipeline

use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::{Error, Result};
use crate::record_batch::RecordBatch;
use crate::schema::Schema;

/// A record batch source for the pipeline
pub trait RecordBatchSource: Send + Sync {
    /// Get the schema of this source
    fn schema(&self) -> Arc<Schema>;

    /// Retrieve the next batch of records from this source
    /// Returns None when exhausted
    fn next_batch(&mut self, max_batch_size: usize) -> Result<Option<RecordBatch>>;

    /// Reset the source to start reading from the beginning
    fn reset(&mut self) -> Result<()>;
}

/// An in-memory source whose contents are replaced wholesale on each rebind
///
/// Readers take an `Arc` snapshot when they start scanning, so a rebind never
/// changes rows under an open scanner; it only affects scanners opened later.
#[derive(Debug)]
pub struct InMemorySource {
    /// Schema every bound batch must have
    schema: Arc<Schema>,

    /// The currently bound batch, `None` until the first rebind
    data: RwLock<Option<Arc<RecordBatch>>>,
}

impl InMemorySource {
    /// Create an unbound source with the given schema
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            data: RwLock::new(None),
        }
    }

    /// Get the schema of this source
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Replace the bound batch
    pub fn set_batch(&self, batch: RecordBatch) -> Result<()> {
        if batch.schema().as_ref() != self.schema.as_ref() {
            return Err(Error::SchemaMismatch(format!(
                "batch schema does not match source schema: {}",
                batch.schema()
            )));
        }

        debug!(rows = batch.row_count(), "rebinding in-memory source");
        let mut data = self
            .data
            .write()
            .map_err(|_| Error::InvalidOperation("source buffer lock poisoned".into()))?;
        *data = Some(Arc::new(batch));
        Ok(())
    }

    /// Snapshot of the bound batch
    pub fn snapshot(&self) -> Result<Option<Arc<RecordBatch>>> {
        let data = self
            .data
            .read()
            .map_err(|_| Error::InvalidOperation("source buffer lock poisoned".into()))?;
        Ok(data.clone())
    }

    /// Whether a batch has been bound yet
    pub fn is_bound(&self) -> bool {
        self.data.read().map(|d| d.is_some()).unwrap_or(false)
    }

    /// Open a scanner over the currently bound batch
    ///
    /// An unbound source scans as zero rows.
    pub fn scan(&self) -> Result<BatchScanner> {
        Ok(BatchScanner::new(self.schema.clone(), self.snapshot()?))
    }
}

/// Scans a batch snapshot in chunks
#[derive(Debug, Clone)]
pub struct BatchScanner {
    /// Schema of the scanned rows
    schema: Arc<Schema>,

    /// The snapshot being scanned
    batch: Option<Arc<RecordBatch>>,

    /// Next row to hand out
    offset: usize,
}

impl BatchScanner {
    /// Create a scanner over a snapshot
    pub fn new(schema: Arc<Schema>, batch: Option<Arc<RecordBatch>>) -> Self {
        Self {
            schema,
            batch,
            offset: 0,
        }
    }
}

impl RecordBatchSource for BatchScanner {
    fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    fn next_batch(&mut self, max_batch_size: usize) -> Result<Option<RecordBatch>> {
        if max_batch_size == 0 {
            return Err(Error::InvalidArgument("batch size must be greater than 0".into()));
        }

        let Some(batch) = &self.batch else {
            return Ok(None);
        };
        if self.offset >= batch.row_count() {
            return Ok(None);
        }

        let length = max_batch_size.min(batch.row_count() - self.offset);
        let chunk = if self.offset == 0 && length == batch.row_count() {
            batch.as_ref().clone()
        } else {
            batch.slice(self.offset, length)?
        };
        self.offset += length;

        Ok(Some(chunk))
    }

    fn reset(&mut self) -> Result<()> {
        self.offset = 0;
        Ok(())
    }
}
