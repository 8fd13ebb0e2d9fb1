//! Transform trait and chains for record batch transformation

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::record_batch::RecordBatch;
use crate::schema::Schema;

/// A trained transformation over record batches
///
/// Transforms are read-only at prediction time, so one instance serves every
/// cursor opened over a pipeline.
pub trait RecordBatchTransform: Send + Sync {
    /// Short name for logs and errors
    fn name(&self) -> &str;

    /// Transform a record batch
    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch>;

    /// Get the output schema for this transform when applied to the given input schema
    fn output_schema(&self, input_schema: &Schema) -> Result<Arc<Schema>>;
}

/// A chain of transforms that can be executed as a single transform
#[derive(Default)]
pub struct TransformChain {
    /// The transforms in this chain
    transforms: Vec<Box<dyn RecordBatchTransform>>,
}

impl TransformChain {
    /// Create a new transform chain
    pub fn new(transforms: Vec<Box<dyn RecordBatchTransform>>) -> Self {
        Self { transforms }
    }

    /// Append a transform to the end of the chain
    pub fn push(&mut self, transform: Box<dyn RecordBatchTransform>) {
        self.transforms.push(transform);
    }

    /// Get a reference to the transforms in this chain
    pub fn transforms(&self) -> &[Box<dyn RecordBatchTransform>] {
        &self.transforms
    }

    /// Number of transforms in the chain
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Whether the chain is the identity
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl fmt::Debug for TransformChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.transforms.iter().map(|t| t.name())).finish()
    }
}

impl RecordBatchTransform for TransformChain {
    fn name(&self) -> &str {
        "chain"
    }

    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch> {
        let mut current = batch;

        for transform in &self.transforms {
            current = transform.transform(current)?;
        }

        Ok(current)
    }

    fn output_schema(&self, input_schema: &Schema) -> Result<Arc<Schema>> {
        let mut current = Arc::new(input_schema.clone());

        for transform in &self.transforms {
            current = transform.output_schema(&current)?;
        }

        Ok(current)
    }
}
