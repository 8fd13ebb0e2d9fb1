//! Single-example prediction engine

use std::io::Read;

use ml_predict_core::{DestinationRecord, Error, Result, SourceRecord, TransformChain};

use crate::batch::{BatchPredictionEngine, PredictionOptions};
use crate::context::ExecutionContext;
use crate::model::{ModelArtifact, ModelLoader};

/// Predicts one example at a time, expecting at most one output row
///
/// The pipeline beneath always runs on the calling thread, whatever the
/// configured concurrency.
#[derive(Debug)]
pub struct SinglePredictionEngine<S, D> {
    engine: BatchPredictionEngine<S, D>,
}

impl<S: SourceRecord, D: DestinationRecord> SinglePredictionEngine<S, D> {
    /// Build an engine from any model loader
    pub fn from_loader(loader: &dyn ModelLoader, options: &PredictionOptions) -> Result<Self> {
        let engine = BatchPredictionEngine::from_loader(loader, &single_threaded(options))?;
        Ok(Self { engine })
    }

    /// Build an engine from a model artifact
    pub fn from_artifact(artifact: &ModelArtifact, options: &PredictionOptions) -> Result<Self> {
        Self::from_loader(artifact, options)
    }

    /// Build an engine from a serialized model artifact
    pub fn from_reader<R: Read>(reader: R, options: &PredictionOptions) -> Result<Self> {
        Self::from_artifact(&ModelArtifact::read_from(reader)?, options)
    }

    /// Build an engine that runs `transforms` with no scorer
    pub fn from_transforms(transforms: TransformChain, options: &PredictionOptions) -> Result<Self> {
        let engine = BatchPredictionEngine::from_transforms(transforms, &single_threaded(options))?;
        Ok(Self { engine })
    }

    /// Predict for one example
    ///
    /// `None` when the pipeline filtered the example out. Fails with
    /// [`Error::MultipleResults`] if the pipeline produced a second row; no
    /// further rows are read.
    pub fn predict(&self, example: &S) -> Result<Option<D>> {
        let mut rows = self.engine.predict(std::iter::once(example), true)?;
        if rows.advance()?.is_none() {
            return Ok(None);
        }
        let first = rows.take_current();
        if rows.advance()?.is_some() {
            return Err(Error::MultipleResults);
        }
        Ok(first)
    }

    /// The batch engine beneath
    pub fn engine(&self) -> &BatchPredictionEngine<S, D> {
        &self.engine
    }
}

fn single_threaded(options: &PredictionOptions) -> PredictionOptions {
    options.clone().with_context(ExecutionContext::single_threaded())
}
