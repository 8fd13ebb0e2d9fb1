//! Batch prediction engine

use std::borrow::Borrow;
use std::io::Read;
use std::sync::Arc;

use tracing::debug;

use ml_predict_core::{
    DestinationRecord, RecordBatchTransform, Result, Schema, SchemaDefinition, SourceRecord,
    TransformChain,
};

use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::model::{ModelArtifact, ModelLoader, RoleMapping};
use crate::pipe::{PipeEngine, PipeRows};
use crate::pipeline::Pipeline;
use crate::source_buffer::SourceBuffer;

/// Construction options shared by the engines
#[derive(Debug, Clone, Default)]
pub struct PredictionOptions {
    /// Engine configuration
    pub config: EngineConfig,

    /// Execution context; derived from `config` when unset
    pub context: Option<ExecutionContext>,

    /// Member-to-column overrides for the source record
    pub input_definition: Option<SchemaDefinition>,

    /// Member-to-column overrides for the destination record
    pub output_definition: Option<SchemaDefinition>,
}

impl PredictionOptions {
    /// Options with the given configuration
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Run with an explicit execution context
    #[must_use]
    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Map source record members onto columns
    #[must_use]
    pub fn with_input_definition(mut self, definition: SchemaDefinition) -> Self {
        self.input_definition = Some(definition);
        self
    }

    /// Map destination record members onto columns
    #[must_use]
    pub fn with_output_definition(mut self, definition: SchemaDefinition) -> Self {
        self.output_definition = Some(definition);
        self
    }

    fn context(&self) -> Result<ExecutionContext> {
        match self.context {
            Some(context) => Ok(context),
            None => ExecutionContext::from_config(&self.config),
        }
    }
}

/// Runs a trained pipeline over batches of `S`, yielding `D` per output row
///
/// Each [`predict`](Self::predict) replaces the source contents and
/// invalidates every sequence returned earlier. Use one engine per thread of
/// predictions.
#[derive(Debug)]
pub struct BatchPredictionEngine<S, D> {
    buffer: SourceBuffer<S>,
    pipe: PipeEngine<D>,
}

impl<S: SourceRecord, D: DestinationRecord> BatchPredictionEngine<S, D> {
    /// Build an engine from any model loader
    ///
    /// With a predictor, its default scorer is appended after the transforms,
    /// bound to the loaded role mapping or, failing that, to
    /// `default_features_column`.
    pub fn from_loader(loader: &dyn ModelLoader, options: &PredictionOptions) -> Result<Self> {
        options.config.validate()?;
        let buffer = SourceBuffer::<S>::new(options.input_definition.as_ref())?;

        let mut chain = loader.load_transforms(buffer.schema())?;
        if let Some(predictor) = loader.load_predictor()? {
            let roles = match loader.load_role_mapping()? {
                Some(roles) => roles,
                None => RoleMapping::features(&options.config.default_features_column),
            };
            let scorer_input = chain.output_schema(buffer.schema())?;
            debug!(predictor = predictor.name(), ?roles, "appending default scorer");
            chain.push(predictor.create_default_scorer(&roles, &scorer_input)?);
        }

        Self::compose(buffer, chain, options)
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
        options.config.validate()?;
        let buffer = SourceBuffer::<S>::new(options.input_definition.as_ref())?;
        Self::compose(buffer, transforms, options)
    }

    fn compose(buffer: SourceBuffer<S>, chain: TransformChain, options: &PredictionOptions) -> Result<Self> {
        let pipeline = Arc::new(Pipeline::new(
            Arc::clone(buffer.source()),
            chain,
            options.context()?,
            options.config.batch_size,
        )?);
        let adapter = pipeline.as_cursorable::<D>(
            options.config.ignore_missing_columns,
            options.output_definition.as_ref(),
        )?;
        debug!(
            pipeline = %pipeline.id(),
            ignore_missing_columns = options.config.ignore_missing_columns,
            "batch prediction engine ready"
        );

        Ok(Self {
            buffer,
            pipe: PipeEngine::new(adapter),
        })
    }

    /// Predict over `examples`
    ///
    /// `examples` is enumerated exactly once, before this returns. The rows
    /// come back lazily; any sequence from an earlier call becomes stale.
    pub fn predict<I>(&self, examples: I, reuse_row_objects: bool) -> Result<PipeRows<'_, D>>
    where
        I: IntoIterator,
        I::Item: Borrow<S>,
    {
        self.pipe.reset();
        self.buffer.set_data(examples)?;
        self.pipe.run_pipe(reuse_row_objects)
    }

    /// Schema of the source columns
    pub fn input_schema(&self) -> &Arc<Schema> {
        self.buffer.schema()
    }

    /// Schema of the rows the pipeline produces
    pub fn output_schema(&self) -> &Arc<Schema> {
        self.pipeline().output_schema()
    }

    /// The composed pipeline
    pub fn pipeline(&self) -> &Arc<Pipeline> {
        self.pipe.adapter().pipeline()
    }

    /// The pipe engine driving the pipeline
    pub fn pipe(&self) -> &PipeEngine<D> {
        &self.pipe
    }
}
