//! Streaming prediction engines over trained ml-predict pipelines
//!
//! A [`BatchPredictionEngine`] turns a batch of typed source records into a
//! lazy, single-pass sequence of typed destination records by running them
//! through a trained transform chain and scorer. The
//! [`SinglePredictionEngine`] narrows this to one example and at most one
//! result, and the [`SimplePredictionEngine`] fixes the record types to a
//! dense feature vector in and a score/probability pair out.

#![warn(missing_docs)]

pub mod batch;
pub mod config;
pub mod context;
pub mod cursor;
pub mod model;
pub mod pipe;
pub mod pipeline;
pub mod simple;
pub mod single;
pub mod source_buffer;
pub mod transforms;

// Re-export key types for convenience
pub use batch::{BatchPredictionEngine, PredictionOptions};
pub use config::EngineConfig;
pub use context::ExecutionContext;
pub use cursor::{CursorableAdapter, RowCursor};
pub use model::{
    LinearBinaryPredictor, ModelArtifact, ModelLoader, Predictor, PredictorParams, RoleMapping,
    TransformStep,
};
pub use pipe::{PipeEngine, PipeRows};
pub use pipeline::Pipeline;
pub use simple::{FeatureExample, ScoredPrediction, SimplePredictionEngine};
pub use single::SinglePredictionEngine;
pub use source_buffer::SourceBuffer;

pub use ml_predict_core::{Error, Result};

static_assertions::assert_impl_all!(Pipeline: Send, Sync);
static_assertions::assert_impl_all!(SimplePredictionEngine: Send, Sync);
static_assertions::assert_impl_all!(ModelArtifact: Send, Sync);
