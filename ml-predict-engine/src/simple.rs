//! Typed wrapper: dense float features in, score and probability out

use ml_predict_core::{
    DataType, DestinationRecord, Error, FieldGetter, FieldSetter, Member, RecordShape, Result,
    SchemaDefinition, SourceRecord, Value,
};

use crate::batch::PredictionOptions;
use crate::config::EngineConfig;
use crate::model::ModelLoader;
use crate::single::SinglePredictionEngine;

/// One dense feature vector
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureExample {
    /// Feature values, one per slot
    pub features: Vec<f32>,
}

impl RecordShape for FeatureExample {
    fn members() -> Vec<Member> {
        vec![Member::vector("features")]
    }
}

impl SourceRecord for FeatureExample {
    fn getter(member: &str) -> Option<FieldGetter<Self>> {
        match member {
            "features" => Some(|r: &Self| Value::Vector(r.features.clone())),
            _ => None,
        }
    }
}

/// Score and probability of one example
///
/// Either stays `0.0` when the model produces no such column.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoredPrediction {
    /// Raw score
    pub score: f32,
    /// Calibrated probability
    pub probability: f32,
}

impl RecordShape for ScoredPrediction {
    fn members() -> Vec<Member> {
        vec![
            Member::new("score", DataType::Float32),
            Member::new("probability", DataType::Float32),
        ]
    }
}

impl DestinationRecord for ScoredPrediction {
    fn setter(member: &str) -> Option<FieldSetter<Self>> {
        match member {
            "score" => Some(|r: &mut Self, v: Value| {
                r.score = v.as_f32()?;
                Ok(())
            }),
            "probability" => Some(|r: &mut Self, v: Value| {
                r.probability = v.as_f32()?;
                Ok(())
            }),
            _ => None,
        }
    }
}

/// Single-example engine over a fixed-width feature vector
#[derive(Debug)]
pub struct SimplePredictionEngine {
    engine: SinglePredictionEngine<FeatureExample, ScoredPrediction>,
    feature_column: String,
    feature_count: usize,
}

impl SimplePredictionEngine {
    /// Build an engine feeding `feature_count` floats into `feature_column`
    ///
    /// Missing score or probability columns are tolerated whatever
    /// `config.ignore_missing_columns` says.
    pub fn new(
        loader: &dyn ModelLoader,
        feature_column: &str,
        feature_count: usize,
        config: EngineConfig,
    ) -> Result<Self> {
        if feature_count == 0 {
            return Err(Error::InvalidArgument("feature count must be greater than 0".into()));
        }

        let input = SchemaDefinition::new().map_typed(
            "features",
            feature_column,
            DataType::float_vector(feature_count),
        );
        let output = SchemaDefinition::new()
            .map("score", &config.score_column)
            .map("probability", &config.probability_column);
        let options = PredictionOptions::new(config.with_ignore_missing_columns(true))
            .with_input_definition(input)
            .with_output_definition(output);

        Ok(Self {
            engine: SinglePredictionEngine::from_loader(loader, &options)?,
            feature_column: feature_column.to_string(),
            feature_count,
        })
    }

    /// Score one feature vector
    ///
    /// `None` when the model filtered the example out.
    pub fn predict(&self, features: &[f32]) -> Result<Option<ScoredPrediction>> {
        if features.len() != self.feature_count {
            return Err(Error::InvalidArgument(format!(
                "expected {} features, got {}",
                self.feature_count,
                features.len()
            )));
        }
        self.engine.predict(&FeatureExample {
            features: features.to_vec(),
        })
    }

    /// Sparse input is not supported
    pub fn predict_sparse(&self, _indices: &[usize], _values: &[f32]) -> Result<Option<ScoredPrediction>> {
        Err(Error::NotImplemented("sparse feature vectors".into()))
    }

    /// Number of features per example
    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// Column the features are bound to
    pub fn feature_column(&self) -> &str {
        &self.feature_column
    }

    /// The single-example engine beneath
    pub fn engine(&self) -> &SinglePredictionEngine<FeatureExample, ScoredPrediction> {
        &self.engine
    }
}
