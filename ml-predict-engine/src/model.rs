//! Model loading seams and the bincode model artifact
//!
//! Engines only see the [`ModelLoader`] and [`Predictor`] traits. The
//! [`ModelArtifact`] is one loader: a versioned, serde-described list of
//! built-in transforms plus an optional predictor and role mapping.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use ml_predict_core::{Error, RecordBatchTransform, Result, Schema, TransformChain};

use crate::transforms::{AffineNormalize, CopyColumns, DropColumns, DropNonFinite, LinearScorer};

/// Role whose column holds the feature vector
pub const FEATURE_ROLE: &str = "Feature";

/// Column the built-in scorer writes scores to
pub const SCORE_COLUMN: &str = "Score";

/// Column the built-in scorer writes probabilities to
pub const PROBABILITY_COLUMN: &str = "Probability";

/// Artifact format version this crate reads and writes
pub const FORMAT_VERSION: u32 = 1;

/// Which column plays which role for a predictor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMapping {
    roles: BTreeMap<String, String>,
}

impl RoleMapping {
    /// An empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// The mapping used when a model persisted none: features in `column`
    pub fn features(column: &str) -> Self {
        Self::new().with_role(FEATURE_ROLE, column)
    }

    /// Bind `role` to `column`
    #[must_use]
    pub fn with_role(mut self, role: &str, column: &str) -> Self {
        self.roles.insert(role.to_string(), column.to_string());
        self
    }

    /// Column bound to `role`
    pub fn column(&self, role: &str) -> Option<&str> {
        self.roles.get(role).map(String::as_str)
    }

    /// Column bound to the feature role
    pub fn feature_column(&self) -> Result<&str> {
        self.column(FEATURE_ROLE).ok_or_else(|| {
            Error::SchemaMismatch(format!("role mapping has no '{FEATURE_ROLE}' column"))
        })
    }
}

/// A trained predictor able to build the transform that scores rows
pub trait Predictor: Send + Sync + fmt::Debug {
    /// Predictor kind, for logging
    fn name(&self) -> &str;

    /// Scorer over rows of `input`, reading the columns `roles` points at
    fn create_default_scorer(
        &self,
        roles: &RoleMapping,
        input: &Schema,
    ) -> Result<Box<dyn RecordBatchTransform>>;
}

/// Source of a trained pipeline
pub trait ModelLoader {
    /// Transform chain to compose over rows of `input`
    fn load_transforms(&self, input: &Schema) -> Result<TransformChain>;

    /// Predictor, if the model has one
    fn load_predictor(&self) -> Result<Option<Arc<dyn Predictor>>>;

    /// Persisted role mapping, if any
    fn load_role_mapping(&self) -> Result<Option<RoleMapping>>;
}

/// Serialized description of a built-in transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransformStep {
    /// Copy `(source, destination)` columns
    CopyColumns {
        /// Column pairs
        pairs: Vec<(String, String)>,
    },
    /// Drop columns by name
    DropColumns {
        /// Column names
        names: Vec<String>,
    },
    /// Per-slot affine normalization
    AffineNormalize {
        /// Column to normalize
        column: String,
        /// Subtracted per slot
        offsets: Vec<f32>,
        /// Multiplied per slot
        scales: Vec<f32>,
    },
    /// Drop rows with NaN or infinite values
    DropNonFinite {
        /// Column to check
        column: String,
    },
}

impl TransformStep {
    /// Build the transform this step describes
    pub fn build(&self) -> Result<Box<dyn RecordBatchTransform>> {
        Ok(match self {
            TransformStep::CopyColumns { pairs } => Box::new(CopyColumns::new(pairs.clone())),
            TransformStep::DropColumns { names } => Box::new(DropColumns::new(names.clone())),
            TransformStep::AffineNormalize {
                column,
                offsets,
                scales,
            } => Box::new(AffineNormalize::new(column, offsets.clone(), scales.clone())?),
            TransformStep::DropNonFinite { column } => Box::new(DropNonFinite::new(column)),
        })
    }
}

/// Serialized description of a predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PredictorParams {
    /// Logistic regression over the feature vector
    LinearBinary {
        /// One weight per feature slot
        weights: Vec<f32>,
        /// Intercept
        bias: f32,
    },
}

impl PredictorParams {
    /// Build the predictor these parameters describe
    pub fn build(&self) -> Arc<dyn Predictor> {
        match self {
            PredictorParams::LinearBinary { weights, bias } => {
                Arc::new(LinearBinaryPredictor::new(weights.clone(), *bias))
            }
        }
    }
}

/// Linear binary classifier
#[derive(Debug, Clone)]
pub struct LinearBinaryPredictor {
    weights: Arc<[f32]>,
    bias: f32,
}

impl LinearBinaryPredictor {
    /// Create a predictor from weights and bias
    pub fn new(weights: Vec<f32>, bias: f32) -> Self {
        Self {
            weights: weights.into(),
            bias,
        }
    }
}

impl Predictor for LinearBinaryPredictor {
    fn name(&self) -> &str {
        "linear_binary"
    }

    fn create_default_scorer(
        &self,
        roles: &RoleMapping,
        input: &Schema,
    ) -> Result<Box<dyn RecordBatchTransform>> {
        let scorer = LinearScorer::new(roles.feature_column()?, Arc::clone(&self.weights), self.bias);
        scorer.output_schema(input)?;
        Ok(Box::new(scorer))
    }
}

/// A trained pipeline stored as bincode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Format version, checked on read
    pub format_version: u32,

    /// Transforms applied in order
    pub transforms: Vec<TransformStep>,

    /// Optional predictor appended after the transforms
    pub predictor: Option<PredictorParams>,

    /// Optional role mapping for the predictor
    pub role_mapping: Option<RoleMapping>,
}

impl Default for ModelArtifact {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            transforms: Vec::new(),
            predictor: None,
            role_mapping: None,
        }
    }
}

impl ModelArtifact {
    /// An artifact with no transforms and no predictor
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transform
    #[must_use]
    pub fn with_transform(mut self, transform: TransformStep) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Set the predictor
    #[must_use]
    pub fn with_predictor(mut self, predictor: PredictorParams) -> Self {
        self.predictor = Some(predictor);
        self
    }

    /// Set the role mapping
    #[must_use]
    pub fn with_role_mapping(mut self, roles: RoleMapping) -> Self {
        self.role_mapping = Some(roles);
        self
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::checked(bincode::deserialize(bytes)?)
    }

    /// Write to a stream
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    /// Read from a stream
    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        Self::checked(bincode::deserialize_from(reader)?)
    }

    /// Write to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Read from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::read_from(BufReader::new(File::open(path)?))
    }

    fn checked(artifact: Self) -> Result<Self> {
        if artifact.format_version != FORMAT_VERSION {
            return Err(Error::ModelFormat(format!(
                "unsupported format version {} (expected {FORMAT_VERSION})",
                artifact.format_version
            )));
        }
        debug!(
            transforms = artifact.transforms.len(),
            predictor = artifact.predictor.is_some(),
            "model artifact read"
        );
        Ok(artifact)
    }
}

impl ModelLoader for ModelArtifact {
    fn load_transforms(&self, input: &Schema) -> Result<TransformChain> {
        let mut chain = TransformChain::default();
        let mut schema = Arc::new(input.clone());
        for step in &self.transforms {
            let transform = step.build()?;
            schema = transform.output_schema(&schema)?;
            chain.push(transform);
        }
        Ok(chain)
    }

    fn load_predictor(&self) -> Result<Option<Arc<dyn Predictor>>> {
        Ok(self.predictor.as_ref().map(PredictorParams::build))
    }

    fn load_role_mapping(&self) -> Result<Option<RoleMapping>> {
        Ok(self.role_mapping.clone())
    }
}
