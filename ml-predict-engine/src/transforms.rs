//! Built-in transforms and the linear scorer

use std::sync::Arc;

use ml_predict_core::{
    Column, ColumnData, DataType, Error, Field, RecordBatch, RecordBatchTransform, Result, Schema,
};

/// Adds each destination column as a copy of its source column
#[derive(Debug, Clone)]
pub struct CopyColumns {
    pairs: Vec<(String, String)>,
}

impl CopyColumns {
    /// Copy `source -> destination` for every pair, in order
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }
}

impl RecordBatchTransform for CopyColumns {
    fn name(&self) -> &str {
        "copy_columns"
    }

    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch> {
        let mut batch = batch;
        for (source, destination) in &self.pairs {
            let copy = batch.column_by_name(source)?.renamed(destination);
            batch = batch.with_column(copy)?;
        }
        Ok(batch)
    }

    fn output_schema(&self, input_schema: &Schema) -> Result<Arc<Schema>> {
        let mut schema = input_schema.clone();
        for (source, destination) in &self.pairs {
            let data_type = schema.field_by_name(source)?.data_type().clone();
            schema = schema.with_field(Field::new(destination, data_type));
        }
        Ok(Arc::new(schema))
    }
}

/// Removes columns; names that are not present are ignored
#[derive(Debug, Clone)]
pub struct DropColumns {
    names: Vec<String>,
}

impl DropColumns {
    /// Drop the named columns
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }
}

impl RecordBatchTransform for DropColumns {
    fn name(&self) -> &str {
        "drop_columns"
    }

    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch> {
        Ok(batch.without_columns(&self.names))
    }

    fn output_schema(&self, input_schema: &Schema) -> Result<Arc<Schema>> {
        Ok(Arc::new(input_schema.without(&self.names)))
    }
}

/// `(x - offset) * scale`, slot by slot, over a float or float vector column
#[derive(Debug, Clone)]
pub struct AffineNormalize {
    column: String,
    offsets: Vec<f32>,
    scales: Vec<f32>,
}

impl AffineNormalize {
    /// Normalize `column` with one offset and scale per slot
    pub fn new(column: &str, offsets: Vec<f32>, scales: Vec<f32>) -> Result<Self> {
        if offsets.len() != scales.len() || offsets.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "normalizer for '{column}' needs matching, non-empty offsets and scales ({} vs {})",
                offsets.len(),
                scales.len()
            )));
        }
        Ok(Self {
            column: column.to_string(),
            offsets,
            scales,
        })
    }

    fn check(&self, data_type: &DataType) -> Result<()> {
        let width = match data_type {
            DataType::Float32 => 1,
            DataType::FixedSizeList(item, width) if **item == DataType::Float32 => *width,
            other => {
                return Err(Error::SchemaMismatch(format!(
                    "cannot normalize column '{}' of type {other}",
                    self.column
                )))
            }
        };
        if width != self.offsets.len() {
            return Err(Error::SchemaMismatch(format!(
                "column '{}' has {width} slots, normalizer has {}",
                self.column,
                self.offsets.len()
            )));
        }
        Ok(())
    }

    fn apply(&self, values: &[f32]) -> Vec<f32> {
        let width = self.offsets.len();
        values
            .iter()
            .enumerate()
            .map(|(i, x)| (x - self.offsets[i % width]) * self.scales[i % width])
            .collect()
    }
}

impl RecordBatchTransform for AffineNormalize {
    fn name(&self) -> &str {
        "affine_normalize"
    }

    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch> {
        let column = batch.column_by_name(&self.column)?;
        self.check(column.data_type())?;

        let data = match column.data() {
            ColumnData::Float32(values) => ColumnData::Float32(self.apply(values)),
            ColumnData::FloatVector { values, width } => ColumnData::FloatVector {
                values: self.apply(values),
                width: *width,
            },
            _ => {
                return Err(Error::SchemaMismatch(format!(
                    "cannot normalize column '{}'",
                    self.column
                )))
            }
        };
        let normalized = Column::new(&self.column, data)?;
        batch.with_column(normalized)
    }

    fn output_schema(&self, input_schema: &Schema) -> Result<Arc<Schema>> {
        self.check(input_schema.field_by_name(&self.column)?.data_type())?;
        Ok(Arc::new(input_schema.clone()))
    }
}

/// Drops rows whose float column holds a NaN or infinity in any slot
#[derive(Debug, Clone)]
pub struct DropNonFinite {
    column: String,
}

impl DropNonFinite {
    /// Filter on `column`
    pub fn new(column: &str) -> Self {
        Self {
            column: column.to_string(),
        }
    }

    fn check(&self, data_type: &DataType) -> Result<()> {
        match data_type {
            DataType::Float32 | DataType::Float64 => Ok(()),
            DataType::FixedSizeList(item, _) if **item == DataType::Float32 => Ok(()),
            other => Err(Error::SchemaMismatch(format!(
                "cannot filter non-finite values of column '{}' of type {other}",
                self.column
            ))),
        }
    }
}

impl RecordBatchTransform for DropNonFinite {
    fn name(&self) -> &str {
        "drop_non_finite"
    }

    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch> {
        let column = batch.column_by_name(&self.column)?;
        self.check(column.data_type())?;
        let keep: Vec<usize> = match column.data() {
            ColumnData::Float32(v) => (0..v.len()).filter(|&i| v[i].is_finite()).collect(),
            ColumnData::Float64(v) => (0..v.len()).filter(|&i| v[i].is_finite()).collect(),
            ColumnData::FloatVector { values, width } => values
                .chunks(*width)
                .enumerate()
                .filter(|(_, row)| row.iter().all(|x| x.is_finite()))
                .map(|(i, _)| i)
                .collect(),
            _ => (0..batch.row_count()).collect(),
        };

        if keep.len() == batch.row_count() {
            return Ok(batch);
        }
        batch.take(&keep)
    }

    fn output_schema(&self, input_schema: &Schema) -> Result<Arc<Schema>> {
        self.check(input_schema.field_by_name(&self.column)?.data_type())?;
        Ok(Arc::new(input_schema.clone()))
    }
}

/// Appends a linear score and its logistic probability
///
/// `score = w · x + b` over a float vector column; `probability` is the
/// sigmoid of the score.
#[derive(Debug, Clone)]
pub struct LinearScorer {
    features: String,
    weights: Arc<[f32]>,
    bias: f32,
    score_column: String,
    probability_column: String,
}

impl LinearScorer {
    /// Score `features` with `weights` and `bias`
    pub fn new(features: &str, weights: Arc<[f32]>, bias: f32) -> Self {
        Self {
            features: features.to_string(),
            weights,
            bias,
            score_column: crate::model::SCORE_COLUMN.to_string(),
            probability_column: crate::model::PROBABILITY_COLUMN.to_string(),
        }
    }

    fn score(&self, x: &[f32]) -> f32 {
        self.weights.iter().zip(x).map(|(w, x)| w * x).sum::<f32>() + self.bias
    }
}

/// Logistic function
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

impl RecordBatchTransform for LinearScorer {
    fn name(&self) -> &str {
        "linear_scorer"
    }

    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch> {
        let column = batch.column_by_name(&self.features)?;
        let ColumnData::FloatVector { values, width } = column.data() else {
            return Err(Error::SchemaMismatch(format!(
                "feature column '{}' is not a float vector",
                self.features
            )));
        };

        let scores: Vec<f32> = values.chunks(*width).map(|x| self.score(x)).collect();
        let probabilities = scores.iter().copied().map(sigmoid).collect();

        batch
            .with_column(Column::from_f32(&self.score_column, scores))?
            .with_column(Column::from_f32(&self.probability_column, probabilities))
    }

    fn output_schema(&self, input_schema: &Schema) -> Result<Arc<Schema>> {
        let data_type = input_schema.field_by_name(&self.features)?.data_type();
        if data_type != &DataType::float_vector(self.weights.len()) {
            return Err(Error::SchemaMismatch(format!(
                "scorer expects '{}' as {}, found {data_type}",
                self.features,
                DataType::float_vector(self.weights.len())
            )));
        }
        Ok(Arc::new(
            input_schema
                .with_field(Field::new(&self.score_column, DataType::Float32))
                .with_field(Field::new(&self.probability_column, DataType::Float32)),
        ))
    }
}
