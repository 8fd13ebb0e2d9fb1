//! End-to-end behavior of the prediction engines

use std::sync::Arc;

use anyhow::Result;
use proptest::prelude::*;

use ml_predict_core::{
    DataType, DestinationRecord, FieldGetter, FieldSetter, Member, RecordBatch,
    RecordBatchTransform, RecordShape, Schema, SchemaDefinition, SourceRecord, TransformChain,
    Value,
};
use ml_predict_engine::{
    BatchPredictionEngine, EngineConfig, Error, ExecutionContext, ModelArtifact,
    PredictionOptions, PredictorParams, SimplePredictionEngine, SinglePredictionEngine,
    TransformStep,
};

#[derive(Debug, Clone, PartialEq)]
struct Example {
    features: Vec<f32>,
}

impl RecordShape for Example {
    fn members() -> Vec<Member> {
        vec![Member::vector("features")]
    }
}

impl SourceRecord for Example {
    fn getter(member: &str) -> Option<FieldGetter<Self>> {
        match member {
            "features" => Some(|r: &Self| Value::Vector(r.features.clone())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Row {
    features: Vec<f32>,
}

impl RecordShape for Row {
    fn members() -> Vec<Member> {
        vec![Member::vector("features")]
    }
}

impl DestinationRecord for Row {
    fn setter(member: &str) -> Option<FieldSetter<Self>> {
        match member {
            "features" => Some(|r: &mut Self, v: Value| {
                r.features = v.into_vector()?;
                Ok(())
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Scored {
    score: f32,
    probability: f32,
}

impl RecordShape for Scored {
    fn members() -> Vec<Member> {
        vec![
            Member::new("score", DataType::Float32),
            Member::new("probability", DataType::Float32),
        ]
    }
}

impl DestinationRecord for Scored {
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

#[derive(Debug, Clone, Default, PartialEq)]
struct ScoredRow {
    features: Vec<f32>,
    score: f32,
    probability: f32,
}

impl RecordShape for ScoredRow {
    fn members() -> Vec<Member> {
        vec![
            Member::vector("features"),
            Member::new("score", DataType::Float32),
            Member::new("probability", DataType::Float32),
        ]
    }
}

impl DestinationRecord for ScoredRow {
    fn setter(member: &str) -> Option<FieldSetter<Self>> {
        match member {
            "features" => Some(|r: &mut Self, v: Value| {
                r.features = v.into_vector()?;
                Ok(())
            }),
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

/// Emits every row twice
struct Duplicate;

impl RecordBatchTransform for Duplicate {
    fn name(&self) -> &str {
        "duplicate"
    }

    fn transform(&self, batch: RecordBatch) -> ml_predict_core::Result<RecordBatch> {
        let indices: Vec<usize> = (0..batch.row_count()).flat_map(|i| [i, i]).collect();
        batch.take(&indices)
    }

    fn output_schema(&self, input_schema: &Schema) -> ml_predict_core::Result<Arc<Schema>> {
        Ok(Arc::new(input_schema.clone()))
    }
}

fn options(width: usize) -> PredictionOptions {
    PredictionOptions::new(EngineConfig::default().with_batch_size(2))
        .with_input_definition(SchemaDefinition::new().map_typed(
            "features",
            "Features",
            DataType::float_vector(width),
        ))
        .with_output_definition(SchemaDefinition::new().map("features", "Features"))
}

fn scored_options(width: usize) -> PredictionOptions {
    PredictionOptions::new(EngineConfig::default().with_batch_size(2))
        .with_input_definition(SchemaDefinition::new().map_typed(
            "features",
            "Features",
            DataType::float_vector(width),
        ))
        .with_output_definition(
            SchemaDefinition::new()
                .map("score", "Score")
                .map("probability", "Probability"),
        )
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn identity(width: usize) -> Result<BatchPredictionEngine<Example, Row>> {
    Ok(BatchPredictionEngine::from_transforms(TransformChain::default(), &options(width))?)
}

fn examples(rows: &[[f32; 3]]) -> Vec<Example> {
    rows.iter()
        .map(|r| Example {
            features: r.to_vec(),
        })
        .collect()
}

#[test]
fn identity_pipeline_round_trips_three_examples() -> Result<()> {
    let engine = identity(3)?;
    let input = examples(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);

    let rows: Vec<Row> = engine.predict(&input, false)?.collect::<Result<_, _>>()?;
    assert_eq!(
        rows.iter().map(|r| r.features.clone()).collect::<Vec<_>>(),
        input.iter().map(|e| e.features.clone()).collect::<Vec<_>>()
    );
    Ok(())
}

#[test]
fn identity_pipeline_leaves_unscored_members_at_default() -> Result<()> {
    let mut options = options(3).with_output_definition(
        SchemaDefinition::new()
            .map("features", "Features")
            .map("score", "Score")
            .map("probability", "Probability"),
    );
    options.config = options.config.with_ignore_missing_columns(true);
    let engine = BatchPredictionEngine::<Example, ScoredRow>::from_transforms(TransformChain::default(), &options)?;
    let input = examples(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);

    let rows: Vec<ScoredRow> = engine.predict(&input, false)?.collect::<Result<_, _>>()?;
    assert_eq!(rows.len(), 3);
    for (row, example) in rows.iter().zip(&input) {
        assert_eq!(row.features, example.features);
        assert_eq!(row.score, 0.0);
        assert_eq!(row.probability, 0.0);
    }
    Ok(())
}

#[test]
fn allocate_mode_yields_distinct_instances() -> Result<()> {
    let engine = identity(3)?;
    let input = examples(&[[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [3.0, 0.0, 0.0]]);

    let mut rows = engine.predict(&input, false)?;
    let mut held = Vec::new();
    while rows.advance()?.is_some() {
        held.push(rows.take_current().expect("row just yielded"));
    }
    assert_eq!(held.len(), 3);
    let addresses: Vec<*const f32> = held.iter().map(|r| r.features.as_ptr()).collect();
    assert!(addresses.iter().enumerate().all(|(i, a)| addresses[i + 1..].iter().all(|b| a != b)));
    Ok(())
}

#[test]
fn filtering_changes_the_row_count() -> Result<()> {
    let model = ModelArtifact::new().with_transform(TransformStep::DropNonFinite {
        column: "Features".into(),
    });
    let engine = BatchPredictionEngine::<Example, Row>::from_artifact(&model, &options(3))?;
    let input = examples(&[[1.0, 2.0, 3.0], [f32::NAN, 0.0, 0.0], [0.0, f32::INFINITY, 0.0]]);

    assert_eq!(engine.predict(&input, false)?.count(), 1);
    Ok(())
}

#[test]
fn reuse_mode_refills_the_same_instance() -> Result<()> {
    let engine = identity(3)?;
    let input = examples(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);

    let mut rows = engine.predict(&input, true)?;
    let mut addresses = Vec::new();
    let mut seen = Vec::new();
    while let Some(row) = rows.advance()? {
        addresses.push(std::ptr::from_ref(row) as usize);
        seen.push(row.features.clone());
    }
    assert!(addresses.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[2], vec![7.0, 8.0, 9.0]);
    Ok(())
}

#[test]
fn second_predict_invalidates_the_first_sequence() -> Result<()> {
    init_tracing();
    let engine = identity(3)?;
    let first_input = examples(&[[1.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);
    let second_input = examples(&[[3.0, 0.0, 0.0]]);

    let mut first = engine.predict(&first_input, true)?;
    assert!(first.advance()?.is_some());

    let second: Vec<Row> = engine.predict(&second_input, true)?.collect::<Result<_, _>>()?;
    assert_eq!(second.len(), 1);

    assert!(matches!(first.advance(), Err(Error::StaleIteration { .. })));
    drop(first);
    assert_eq!(engine.pipeline().open_cursors(), 0);
    Ok(())
}

#[test]
fn reset_with_nothing_pending_changes_nothing() -> Result<()> {
    let input = examples(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);

    let fresh = identity(3)?;
    let expected: Vec<Row> = fresh.predict(&input, false)?.collect::<Result<_, _>>()?;

    let reset = identity(3)?;
    reset.pipe().reset();
    reset.pipe().reset();
    let actual: Vec<Row> = reset.predict(&input, false)?.collect::<Result<_, _>>()?;

    assert_eq!(actual, expected);
    Ok(())
}

#[test]
fn empty_input_yields_no_rows() -> Result<()> {
    let engine = identity(3)?;
    assert_eq!(engine.predict(Vec::<Example>::new(), false)?.count(), 0);
    assert_eq!(engine.pipeline().open_cursors(), 0);
    Ok(())
}

#[test]
fn cursors_are_released_on_every_exit_path() -> Result<()> {
    init_tracing();
    let engine = identity(3)?;
    let input = examples(&[[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [3.0, 0.0, 0.0]]);

    // Exhausted
    let mut rows = engine.predict(&input, false)?;
    while rows.advance()?.is_some() {}
    assert_eq!(engine.pipeline().open_cursors(), 0);
    drop(rows);

    // Abandoned mid-way
    let mut rows = engine.predict(&input, true)?;
    rows.advance()?;
    assert_eq!(engine.pipeline().open_cursors(), 1);
    drop(rows);
    assert_eq!(engine.pipeline().open_cursors(), 0);

    // Failed with a stale advance
    let mut rows = engine.predict(&input, true)?;
    engine.pipe().reset();
    assert!(rows.advance().is_err());
    assert_eq!(engine.pipeline().open_cursors(), 0);
    Ok(())
}

#[test]
fn single_engine_rejects_two_rows_per_example() -> Result<()> {
    let chain = TransformChain::new(vec![Box::new(Duplicate)]);
    let engine = SinglePredictionEngine::<Example, Row>::from_transforms(chain, &options(3))?;
    let example = Example {
        features: vec![1.0, 2.0, 3.0],
    };
    assert!(matches!(engine.predict(&example), Err(Error::MultipleResults)));
    Ok(())
}

#[test]
fn single_engine_returns_the_one_row() -> Result<()> {
    let engine = SinglePredictionEngine::<Example, Row>::from_transforms(
        TransformChain::default(),
        &options(3).with_context(ExecutionContext::new(8)?),
    )?;
    let example = Example {
        features: vec![1.0, 2.0, 3.0],
    };
    assert_eq!(engine.predict(&example)?, Some(Row { features: example.features.clone() }));
    Ok(())
}

#[test]
fn linear_model_scores_examples() -> Result<()> {
    let model = ModelArtifact::new().with_predictor(PredictorParams::LinearBinary {
        weights: vec![1.0, -1.0, 0.5],
        bias: 0.25,
    });
    let engine = BatchPredictionEngine::<Example, Scored>::from_artifact(&model, &scored_options(3))?;
    let input = examples(&[[1.0, 1.0, 2.0], [0.0, 0.0, 0.0]]);

    let rows: Vec<Scored> = engine.predict(&input, false)?.collect::<Result<_, _>>()?;
    assert_eq!(rows[0].score, 1.25);
    assert_eq!(rows[1].score, 0.25);
    for row in &rows {
        let expected = 1.0 / (1.0 + (-row.score).exp());
        assert!((row.probability - expected).abs() < 1e-6);
    }
    Ok(())
}

#[test]
fn artifact_file_round_trip_loads_into_an_engine() -> Result<()> {
    let model = ModelArtifact::new()
        .with_transform(TransformStep::AffineNormalize {
            column: "Features".into(),
            offsets: vec![1.0, 1.0, 1.0],
            scales: vec![1.0, 1.0, 1.0],
        })
        .with_predictor(PredictorParams::LinearBinary {
            weights: vec![1.0, 1.0, 1.0],
            bias: 0.0,
        });

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("model.bin");
    model.save(&path)?;
    assert_eq!(ModelArtifact::load(&path)?, model);

    let engine = SimplePredictionEngine::new(&ModelArtifact::load(&path)?, "Features", 3, EngineConfig::default())?;
    let prediction = engine.predict(&[2.0, 2.0, 2.0])?.expect("one row per example");
    assert_eq!(prediction.score, 3.0);

    let reader = std::fs::File::open(&path)?;
    let batch = BatchPredictionEngine::<Example, Scored>::from_reader(reader, &scored_options(3))?;
    assert_eq!(batch.predict(&examples(&[[1.0, 1.0, 1.0]]), false)?.count(), 1);
    Ok(())
}

#[test]
fn typed_wrapper_over_transform_only_model_returns_zeros() -> Result<()> {
    let model = ModelArtifact::new().with_transform(TransformStep::CopyColumns {
        pairs: vec![("Features".into(), "Raw".into())],
    });
    let engine = SimplePredictionEngine::new(&model, "Features", 3, EngineConfig::default())?;
    let prediction = engine.predict(&[1.0, 2.0, 3.0])?.expect("one row per example");
    assert_eq!(prediction.score, 0.0);
    assert_eq!(prediction.probability, 0.0);

    assert!(matches!(engine.predict(&[1.0]), Err(Error::InvalidArgument(_))));
    Ok(())
}

#[test]
fn parallel_chunks_keep_source_order() -> Result<()> {
    let engine = BatchPredictionEngine::<Example, Row>::from_transforms(
        TransformChain::default(),
        &options(3).with_context(ExecutionContext::new(4)?),
    )?;
    #[allow(clippy::cast_precision_loss)]
    let input: Vec<Example> = (0..25)
        .map(|i| Example {
            features: vec![i as f32, 0.0, 0.0],
        })
        .collect();

    let rows: Vec<Row> = engine.predict(&input, false)?.collect::<Result<_, _>>()?;
    assert_eq!(
        rows.iter().map(|r| r.features[0]).collect::<Vec<_>>(),
        input.iter().map(|e| e.features[0]).collect::<Vec<_>>()
    );
    Ok(())
}

proptest! {
    #[test]
    fn reuse_and_allocate_agree(
        rows in proptest::collection::vec(proptest::collection::vec(-1e3f32..1e3, 3), 0..20),
    ) {
        let engine = identity(3).unwrap();
        let input: Vec<Example> = rows.into_iter().map(|features| Example { features }).collect();

        let allocated: Vec<Row> = engine
            .predict(&input, false)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        let mut reused = Vec::new();
        let mut sequence = engine.predict(&input, true).unwrap();
        while let Some(row) = sequence.advance().unwrap() {
            reused.push(row.clone());
        }

        prop_assert_eq!(reused, allocated);
    }
}
