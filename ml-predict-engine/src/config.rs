//! Engine configuration

use std::io::Read;

use serde::{Deserialize, Serialize};

use ml_predict_core::{Error, Result};

/// Configuration shared by the prediction engines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rows pulled from the source per chunk
    pub batch_size: usize,

    /// Chunks transformed at once; `None` picks the host's parallelism
    pub concurrency: Option<usize>,

    /// Leave destination members without a column at their prior value
    /// instead of failing
    pub ignore_missing_columns: bool,

    /// Column bound to the feature role when a model persisted no role mapping
    pub default_features_column: String,

    /// Score column read by the typed wrapper
    pub score_column: String,

    /// Probability column read by the typed wrapper
    pub probability_column: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 1024,
            concurrency: None,
            ignore_missing_columns: false,
            default_features_column: "Features".to_string(),
            score_column: "Score".to_string(),
            probability_column: "Probability".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON; absent keys take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from a JSON reader
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engines cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidArgument("batch_size must be greater than 0".into()));
        }
        if self.concurrency == Some(0) {
            return Err(Error::InvalidArgument("concurrency must be greater than 0".into()));
        }
        for (key, value) in [
            ("default_features_column", &self.default_features_column),
            ("score_column", &self.score_column),
            ("probability_column", &self.probability_column),
        ] {
            if value.is_empty() {
                return Err(Error::InvalidArgument(format!("{key} must not be empty")));
            }
        }
        Ok(())
    }

    /// Set the chunk size
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the concurrency degree
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Tolerate destination members with no matching column
    #[must_use]
    pub fn with_ignore_missing_columns(mut self, ignore: bool) -> Self {
        self.ignore_missing_columns = ignore;
        self
    }

    /// Set the column bound to the feature role when none was persisted
    #[must_use]
    pub fn with_default_features_column(mut self, column: &str) -> Self {
        self.default_features_column = column.to_string();
        self
    }
}
