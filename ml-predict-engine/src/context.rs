//! Execution context handed to pipelines at construction

use ml_predict_core::{Error, Result};

use crate::config::EngineConfig;

/// How many source chunks a pipeline may transform at once
///
/// Passed explicitly to every pipeline instead of read from a global, so an
/// engine can pin the pipeline beneath it to one thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    concurrency: usize,
}

impl ExecutionContext {
    /// A context with the given degree of concurrency
    pub fn new(concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(Error::InvalidArgument("concurrency must be greater than 0".into()));
        }
        Ok(Self { concurrency })
    }

    /// A context that runs everything on the calling thread
    pub const fn single_threaded() -> Self {
        Self { concurrency: 1 }
    }

    /// The context described by a configuration
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        match config.concurrency {
            Some(concurrency) => Self::new(concurrency),
            None => Ok(Self::host_default()),
        }
    }

    /// The host's available parallelism
    #[cfg(feature = "parallel")]
    pub fn host_default() -> Self {
        Self {
            concurrency: num_cpus::get().max(1),
        }
    }

    /// Without the `parallel` feature the host default is one thread
    #[cfg(not(feature = "parallel"))]
    pub const fn host_default() -> Self {
        Self::single_threaded()
    }

    /// Degree of concurrency
    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Whether this context runs on the calling thread only
    pub const fn is_single_threaded(&self) -> bool {
        self.concurrency == 1
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::host_default()
    }
}
