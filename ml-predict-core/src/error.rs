//! Error types for ml-predict

use std::io;
use thiserror::Error;

/// Result type for ml-predict operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for ml-predict operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error while reading or writing a model stream
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Index out of bounds
    #[error("Index out of bounds")]
    IndexOutOfBounds,

    /// Invalid argument supplied by the caller
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Required columns are missing or have an incompatible type
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A value does not fit the type of its column
    #[error("Data type mismatch: {0}")]
    TypeMismatch(String),

    /// A row sequence was advanced after its engine was reset
    #[error("Stale iteration: sequence started at generation {started}, engine is at generation {current}")]
    StaleIteration {
        /// Generation the sequence was created under
        started: u64,
        /// Generation of the engine at the failing advance
        current: u64,
    },

    /// More than one result where at most one was expected
    #[error("Multiple results where at most one was expected")]
    MultipleResults,

    /// Model stream could not be interpreted
    #[error("Model format error: {0}")]
    ModelFormat(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Configuration could not be parsed
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// Feature not implemented
    #[error("Feature not implemented: {0}")]
    NotImplemented(String),
}
