//! Core traits, data structures, and abstractions for ml-predict
//!
//! This crate provides the columnar data model (schemas, columns, record
//! batches), the binding of typed records onto columns, and the source and
//! transform seams that prediction pipelines are composed from.

#![warn(missing_docs)]

pub mod column;
pub mod error;
pub mod record;
pub mod record_batch;
pub mod schema;
pub mod source;
pub mod transform;
pub mod value;

// Re-export key types for convenience
pub use column::{Column, ColumnBuilder, ColumnData};
pub use error::{Error, Result};
pub use record::{
    ColumnMapping, DestinationRecord, FieldGetter, FieldSetter, Member, RecordShape,
    ResolvedMember, SchemaDefinition, SourceRecord,
};
pub use record_batch::RecordBatch;
pub use schema::{DataType, Field, Schema};
pub use source::{BatchScanner, InMemorySource, RecordBatchSource};
pub use transform::{RecordBatchTransform, TransformChain};
pub use value::Value;

static_assertions::assert_impl_all!(RecordBatch: Send, Sync);
static_assertions::assert_impl_all!(InMemorySource: Send, Sync);
static_assertions::assert_impl_all!(TransformChain: Send, Sync);
