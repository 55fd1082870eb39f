//! Stream schema module
//!
//! Declared fields and stream metadata consumed by the normalizer.
//!
//! # Features
//!
//! - **Stream Catalog**: Static definitions for every extractable stream
//! - **Field Types**: Declared types driving reconciliation and discovery
//! - **JSON Schema**: Nullable schemas for the discover command

mod catalog;
mod types;

pub use catalog::{all_streams, find_stream, select_streams, Replication, StreamDefinition};
pub use types::{Field, FieldType, JsonSchema, JsonType, JsonTypeOrArray, SchemaProperty};
