//! Record normalization module
//!
//! Converts feed entries with OData-typed properties into flat records and
//! shapes them to a stream's declared fields.

mod normalizer;
mod types;

pub use normalizer::{coerce, field_name, normalize, reconcile, EDM_BOOLEAN};
pub use types::{parse_timestamp, FieldValue, NormalizedRecord, TIMESTAMP_FORMAT};

#[cfg(test)]
mod tests;
