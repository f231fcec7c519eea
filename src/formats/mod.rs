//! Export formats for decoded records.

pub mod parquet;
