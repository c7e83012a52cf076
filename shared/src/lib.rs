//! Shared domain types for the Shopee order ingestion service.
//!
//! Used by `shopee-client` (wire-adjacent enums) and `ingest-server`
//! (rows, job payloads, stats).

pub mod error;
pub mod jobs;
pub mod models;
pub mod util;

pub use error::{IngestError, IngestResult};
