//! Signed HTTP client for the Shopee Open API v2.
//!
//! Covers request signing, the response envelope, error classification,
//! cursor pagination and typed wrappers for the endpoints the ingestion
//! pipeline uses.

pub mod client;
pub mod config;
pub mod error;
pub mod sign;
pub mod types;

pub use client::ShopeeClient;
pub use config::ShopeeConfig;
pub use error::{ClientError, ClientResult};
