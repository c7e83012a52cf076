//! Database access layer
//!
//! Free functions over `&PgPool` / open transactions, raw SQL, no ORM.

pub mod orders;
pub mod shops;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;
