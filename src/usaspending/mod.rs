//! Client for the USAspending.gov v2 API.
//!
//! Only two endpoints are used: `search/spending_by_award/` for paginated
//! contract search and `awards/{id}/` for a single award record. Bodies are
//! passed through untouched; this module owns request shaping and the retry
//! policy.

pub mod client;
pub mod error;
pub mod query;

pub use client::{RetryPolicy, UsaSpendingClient};
pub use error::ClientError;
pub use query::{DateRange, SearchQuery, SortOrder};
