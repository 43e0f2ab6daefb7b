//! Integration tests - generated SQL executed against SQLite
//!
//! Documents are inserted through `Container`, queries run on a real connection and the
//! assembled JSON is compared with what the documents hold.

mod harness;

mod aggregate_queries;
mod catalog_reload;
mod list_queries;
