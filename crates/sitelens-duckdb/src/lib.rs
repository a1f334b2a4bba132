pub mod backend;
pub mod metadata_impl;
pub mod queries;
pub mod schema;
pub mod seed;
pub mod store;

pub use backend::DuckDbBackend;

/// Re-export the `duckdb` crate so consumers (especially tests) can use
/// `sitelens_duckdb::duckdb::params!` without an extra dependency.
pub use duckdb;
