pub mod app;
pub mod auth;
pub mod enrich;
pub mod envelope;
pub mod error;
pub mod routes;
pub mod state;
