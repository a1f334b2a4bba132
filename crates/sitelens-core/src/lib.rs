pub mod analytics;
pub mod config;
pub mod error;
pub mod event;
pub mod filter;
pub mod funnel;
pub mod params;
pub mod reports;
pub mod secret;
pub mod sql;
pub mod window;
