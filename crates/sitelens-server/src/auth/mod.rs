//! Site resolution and access control for the public analytics API.

pub mod credentials;
pub mod guard;
pub mod site;

pub use guard::{authorize, Principal, SiteContext};
