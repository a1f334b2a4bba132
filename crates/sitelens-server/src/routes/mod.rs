pub mod funnel;
pub mod health;
pub mod lists;
pub mod overview;
