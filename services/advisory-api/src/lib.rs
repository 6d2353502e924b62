pub mod auth;
pub mod cache;
pub mod config;
pub mod envelope;
pub mod errors;
pub mod handlers;
pub mod ledger;
pub mod membership;
pub mod metrics;
pub mod models;
pub mod password;
pub mod presenters;
pub mod services;
pub mod shortener;
pub mod sorting;
pub mod store;
pub mod verification;

pub use config::Config;
pub use errors::{ApiError, Result};
