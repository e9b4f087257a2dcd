//! Token-metered payment and service-consumption core.
//!
//! Exports the modules shared by the server binary and any future utility
//! binaries (e.g. a migration runner).

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

pub use config::AppSettings;
pub use error::AppError;
pub use models::runtime_config::AppState;
