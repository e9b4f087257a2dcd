pub mod domain;
pub mod dto;
pub mod runtime_config;

pub use runtime_config::AppState;
