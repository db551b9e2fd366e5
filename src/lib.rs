pub mod application;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::services::ChatServices;
pub use config::{Config, ConfigError};
pub use domain::errors::{ChatError, ChatResult};
