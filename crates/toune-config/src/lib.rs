//! Configuration, paths and logging bootstrap for Toune.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_ACCOUNTS_BASE_URL, DEFAULT_API_BASE_URL, DEFAULT_LOG_LEVEL,
    DEFAULT_REDIRECT_URI, DEFAULT_SCOPES,
};
pub use error::{ConfigError, ConfigResult};
pub use logging::{init_logging, normalize_level, parse_level};
pub use paths::Paths;
