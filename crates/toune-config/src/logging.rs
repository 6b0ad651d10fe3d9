//! Logging initialization.
//!
//! Thin wrapper over the observability crate: structured JSONL goes to
//! `~/.toune/logs/toune.jsonl`, and optionally a compact copy to stderr.

use crate::Paths;

/// Initialize logging for a Toune process.
///
/// `level` is the default filter when `RUST_LOG` is unset; unknown values fall
/// back to `info`.
pub fn init_logging(paths: &Paths, service_name: &str, level: &str, also_stderr: bool) {
    observability::init_with_config(observability::LogConfig {
        service_name: service_name.into(),
        default_level: normalize_level(level).into(),
        log_path: Some(paths.log_file()),
        also_stderr,
    });
}

/// Map a user-supplied level to one `EnvFilter` understands.
pub fn normalize_level(level: &str) -> &'static str {
    match parse_level(level) {
        tracing::Level::TRACE => "trace",
        tracing::Level::DEBUG => "debug",
        tracing::Level::INFO => "info",
        tracing::Level::WARN => "warn",
        tracing::Level::ERROR => "error",
    }
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.trim().to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
