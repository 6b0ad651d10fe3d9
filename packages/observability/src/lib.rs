//! # Observability
//!
//! Shared tracing setup for Toune binaries.
//!
//! Services call [`init`] or [`init_with_config`] once at startup and then use
//! the standard `tracing` macros. Output goes to:
//!
//! - a JSONL file (`~/.toune/logs/toune.jsonl` unless overridden), one object per event
//! - optionally stderr, in compact human-readable form
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "toune".into(),
//!     default_level: "debug".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! });
//! tracing::info!("ready");
//! ```

mod json_layer;
mod writer;

pub use json_layer::{JsonLayer, LogEntry};
pub use writer::AppendWriter;

use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every JSON line.
    pub service_name: String,

    /// Default filter (e.g. "debug", "info"); `RUST_LOG` takes precedence.
    pub default_level: String,

    /// JSONL file path. Defaults to `~/.toune/logs/toune.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit compact logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

fn default_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".toune").join("logs").join("toune.jsonl"))
}

/// Initialize with default settings for `service_name`.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize with custom configuration.
///
/// A log file that cannot be opened is reported on stderr and skipped; a
/// second initialization in the same process is a no-op.
pub fn init_with_config(config: LogConfig) {
    let env_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level))
    };

    let log_path = config.log_path.clone().or_else(default_log_path);
    let json_layer = log_path.as_ref().and_then(|path| match AppendWriter::open(path) {
        Ok(writer) => Some(JsonLayer::new(config.service_name.clone(), writer).with_filter(env_filter())),
        Err(e) => {
            eprintln!("observability: cannot open {}: {}", path.display(), e);
            None
        }
    });

    let stderr_layer = config.also_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(env_filter())
    });

    let installed = tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(
            service = %config.service_name,
            log_path = ?log_path,
            "observability initialized"
        );
    }
}

pub use tracing::{debug, error, info, instrument, span, trace, warn, Level};
