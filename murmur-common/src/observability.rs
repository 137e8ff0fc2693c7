//! Logging setup shared by the `murmur` binary and the integration tests.
//!
//! [`init_logging`] installs one global `tracing` subscriber: a daily rolling
//! file in the resolved log directory, plus an optional stderr copy. Only the
//! first call installs anything; later calls return the same file path.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const LOG_DIR_ENV: &str = "MURMUR_LOG_DIR";

/// Kept alive for the whole process so the background writer keeps flushing.
struct Installed {
    path: PathBuf,
    _guard: WorkerGuard,
}

static INSTALLED: OnceLock<Installed> = OnceLock::new();

/// Output encoding for structured logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Names the log file (`<app_name>.log.<date>`) and the default directory.
    pub app_name: &'static str,
    /// Takes precedence over `MURMUR_LOG_DIR` and the per-user data directory.
    pub log_dir: Option<PathBuf>,
    /// Also print events on stderr.
    pub emit_stderr: bool,
    pub format: LogFormat,
    /// Used when `RUST_LOG` is unset or unparsable.
    pub default_filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            app_name: "murmur",
            log_dir: None,
            emit_stderr: true,
            format: LogFormat::Text,
            default_filter: "info".to_string(),
        }
    }
}

/// Install the global subscriber and return today's log file.
pub fn init_logging(config: LogConfig) -> anyhow::Result<PathBuf> {
    if let Some(installed) = INSTALLED.get() {
        return Ok(installed.path.clone());
    }

    let dir = log_dir(config.app_name, config.log_dir.as_deref());
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;

    // the appender rolls on UTC dates and suffixes the file with them
    let file_name = format!("{}.log", config.app_name);
    let path = dir.join(format!("{file_name}.{}", Utc::now().format("%Y-%m-%d")));
    let (writer, guard) = tracing_appender::non_blocking(rolling::daily(&dir, &file_name));

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));
    let stderr = config
        .emit_stderr
        .then(|| sink_layer(config.format, std::io::stderr, true));

    tracing_subscriber::registry()
        .with(filter)
        .with(sink_layer(config.format, writer, false))
        .with(stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    let installed = INSTALLED.get_or_init(|| Installed { path, _guard: guard });
    Ok(installed.path.clone())
}

fn sink_layer<S, W>(format: LogFormat, writer: W, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span> + 'static,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Text => fmt::layer().with_writer(writer).with_ansi(ansi).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
    }
}

/// Explicit directory, then `MURMUR_LOG_DIR`, then the user data directory.
fn log_dir(app_name: &str, explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(LOG_DIR_ENV).map(PathBuf::from))
        .map(|dir| expand_home(&dir))
        .unwrap_or_else(|| data_dir(app_name))
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

fn data_dir(app_name: &str) -> PathBuf {
    let base = std::env::var_os("XDG_DATA_HOME")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("share")));
    match base {
        Some(base) => base.join(app_name),
        None => PathBuf::from(".").join(app_name),
    }
}
