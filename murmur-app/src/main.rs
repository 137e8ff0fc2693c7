use anyhow::{Context, Result};
use clap::Parser;
use murmur_common::observability::{LogConfig, LogFormat, init_logging};
use murmur_config::{MurmurConfig, MurmurConfigLoader};
use murmur_harvest::StopReason;
use murmur_runtime::MurmurRuntime;
use std::path::PathBuf;
use std::time::Duration;

mod wiring;

/// Harvest search results into CSV and JSON files.
#[derive(Debug, Parser)]
#[command(name = "murmur", version)]
struct Cli {
    /// YAML configuration file.
    #[arg(long, env = "MURMUR_CONFIG", default_value = "murmur.yaml")]
    config: PathBuf,

    /// Directory for rolling log files (overrides `logging.dir`).
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    /// Do not mirror logs to stderr.
    #[arg(long)]
    quiet: bool,
}

fn log_config(cli: &Cli, cfg: &MurmurConfig) -> LogConfig {
    LogConfig {
        log_dir: cli.log_dir.clone().or_else(|| cfg.logging.dir.clone()),
        emit_stderr: cfg.logging.stderr && !cli.quiet,
        format: if cli.json_logs {
            LogFormat::Json
        } else {
            cfg.logging.format
        },
        default_filter: cfg
            .logging
            .filter
            .clone()
            .unwrap_or_else(|| LogConfig::default().default_filter),
        ..LogConfig::default()
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config problems surface before any logging or network setup.
    let cfg = MurmurConfigLoader::new()
        .with_file(&cli.config)
        .load()
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let log_dir = init_logging(log_config(&cli, &cfg))?;
    tracing::info!(
        config = %cli.config.display(),
        logs = %log_dir.display(),
        query = %cfg.search.query,
        "murmur starting"
    );

    let runtime = MurmurRuntime::build("murmur", Some(2))?;
    let handle = runtime.handle();
    let _signals = handle.listen_for_shutdown();

    let outcome = runtime.block_on(wiring::run(cfg, handle.cancellation()));
    runtime.shutdown(Duration::from_secs(1));

    let report = outcome?;
    match report.stop {
        StopReason::TargetReached => tracing::info!(records = report.records, "target reached"),
        StopReason::Exhausted => tracing::info!(records = report.records, "search exhausted before target"),
        StopReason::Cancelled => tracing::info!(records = report.records, "stopped on request"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(extra: &str) -> MurmurConfig {
        let yaml = format!(
            r#"
credentials: {{ username: alice, email: alice@example.com, password: pw }}
search: {{ query: rust, minimum_records: 1 }}
limits:
  max_inactivity: 1
  max_timeouts: 1
  timeout_backoff_secs: 1
  pacing: {{ min_secs: 1, max_secs: 2 }}
output: {{ csv: a.csv, json: a.json, token: t.json }}
{extra}
"#
        );
        MurmurConfigLoader::new().with_yaml_str(&yaml).load().unwrap()
    }

    #[test]
    fn flags_override_logging_section() {
        let cfg = cfg("logging: { dir: /var/log/murmur, format: text, stderr: true, filter: debug }");
        let cli = Cli::parse_from(["murmur", "--log-dir", "/tmp/m", "--json-logs", "--quiet"]);

        let log = log_config(&cli, &cfg);
        assert_eq!(log.log_dir, Some(PathBuf::from("/tmp/m")));
        assert_eq!(log.format, LogFormat::Json);
        assert!(!log.emit_stderr);
        assert_eq!(log.default_filter, "debug");
    }

    #[test]
    fn logging_section_is_optional() {
        let cli = Cli::parse_from(["murmur", "--config", "x.yaml"]);
        let log = log_config(&cli, &cfg(""));
        assert_eq!(cli.config, PathBuf::from("x.yaml"));
        assert_eq!(log.log_dir, None);
        assert_eq!(log.format, LogFormat::Text);
        assert!(log.emit_stderr);
        assert_eq!(log.default_filter, "info");
    }
}
