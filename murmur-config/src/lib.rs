//! Loader for the harvester configuration: YAML file + environment overlays.
//!
//! Precedence, lowest first: the YAML file (or inline YAML in tests), then
//! `MURMUR__`-prefixed environment variables using `__` as the nesting separator
//! (`MURMUR__SEARCH__QUERY`). After merging, every string is passed through
//! `${VAR}` and leading `~/` expansion so secrets and home paths stay out of the file.
//!
//! Every section except `client` and `logging` is required; a missing key is a
//! [`ConfigError::Load`], a present-but-unusable value is a [`ConfigError::Invalid`].
use config::{Config, Environment, File, FileFormat};
use murmur_common::observability::LogFormat;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "MURMUR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct MurmurConfig {
    pub credentials: CredentialsConfig,
    pub search: SearchConfig,
    pub limits: LimitsConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Deserialize)]
pub struct CredentialsConfig {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub query: String,
    /// Stop once at least this many records were collected.
    pub minimum_records: u64,
    #[serde(default = "default_product")]
    pub product: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Consecutive empty pages tolerated before the search counts as exhausted.
    pub max_inactivity: u32,
    /// Consecutive timeouts tolerated before the run fails.
    pub max_timeouts: u32,
    pub timeout_backoff_secs: u64,
    /// Wait applied when a rate-limit signal carries no reset time.
    #[serde(default = "default_rate_limit_fallback_secs")]
    pub rate_limit_fallback_secs: u64,
    pub pacing: PacingConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PacingConfig {
    pub min_secs: u64,
    pub max_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub csv: PathBuf,
    pub json: PathBuf,
    pub token: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            language: default_language(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_true")]
    pub stderr: bool,
    #[serde(default)]
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            format: LogFormat::default(),
            stderr: true,
            filter: None,
        }
    }
}

fn default_product() -> String {
    "Latest".into()
}
fn default_page_size() -> u32 {
    20
}
fn default_rate_limit_fallback_secs() -> u64 {
    60
}
fn default_base_url() -> String {
    "https://x.com/".into()
}
fn default_language() -> String {
    "en-US".into()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

impl MurmurConfig {
    /// Reject values that deserialize fine but cannot drive a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("credentials.username", self.credentials.username.as_str()),
            ("credentials.email", self.credentials.email.as_str()),
            ("credentials.password", self.credentials.password.as_str()),
            ("search.query", self.search.query.as_str()),
            ("search.product", self.search.product.as_str()),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("`{key}` must not be empty")));
            }
        }
        for (key, path) in [
            ("output.csv", &self.output.csv),
            ("output.json", &self.output.json),
            ("output.token", &self.output.token),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!("`{key}` must not be empty")));
            }
        }
        if self.output.csv == self.output.json {
            return Err(ConfigError::Invalid(
                "`output.csv` and `output.json` must be different files".into(),
            ));
        }
        if self.search.minimum_records == 0 {
            return Err(ConfigError::Invalid(
                "`search.minimum_records` must be at least 1".into(),
            ));
        }
        if self.search.page_size == 0 {
            return Err(ConfigError::Invalid("`search.page_size` must be at least 1".into()));
        }
        let pacing = self.limits.pacing;
        if pacing.min_secs > pacing.max_secs {
            return Err(ConfigError::Invalid(format!(
                "`limits.pacing.min_secs` ({}) exceeds `limits.pacing.max_secs` ({})",
                pacing.min_secs, pacing.max_secs
            )));
        }
        if self.client.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "`client.request_timeout_secs` must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') || s.starts_with('~') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::full(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (YAML + env overrides).
pub struct MurmurConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for MurmurConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl MurmurConfigLoader {
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use murmur_config::MurmurConfigLoader;
    ///
    /// let cfg = MurmurConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// credentials: { username: alice, email: alice@example.com, password: s3cret }
    /// search: { query: "rust lang:en", minimum_records: 50 }
    /// limits:
    ///   max_inactivity: 3
    ///   max_timeouts: 3
    ///   timeout_backoff_secs: 5
    ///   pacing: { min_secs: 5, max_secs: 10 }
    /// output: { csv: out.csv, json: out.json, token: cookies.json }
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.search.minimum_records, 50);
    /// assert_eq!(cfg.search.product, "Latest");
    /// assert_eq!(cfg.client.base_url, "https://x.com/");
    /// assert!(!format!("{:?}", cfg.credentials).contains("s3cret"));
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Consume the builder, apply env overrides and `${VAR}` expansion, then
    /// deserialize and validate.
    pub fn load(self) -> Result<MurmurConfig, ConfigError> {
        let merged = self
            .builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let mut v: Value = merged.try_deserialize()?;
        expand_env_in_value(&mut v);

        // Re-enter `config` so string env values ("1000") still coerce into numbers.
        let expanded = serde_json::to_string(&v).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let typed: MurmurConfig = Config::builder()
            .add_source(File::from_str(&expanded, FileFormat::Json))
            .build()?
            .try_deserialize()?;

        typed.validate()?;
        Ok(typed)
    }
}
