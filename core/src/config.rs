//! Toolkit configuration.
//!
//! RULE: The environment is read exactly once, in `ToolkitConfig::from_env`,
//! by the runner at startup. Everything below receives the struct.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BATCH_SIZE: usize = 500;
/// Upper bound on rows per write call to the data-access client.
pub const MAX_BATCH_SIZE: usize = 1000;
pub const DEFAULT_SOURCE_PREFIX: &str = "mock_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    pub health_url:         String,
    pub overview_url:       String,
    /// Bearer token for the overview endpoint. Only required by the
    /// overview contract check.
    #[serde(skip_serializing)]
    pub api_token:          Option<String>,
    pub retries:            u32,
    pub interval_ms:        u64,
    pub request_timeout_ms: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            health_url:         "http://127.0.0.1:3000/health".into(),
            overview_url:       "http://127.0.0.1:3000/api/dashboard/overview".into(),
            api_token:          None,
            retries:            30,
            interval_ms:        1_000,
            request_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolkitConfig {
    pub database_url:   String,
    /// Isolation label; a non-empty schema gets its own database file.
    pub schema_name:    Option<String>,
    pub data_dir:       PathBuf,
    pub reports_dir:    PathBuf,
    /// Paths under this root are recorded relative to it in manifests.
    pub workspace_root: PathBuf,
    pub health:         HealthCheckConfig,
    pub max_log_bytes:  u64,
    pub batch_size:     usize,
    pub source_prefix:  String,
}

impl ToolkitConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys take defaults;
    /// set-but-unparseable numeric keys are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let workspace_root = match lookup("ADSIM_WORKSPACE_ROOT") {
            Some(p) => PathBuf::from(p),
            None => std::env::current_dir()?,
        };
        let data_dir = lookup("ADSIM_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| workspace_root.join("data"));
        let reports_dir = lookup("ADSIM_REPORTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| workspace_root.join("reports"));

        let defaults = HealthCheckConfig::default();
        let health = HealthCheckConfig {
            health_url:         lookup("ADSIM_HEALTH_URL").unwrap_or(defaults.health_url),
            overview_url:       lookup("ADSIM_OVERVIEW_URL").unwrap_or(defaults.overview_url),
            api_token:          lookup("ADSIM_API_TOKEN").filter(|t| !t.is_empty()),
            retries:            parse_or(&lookup, "ADSIM_HEALTH_RETRIES", defaults.retries)?,
            interval_ms:        parse_or(&lookup, "ADSIM_HEALTH_INTERVAL_MS", defaults.interval_ms)?,
            request_timeout_ms: parse_or(&lookup, "ADSIM_REQUEST_TIMEOUT_MS", defaults.request_timeout_ms)?,
        };

        let batch_size: usize = parse_or(&lookup, "ADSIM_BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            anyhow::bail!("ADSIM_BATCH_SIZE must be in 1..={MAX_BATCH_SIZE}, got {batch_size}");
        }

        Ok(Self {
            database_url: lookup("ADSIM_DATABASE_URL").unwrap_or_else(|| "adsim.db".into()),
            schema_name: lookup("ADSIM_SCHEMA").filter(|s| !s.trim().is_empty()),
            data_dir,
            reports_dir,
            workspace_root,
            health,
            max_log_bytes: parse_or(&lookup, "ADSIM_MAX_LOG_BYTES", 1_048_576)?,
            batch_size,
            source_prefix: lookup("ADSIM_SOURCE_PREFIX")
                .unwrap_or_else(|| DEFAULT_SOURCE_PREFIX.into()),
        })
    }

    /// In-memory database, reports under `root`. Used in tests.
    pub fn default_test(root: &Path) -> Self {
        Self {
            database_url:   ":memory:".into(),
            schema_name:    None,
            data_dir:       root.join("data"),
            reports_dir:    root.join("reports"),
            workspace_root: root.to_path_buf(),
            health:         HealthCheckConfig { retries: 3, interval_ms: 1, ..Default::default() },
            max_log_bytes:  64 * 1024,
            batch_size:     DEFAULT_BATCH_SIZE,
            source_prefix:  DEFAULT_SOURCE_PREFIX.into(),
        }
    }

    /// The database the store should open, after schema isolation.
    /// `orders.db` with schema `qa` becomes `orders.qa.db`.
    pub fn database_path(&self) -> String {
        let Some(schema) = &self.schema_name else {
            return self.database_url.clone();
        };
        if self.database_url == ":memory:" || self.database_url.starts_with("file:") {
            return self.database_url.clone();
        }
        let path = Path::new(&self.database_url);
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("adsim");
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("db");
        path.with_file_name(format!("{stem}.{schema}.{ext}"))
            .to_string_lossy()
            .into_owned()
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {key}='{raw}': {e}")),
    }
}
