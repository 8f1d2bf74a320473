//! Runtime configuration, read from the environment (and `.env` via dotenv).

use crate::error::{Result, TrendError};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-preview-09-2025";
pub const DEFAULT_GEMINI_TIMEOUT_SECS: u64 = 90;

/// Databricks SQL warehouse connection.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    pub server_hostname: String,
    pub http_path: String,
    pub access_token: String,
}

impl WarehouseConfig {
    /// All three settings are required.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server_hostname: required("DATABRICKS_SERVER_HOSTNAME")?,
            http_path: required("DATABRICKS_HTTP_PATH")?,
            access_token: required("DATABRICKS_TOKEN")?,
        })
    }

    /// The warehouse id is the last segment of the HTTP path
    /// (`/sql/1.0/warehouses/<id>`).
    pub fn warehouse_id(&self) -> Result<String> {
        self.http_path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                TrendError::Config(format!(
                    "Cannot derive a warehouse id from HTTP path '{}'",
                    self.http_path
                ))
            })
    }

    pub fn base_url(&self) -> String {
        let host = self.server_hostname.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        }
    }
}

/// Generative-text endpoint settings. The key is validated at call time.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: optional("GEMINI_API_KEY"),
            model: optional("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            timeout: Duration::from_secs(
                parse_or("GEMINI_TIMEOUT_SECS", DEFAULT_GEMINI_TIMEOUT_SECS),
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Present when every Databricks variable is set.
    pub warehouse: Option<WarehouseConfig>,
    /// Local SQLite warehouse directory (`silver.db` + `gold.db`).
    pub sqlite_dir: Option<PathBuf>,
    pub gemini: GeminiConfig,
    pub cache_ttl: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            warehouse: WarehouseConfig::from_env().ok(),
            sqlite_dir: optional("TRENDSCOPE_SQLITE_DIR").map(PathBuf::from),
            gemini: GeminiConfig::from_env(),
            cache_ttl: Duration::from_secs(parse_or(
                "TRENDSCOPE_CACHE_TTL_SECS",
                DEFAULT_CACHE_TTL_SECS,
            )),
        }
    }
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required(key: &str) -> Result<String> {
    optional(key).ok_or_else(|| TrendError::Config(format!("Missing environment variable {}", key)))
}

fn parse_or(key: &str, default: u64) -> u64 {
    optional(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}
