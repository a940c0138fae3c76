use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Everything the extractor needs, passed explicitly to the store, scraper
/// and orchestrator at construction.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub delays: DelayConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    pub database_path: PathBuf,
    /// Truncation ceiling, kept under the external quota as a safety margin
    pub max_db_size_gb: f64,
    /// External quota, only used for the operator gauge
    pub quota_gb: f64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/emails.db"),
            max_db_size_gb: 0.45,
            quota_gb: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 12,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        // Page fetches are kept within 10-15s regardless of what the file says
        Duration::from_secs(self.timeout_secs.clamp(10, 15))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    pub endpoint: String,
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://html.duckduckgo.com/html/".to_string(),
            max_results: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DelayConfig {
    /// Pause after each search result has been visited
    pub page_delay_ms: u64,
    /// Pause once a keyword's search is finished
    pub search_delay_ms: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            page_delay_ms: 1000,
            search_delay_ms: 700,
        }
    }
}

impl DelayConfig {
    pub fn none() -> Self {
        Self {
            page_delay_ms: 0,
            search_delay_ms: 0,
        }
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn search_delay(&self) -> Duration {
        Duration::from_millis(self.search_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("outputs"),
        }
    }
}

impl AppConfig {
    /// Layers built-in defaults, an optional TOML file and
    /// `EMAIL_EXTRACTOR__SECTION__KEY` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

        builder = match path {
            Some(p) => builder.add_source(File::from(p.to_path_buf())),
            None => builder.add_source(File::with_name("email_extractor").required(false)),
        };

        let config = builder
            .add_source(
                Environment::with_prefix("EMAIL_EXTRACTOR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }
}
