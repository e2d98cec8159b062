use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Change of Control Analyzer software@example.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Clone, Debug)]
pub struct AnalyzerConfig {
    pub openai_key: Option<String>,
    pub openai_model: String,
    pub user_agent: String,
    pub data_dir: PathBuf,
    pub registry_ttl: Duration,
    pub batch_size: usize,
    pub group_pause: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            openai_key: None,
            openai_model: DEFAULT_MODEL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            data_dir: PathBuf::from("data"),
            registry_ttl: Duration::from_secs(24 * 60 * 60),
            batch_size: 3,
            group_pause: Duration::from_millis(500),
        }
    }
}

impl AnalyzerConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let openai_key = std::env::var("OPENAI_KEY").ok();
        let openai_model = std::env::var("OPENAI_MODEL").unwrap_or(defaults.openai_model);
        let user_agent = std::env::var("USER_AGENT").unwrap_or(defaults.user_agent);

        let data_dir = std::env::var("ANALYZER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let registry_ttl = match std::env::var("REGISTRY_TTL_SECS") {
            Ok(v) => Duration::from_secs(
                v.parse()
                    .map_err(|e| anyhow!("Invalid REGISTRY_TTL_SECS '{}': {}", v, e))?,
            ),
            Err(_) => defaults.registry_ttl,
        };

        let batch_size = match std::env::var("BATCH_SIZE") {
            Ok(v) => v
                .parse()
                .map_err(|e| anyhow!("Invalid BATCH_SIZE '{}': {}", v, e))?,
            Err(_) => defaults.batch_size,
        };
        if batch_size == 0 {
            return Err(anyhow!("BATCH_SIZE must be at least 1"));
        }

        let group_pause = match std::env::var("GROUP_PAUSE_MS") {
            Ok(v) => Duration::from_millis(
                v.parse()
                    .map_err(|e| anyhow!("Invalid GROUP_PAUSE_MS '{}': {}", v, e))?,
            ),
            Err(_) => defaults.group_pause,
        };

        Ok(Self {
            openai_key,
            openai_model,
            user_agent,
            data_dir,
            registry_ttl,
            batch_size,
            group_pause,
        })
    }

    pub fn require_openai_key(&self) -> Result<&str> {
        self.openai_key.as_deref().ok_or_else(|| {
            anyhow!("OPENAI_KEY environment variable not set. Please run with: OPENAI_KEY=your-key-here coc-cli ...")
        })
    }

    pub fn tickers_cache_path(&self) -> PathBuf {
        self.data_dir.join("edgar").join("tickers.json")
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("results")
    }
}
