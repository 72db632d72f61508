use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Retry and concurrency settings for synchronizer sweeps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Submission attempts per draft per triggering event
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// 1 means drafts are submitted one after another
    #[serde(default = "default_max_concurrent_submissions")]
    pub max_concurrent_submissions: usize,
    /// Sweep once when the synchronizer starts if already signed in
    #[serde(default = "default_sweep_on_start")]
    pub sweep_on_start: bool,
}

fn default_base_url() -> String {
    "http://localhost:8080/api/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_max_concurrent_submissions() -> usize {
    1
}

fn default_sweep_on_start() -> bool {
    true
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
            max_concurrent_submissions: default_max_concurrent_submissions(),
            sweep_on_start: default_sweep_on_start(),
        }
    }
}

impl SyncConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let millis = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(millis.min(self.max_backoff_ms as f64) as u64)
    }
}

impl Config {
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Defaults when the file does not exist yet
    pub fn load_or_default(path: &PathBuf) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    pub fn save_to_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let base_url = self.api.base_url.trim();
        if base_url.is_empty() {
            return Err(anyhow::anyhow!("api.base_url is required and cannot be empty"));
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(anyhow::anyhow!("api.base_url must be an http(s) URL: {}", base_url));
        }
        if self.api.timeout_secs == 0 {
            return Err(anyhow::anyhow!("api.timeout_secs must be greater than zero"));
        }
        if self.sync.max_attempts == 0 {
            return Err(anyhow::anyhow!("sync.max_attempts must be at least 1"));
        }
        if self.sync.backoff_multiplier < 1.0 {
            return Err(anyhow::anyhow!("sync.backoff_multiplier must be at least 1.0"));
        }
        if self.sync.max_backoff_ms < self.sync.initial_backoff_ms {
            return Err(anyhow::anyhow!("sync.max_backoff_ms must not be below sync.initial_backoff_ms"));
        }
        if self.sync.max_concurrent_submissions == 0 {
            return Err(anyhow::anyhow!("sync.max_concurrent_submissions must be at least 1"));
        }
        Ok(())
    }
}
