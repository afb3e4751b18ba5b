use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use actloop::oracle::AssistantsConfig;
use actloop::oracle::assistants::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use actloop::prompt::{DEFAULT_INSTRUCTIONS, DEFAULT_OBJECTIVE_TEMPLATE};
use actloop::runner::{DEFAULT_COMPLETION_SENTINEL, LoopConfig, PollConfig};

use crate::cli::commands::RunOverrides;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub oracle: OracleConfig,
    pub polling: PollingConfig,
    pub executor: ExecutorConfig,
    #[serde(rename = "loop")]
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub base_url: String,
    pub model: String,
    pub assistant_name: String,
    /// Handlebars template; `{{completion_sentinel}}` is available
    pub instructions: String,
    pub api_key_env: String,
    pub timeout_ms: u64,
    /// Handlebars template; `{{objective}}` is available
    pub objective_template: String,
    pub completion_sentinel: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            assistant_name: "actloop".to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_ms: 60000,
            objective_template: DEFAULT_OBJECTIVE_TEMPLATE.to_string(),
            completion_sentinel: DEFAULT_COMPLETION_SENTINEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub max_wait_ms: Option<u64>,
    pub empty_read_retries: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10000,
            max_wait_ms: None,
            empty_read_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub artifact_dir: PathBuf,
    pub shell: String,
    pub timeout_ms: Option<u64>,
    /// Echo each captured line to the terminal
    pub echo: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("."),
            shell: "sh".to_string(),
            timeout_ms: None,
            echo: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_actions: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            oracle: OracleConfig::default(),
            polling: PollingConfig::default(),
            executor: ExecutorConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Reject values the loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.polling.interval_ms == 0 {
            bail!("polling.interval_ms must be greater than zero");
        }
        if self.executor.shell.trim().is_empty() {
            bail!("executor.shell must not be empty");
        }
        if self.oracle.completion_sentinel.trim().is_empty() {
            bail!("oracle.completion_sentinel must not be empty");
        }
        if self.oracle.api_key_env.trim().is_empty() {
            bail!("oracle.api_key_env must not be empty");
        }
        Ok(())
    }

    /// Apply `run` flags on top of file values
    pub fn apply_overrides(&mut self, overrides: &RunOverrides) {
        if let Some(dir) = &overrides.artifact_dir {
            self.executor.artifact_dir = dir.clone();
        }
        if let Some(interval) = overrides.poll_interval_ms {
            self.polling.interval_ms = interval;
        }
        if let Some(max_wait) = overrides.max_wait_ms {
            self.polling.max_wait_ms = Some(max_wait);
        }
        if let Some(max_actions) = overrides.max_actions {
            self.limits.max_actions = Some(max_actions);
        }
        if let Some(model) = &overrides.model {
            self.oracle.model = model.clone();
        }
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.polling.interval_ms),
            max_wait: self.polling.max_wait_ms.map(Duration::from_millis),
            empty_read_retries: self.polling.empty_read_retries,
        }
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            completion_sentinel: self.oracle.completion_sentinel.clone(),
            objective_template: self.oracle.objective_template.clone(),
            max_actions: self.limits.max_actions,
            poll: self.poll_config(),
        }
    }

    /// Client settings; `instructions` is the already rendered text
    pub fn assistants_config(&self, instructions: String) -> AssistantsConfig {
        AssistantsConfig {
            base_url: self.oracle.base_url.clone(),
            model: self.oracle.model.clone(),
            assistant_name: self.oracle.assistant_name.clone(),
            instructions,
            timeout: Duration::from_millis(self.oracle.timeout_ms),
        }
    }

    pub fn executor_timeout(&self) -> Option<Duration> {
        self.executor.timeout_ms.map(Duration::from_millis)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config")
    }
}
