use anyhow::{anyhow, Context};
use hearth_brain::{RouterConfig, TalkConfig};
use hearth_logging::LogFormat;
use hearth_runner::RunnerConfig;
use hearth_types::Provider;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Default config template created when no config exists
const DEFAULT_CONFIG: &str = r#"
[assistant]
lang = "en"
skill_suffix = "_skill"
muted = false

[providers]
default = "openai"  # or "ollama"
idle_timeout_secs = 300

[providers.openai]
api_key = ""  # Set via OPENAI_API_KEY env var
model = "gpt-4o-mini"
base_url = ""  # Optional: Set via OPENAI_BASE_URL env var

[providers.ollama]
base_url = "http://localhost:11434"
model = "llama3"

[skills]
directories = ["./skills"]

[runner]
command = "hearth-python-bridge"
timeout_secs = 60
kill_grace_ms = 2000

[talk]
paraphrase = false
min_paraphrase_words = 5
typing_delay_min_ms = 100
typing_delay_max_ms = 350

[logging]
level = "info"  # trace, debug, info, warn, error
format = "pretty"  # or "json"
"#;

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default = "default_skill_suffix")]
    pub skill_suffix: String,
    /// Deliver text only, never synthesize speech
    #[serde(default)]
    pub muted: bool,
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_skill_suffix() -> String {
    RouterConfig::default().skill_suffix
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            lang: default_lang(),
            skill_suffix: default_skill_suffix(),
            muted: false,
        }
    }
}

impl AssistantConfig {
    pub fn router(&self) -> RouterConfig {
        RouterConfig {
            skill_suffix: self.skill_suffix.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenAIConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProvidersConfig {
    pub default: String,
    /// Release the inference context after this much inactivity
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    pub openai: OpenAIConfig,
    pub ollama: OllamaConfig,
}

fn default_idle_timeout_secs() -> u64 {
    hearth_provider::DEFAULT_IDLE_TIMEOUT.as_secs()
}

impl ProvidersConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// The configured default provider
    pub fn provider(&self) -> Provider {
        match self.default.as_str() {
            "openai" => Provider::openai(
                &self.openai.model,
                self.openai.api_key.as_deref(),
                self.openai.base_url.as_deref(),
            ),
            "ollama" => Provider::ollama(&self.ollama.model, &self.ollama.base_url),
            other => {
                warn!("Unknown provider '{}', defaulting to OpenAI", other);
                Provider::openai(
                    &self.openai.model,
                    self.openai.api_key.as_deref(),
                    self.openai.base_url.as_deref(),
                )
            }
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SkillsConfig {
    #[serde(default)]
    pub directories: Vec<String>,
}

impl SkillsConfig {
    /// Directories with a leading `~` expanded
    pub fn expanded_directories(&self) -> Vec<PathBuf> {
        self.directories
            .iter()
            .map(|dir| match (dir.strip_prefix('~'), dirs::home_dir()) {
                (Some(rest), Some(home)) => home.join(rest.trim_start_matches('/')),
                _ => PathBuf::from(dir),
            })
            .collect()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub assistant: AssistantConfig,
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub skills: SkillsConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub talk: TalkConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Get the global config path: ~/.hearth/hearth.toml
    fn global_config_path() -> anyhow::Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home.join(".hearth").join("hearth.toml"))
    }

    /// Ensure global config directory and file exist, creating defaults if needed
    fn ensure_global_config() -> anyhow::Result<PathBuf> {
        let config_path = Self::global_config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| anyhow!("Invalid config path {}", config_path.display()))?;

        if !config_dir.exists() {
            fs::create_dir_all(config_dir)
                .with_context(|| format!("Failed to create {}", config_dir.display()))?;
            eprintln!("Created config directory: {}", config_dir.display());
        }

        if !config_path.exists() {
            fs::write(&config_path, DEFAULT_CONFIG.trim())
                .with_context(|| format!("Failed to write {}", config_path.display()))?;
            eprintln!("Created default config: {}", config_path.display());
            eprintln!("Please edit this file or set environment variables.");
        }

        Ok(config_path)
    }

    /// Load configuration with layered approach:
    /// 1. Global config: ~/.hearth/hearth.toml (auto-created if missing)
    /// 2. Local override: ./hearth.toml (workspace, optional)
    /// 3. Environment variables (highest priority)
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file from current directory
        dotenvy::dotenv().ok();

        let global_config_path = Self::ensure_global_config()?;

        // Later sources override earlier ones
        let mut config_builder = config::Config::builder()
            .add_source(config::File::from(global_config_path))
            .add_source(config::File::with_name("hearth").required(false))
            .add_source(config::Environment::with_prefix("HEARTH").separator("__"));

        // Convenience env var overrides
        if let Ok(key) = env::var("OPENAI_API_KEY") {
            config_builder = config_builder.set_override("providers.openai.api_key", key)?;
        }

        if let Ok(url) = env::var("OPENAI_BASE_URL") {
            config_builder = config_builder.set_override("providers.openai.base_url", url)?;
        }

        if let Ok(url) = env::var("OLLAMA_BASE_URL") {
            config_builder = config_builder.set_override("providers.ollama.base_url", url)?;
        }

        let config = config_builder.build().context("Failed to load configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Invalid configuration")?;
        Ok(config)
    }
}
