use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment, File};
use scout::agent::{AgentConfig, DEFAULT_MAX_ITERATIONS};
use scout::providers::configs::{OpenAiProviderConfig, DEFAULT_MODEL, OPENROUTER_HOST};
use scout::search::{KeywordMatch, SearchConfig};
use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Default, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Browser origin allowed to call the API; any origin when unset
    #[serde(default)]
    pub cors_origin: Option<String>,
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_provider_host")]
    pub host: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<i32>,
}

impl ProviderSettings {
    pub fn into_config(self) -> OpenAiProviderConfig {
        OpenAiProviderConfig {
            host: self.host,
            api_key: self.api_key.unwrap_or_default(),
            model: self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,
    /// Show tool status notes in the reply text
    #[serde(default = "default_true")]
    pub announce_tools: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            provider_timeout_secs: default_provider_timeout_secs(),
            announce_tools: true,
        }
    }
}

impl AgentSettings {
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_iterations: self.max_iterations,
            provider_timeout: Duration::from_secs(self.provider_timeout_secs),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchSettings {
    #[serde(default)]
    pub keyword_match: KeywordMatch,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    #[serde(default = "default_description_chars")]
    pub description_chars: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            keyword_match: KeywordMatch::default(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            description_chars: default_description_chars(),
        }
    }
}

impl SearchSettings {
    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            keyword_match: self.keyword_match,
            default_limit: self.default_limit.min(self.max_limit),
            max_limit: self.max_limit,
            description_chars: self.description_chars,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// JSON array of company records loaded into memory
    #[default]
    Json,
    /// Read-only SQLite database with a `companies` table
    Sqlite,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreSettings {
    #[serde(default, rename = "type")]
    pub kind: StoreKind,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub store: StoreSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Self::load()?;
        settings.validate()?;
        Ok(settings)
    }

    fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("provider.host", default_provider_host())?
            .set_default("provider.model", default_model())?
            // Optional scout.toml in the working directory, overridden by the environment
            .add_source(File::with_name("scout").required(false))
            .add_source(
                Environment::with_prefix("SCOUT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        match config.try_deserialize() {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                if let Some(field) = missing_field(&err.to_string()) {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(&field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let missing = |field: &str| ConfigError::MissingEnvVar {
            env_var: to_env_var(field),
        };

        if self
            .provider
            .api_key
            .as_deref()
            .map_or(true, |key| key.trim().is_empty())
        {
            return Err(missing("provider.api_key"));
        }
        if self.store.path.is_none() {
            return Err(missing("store.path"));
        }
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "agent.max_iterations must be at least 1".to_string(),
            ));
        }
        if self.search.max_limit == 0 {
            return Err(ConfigError::Invalid(
                "search.max_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Extract the dotted key from messages like "missing field `type` for key `store`"
fn missing_field(message: &str) -> Option<String> {
    let rest = message.strip_prefix("missing field `")?;
    let (field, rest) = rest.split_once('`')?;
    let parent = rest
        .split_once("for key")
        .map(|(_, key)| key.trim().trim_matches(|c| c == '`' || c == '"'))
        .filter(|key| !key.is_empty());

    Some(match parent {
        Some(parent) => format!("{}.{}", parent, field),
        None => field.to_string(),
    })
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_provider_host() -> String {
    OPENROUTER_HOST.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_provider_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_limit() -> usize {
    10
}

fn default_max_limit() -> usize {
    50
}

fn default_description_chars() -> usize {
    300
}
