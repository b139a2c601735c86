use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Other(#[from] config::ConfigError),
}

/// Environment variable that sets the configuration key `field`, e.g. `provider.api_key`
pub fn to_env_var(field: &str) -> String {
    format!("SCOUT_{}", field.to_uppercase().replace('.', "__"))
}
