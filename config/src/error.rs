use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("config validation failed: {0}")]
    Validation(String),

    #[error("config watch channel error: {0}")]
    Watch(String),

    #[error("hot-reload callback rejected the new config: {0}")]
    CallbackRejected(String),
}
