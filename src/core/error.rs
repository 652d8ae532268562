//! Error types for the appender

pub type Result<T> = std::result::Result<T, AppenderError>;

#[derive(Debug, thiserror::Error)]
pub enum AppenderError {
    /// Invalid configuration with details
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfiguration { field: String, message: String },

    /// Configuration file could not be read
    #[error("Failed to read configuration file '{path}': {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration document could not be parsed
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Layout pattern could not be compiled
    #[error("Invalid layout pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Appender already running
    #[error("Appender '{0}' is already started")]
    AlreadyStarted(String),

    /// Appender was stopped and cannot be restarted
    #[error("Appender '{0}' has been stopped")]
    Stopped(String),

    /// Background worker could not be spawned
    #[error("Failed to spawn background worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

impl AppenderError {
    /// Create an invalid configuration error
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppenderError::InvalidConfiguration {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a configuration file error
    pub fn config_io(path: impl Into<String>, source: std::io::Error) -> Self {
        AppenderError::ConfigIo {
            path: path.into(),
            source,
        }
    }

    /// Create a pattern compilation error
    pub fn pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        AppenderError::InvalidPattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }
}
