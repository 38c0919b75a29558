use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from I/O operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The capture provider could not be launched
    #[error("Failed to start capture provider '{program}': {source}")]
    ProviderStart {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The capture provider misbehaved after launch
    #[error("Capture provider error: {0}")]
    ProviderError(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for application
pub type AppResult<T> = Result<T, AppError>;
