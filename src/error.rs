//! Error types for glottocat

use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// A record without a stable external identifier cannot be imported:
    /// assigning a synthetic key would break cross-referencing with the
    /// source corpus.
    #[error("record '{bibkey}' carries no usable glottolog_ref_id")]
    MissingIdentity { bibkey: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("catalog store error: {0}")]
    Store(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
