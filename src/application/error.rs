//! Application-level errors (wraps domain errors)

use thiserror::Error;

use crate::domain::DomainError;

/// Application errors wrap domain errors and add orchestration context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("defaults declare no version at '{route}'")]
    MissingDefaultVersion { route: String },

    #[error("document version {user} is newer than defaults version {defaults}")]
    DowngradeNotAllowed { user: String, defaults: String },

    #[error("unsupported relocation file format: {0}")]
    UnsupportedFormat(std::path::PathBuf),

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
