use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure categories for pipeline operations.
///
/// `Configuration` and `Validation` are raised before any external call is
/// made. `Upstream` and `Io` are raised by the service that hit them, after
/// logging the underlying cause; callers present them to the user and keep
/// the session alive so the stage can be retried.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{service} request failed: {message}")]
    Upstream {
        service: &'static str,
        message: String,
    },

    #[error("file operation failed on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
}

impl Error {
    pub fn upstream(service: &'static str, message: impl ToString) -> Self {
        Error::Upstream {
            service,
            message: message.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors caused by user input rather than a system fault.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}
