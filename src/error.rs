//! Error types for the asset generation pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Storage-related errors
///
/// Anything that threatens the manifest, cache, error log or artifact on disk.
/// These are never absorbed at the item boundary.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize {what}: {message}")]
    Serialize { what: &'static str, message: String },

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StorageError {
    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Write {
            path: path.into(),
            source,
        }
    }
}

/// Classified failure of a call to the external service.
///
/// The classification drives the backoff in [`crate::retry`]. Each variant carries
/// the attempt number on which it was observed (0 until the retry layer stamps it).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("Rate limit exceeded (attempt {attempt}): {message}")]
    RateLimited { attempt: u32, message: String },

    #[error("HTTP {status} (attempt {attempt}): {message}")]
    TransientHttp {
        attempt: u32,
        status: u16,
        message: String,
    },

    #[error("{message} (attempt {attempt})")]
    Other { attempt: u32, message: String },
}

/// Coarse classification of a [`ServiceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    RateLimited,
    TransientHttp,
    Other,
}

impl ServiceError {
    pub fn rate_limited(message: impl Into<String>) -> Self {
        ServiceError::RateLimited {
            attempt: 0,
            message: message.into(),
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        ServiceError::TransientHttp {
            attempt: 0,
            status,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        ServiceError::Other {
            attempt: 0,
            message: message.into(),
        }
    }

    /// Map a non-success HTTP status to its classification. 429 is the only
    /// status treated as rate limiting.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        if status == 429 {
            ServiceError::rate_limited(body)
        } else {
            ServiceError::http(status, body)
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ServiceError::RateLimited { .. } => ErrorClass::RateLimited,
            ServiceError::TransientHttp { .. } => ErrorClass::TransientHttp,
            ServiceError::Other { .. } => ErrorClass::Other,
        }
    }

    pub fn attempt(&self) -> u32 {
        match self {
            ServiceError::RateLimited { attempt, .. }
            | ServiceError::TransientHttp { attempt, .. }
            | ServiceError::Other { attempt, .. } => *attempt,
        }
    }

    pub fn with_attempt(mut self, n: u32) -> Self {
        match &mut self {
            ServiceError::RateLimited { attempt, .. }
            | ServiceError::TransientHttp { attempt, .. }
            | ServiceError::Other { attempt, .. } => *attempt = n,
        }
        self
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            return ServiceError::from_status(status.as_u16(), error.to_string());
        }
        if error.is_timeout() {
            ServiceError::other(format!("Request timeout: {}", error))
        } else if error.is_connect() {
            ServiceError::other(format!("Connection error: {}", error))
        } else {
            ServiceError::other(format!("HTTP error: {}", error))
        }
    }
}

/// Top-level errors. Anything surfacing here aborts the run.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Catalog error: {0}")]
    CatalogError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Cancelled")]
    Cancelled,
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
