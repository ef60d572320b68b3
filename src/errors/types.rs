//! Error type definitions for m3u-sync
//!
//! Errors are layered the same way the application is: storage failures
//! surface as [`RepositoryError`], upstream fetch failures as [`SourceError`],
//! and both roll up into [`AppError`] at the service boundary.

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Storage collaborator failures (including a failed channel replace)
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Upstream playlist fetch failures
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Resource not found errors
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },
}

/// Repository layer specific errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database errors from sqlx
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Extra tag (de)serialization failures
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Stored timestamps that do not parse
    #[error("Chrono parsing error: {0}")]
    ChronoParse(#[from] chrono::ParseError),

    /// Stored identifiers that do not parse
    #[error("UUID parsing error: {0}")]
    UuidParse(#[from] uuid::Error),

    /// Record not found
    #[error("Record not found: {table} with {field} = {value}")]
    RecordNotFound {
        table: String,
        field: String,
        value: String,
    },

    /// Stored values outside of their domain
    #[error("Invalid data in {field}: {message}")]
    InvalidData { field: String, message: String },

    /// The atomic delete-and-insert of a playlist's channels did not complete
    #[error("Channel replace failed for playlist {playlist_id}: {message}")]
    ReplaceFailed { playlist_id: String, message: String },
}

/// Source fetch specific errors
#[derive(Error, Debug)]
pub enum SourceError {
    /// Network timeouts
    #[error("Connection timeout: {url}")]
    Timeout { url: String },

    /// Connection level failures
    #[error("Connection failed: {url} - {message}")]
    ConnectionFailed { url: String, message: String },

    /// Non-success HTTP status from the source
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// Body could not be read or decoded as text
    #[error("Invalid response body from {url}: {message}")]
    InvalidBody { url: String, message: String },

    /// Invalid client configuration
    #[error("Invalid configuration: {field} - {message}")]
    InvalidConfig { field: String, message: String },
}

impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource: R, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }
}

impl RepositoryError {
    pub fn record_not_found<T: Into<String>, F: Into<String>, V: Into<String>>(
        table: T,
        field: F,
        value: V,
    ) -> Self {
        Self::RecordNotFound {
            table: table.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn replace_failed<P: ToString, M: Into<String>>(playlist_id: P, message: M) -> Self {
        Self::ReplaceFailed {
            playlist_id: playlist_id.to_string(),
            message: message.into(),
        }
    }
}

impl SourceError {
    pub fn connection_failed<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::ConnectionFailed {
            url: url.into(),
            message: message.into(),
        }
    }
}
