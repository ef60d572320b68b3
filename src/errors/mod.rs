//! Centralized error handling for m3u-sync
//!
//! # Error Categories
//!
//! - **Repository Errors**: SQLite operations and the atomic channel replace
//! - **Source Errors**: fetching the upstream playlist text
//! - **Validation Errors**: requests that cannot be served (e.g. syncing a custom playlist)
//!
//! Parsing never produces an error: malformed M3U lines are skipped.
//!
//! # Usage
//!
//! ```rust
//! use m3u_sync::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Err(AppError::validation("playlist has no source URL"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Repository Results
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Convenience type alias for Source Results
pub type SourceResult<T> = Result<T, SourceError>;
