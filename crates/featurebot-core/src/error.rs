//! Core error types for featurebot-core.
//!
//! Persistence failures surface as [`StoreError`], network and API failures as
//! [`PlatformError`]. Neither is fatal to a running bot: callers log them and
//! abandon the step that raised them.

use std::path::PathBuf;
use thiserror::Error;

use crate::platform::PostId;

/// Core error type for featurebot-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Countdown store or day marker failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Platform API failure
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Job scheduler failures
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistence errors raised by the countdown store and the day marker.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// A feature record already exists for this post
    #[error("Post {0} already has a feature record")]
    DuplicateRecord(PostId),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A previous holder of the connection panicked
    #[error("Database connection mutex poisoned")]
    Poisoned,
}

/// Platform client errors.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Transport-level failure (connect, timeout, body decode)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The instance answered with a non-success status or an error body
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// A response was missing a field we depend on
    #[error("Unexpected response: missing {0}")]
    MissingField(&'static str),

    /// Invalid instance URL
    #[error("Invalid instance URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Called an authenticated endpoint before logging in
    #[error("Not logged in to {instance}")]
    NotAuthenticated { instance: String },

    /// Community is outside the federation allow-list
    #[error("Community {community}@{instance} is not in the allow-list")]
    NotAllowed { community: String, instance: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    /// Failed to resolve the data directory
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg) => {
                if code.code == rusqlite::ErrorCode::DatabaseLocked
                    || code.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<tokio_cron_scheduler::JobSchedulerError> for CoreError {
    fn from(err: tokio_cron_scheduler::JobSchedulerError) -> Self {
        CoreError::Scheduler(format!("{err:?}"))
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
