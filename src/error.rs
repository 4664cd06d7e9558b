//! Error types for the rednote collector
//!
//! Two domain enums cover the fallible seams: the page-session capability
//! and the persistence gateway. Everything above them composes with
//! `anyhow::Result` at the application boundary.

use thiserror::Error;

/// Errors surfaced by the page-session capability
#[derive(Error, Debug)]
pub enum SessionError {
    /// Navigation to a URL failed or timed out
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// A required element could not be located
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// An element handle no longer resolves (page mutated or navigated)
    #[error("stale element handle: {0}")]
    StaleHandle(u64),

    /// Script execution against the document or an element failed
    #[error("script execution failed: {0}")]
    Script(String),

    /// Synthesized input (click, key press, wheel) was rejected
    #[error("input synthesis failed: {0}")]
    Input(String),

    /// The automation backend itself failed (launch, connect, protocol)
    #[error("browser backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the persistence gateway
#[derive(Error, Debug)]
pub enum StoreError {
    /// The connection is down and could not be re-established
    #[error("database unavailable: {0}")]
    Unavailable(String),

    /// Underlying SQLite error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Comment blob (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error (export files, database directory)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_display() {
        let err = SessionError::ElementNotFound("div.comments-container".into());
        assert!(err.to_string().contains("div.comments-container"));
    }

    #[test]
    fn test_store_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: StoreError = io.into();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
