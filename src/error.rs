//! Error types for autoclock
//!
//! This module defines the error taxonomy shared by the session store, the
//! remote collaborators and the reconciliation controller, using `thiserror`
//! for ergonomic error handling.

use thiserror::Error;

/// Main error type for autoclock operations
///
/// The controller branches on these variants to decide whether a failure is
/// transient (log and retry next tick), permanent for one presence axis, or a
/// contract violation that should surface at the call site.
#[derive(Error, Debug)]
pub enum AutoclockError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote service unreachable, returned a non-success status, or timed out
    #[error("Transport error: {0}")]
    Transport(String),

    /// Session store persistence failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// A presence signal is not available on this platform
    #[error("Presence signal unavailable: {0}")]
    SignalUnavailable(String),

    /// A session with this id already exists in the store
    #[error("Duplicate session id: {0}")]
    DuplicateId(String),

    /// Missing credentials for a remote collaborator
    #[error("Missing credentials for {0}")]
    MissingCredentials(String),

    /// User supplied an invalid argument on the command surface
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

impl AutoclockError {
    /// Returns `true` when the error means a presence signal can never be
    /// sampled in this process.
    pub fn is_signal_unavailable(&self) -> bool {
        matches!(self, AutoclockError::SignalUnavailable(_))
    }

    /// Returns `true` for failures a later retry may get past.
    pub fn is_transport(&self) -> bool {
        matches!(self, AutoclockError::Transport(_))
    }
}

/// Result type alias for autoclock operations
///
/// Uses `anyhow::Error` so call sites can attach context; typed variants are
/// recovered with `downcast_ref::<AutoclockError>()`.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let error = AutoclockError::Transport("connection refused".to_string());
        assert_eq!(error.to_string(), "Transport error: connection refused");
    }

    #[test]
    fn test_storage_error_display() {
        let error = AutoclockError::Storage("database is locked".to_string());
        assert_eq!(error.to_string(), "Storage error: database is locked");
    }

    #[test]
    fn test_duplicate_id_display() {
        let error = AutoclockError::DuplicateId("abc".to_string());
        assert_eq!(error.to_string(), "Duplicate session id: abc");
    }

    #[test]
    fn test_signal_unavailable_is_detected_through_anyhow() {
        let error: anyhow::Error =
            AutoclockError::SignalUnavailable("loginctl not found".to_string()).into();
        let typed = error
            .downcast_ref::<AutoclockError>()
            .expect("typed error preserved");
        assert!(typed.is_signal_unavailable());
    }

    #[test]
    fn test_transport_is_not_signal_unavailable() {
        assert!(!AutoclockError::Transport("x".to_string()).is_signal_unavailable());
    }

    #[test]
    fn test_is_transport() {
        assert!(AutoclockError::Transport("x".to_string()).is_transport());
        assert!(!AutoclockError::MissingCredentials("x".to_string()).is_transport());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: AutoclockError = io_error.into();
        assert!(matches!(error, AutoclockError::Io(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: : yaml").unwrap_err();
        let error: AutoclockError = yaml_error.into();
        assert!(matches!(error, AutoclockError::Yaml(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AutoclockError>();
    }
}
