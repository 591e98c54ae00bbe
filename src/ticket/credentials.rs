//! Jira API token persistence via OS keyring
//!
//! The token is stored in the operating system's native credential store
//! (Keychain on macOS, Secret Service on Linux, Windows Credential Manager
//! on Windows) under one service name, keyed by account email.

use crate::error::{AutoclockError, Result};

const SERVICE: &str = "autoclock-jira";

/// Stateless accessor for the Jira token in the OS keyring.
pub struct JiraCredentials;

impl JiraCredentials {
    /// Persist the API token for `email`.
    ///
    /// # Errors
    ///
    /// Returns [`AutoclockError::Keyring`] if the OS credential store
    /// rejects the write.
    pub fn save_token(&self, email: &str, token: &str) -> Result<()> {
        let entry = keyring::Entry::new(SERVICE, email).map_err(AutoclockError::Keyring)?;
        entry.set_password(token).map_err(AutoclockError::Keyring)?;
        Ok(())
    }

    /// Load the API token for `email`; `Ok(None)` when none was saved.
    pub fn load_token(&self, email: &str) -> Result<Option<String>> {
        let entry = keyring::Entry::new(SERVICE, email).map_err(AutoclockError::Keyring)?;
        match entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AutoclockError::Keyring(e).into()),
        }
    }
}
