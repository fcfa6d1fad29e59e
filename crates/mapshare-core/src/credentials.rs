//! MapShare password storage in the OS keychain.
//!
//! Passwords are stored per MapShare identifier so the CLI does not need
//! them on the command line or in the config file.

use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "inreach-mapshare";

pub struct CredentialStore;

impl CredentialStore {
    /// Store the password for a MapShare identifier
    pub fn store(identifier: &str, password: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, identifier)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(password)
            .context("Failed to store password in keychain")?;
        Ok(())
    }

    /// Retrieve the password for a MapShare identifier
    pub fn get_password(identifier: &str) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, identifier)
            .context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Forget the password for a MapShare identifier.
    /// An identifier with nothing stored is not an error.
    pub fn delete(identifier: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, identifier)
            .context("Failed to create keyring entry")?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete password from keychain"),
        }
    }

    pub fn has_credentials(identifier: &str) -> bool {
        Entry::new(SERVICE_NAME, identifier)
            .map(|entry| entry.get_password().is_ok())
            .unwrap_or(false)
    }
}
