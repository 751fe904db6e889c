use anyhow::{Context, Result};
use keyring::Entry;

use super::Credentials;

const SERVICE_NAME: &str = "garmin-connect";

/// Keeps passwords in the OS keychain so session files never need to.
///
/// Without a platform backend enabled on `keyring`, entries live in memory
/// only and nothing survives the process.
pub struct CredentialStore;

impl CredentialStore {
    pub fn store(credentials: &Credentials) -> Result<()> {
        entry(&credentials.email)?
            .set_password(&credentials.password)
            .with_context(|| format!("Failed to save password for {}", credentials.email))
    }

    /// Rebuild the full credentials for an email
    pub fn load(email: &str) -> Result<Credentials> {
        let password = entry(email)?
            .get_password()
            .with_context(|| format!("No password saved for {}", email))?;
        Ok(Credentials::new(email, password))
    }

    pub fn delete(email: &str) -> Result<()> {
        entry(email)?
            .delete_credential()
            .with_context(|| format!("Failed to forget password for {}", email))
    }
}

fn entry(email: &str) -> Result<Entry> {
    Entry::new(SERVICE_NAME, email).context("Failed to open keychain entry")
}
