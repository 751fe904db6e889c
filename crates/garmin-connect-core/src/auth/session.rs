use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Profile;

/// Login credentials for the SSO service.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.email.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything a client needs to act as a signed-in browser session.
///
/// The session id is only valid together with the load balancer id issued
/// in the same handshake, so the two are set and cleared as a pair.
/// Serializes to the same JSON a previous run wrote, which lets a new process
/// resume the session without signing in again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(flatten)]
    credentials: Credentials,
    #[serde(rename = "sessionID", default)]
    session_id: String,
    #[serde(rename = "cflb", default)]
    load_balancer_id: String,
    #[serde(rename = "socialProfile", default)]
    profile: Option<Profile>,
    #[serde(rename = "authenticatedAt", default, skip_serializing_if = "Option::is_none")]
    authenticated_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            ..Default::default()
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn set_credentials(&mut self, credentials: Credentials) {
        self.credentials = credentials;
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn load_balancer_id(&self) -> &str {
        &self.load_balancer_id
    }

    /// Install a session id together with the load balancer id it belongs to
    pub fn set_tokens(&mut self, session_id: impl Into<String>, load_balancer_id: impl Into<String>) {
        self.session_id = session_id.into();
        self.load_balancer_id = load_balancer_id.into();
        self.authenticated_at = None;
    }

    pub fn clear_tokens(&mut self) {
        self.session_id.clear();
        self.load_balancer_id.clear();
        self.authenticated_at = None;
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn set_profile(&mut self, profile: Profile) {
        self.profile = Some(profile);
    }

    /// When the current session was established by a handshake in this or a
    /// previous run. `None` for injected sessions.
    pub fn authenticated_at(&self) -> Option<DateTime<Utc>> {
        self.authenticated_at
    }

    pub(crate) fn mark_authenticated(&mut self) {
        self.authenticated_at = Some(Utc::now());
    }

    pub fn is_authenticated(&self) -> bool {
        !self.session_id.is_empty()
    }
}

/// JSON file holding a [`SessionState`] between runs.
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load session state from disk, `None` if no file exists yet
    pub fn load(&self) -> Result<Option<SessionState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)
            .context("Failed to read session file")?;
        let state = serde_json::from_str(&contents)
            .context("Failed to parse session file")?;
        Ok(Some(state))
    }

    /// Save session state to disk, readable by the owner only
    pub fn save(&self, state: &SessionState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write session file {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to restrict session file permissions")?;
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
