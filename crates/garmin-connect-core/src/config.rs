//! Client configuration.
//!
//! Holds the endpoints used for sign-in and the knobs of the HTTP client.
//! Configuration is stored at `~/.config/garmin-connect/config.json`; every
//! field is optional in the file and falls back to the defaults below.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "garmin-connect";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

const DEFAULT_SSO_URL: &str = "https://sso.garmin.com/sso/signin";
const DEFAULT_SERVICE_URL: &str = "https://connect.garmin.com/modern/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sign-in endpoint of the SSO service
    pub sso_url: String,
    /// Base URL of the Garmin Connect web application. Must end with `/`.
    pub service_url: String,
    /// Sent as `User-Agent` on every request
    pub user_agent: String,
    /// Renew the session and replay the request when Garmin invalidates it
    pub auto_renew_session: bool,
    /// Cap TLS at 1.2; Cloudflare in front of Garmin rejects some newer handshakes
    pub max_tls_1_2: bool,
    /// Per-request timeout. No timeout when unset.
    pub request_timeout_secs: Option<u64>,
    /// Trace every request and response on the `garmin_connect_core::dump` target
    pub dump_http: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sso_url: DEFAULT_SSO_URL.to_string(),
            service_url: DEFAULT_SERVICE_URL.to_string(),
            user_agent: concat!("garmin-connect-core/", env!("CARGO_PKG_VERSION")).to_string(),
            auto_renew_session: true,
            max_tls_1_2: true,
            request_timeout_secs: None,
            dump_http: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Default location of the persisted session state
    pub fn session_path() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join(SESSION_FILE))
    }

    /// The SSO sign-in URL, pointing the service and gauth host at Connect.
    pub fn signin_url(&self) -> Result<Url, url::ParseError> {
        Url::parse_with_params(
            &self.sso_url,
            &[
                ("service", self.service_url.as_str()),
                ("gauthHost", self.service_url.as_str()),
                ("generateExtraServiceTicket", "true"),
                ("generateTwoExtraServiceTickets", "true"),
            ],
        )
    }

    pub fn logout_url(&self) -> Result<Url, url::ParseError> {
        self.service_url()?.join("auth/logout")
    }

    /// URL of the social profile of `display_name`; the authenticated user's
    /// own profile when empty.
    pub fn social_profile_url(&self, display_name: &str) -> Result<Url, url::ParseError> {
        let mut url = self
            .service_url()?
            .join("proxy/userprofile-service/socialProfile")?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .push(display_name);
        Ok(url)
    }

    fn service_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.service_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signin_url() {
        let url = Config::default().signin_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://sso.garmin.com/sso/signin\
             ?service=https%3A%2F%2Fconnect.garmin.com%2Fmodern%2F\
             &gauthHost=https%3A%2F%2Fconnect.garmin.com%2Fmodern%2F\
             &generateExtraServiceTicket=true\
             &generateTwoExtraServiceTickets=true"
        );
    }

    #[test]
    fn test_service_urls() {
        let config = Config::default();
        assert_eq!(
            config.logout_url().unwrap().as_str(),
            "https://connect.garmin.com/modern/auth/logout"
        );
        assert_eq!(
            config.social_profile_url("runner42").unwrap().as_str(),
            "https://connect.garmin.com/modern/proxy/userprofile-service/socialProfile/runner42"
        );
        assert_eq!(
            config.social_profile_url("").unwrap().as_str(),
            "https://connect.garmin.com/modern/proxy/userprofile-service/socialProfile/"
        );
    }

    #[test]
    fn test_social_profile_url_escapes_display_name() {
        let config = Config::default();
        assert_eq!(
            config.social_profile_url("a/b?c#d").unwrap().as_str(),
            "https://connect.garmin.com/modern/proxy/userprofile-service/socialProfile/a%2Fb%3Fc%23d"
        );
    }

    #[test]
    fn test_load_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"auto_renew_session": false, "request_timeout_secs": 30}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(!config.auto_renew_session);
        assert_eq!(config.request_timeout_secs, Some(30));
        assert_eq!(config.sso_url, DEFAULT_SSO_URL);
        assert!(config.max_tls_1_2);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
    }
}
