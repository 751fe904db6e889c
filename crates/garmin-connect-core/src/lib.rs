//! Client for the unofficial, cookie-authenticated Garmin Connect web API.
//!
//! [`ApiClient`] signs in through Garmin's SSO, carries the session across
//! calls and renews it when Garmin silently expires it. Resource callers use
//! [`ApiClient::fetch`] and [`ApiClient::submit`] and never deal with cookies.
//!
//! ```no_run
//! # async fn run() -> Result<(), garmin_connect_core::ApiError> {
//! use garmin_connect_core::{ApiClient, Config, Credentials};
//!
//! let client = ApiClient::new(Config::default())?;
//! client.set_credentials(Credentials::new("ada@example.com", "secret")).await;
//! let profile = client.authenticate().await?;
//! println!("Signed in as {}", profile.display_name);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{CredentialStore, Credentials, ScrapeError, SessionFile, SessionState};
pub use config::Config;
pub use models::Profile;

// Resource callers name methods and statuses when dispatching
pub use reqwest::{Method, StatusCode};
