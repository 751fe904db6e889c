//! Authentication module for Garmin Connect sessions.
//!
//! This module provides:
//! - `SessionState`: credentials, session/load balancer ids and profile
//! - `SessionFile`: JSON persistence of `SessionState` between runs
//! - `SessionNegotiator`: the SSO sign-in handshake
//! - `CredentialStore`: Secure OS-level credential storage via keyring
//! - `scrape`: extraction of values embedded in Garmin's HTML pages

pub mod credentials;
pub mod negotiator;
pub mod scrape;
pub mod session;

pub use credentials::CredentialStore;
pub use negotiator::SessionNegotiator;
pub use scrape::ScrapeError;
pub use session::{Credentials, SessionFile, SessionState};
