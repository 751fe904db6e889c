//! Request dispatch for the Garmin Connect web API.
//!
//! This module provides the `ApiClient`, which attaches the session cookies
//! to every request and transparently renews the session when Garmin
//! invalidates it.
//!
//! The API is cookie authenticated: a `SESSIONID` cookie obtained through
//! the SSO handshake, pinned to a backend by Cloudflare's `__cflb` cookie.

pub mod client;
pub mod cookies;
pub mod error;
pub mod request;

pub use client::ApiClient;
pub use error::ApiError;
pub use request::DUMP_TARGET;
