//! Data models shared between the session core and resource callers.
//!
//! Only the identity record parsed during sign-in lives here; per-resource
//! payloads belong to the callers that request them.

pub mod profile;

pub use profile::Profile;
