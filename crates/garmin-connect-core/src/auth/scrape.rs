//! Line-oriented extraction of values embedded in Garmin's HTML pages.
//!
//! These helpers match literal markers in third-party markup. When Garmin
//! changes its pages they fail with a [`ScrapeError`] instead of guessing.

use thiserror::Error;

use crate::models::Profile;

/// Marker identifying the hidden CSRF input of the sign-in form
const CSRF_MARKER: &str = r#"name="_csrf""#;
const CSRF_PREFIX: &str = r#"<input type="hidden" name="_csrf" value=""#;
const CSRF_SUFFIX: &str = r#"" />"#;

/// Marker identifying the script assignment carrying the viewer's profile
const PROFILE_MARKER: &str = "VIEWER_SOCIAL_PROFILE";
const PROFILE_PREFIX: &str = "window.VIEWER_SOCIAL_PROFILE = ";
const PROFILE_SUFFIX: &str = ";";

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("CSRF token not found in sign-in page")]
    CsrfTokenNotFound,

    #[error("Social profile not found in HTML")]
    ProfileNotFound,

    #[error("Social profile is not valid JSON: {0}")]
    InvalidProfile(#[source] serde_json::Error),
}

/// Extract the CSRF token from the sign-in form.
pub fn extract_csrf_token(html: &str) -> Result<String, ScrapeError> {
    let line = html
        .lines()
        .find(|line| line.contains(CSRF_MARKER))
        .ok_or(ScrapeError::CsrfTokenNotFound)?
        .trim();

    let line = line.strip_prefix(CSRF_PREFIX).unwrap_or(line);
    let line = line.strip_suffix(CSRF_SUFFIX).unwrap_or(line);

    Ok(line.to_string())
}

/// Extract the authenticated user's profile from the page served after the
/// session has been activated.
pub fn extract_profile(html: &str) -> Result<Profile, ScrapeError> {
    let line = html
        .lines()
        .find(|line| line.contains(PROFILE_MARKER))
        .ok_or(ScrapeError::ProfileNotFound)?;

    let unescaped = line.trim().replace('\\', "");
    let json = unescaped
        .strip_prefix(PROFILE_PREFIX)
        .unwrap_or(unescaped.as_str());
    let json = json.strip_suffix(PROFILE_SUFFIX).unwrap_or(json);

    serde_json::from_str(json).map_err(ScrapeError::InvalidProfile)
}
