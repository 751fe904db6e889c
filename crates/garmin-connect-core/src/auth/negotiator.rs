//! The Garmin SSO handshake.
//!
//! Signing in takes four round trips: fetch the sign-in form for its CSRF
//! token, post the credentials, redeem the service ticket found in the
//! response for a session cookie, and finally follow the ticket redirect,
//! which activates the session and serves the viewer's profile.
//!
//! Requests here go straight to the [`Transport`], never through the
//! dispatcher, so a failing handshake can never trigger another renewal.

use regex::Regex;
use reqwest::header::{LOCATION, REFERER};
use reqwest::Method;
use tracing::{debug, info, warn};
use url::Url;

use super::{scrape, SessionState};
use crate::api::cookies::{self, LOAD_BALANCER_COOKIE, SESSION_COOKIE};
use crate::api::request::{PendingRequest, Transport};
use crate::api::ApiError;
use crate::config::Config;
use crate::models::Profile;

pub struct SessionNegotiator {
    transport: Transport,
    signin_url: Url,
    ticket_pattern: Regex,
}

impl SessionNegotiator {
    pub fn new(transport: Transport, config: &Config) -> Result<Self, ApiError> {
        let signin_url = config
            .signin_url()
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid SSO URL: {}", e)))?;

        Ok(Self {
            transport,
            signin_url,
            ticket_pattern: ticket_pattern(&config.service_url)?,
        })
    }

    /// Sign in with the credentials in `state`.
    ///
    /// The session id, load balancer id and profile are written to `state`
    /// only once the whole handshake has succeeded.
    pub async fn authenticate(&self, state: &mut SessionState) -> Result<Profile, ApiError> {
        let credentials = state.credentials().clone();
        if !credentials.is_complete() {
            return Err(ApiError::NoCredentials);
        }

        debug!(url = %self.signin_url, "Getting CSRF token");
        let response = self
            .transport
            .send(&PendingRequest::get(self.signin_url.clone()), &[])
            .await?;
        let sso_cookies: Vec<(String, String)> = cookies::set_cookies(response.headers())
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        let page = response.text().await?;
        let csrf_token = scrape::extract_csrf_token(&page)?;

        debug!(url = %self.signin_url, "Trying credentials");
        let submission = PendingRequest::new(Method::POST, self.signin_url.clone())
            .form(&[
                ("username", credentials.email.as_str()),
                ("password", credentials.password.as_str()),
                ("embed", "false"),
                ("_csrf", csrf_token.as_str()),
            ])
            .header(REFERER, self.signin_url.as_str())?;
        let sso_cookie_refs: Vec<(&str, &str)> = sso_cookies
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        let response = self.transport.send(&submission, &sso_cookie_refs).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %ApiError::truncate_body(&body), "SSO rejected sign-in request");
            return Err(ApiError::SignInRejected(status));
        }

        let body = response.text().await?;
        let ticket_url = self.find_ticket_url(&body).ok_or(ApiError::WrongCredentials)?;

        debug!(url = %ticket_url, "Requesting session at ticket URL");
        let response = self
            .transport
            .send(&PendingRequest::get(ticket_url.clone()), &[])
            .await?;

        let load_balancer_id =
            cookies::find_set_cookie(response.headers(), LOAD_BALANCER_COOKIE).unwrap_or_default();
        let session_id = match cookies::find_set_cookie(response.headers(), SESSION_COOKIE) {
            Some(session_id) => session_id,
            None => {
                debug!("Ticket was not honored, no session cookie set");
                return Err(ApiError::WrongCredentials);
            }
        };
        if load_balancer_id.is_empty() {
            debug!("No load balancer cookie set with the session");
        }

        // The session id stays invalid until the redirect is followed.
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                ApiError::InvalidResponse("Ticket response carried no Location header".to_string())
            })?;
        let activation_url = ticket_url.join(location).map_err(|e| {
            ApiError::InvalidResponse(format!("Invalid redirect location {}: {}", location, e))
        })?;

        debug!(url = %activation_url, "Redeeming session id");
        let response = self
            .transport
            .send(
                &PendingRequest::get(activation_url),
                &[
                    (SESSION_COOKIE, session_id.as_str()),
                    (LOAD_BALANCER_COOKIE, load_balancer_id.as_str()),
                ],
            )
            .await?;
        let page = response.text().await?;
        let profile = scrape::extract_profile(&page)?;

        state.set_tokens(session_id, load_balancer_id);
        state.set_profile(profile.clone());
        state.mark_authenticated();

        info!(email = %credentials.email, display_name = %profile.display_name, "Successfully authenticated");
        Ok(profile)
    }

    /// Find the service ticket URL in the credentials response.
    ///
    /// The URL sits JSON-escaped inside an inline script, so slashes appear
    /// as `\/`.
    fn find_ticket_url(&self, body: &str) -> Option<Url> {
        let found = self.ticket_pattern.find(body)?;
        let unescaped = found.as_str().replace(r"\/", "/");
        match Url::parse(&unescaped) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(url = %unescaped, error = %e, "Ignoring unparsable ticket URL");
                None
            }
        }
    }
}

/// Pattern matching the escaped `<service_url>?ticket=<ticket>` URL
fn ticket_pattern(service_url: &str) -> Result<Regex, ApiError> {
    let escaped = service_url.replace('/', r"\/");
    Regex::new(&format!(r"{}\?ticket=[a-zA-Z0-9-]*", regex::escape(&escaped)))
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid ticket pattern: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn negotiator() -> SessionNegotiator {
        let config = Config::default();
        let transport = Transport::new(&config).unwrap();
        SessionNegotiator::new(transport, &config).unwrap()
    }

    #[test]
    fn test_find_ticket_url() {
        let body = r#"<script>var response_url = "https:\/\/connect.garmin.com\/modern\/?ticket=ST-0482315-fXq9cT2mLbWz7aNe1PdR-cas";</script>"#;

        let url = negotiator().find_ticket_url(body).expect("ticket should be found");
        assert_eq!(
            url.as_str(),
            "https://connect.garmin.com/modern/?ticket=ST-0482315-fXq9cT2mLbWz7aNe1PdR-cas"
        );
    }

    #[test]
    fn test_find_ticket_url_ignores_other_hosts() {
        let body = r#"var response_url = "https:\/\/evil.example.com\/modern\/?ticket=ST-1";"#;
        assert!(negotiator().find_ticket_url(body).is_none());

        // Dots in the service URL are literal
        let body = r#"var response_url = "https:\/\/connectXgarmin.com\/modern\/?ticket=ST-1";"#;
        assert!(negotiator().find_ticket_url(body).is_none());
    }

    #[test]
    fn test_find_ticket_url_missing() {
        let body = "<html><div id=\"status\">Invalid sign in. Please try again.</div></html>";
        assert!(negotiator().find_ticket_url(body).is_none());
    }

    #[tokio::test]
    async fn test_authenticate_without_credentials() {
        let mut state = SessionState::default();
        let result = negotiator().authenticate(&mut state).await;
        assert!(matches!(result, Err(ApiError::NoCredentials)));
        assert!(!state.is_authenticated());
    }
}
