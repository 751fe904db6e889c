//! API client for the Garmin Connect web API.
//!
//! This module provides the `ApiClient` struct, which owns the session state
//! and dispatches authenticated requests on behalf of resource callers.

use std::sync::Arc;
use std::time::Instant;

use reqwest::{Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::cookies::{self, LOAD_BALANCER_COOKIE, SESSION_COOKIE};
use super::request::{PendingRequest, Transport};
use super::ApiError;
use crate::auth::{Credentials, SessionNegotiator, SessionState};
use crate::config::Config;
use crate::models::Profile;

/// API client for Garmin Connect.
///
/// Clone is cheap and clones share the session. Every dispatch holds the
/// session lock from reading the cookies until the final response, renewal
/// and replay included, so concurrent calls are serialized and never see a
/// half-renewed session.
#[derive(Clone)]
pub struct ApiClient {
    transport: Transport,
    negotiator: Arc<SessionNegotiator>,
    config: Arc<Config>,
    state: Arc<Mutex<SessionState>>,
}

impl ApiClient {
    /// Create a new API client without any session
    pub fn new(config: Config) -> Result<Self, ApiError> {
        Self::with_state(config, SessionState::default())
    }

    /// Create a client resuming a previously saved session
    pub fn with_state(config: Config, state: SessionState) -> Result<Self, ApiError> {
        let transport = Transport::new(&config)?;
        let negotiator = SessionNegotiator::new(transport.clone(), &config)?;

        Ok(Self {
            transport,
            negotiator: Arc::new(negotiator),
            config: Arc::new(config),
            state: Arc::new(Mutex::new(state)),
        })
    }

    // ===== Session State =====

    pub async fn credentials(&self) -> Credentials {
        self.state.lock().await.credentials().clone()
    }

    pub async fn set_credentials(&self, credentials: Credentials) {
        self.state.lock().await.set_credentials(credentials);
    }

    pub async fn session_id(&self) -> String {
        self.state.lock().await.session_id().to_string()
    }

    pub async fn load_balancer_id(&self) -> String {
        self.state.lock().await.load_balancer_id().to_string()
    }

    /// Inject a session obtained earlier. The load balancer id must be the
    /// one issued together with the session id.
    pub async fn set_tokens(&self, session_id: impl Into<String>, load_balancer_id: impl Into<String>) {
        self.state.lock().await.set_tokens(session_id, load_balancer_id);
    }

    /// Profile of the signed-in user, the default target of resource callers
    pub async fn profile(&self) -> Option<Profile> {
        self.state.lock().await.profile().cloned()
    }

    pub async fn set_profile(&self, profile: Profile) {
        self.state.lock().await.set_profile(profile);
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.is_authenticated()
    }

    /// Copy of the whole session state, suitable for persisting
    pub async fn snapshot(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    pub async fn restore(&self, state: SessionState) {
        *self.state.lock().await = state;
    }

    // ===== Authentication =====

    /// Sign in with the configured credentials and return the user's profile
    pub async fn authenticate(&self) -> Result<Profile, ApiError> {
        let mut state = self.state.lock().await;
        self.negotiator.authenticate(&mut state).await
    }

    /// End the session with Garmin and forget the session cookies
    pub async fn signout(&self) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        if !state.is_authenticated() {
            return Err(ApiError::NotAuthenticated);
        }

        let url = self
            .config
            .logout_url()
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid logout URL: {}", e)))?;
        self.transport
            .send(&PendingRequest::get(url), &session_cookies(&state))
            .await?;

        state.clear_tokens();
        info!("Signed out");
        Ok(())
    }

    // ===== Dispatch =====

    /// Send an authenticated request and decode the JSON response body
    pub async fn fetch<T, P>(&self, method: Method, url: &str, payload: Option<&P>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let response = self.dispatch(Self::request(method, url, payload)?).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// GET `url` and decode the JSON response body
    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        self.fetch::<T, ()>(Method::GET, url, None).await
    }

    /// Send an authenticated request when no data is expected in return,
    /// only a status code. `expected_status` of `None` accepts any status
    /// not already classified as an error.
    pub async fn submit<P>(
        &self,
        method: Method,
        url: &str,
        payload: Option<&P>,
        expected_status: Option<StatusCode>,
    ) -> Result<(), ApiError>
    where
        P: Serialize + ?Sized,
    {
        let response = self.dispatch(Self::request(method.clone(), url, payload)?).await?;
        let status = response.status();

        match expected_status {
            Some(expected) if expected != status => Err(ApiError::UnexpectedStatus {
                method,
                status,
                expected,
            }),
            _ => Ok(()),
        }
    }

    /// Retrieve the raw body of `url` using the session.
    ///
    /// The session cookie is sent to `url`, so only use this for Garmin
    /// endpoints.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let response = self.dispatch(PendingRequest::parse(Method::GET, url)?).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Social profile of `display_name`, or of the signed-in user when empty
    pub async fn social_profile(&self, display_name: &str) -> Result<Profile, ApiError> {
        let url = self
            .config
            .social_profile_url(display_name)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid display name {}: {}", display_name, e)))?;
        self.get(url.as_str()).await
    }

    fn request<P>(method: Method, url: &str, payload: Option<&P>) -> Result<PendingRequest, ApiError>
    where
        P: Serialize + ?Sized,
    {
        let pending = PendingRequest::parse(method, url)?;
        match payload {
            Some(payload) => pending.json(payload),
            None => Ok(pending),
        }
    }

    /// Send `pending`, renewing the session and replaying once if Garmin
    /// invalidated it, then classify the final response.
    async fn dispatch(&self, pending: PendingRequest) -> Result<Response, ApiError> {
        let mut state = self.state.lock().await;

        debug!(method = %pending.method(), url = %pending.url(), "Requesting");
        let mut started = Instant::now();
        let mut response = self.transport.send(&pending, &session_cookies(&state)).await?;

        // Garmin answers 403 both when access is denied and when the session
        // is invalid. Only the latter comes with a new session cookie.
        if cookies::find_set_cookie(response.headers(), SESSION_COOKIE).is_some() {
            state.clear_tokens();

            if !self.config.auto_renew_session {
                info!("Session invalid, automatic renewal disabled");
                return Err(ApiError::SessionExpired);
            }

            info!("Session invalid, requesting new session");
            self.negotiator.authenticate(&mut state).await?;

            // One replay only. A second invalidation means something else
            // is wrong and is left to the classification below.
            debug!(method = %pending.method(), url = %pending.url(), "Replaying request");
            started = Instant::now();
            response = self.transport.send(&pending, &session_cookies(&state)).await?;
        }
        drop(state);

        debug!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Got response"
        );

        Self::classify(response).await
    }

    async fn classify(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            let body = response.bytes().await?;
            return Err(ApiError::from_forbidden(&body));
        }
        match ApiError::from_status(status) {
            Some(err) => Err(err),
            None => Ok(response),
        }
    }
}

fn session_cookies(state: &SessionState) -> [(&'static str, &str); 2] {
    [
        (SESSION_COOKIE, state.session_id()),
        (LOAD_BALANCER_COOKIE, state.load_balancer_id()),
    ]
}
