//! Outgoing request construction and the raw HTTP transport.
//!
//! A [`PendingRequest`] owns a fully buffered body, so the same request can
//! be sent again after the session has been renewed.

use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{redirect, tls, Client, Method, Response};
use serde::Serialize;
use tracing::trace;
use url::Url;

use super::cookies;
use super::ApiError;
use crate::config::Config;

/// Target used for full request/response dumps
pub const DUMP_TARGET: &str = "garmin_connect_core::dump";

/// Garmin's API refuses requests without this header.
const NK_HEADER: HeaderName = HeaderName::from_static("nk");

/// A request description that can be materialized any number of times.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl PendingRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Parse `url` and start a request, rejecting malformed URLs up front
    pub fn parse(method: Method, url: &str) -> Result<Self, ApiError> {
        let url = Url::parse(url)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid URL {}: {}", url, e)))?;
        Ok(Self::new(method, url))
    }

    /// Serialize `payload` as the JSON body
    pub fn json<P: Serialize + ?Sized>(mut self, payload: &P) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_vec(payload)?);
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(self)
    }

    /// Encode `fields` as an `application/x-www-form-urlencoded` body
    pub fn form(mut self, fields: &[(&str, &str)]) -> Self {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        self.body = Some(encoded.into_bytes());
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        self
    }

    pub fn header(mut self, name: HeaderName, value: &str) -> Result<Self, ApiError> {
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid {} header: {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

/// Sends requests with the fixed client headers and explicit cookies.
///
/// Redirects are never followed: the sign-in handshake needs to see the
/// cookies and `Location` of the redirect responses themselves.
#[derive(Clone)]
pub struct Transport {
    http: Client,
    user_agent: HeaderValue,
    dump: bool,
}

impl Transport {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let mut builder = Client::builder().redirect(redirect::Policy::none());
        if config.max_tls_1_2 {
            builder = builder.max_tls_version(tls::Version::TLS_1_2);
        }
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid user agent: {}", e)))?;

        Ok(Self {
            http: builder.build()?,
            user_agent,
            dump: config.dump_http,
        })
    }

    /// Materialize `pending` with `cookies` attached and send it.
    pub async fn send(
        &self,
        pending: &PendingRequest,
        cookies: &[(&str, &str)],
    ) -> Result<Response, ApiError> {
        let mut headers = pending.headers.clone();
        headers.insert(header::USER_AGENT, self.user_agent.clone());
        headers.insert(NK_HEADER, HeaderValue::from_static("NT"));
        if let Some(cookie) = cookies::cookie_header(cookies)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid cookie value: {}", e)))?
        {
            headers.insert(header::COOKIE, cookie);
        }

        let mut builder = self
            .http
            .request(pending.method.clone(), pending.url.clone())
            .headers(headers);
        if let Some(ref body) = pending.body {
            builder = builder.body(body.clone());
        }
        let request = builder.build()?;

        if self.dump {
            let body = request
                .body()
                .and_then(|b| b.as_bytes())
                .map(String::from_utf8_lossy)
                .unwrap_or_default();
            trace!(
                target: DUMP_TARGET,
                method = %request.method(),
                url = %request.url(),
                headers = ?request.headers(),
                body = %body,
                "REQUEST"
            );
        }

        let response = self.http.execute(request).await?;

        if self.dump {
            trace!(
                target: DUMP_TARGET,
                status = %response.status(),
                url = %response.url(),
                headers = ?response.headers(),
                "RESPONSE"
            );
        }

        Ok(response)
    }
}
