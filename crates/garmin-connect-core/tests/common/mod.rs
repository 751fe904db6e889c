//! Shared fixtures: a mock of Garmin's SSO and Connect endpoints.

#![allow(dead_code)]

use garmin_connect_core::{ApiClient, Config, Credentials};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const EMAIL: &str = "ada@example.com";
pub const PASSWORD: &str = "correct horse";
pub const CSRF_TOKEN: &str = "3E1B2F0A9C8D7E6F5A4B3C2D1E0F9A8B7C6D5E4F";
pub const TICKET: &str = "ST-0482315-fXq9cT2mLbWz7aNe1PdR-cas";
pub const SSO_COOKIE: &str = "GARMIN-SSO-GUID";

pub const SIGNIN_PAGE: &str = r#"<!DOCTYPE html>
<html>
<body>
    <form method="post" id="login-form">
        <input type="hidden" name="embed" value="false" />
        <input type="hidden" name="_csrf" value="3E1B2F0A9C8D7E6F5A4B3C2D1E0F9A8B7C6D5E4F" />
    </form>
</body>
</html>
"#;

pub const ACTIVATION_PAGE: &str = r#"<html>
<head>
<script type="text/javascript">
    window.VIEWER_SOCIAL_PROFILE = {\"id\":3172291,\"profileId\":2883745,\"displayName\":\"runner42\",\"fullName\":\"Ada Runner\"};
</script>
</head>
</html>
"#;

pub fn config(server: &MockServer) -> Config {
    Config {
        sso_url: format!("{}/sso/signin", server.uri()),
        service_url: format!("{}/modern/", server.uri()),
        ..Default::default()
    }
}

pub fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(config(server)).expect("client should build")
}

pub async fn client_with_credentials(server: &MockServer) -> ApiClient {
    let client = client(server);
    client.set_credentials(Credentials::new(EMAIL, PASSWORD)).await;
    client
}

pub fn resource_url(server: &MockServer, resource: &str) -> String {
    format!("{}/modern/proxy/{}", server.uri(), resource)
}

/// Credentials response embedding the JSON-escaped ticket URL
pub fn ticket_page(server: &MockServer) -> String {
    let service_url = format!("{}/modern/", server.uri()).replace('/', r"\/");
    format!(
        "<html><script>var response_url = \"{}?ticket={}\";</script></html>",
        service_url, TICKET
    )
}

pub async fn mount_signin_page(server: &MockServer, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/sso/signin"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", format!("{}=sso-guid-1; Path=/", SSO_COOKIE).as_str())
                .set_body_string(SIGNIN_PAGE),
        )
        .expect(expected)
        .mount(server)
        .await;
}

pub async fn mount_credentials_accepted(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/sso/signin"))
        .and(body_string_contains(format!("_csrf={}", CSRF_TOKEN)))
        .respond_with(ResponseTemplate::new(200).set_body_string(ticket_page(server)))
        .expect(expected)
        .mount(server)
        .await;
}

pub async fn mount_ticket(server: &MockServer, session_id: &str, load_balancer_id: &str, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/modern/"))
        .and(query_param("ticket", TICKET))
        .respond_with(
            ResponseTemplate::new(302)
                .append_header("set-cookie", format!("__cflb={}; SameSite=None; Secure; path=/; HttpOnly", load_balancer_id).as_str())
                .append_header("set-cookie", format!("SESSIONID={}; Path=/; Secure; HttpOnly", session_id).as_str())
                .insert_header("location", format!("{}/modern/activate", server.uri()).as_str()),
        )
        .expect(expected)
        .mount(server)
        .await;
}

pub async fn mount_activation(server: &MockServer, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/modern/activate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ACTIVATION_PAGE))
        .expect(expected)
        .mount(server)
        .await;
}

/// Mount a complete, successful handshake issuing the given session
pub async fn mount_handshake(server: &MockServer, session_id: &str, load_balancer_id: &str, expected: u64) {
    mount_signin_page(server, expected).await;
    mount_credentials_accepted(server, expected).await;
    mount_ticket(server, session_id, load_balancer_id, expected).await;
    mount_activation(server, expected).await;
}

/// Bodies of all requests received for `request_path`, in order
pub async fn received_bodies(server: &MockServer, request_path: &str) -> Vec<Vec<u8>> {
    server
        .received_requests()
        .await
        .expect("request recording is enabled")
        .into_iter()
        .filter(|request| request.url.path() == request_path)
        .map(|request| request.body)
        .collect()
}
