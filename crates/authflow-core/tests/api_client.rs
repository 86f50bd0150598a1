//! Integration tests for the login client.
//!
//! Each test runs the real `ApiClient` against a local mock server and checks
//! how the outcome is classified.

use std::time::Duration;

use authflow_core::api::{ApiClient, AuthError, Authenticator, ErrorKind};
use authflow_core::auth::Credentials;
use authflow_core::Config;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

fn client_for(base_url: &str) -> ApiClient {
    let config = Config {
        base_url: base_url.to_string(),
        request_timeout_secs: 1,
        ..Config::default()
    };
    ApiClient::new(&config).expect("build client")
}

fn credentials() -> Credentials {
    Credentials::new("maxkorn", "maxkorn")
}

async fn login_with_response(response: ResponseTemplate) -> Result<authflow_core::AuthToken, AuthError> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(response)
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server.uri()).login(&credentials()).await
}

#[tokio::test]
async fn test_login_sends_expected_request_and_parses_tokens() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("accept", "application/json"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"username": "maxkorn", "password": "maxkorn"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "refresh": "c31c2b7b",
            "success": true,
            "token": "18370fdf"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = client_for(&server.uri())
        .login(&credentials())
        .await
        .expect("login succeeds");

    assert_eq!(token.access_token, "18370fdf");
    assert_eq!(token.refresh_token, "c31c2b7b");
    assert_eq!(token.expires_at, None);
}

#[tokio::test]
async fn test_configured_ttl_stamps_expiry() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "refresh": "r",
            "success": true,
            "token": "a"
        })))
        .mount(&server)
        .await;

    let config = Config {
        base_url: server.uri(),
        token_ttl_minutes: Some(30),
        ..Config::default()
    };
    let token = ApiClient::new(&config)
        .expect("build client")
        .login(&credentials())
        .await
        .expect("login succeeds");

    let expiry = token.expires_at.expect("expiry stamped");
    let remaining = expiry - chrono::Utc::now();
    assert!(remaining > chrono::Duration::minutes(29));
    assert!(remaining <= chrono::Duration::minutes(30));
    assert!(!token.is_expired());
}

#[tokio::test]
async fn test_status_codes_are_classified() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let cases = [
        (401, ErrorKind::Unauthorized),
        (500, ErrorKind::Server),
        (502, ErrorKind::Server),
        (400, ErrorKind::Api),
        (403, ErrorKind::Api),
        (404, ErrorKind::Api),
    ];
    for (status, expected) in cases {
        let err = login_with_response(ResponseTemplate::new(status).set_body_string("nope"))
            .await
            .expect_err("non-2xx must fail");
        assert_eq!(err.kind(), expected, "status {}", status);
    }
}

#[tokio::test]
async fn test_success_false_is_unauthorized() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let err = login_with_response(
        ResponseTemplate::new(200).set_body_json(json!({"success": false})),
    )
    .await
    .expect_err("rejected login");
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_malformed_success_body_is_unauthorized() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let err = login_with_response(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .await
        .expect_err("malformed body");
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let err = login_with_response(
        ResponseTemplate::new(200).set_body_json(json!({"success": true, "token": "a"})),
    )
    .await
    .expect_err("missing refresh token");
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_empty_tokens_are_unauthorized() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let bodies = [
        json!({"success": true, "token": "", "refresh": ""}),
        json!({"success": true, "token": "", "refresh": "c31c2b7b"}),
        json!({"success": true, "token": "18370fdf", "refresh": ""}),
    ];
    for body in bodies {
        let err = login_with_response(ResponseTemplate::new(200).set_body_json(body.clone()))
            .await
            .expect_err("empty token accepted");
        assert_eq!(err.kind(), ErrorKind::Unauthorized, "body {}", body);
    }
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    // Grab a free port, then release it so nothing is listening
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .expect("bind")
        .local_addr()
        .expect("local addr");

    let err = client_for(&format!("http://{}", addr))
        .login(&credentials())
        .await
        .expect_err("nothing listening");
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[tokio::test]
async fn test_timeout_is_network_error() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let err = login_with_response(
        ResponseTemplate::new(200)
            .set_delay(Duration::from_secs(3))
            .set_body_json(json!({"success": true, "token": "a", "refresh": "r"})),
    )
    .await
    .expect_err("request times out");
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[tokio::test]
async fn test_invalid_base_url_is_unknown_error() {
    let err = client_for("not a url")
        .login(&credentials())
        .await
        .expect_err("request cannot be built");
    assert_eq!(err.kind(), ErrorKind::Unknown);
}
