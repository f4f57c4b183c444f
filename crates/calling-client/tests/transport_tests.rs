//! Integration tests for status validation and request headers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use calling_client::transport::{ApiRequest, MediaType, Transport};
use calling_client::{HttpError, StickyCookie};
use calling_test_utils::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

async fn mount(mock: &MockCallingService, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path("/probe"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(mock.server())
        .await;
}

#[tokio::test]
async fn test_acceptable_error_status_returns_body() -> Result<(), anyhow::Error> {
    let mock = MockCallingService::start().await;
    mount(&mock, 404, "no such instance yet").await;
    let transport = Transport::new(&mock.client_config())?;

    let response = transport
        .send(ApiRequest::get("/probe"), &[200, 404])
        .await?;

    assert_eq!(response.status, 404);
    assert_eq!(response.text(), "no such instance yet");
    Ok(())
}

#[tokio::test]
async fn test_success_outside_acceptable_set_fails() {
    let mock = MockCallingService::start().await;
    mount(&mock, 204, "").await;
    let transport = Transport::new(&mock.client_config()).unwrap();

    let err = transport
        .send(ApiRequest::get("/probe"), &[200])
        .await
        .expect_err("204 was not declared acceptable");

    assert!(matches!(
        err,
        HttpError::UnexpectedStatus { status: 204, ref expected, .. } if expected == &vec![200]
    ));
}

#[tokio::test]
async fn test_unexpected_status_body_is_sanitized() {
    let mock = MockCallingService::start().await;
    let body = format!(
        "rejected Authorization: Basic cWE6c2VjcmV0 {}",
        "x".repeat(400)
    );
    mount(&mock, 500, &body).await;
    let transport = Transport::new(&mock.client_config()).unwrap();

    let err = transport
        .send(ApiRequest::get("/probe"), &[200])
        .await
        .expect_err("500 should fail");

    let message = err.to_string();
    assert!(!message.contains("cWE6c2VjcmV0"));
    assert!(message.contains("[BASIC_REDACTED]"));
    assert!(message.ends_with("...[truncated]"));
}

#[tokio::test]
async fn test_unauthorized_is_special_cased_for_every_verb() {
    let mock = MockCallingService::start().await;
    Mock::given(method("PUT"))
        .and(path("/probe"))
        .respond_with(ResponseTemplate::new(401))
        .mount(mock.server())
        .await;
    let transport = Transport::new(&mock.client_config()).unwrap();

    let err = transport
        .send(ApiRequest::put("/probe", ""), &[200])
        .await
        .expect_err("401 should fail");

    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn test_request_headers() -> Result<(), anyhow::Error> {
    let mock = MockCallingService::start().await;
    mount(&mock, 200, "{}").await;
    let transport = Transport::new(&mock.client_config())?;

    transport
        .send(
            ApiRequest::get("/probe").with_affinity(Some(StickyCookie::new("SERVERID", "c3"))),
            &[200],
        )
        .await?;
    transport
        .send(
            ApiRequest::get("/probe").with_media_type(MediaType::PlainText),
            &[200],
        )
        .await?;

    let requests = mock.requests_to("/probe").await;
    let first = requests.first().unwrap();
    // "qa:test-basic-auth-password"
    assert_eq!(
        first.headers.get("authorization").unwrap(),
        "Basic cWE6dGVzdC1iYXNpYy1hdXRoLXBhc3N3b3Jk"
    );
    assert_eq!(first.headers.get("content-type").unwrap(), "application/json");
    assert_eq!(first.headers.get("accept").unwrap(), "application/json");
    assert_eq!(cookie_header(first).as_deref(), Some("SERVERID=c3"));

    let second = requests.last().unwrap();
    assert_eq!(second.headers.get("accept").unwrap(), "text/plain");
    assert!(cookie_header(second).is_none());
    Ok(())
}

#[tokio::test]
async fn test_response_cookies_are_exposed() -> Result<(), anyhow::Error> {
    let mock = MockCallingService::start().await;
    Mock::given(method("GET"))
        .and(path("/probe"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{}")
                .append_header("Set-Cookie", "tracking=1; Path=/")
                .append_header("Set-Cookie", "SERVERID=c2; Path=/"),
        )
        .mount(mock.server())
        .await;
    let transport = Transport::new(&mock.client_config())?;

    let response = transport.send(ApiRequest::get("/probe"), &[200]).await?;

    assert_eq!(response.cookies.len(), 2);
    assert_eq!(
        response.cookie("SERVERID"),
        Some(&StickyCookie::new("SERVERID", "c2"))
    );
    Ok(())
}
