//! Mock calling service backed by `wiremock`.
//!
//! Every mount helper requires the basic-auth credentials of
//! [`MockCallingService::client_config`], so a request that loses its
//! credentials falls through to wiremock's default 404.
//!
//! # Example
//!
//! ```rust,ignore
//! use calling_test_utils::*;
//!
//! let mock = MockCallingService::start().await;
//! mock.mount_create_instance(instance_json("abc123", "STARTING"), Some("c2")).await;
//!
//! let client = mock.client();
//! let instance = client.create_instance(&instance_request("Android: test")).await?;
//! ```

use crate::fixtures::{TEST_PASSWORD, TEST_USER};
use calling_client::models::{InstanceRequest, VersionedInstanceType};
use calling_client::{CallingServiceClient, ClientConfig};
use common::secret::SecretString;
use serde_json::Value;
use std::time::Duration;
use wiremock::matchers::{basic_auth, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Cookie name the mock load balancer issues.
pub const STICKY_COOKIE: &str = "SERVERID";

const INSTANCE_API: &str = "/api/v1/instance";

/// Instance creation request with fixed test credentials.
pub fn instance_request(name: &str) -> InstanceRequest {
    InstanceRequest::new(
        "alice@example.com",
        SecretString::from("account-password"),
        VersionedInstanceType::parse("chrome").expect("chrome is a known type"),
        name,
    )
}

/// A mock calling service on a random local port.
pub struct MockCallingService {
    server: MockServer,
}

impl MockCallingService {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Client configuration pointing at this mock, with short timeouts.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.uri(), SecretString::from(TEST_PASSWORD))
            .with_basic_auth_user(TEST_USER)
            .with_connect_timeout(Duration::from_secs(2))
            .with_request_timeout(Duration::from_secs(5))
    }

    pub fn client(&self) -> CallingServiceClient {
        CallingServiceClient::new(&self.client_config()).expect("client builds")
    }

    fn authorized(http_method: &str, request_path: String) -> wiremock::MockBuilder {
        Mock::given(method(http_method))
            .and(path(request_path))
            .and(basic_auth(TEST_USER, TEST_PASSWORD))
    }

    /// Answer instance creation, issuing a sticky cookie for `shard` if given.
    pub async fn mount_create_instance(&self, instance: Value, shard: Option<&str>) {
        let mut response = ResponseTemplate::new(200).set_body_json(instance);
        if let Some(shard) = shard {
            response = response.insert_header(
                "Set-Cookie",
                format!("{STICKY_COOKIE}={shard}; Path=/; HttpOnly").as_str(),
            );
        }
        Self::authorized("POST", format!("{INSTANCE_API}/create"))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Answer instance creation with a bare status and body.
    pub async fn mount_create_instance_status(&self, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path(format!("{INSTANCE_API}/create")))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Answer `GET` on an instance endpoint, e.g. `status` or `flows`.
    pub async fn mount_instance_get(&self, instance_id: &str, endpoint: &str, body: Value) {
        Self::authorized("GET", format!("{INSTANCE_API}/{instance_id}/{endpoint}"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Answer `GET` on an instance endpoint with raw bytes and a status.
    pub async fn mount_instance_raw(
        &self,
        instance_id: &str,
        endpoint: &str,
        status: u16,
        body: Vec<u8>,
    ) {
        Self::authorized("GET", format!("{INSTANCE_API}/{instance_id}/{endpoint}"))
            .respond_with(ResponseTemplate::new(status).set_body_bytes(body))
            .mount(&self.server)
            .await;
    }

    /// Answer destroy with `status`; 200 responses carry `body`.
    pub async fn mount_destroy(&self, instance_id: &str, status: u16, body: Value) {
        Self::authorized("PUT", format!("{INSTANCE_API}/{instance_id}/destroy"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Answer a call-initiating `POST` such as `start` or `acceptNext`.
    pub async fn mount_call_request(&self, instance_id: &str, action: &str, call: Value) {
        Self::authorized("POST", format!("{INSTANCE_API}/{instance_id}/call/{action}"))
            .respond_with(ResponseTemplate::new(200).set_body_json(call))
            .mount(&self.server)
            .await;
    }

    /// Answer a `PUT` on an existing call such as `stop` or `mute`.
    ///
    /// `action` is matched against the raw request path, so escaped names
    /// must be given escaped.
    pub async fn mount_call_action(
        &self,
        instance_id: &str,
        call_id: &str,
        action: &str,
        call: Value,
    ) {
        Self::authorized(
            "PUT",
            format!("{INSTANCE_API}/{instance_id}/call/{call_id}/{action}"),
        )
        .respond_with(ResponseTemplate::new(200).set_body_json(call))
        .mount(&self.server)
        .await;
    }

    /// Answer call status polling.
    pub async fn mount_call_status(&self, instance_id: &str, call_id: &str, call: Value) {
        Self::authorized(
            "GET",
            format!("{INSTANCE_API}/{instance_id}/call/{call_id}/status"),
        )
        .respond_with(ResponseTemplate::new(200).set_body_json(call))
        .mount(&self.server)
        .await;
    }

    /// Answer the fleet listing of one shard, matched by its sticky cookie.
    pub async fn mount_shard_listing(&self, shard: &str, instances: Value) {
        Self::authorized("GET", INSTANCE_API.to_string())
            .and(header("Cookie", format!("{STICKY_COOKIE}={shard}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(instances))
            .mount(&self.server)
            .await;
    }

    /// Fail the fleet listing of one shard with `status`.
    pub async fn mount_shard_failure(&self, shard: &str, status: u16) {
        Self::authorized("GET", INSTANCE_API.to_string())
            .and(header("Cookie", format!("{STICKY_COOKIE}={shard}").as_str()))
            .respond_with(ResponseTemplate::new(status).set_body_string("shard unavailable"))
            .mount(&self.server)
            .await;
    }

    /// All requests received so far.
    pub async fn requests(&self) -> Vec<Request> {
        self.server
            .received_requests()
            .await
            .expect("request recording is enabled")
    }

    /// Requests received for an exact path.
    pub async fn requests_to(&self, request_path: &str) -> Vec<Request> {
        self.requests()
            .await
            .into_iter()
            .filter(|request| request.url.path() == request_path)
            .collect()
    }
}

/// `Cookie` header of a recorded request, if present.
pub fn cookie_header(request: &Request) -> Option<String> {
    request
        .headers
        .get("cookie")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
