//! The calling service client handle.

use crate::affinity::{AffinityStore, StickyCookie};
use crate::config::ClientConfig;
use crate::errors::HttpError;
use crate::transport::Transport;
use tracing::info;

/// Root of every instance endpoint.
pub(crate) const INSTANCE_API: &str = "/api/v1/instance";

/// Client for one test session against the calling service.
///
/// Construct it once and share it by reference (or clone it: clones share the
/// same affinity store). Operations run on the caller's task; the client
/// never spawns work of its own.
#[derive(Debug, Clone)]
pub struct CallingServiceClient {
    pub(crate) transport: Transport,
    pub(crate) affinity: AffinityStore,
    pub(crate) shards: Vec<String>,
    pub(crate) sticky_cookie_name: String,
}

impl CallingServiceClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `HttpError::ClientBuild` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, HttpError> {
        let transport = Transport::new(config)?;

        info!(
            target: "calling.client",
            base_url = %config.base_url,
            shards = ?config.shards,
            sticky_cookie = %config.sticky_cookie_name,
            "Calling service client created"
        );

        Ok(Self {
            transport,
            affinity: AffinityStore::new(),
            shards: config.shards.clone(),
            sticky_cookie_name: config.sticky_cookie_name.clone(),
        })
    }

    /// Sticky-session bindings known to this client.
    pub fn affinity(&self) -> &AffinityStore {
        &self.affinity
    }

    pub fn shards(&self) -> &[String] {
        &self.shards
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Stored cookie for an instance, if it is the configured sticky cookie.
    pub(crate) async fn affinity_for(&self, instance_id: &str) -> Option<StickyCookie> {
        self.affinity
            .get(instance_id)
            .await
            .filter(|cookie| cookie.name == self.sticky_cookie_name)
    }

    /// Cookie that pins a request to `shard`.
    pub(crate) fn shard_cookie(&self, shard: &str) -> StickyCookie {
        StickyCookie::new(&self.sticky_cookie_name, shard)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::SecretString;

    fn client() -> CallingServiceClient {
        let config = ClientConfig::new("http://localhost:9000", SecretString::from("pw"))
            .with_shards(["s1", "s2"])
            .with_sticky_cookie_name("ROUTE");
        CallingServiceClient::new(&config).unwrap()
    }

    #[test]
    fn test_client_uses_configured_shards() {
        let client = client();
        assert_eq!(client.shards(), ["s1".to_string(), "s2".to_string()]);
        assert_eq!(client.transport().base_url(), "http://localhost:9000");
    }

    #[test]
    fn test_shard_cookie_uses_configured_name() {
        let cookie = client().shard_cookie("s2");
        assert_eq!(cookie.header_value(), "ROUTE=s2");
    }

    #[tokio::test]
    async fn test_affinity_for_ignores_foreign_cookies() {
        let client = client();
        client
            .affinity()
            .put("abc", StickyCookie::new("SERVERID", "c1"))
            .await;
        client
            .affinity()
            .put("def", StickyCookie::new("ROUTE", "s1"))
            .await;

        assert!(client.affinity_for("abc").await.is_none());
        assert_eq!(
            client.affinity_for("def").await,
            Some(StickyCookie::new("ROUTE", "s1"))
        );
        assert!(client.affinity_for("unknown").await.is_none());
    }

    #[tokio::test]
    async fn test_clones_share_affinity() {
        let client = client();
        let clone = client.clone();
        clone
            .affinity()
            .put("abc", StickyCookie::new("ROUTE", "s1"))
            .await;

        assert!(client.affinity().contains("abc").await);
    }
}
