//! Fleet discovery across the configured shards.
//!
//! Each shard is asked for its instances with a cookie pinning the request to
//! that shard. Instances the client has not seen before are bound to the
//! shard that reported them, so later per-instance requests are routed
//! correctly. Discovery is all-or-nothing: the first failing shard aborts it.

use crate::client::{CallingServiceClient, INSTANCE_API};
use crate::errors::InstanceError;
use crate::models::Instance;
use crate::transport::{sanitize_error_body, ApiRequest};
use tracing::{debug, info, instrument, warn};

/// A destroy that failed during a sweep.
#[derive(Debug)]
pub struct SweepFailure {
    pub instance_id: String,
    pub error: InstanceError,
}

/// Outcome of [`CallingServiceClient::stop_instances_by_name`].
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Ids of destroyed instances.
    pub stopped: Vec<String>,
    pub failed: Vec<SweepFailure>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl CallingServiceClient {
    /// List running instances on every shard.
    ///
    /// # Errors
    ///
    /// Returns the first `InstanceError` raised by any shard. Affinity entries
    /// seeded from shards queried before the failure are kept.
    #[instrument(skip(self), fields(shards = self.shards.len()))]
    pub async fn get_all_running_instances(&self) -> Result<Vec<Instance>, InstanceError> {
        let mut instances = Vec::new();

        for shard in &self.shards {
            let cookie = self.shard_cookie(shard);
            let request = ApiRequest::get(INSTANCE_API).with_affinity(Some(cookie.clone()));
            let response = self.transport.send(request, &[200]).await.map_err(|e| {
                warn!(target: "calling.fleet", shard = %shard, error = %e, "Shard listing failed");
                e
            })?;
            let shard_instances: Vec<Instance> =
                serde_json::from_slice(&response.body).map_err(|source| InstanceError::Decode {
                    source,
                    body: sanitize_error_body(&response.text()),
                })?;

            for instance in &shard_instances {
                if self.affinity.insert_if_absent(&instance.id, cookie.clone()).await {
                    debug!(
                        target: "calling.fleet",
                        instance_id = %instance.id,
                        shard = %shard,
                        "Bound discovered instance to shard"
                    );
                }
            }
            info!(
                target: "calling.fleet",
                shard = %shard,
                count = shard_instances.len(),
                "Shard listed"
            );
            instances.extend(shard_instances);
        }

        Ok(instances)
    }

    /// Destroy every running instance whose name contains `name_filter`.
    ///
    /// Individual destroy failures are collected in the report instead of
    /// aborting the sweep.
    ///
    /// # Errors
    ///
    /// Returns `InstanceError` if discovery fails.
    #[instrument(skip(self))]
    pub async fn stop_instances_by_name(
        &self,
        name_filter: &str,
    ) -> Result<SweepReport, InstanceError> {
        let instances = self.get_all_running_instances().await?;
        let mut report = SweepReport::default();

        for instance in instances.iter().filter(|i| i.name_contains(name_filter)) {
            match self.destroy_instance(instance).await {
                Ok(_) => report.stopped.push(instance.id.clone()),
                Err(error) => {
                    warn!(
                        target: "calling.fleet",
                        instance_id = %instance.id,
                        error = %error,
                        "Failed to stop instance"
                    );
                    report.failed.push(SweepFailure {
                        instance_id: instance.id.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            target: "calling.fleet",
            stopped = report.stopped.len(),
            failed = report.failed.len(),
            "Sweep finished"
        );
        Ok(report)
    }
}
