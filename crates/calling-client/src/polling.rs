//! Waiting for instances and calls to reach a status.
//!
//! Polling runs at a fixed interval until the status is one of the expected
//! values or the timeout elapses. A failed status fetch ends the wait at once.

use crate::client::CallingServiceClient;
use crate::errors::{CallError, InstanceError};
use crate::models::{Call, CallStatus, Instance, InstanceStatus};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, instrument, warn};

/// Delay between two status fetches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Instance start, slightly above the service's own 180 s start timeout.
pub const INSTANCE_START_TIMEOUT: Duration = Duration::from_secs(190);

pub const INSTANCE_DESTROY_TIMEOUT: Duration = Duration::from_secs(30);

/// Time for peers to establish media after a call was accepted.
pub const PEER_CONNECTIONS_TIMEOUT: Duration = Duration::from_secs(20);

/// Interval and overall timeout of one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollSettings {
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub const fn instance_start() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, INSTANCE_START_TIMEOUT)
    }

    pub const fn instance_destroy() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, INSTANCE_DESTROY_TIMEOUT)
    }

    pub const fn peer_connections() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, PEER_CONNECTIONS_TIMEOUT)
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::instance_start()
    }
}

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("{subject} did not reach [{expected}] within {waited:?}, last status was {last}")]
    Timeout {
        subject: String,
        expected: String,
        last: String,
        waited: Duration,
    },

    #[error(transparent)]
    Instance(#[from] InstanceError),

    #[error(transparent)]
    Call(#[from] CallError),
}

fn join_statuses<S: fmt::Display>(statuses: &[S]) -> String {
    statuses
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Fetch until `status_of` yields one of `expected`.
async fn poll_until<T, S, F, Fut>(
    subject: &str,
    expected: &[S],
    settings: PollSettings,
    status_of: impl Fn(&T) -> S,
    mut fetch: F,
) -> Result<T, WaitError>
where
    S: PartialEq + fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WaitError>>,
{
    let start = Instant::now();

    loop {
        let current = fetch().await?;
        let status = status_of(&current);
        if expected.contains(&status) {
            debug!(target: "calling.polling", subject, status = %status, "Status reached");
            return Ok(current);
        }

        let elapsed = start.elapsed();
        if elapsed >= settings.timeout {
            warn!(
                target: "calling.polling",
                subject,
                status = %status,
                waited = ?elapsed,
                "Timed out waiting for status"
            );
            return Err(WaitError::Timeout {
                subject: subject.to_string(),
                expected: join_statuses(expected),
                last: status.to_string(),
                waited: elapsed,
            });
        }

        debug!(target: "calling.polling", subject, status = %status, "Waiting for status");
        let remaining = settings.timeout.saturating_sub(elapsed);
        sleep(settings.interval.min(remaining)).await;
    }
}

/// Wait until an instance reports one of `expected`.
///
/// # Errors
///
/// - `WaitError::Timeout` if the status was not reached in time
/// - `WaitError::Instance` if a status fetch failed
#[instrument(skip(client, instance, settings), fields(instance_id = %instance.id))]
pub async fn wait_for_instance_status(
    client: &CallingServiceClient,
    instance: &Instance,
    expected: &[InstanceStatus],
    settings: PollSettings,
) -> Result<Instance, WaitError> {
    let subject = format!("instance {}", instance.id);
    poll_until(
        &subject,
        expected,
        settings,
        |current: &Instance| current.status,
        move || async move { client.get_instance(instance).await.map_err(WaitError::from) },
    )
    .await
}

/// Wait until a call reports one of `expected`.
///
/// # Errors
///
/// - `WaitError::Timeout` if the status was not reached in time
/// - `WaitError::Call` if a status fetch failed
#[instrument(skip(client, instance, call, settings), fields(instance_id = %instance.id, call_id = %call.id))]
pub async fn wait_for_call_status(
    client: &CallingServiceClient,
    instance: &Instance,
    call: &Call,
    expected: &[CallStatus],
    settings: PollSettings,
) -> Result<Call, WaitError> {
    let subject = format!("call {} on instance {}", call.id, instance.id);
    poll_until(
        &subject,
        expected,
        settings,
        |current: &Call| current.status,
        move || async move { client.get_call(instance, call).await.map_err(WaitError::from) },
    )
    .await
}
