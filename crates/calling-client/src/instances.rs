//! Instance lifecycle and diagnostics.
//!
//! Creation is the only request sent without affinity: it is the first
//! contact, and its response carries the sticky cookie that binds the new
//! instance to a shard. Destruction releases that binding, but only once the
//! service has confirmed it. A failed destroy keeps the binding so a retry
//! reaches the same shard.

use crate::client::{CallingServiceClient, INSTANCE_API};
use crate::errors::InstanceError;
use crate::models::{
    Call, Flow, Instance, InstanceLog, InstanceRequest, InstanceStatus, PacketCapture,
};
use crate::transport::{sanitize_error_body, ApiRequest, HttpResponse, MediaType};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

const HTTP_OK: u16 = 200;
const HTTP_NOT_FOUND: u16 = 404;

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, InstanceError> {
    serde_json::from_slice(&response.body).map_err(|source| InstanceError::Decode {
        source,
        body: sanitize_error_body(&response.text()),
    })
}

fn instance_path(instance: &Instance, endpoint: &str) -> String {
    format!("{}/{}/{}", INSTANCE_API, instance.id, endpoint)
}

/// Strip an optional `data:<type>;base64,` prefix and decode.
fn decode_preview(encoded: &str) -> Result<Bytes, base64::DecodeError> {
    let payload = match encoded.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map_or(rest, |(_, data)| data),
        None => encoded,
    };
    STANDARD.decode(payload.trim()).map(Bytes::from)
}

impl CallingServiceClient {
    /// Start a new instance.
    ///
    /// The sticky cookie of the creation response, if any, is stored for the
    /// returned instance id.
    ///
    /// # Errors
    ///
    /// - `InstanceError::Http` on transport failure or a non-200 status
    ///   (a 401 is reported as `HttpError::Unauthorized`)
    /// - `InstanceError::Decode` if the response is not an instance
    #[instrument(skip(self, request), fields(name = %request.name, instance_type = ?request.instance_type))]
    pub async fn create_instance(
        &self,
        request: &InstanceRequest,
    ) -> Result<Instance, InstanceError> {
        let body = serde_json::to_string(request).map_err(InstanceError::Encode)?;
        let response = self
            .transport
            .send(
                ApiRequest::post(format!("{INSTANCE_API}/create"), body)
                    .with_redacted_body(format!("{request:?}")),
                &[HTTP_OK],
            )
            .await?;

        let instance: Instance = decode(&response)?;
        match response.cookie(&self.sticky_cookie_name) {
            Some(cookie) => {
                info!(
                    target: "calling.instances",
                    instance_id = %instance.id,
                    shard = %cookie.value,
                    "Instance created"
                );
                self.affinity.put(&instance.id, cookie.clone()).await;
            }
            None => {
                warn!(
                    target: "calling.instances",
                    instance_id = %instance.id,
                    "Instance created without a sticky cookie, later requests use default routing"
                );
            }
        }
        Ok(instance)
    }

    /// Fetch the current state of an instance.
    ///
    /// # Errors
    ///
    /// Returns `InstanceError` on transport failure, a non-200 status, or an
    /// unexpected response shape.
    #[instrument(skip(self, instance), fields(instance_id = %instance.id))]
    pub async fn get_instance(&self, instance: &Instance) -> Result<Instance, InstanceError> {
        let request = ApiRequest::get(instance_path(instance, "status"))
            .with_affinity(self.affinity_for(&instance.id).await);
        let response = self.transport.send(request, &[HTTP_OK]).await?;
        decode(&response)
    }

    /// Fetch only the lifecycle status of an instance.
    ///
    /// # Errors
    ///
    /// Same as [`CallingServiceClient::get_instance`].
    pub async fn get_instance_status(
        &self,
        instance: &Instance,
    ) -> Result<InstanceStatus, InstanceError> {
        Ok(self.get_instance(instance).await?.status)
    }

    /// Tear an instance down and release its affinity.
    ///
    /// The affinity entry is released only once the response has been
    /// decoded as an instance.
    ///
    /// # Errors
    ///
    /// Returns `InstanceError` if the service did not confirm the destroy or
    /// the confirmation cannot be decoded; the affinity entry is left
    /// untouched in both cases.
    #[instrument(skip(self, instance), fields(instance_id = %instance.id))]
    pub async fn destroy_instance(&self, instance: &Instance) -> Result<Instance, InstanceError> {
        let request = ApiRequest::put(instance_path(instance, "destroy"), "")
            .with_affinity(self.affinity_for(&instance.id).await);
        let response = self.transport.send(request, &[HTTP_OK]).await?;
        let destroyed: Instance = decode(&response)?;

        if self.affinity.remove(&instance.id).await.is_some() {
            debug!(target: "calling.instances", instance_id = %instance.id, "Affinity released");
        }
        info!(target: "calling.instances", instance_id = %instance.id, "Instance destroyed");
        Ok(destroyed)
    }

    /// Media flow counters per remote peer.
    ///
    /// # Errors
    ///
    /// Returns `InstanceError` on transport failure, a non-200 status, or an
    /// unexpected response shape.
    #[instrument(skip(self, instance), fields(instance_id = %instance.id))]
    pub async fn get_flows(&self, instance: &Instance) -> Result<Vec<Flow>, InstanceError> {
        let request = ApiRequest::get(instance_path(instance, "flows"))
            .with_affinity(self.affinity_for(&instance.id).await);
        let response = self.transport.send(request, &[HTTP_OK]).await?;
        decode(&response)
    }

    /// Raw packet capture document.
    ///
    /// # Errors
    ///
    /// Returns `InstanceError` on transport failure or a non-200 status.
    #[instrument(skip(self, instance), fields(instance_id = %instance.id))]
    pub async fn get_packets(&self, instance: &Instance) -> Result<String, InstanceError> {
        Ok(self.fetch_packets(instance).await?.text())
    }

    /// Packet capture decoded into sent and received packet sizes.
    ///
    /// # Errors
    ///
    /// Same as [`CallingServiceClient::get_packets`], plus
    /// `InstanceError::Decode` on an unexpected shape or invalid UTF-8.
    #[instrument(skip(self, instance), fields(instance_id = %instance.id))]
    pub async fn get_packet_capture(
        &self,
        instance: &Instance,
    ) -> Result<PacketCapture, InstanceError> {
        let response = self.fetch_packets(instance).await?;
        decode(&response)
    }

    async fn fetch_packets(&self, instance: &Instance) -> Result<HttpResponse, InstanceError> {
        let request = ApiRequest::get(instance_path(instance, "packets"))
            .with_affinity(self.affinity_for(&instance.id).await);
        Ok(self.transport.send(request, &[HTTP_OK]).await?)
    }

    /// Screenshot of the instance as raw image bytes.
    ///
    /// # Errors
    ///
    /// Returns `InstanceError` on transport failure or a non-200 status.
    #[instrument(skip(self, instance), fields(instance_id = %instance.id))]
    pub async fn get_screenshot(&self, instance: &Instance) -> Result<Bytes, InstanceError> {
        let request = ApiRequest::get(instance_path(instance, "screenshot"))
            .with_media_type(MediaType::Unspecified)
            .with_affinity(self.affinity_for(&instance.id).await);
        let response = self.transport.send(request, &[HTTP_OK]).await?;
        Ok(response.body)
    }

    /// Client log of the instance; a missing log is not an error.
    ///
    /// # Errors
    ///
    /// Returns `InstanceError` on transport failure or a status other than
    /// 200 and 404.
    #[instrument(skip(self, instance), fields(instance_id = %instance.id))]
    pub async fn get_log(&self, instance: &Instance) -> Result<InstanceLog, InstanceError> {
        let request = ApiRequest::get(instance_path(instance, "log"))
            .with_media_type(MediaType::PlainText)
            .with_affinity(self.affinity_for(&instance.id).await);
        let response = self
            .transport
            .send(request, &[HTTP_OK, HTTP_NOT_FOUND])
            .await?;

        if response.status == HTTP_NOT_FOUND {
            debug!(target: "calling.instances", instance_id = %instance.id, "No log available yet");
            return Ok(InstanceLog::NotFound);
        }
        Ok(InstanceLog::Available(response.text()))
    }

    /// Call currently running on the instance, if any.
    ///
    /// # Errors
    ///
    /// Same as [`CallingServiceClient::get_instance`].
    pub async fn get_current_call(&self, instance: &Instance) -> Result<Option<Call>, InstanceError> {
        Ok(self.get_instance(instance).await?.current_call)
    }

    /// Latest live preview frame, decoded from the instance status.
    ///
    /// # Errors
    ///
    /// Same as [`CallingServiceClient::get_instance`], plus
    /// `InstanceError::InvalidPreview` if the frame is not valid base64.
    pub async fn get_live_preview(&self, instance: &Instance) -> Result<Option<Bytes>, InstanceError> {
        let current = self.get_instance(instance).await?;
        current
            .screenshot
            .as_deref()
            .map(decode_preview)
            .transpose()
            .map_err(InstanceError::InvalidPreview)
    }
}
