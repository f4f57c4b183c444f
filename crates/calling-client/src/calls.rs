//! Call lifecycle on a running instance.
//!
//! Every operation is routed with the instance's affinity and answers with
//! the call's new state. Call-initiating operations (start, accept, decline)
//! post a [`CallRequest`]; transitions on an existing call put an empty body.

use crate::client::{CallingServiceClient, INSTANCE_API};
use crate::errors::CallError;
use crate::models::{Call, CallRequest, Instance};
use crate::transport::{sanitize_error_body, ApiRequest, HttpResponse};
use tracing::{info, instrument};

const HTTP_OK: u16 = 200;

/// Escape a participant display name for use as a path segment.
///
/// Only spaces are escaped. Names containing `/`, `?`, `#` or `%` produce a
/// malformed path.
pub fn escape_participant_name(name: &str) -> String {
    name.replace(' ', "%20")
}

fn decode(response: &HttpResponse) -> Result<Call, CallError> {
    serde_json::from_slice(&response.body).map_err(|source| CallError::Decode {
        source,
        body: sanitize_error_body(&response.text()),
    })
}

fn call_path(instance: &Instance, call: &Call, action: &str) -> String {
    format!("{}/{}/call/{}/{}", INSTANCE_API, instance.id, call.id, action)
}

impl CallingServiceClient {
    async fn post_call_request(
        &self,
        instance: &Instance,
        action: &str,
        request: &CallRequest,
    ) -> Result<Call, CallError> {
        let body = serde_json::to_string(request).map_err(CallError::Encode)?;
        let path = format!("{}/{}/call/{}", INSTANCE_API, instance.id, action);
        let request = ApiRequest::post(path, body)
            .with_affinity(self.affinity_for(&instance.id).await);
        let response = self.transport.send(request, &[HTTP_OK]).await?;
        let call = decode(&response)?;

        info!(
            target: "calling.calls",
            instance_id = %instance.id,
            call_id = %call.id,
            status = %call.status,
            action,
            "Call request accepted"
        );
        Ok(call)
    }

    async fn put_call_action(
        &self,
        instance: &Instance,
        call: &Call,
        action: &str,
    ) -> Result<Call, CallError> {
        let request = ApiRequest::put(call_path(instance, call, action), "")
            .with_affinity(self.affinity_for(&instance.id).await);
        let response = self.transport.send(request, &[HTTP_OK]).await?;
        let updated = decode(&response)?;

        info!(
            target: "calling.calls",
            instance_id = %instance.id,
            call_id = %updated.id,
            status = %updated.status,
            action,
            "Call updated"
        );
        Ok(updated)
    }

    /// Start an audio call.
    ///
    /// # Errors
    ///
    /// Returns `CallError` on transport failure, a non-200 status, or an
    /// unexpected response shape. The same applies to every call operation.
    #[instrument(skip(self, instance, request), fields(instance_id = %instance.id))]
    pub async fn start_call(
        &self,
        instance: &Instance,
        request: &CallRequest,
    ) -> Result<Call, CallError> {
        self.post_call_request(instance, "start", request).await
    }

    /// Start a video call.
    #[instrument(skip(self, instance, request), fields(instance_id = %instance.id))]
    pub async fn start_video_call(
        &self,
        instance: &Instance,
        request: &CallRequest,
    ) -> Result<Call, CallError> {
        self.post_call_request(instance, "startVideo", request).await
    }

    /// Accept the next incoming call.
    #[instrument(skip(self, instance, request), fields(instance_id = %instance.id))]
    pub async fn accept_next(
        &self,
        instance: &Instance,
        request: &CallRequest,
    ) -> Result<Call, CallError> {
        self.post_call_request(instance, "acceptNext", request).await
    }

    /// Accept the next incoming call with video.
    #[instrument(skip(self, instance, request), fields(instance_id = %instance.id))]
    pub async fn accept_next_video(
        &self,
        instance: &Instance,
        request: &CallRequest,
    ) -> Result<Call, CallError> {
        self.post_call_request(instance, "acceptNextVideo", request)
            .await
    }

    /// Decline an incoming call.
    #[instrument(skip(self, instance, request), fields(instance_id = %instance.id))]
    pub async fn decline(
        &self,
        instance: &Instance,
        request: &CallRequest,
    ) -> Result<Call, CallError> {
        self.post_call_request(instance, "decline", request).await
    }

    #[instrument(skip(self, instance, call), fields(instance_id = %instance.id, call_id = %call.id))]
    pub async fn get_call(&self, instance: &Instance, call: &Call) -> Result<Call, CallError> {
        let request = ApiRequest::get(call_path(instance, call, "status"))
            .with_affinity(self.affinity_for(&instance.id).await);
        let response = self.transport.send(request, &[HTTP_OK]).await?;
        decode(&response)
    }

    #[instrument(skip(self, instance, call), fields(instance_id = %instance.id, call_id = %call.id))]
    pub async fn stop_call(&self, instance: &Instance, call: &Call) -> Result<Call, CallError> {
        self.put_call_action(instance, call, "stop").await
    }

    #[instrument(skip(self, instance, call), fields(instance_id = %instance.id, call_id = %call.id))]
    pub async fn switch_video_on(&self, instance: &Instance, call: &Call) -> Result<Call, CallError> {
        self.put_call_action(instance, call, "switchVideoOn").await
    }

    #[instrument(skip(self, instance, call), fields(instance_id = %instance.id, call_id = %call.id))]
    pub async fn switch_video_off(
        &self,
        instance: &Instance,
        call: &Call,
    ) -> Result<Call, CallError> {
        self.put_call_action(instance, call, "switchVideoOff").await
    }

    #[instrument(skip(self, instance, call), fields(instance_id = %instance.id, call_id = %call.id))]
    pub async fn pause_video_call(
        &self,
        instance: &Instance,
        call: &Call,
    ) -> Result<Call, CallError> {
        self.put_call_action(instance, call, "pauseVideoCall").await
    }

    #[instrument(skip(self, instance, call), fields(instance_id = %instance.id, call_id = %call.id))]
    pub async fn unpause_video_call(
        &self,
        instance: &Instance,
        call: &Call,
    ) -> Result<Call, CallError> {
        self.put_call_action(instance, call, "unpauseVideoCall").await
    }

    #[instrument(skip(self, instance, call), fields(instance_id = %instance.id, call_id = %call.id))]
    pub async fn switch_screensharing_on(
        &self,
        instance: &Instance,
        call: &Call,
    ) -> Result<Call, CallError> {
        self.put_call_action(instance, call, "switchScreensharingOn")
            .await
    }

    #[instrument(skip(self, instance, call), fields(instance_id = %instance.id, call_id = %call.id))]
    pub async fn switch_screensharing_off(
        &self,
        instance: &Instance,
        call: &Call,
    ) -> Result<Call, CallError> {
        self.put_call_action(instance, call, "switchScreensharingOff")
            .await
    }

    #[instrument(skip(self, instance, call), fields(instance_id = %instance.id, call_id = %call.id))]
    pub async fn mute_microphone(
        &self,
        instance: &Instance,
        call: &Call,
    ) -> Result<Call, CallError> {
        self.put_call_action(instance, call, "mute").await
    }

    #[instrument(skip(self, instance, call), fields(instance_id = %instance.id, call_id = %call.id))]
    pub async fn unmute_microphone(
        &self,
        instance: &Instance,
        call: &Call,
    ) -> Result<Call, CallError> {
        self.put_call_action(instance, call, "unmute").await
    }

    #[instrument(skip(self, instance, call), fields(instance_id = %instance.id, call_id = %call.id))]
    pub async fn maximise_call(&self, instance: &Instance, call: &Call) -> Result<Call, CallError> {
        self.put_call_action(instance, call, "maximiseVideoCall").await
    }

    /// Mute one participant of a group call, addressed by display name.
    #[instrument(skip(self, instance, call), fields(instance_id = %instance.id, call_id = %call.id))]
    pub async fn mute_participant(
        &self,
        instance: &Instance,
        call: &Call,
        participant_name: &str,
    ) -> Result<Call, CallError> {
        let action = format!(
            "muteParticipant/{}",
            escape_participant_name(participant_name)
        );
        self.put_call_action(instance, call, &action).await
    }

    /// Mute everyone except the named participant.
    #[instrument(skip(self, instance, call), fields(instance_id = %instance.id, call_id = %call.id))]
    pub async fn mute_all_others(
        &self,
        instance: &Instance,
        call: &Call,
        participant_name: &str,
    ) -> Result<Call, CallError> {
        let action = format!(
            "muteAllOthers/{}",
            escape_participant_name(participant_name)
        );
        self.put_call_action(instance, call, &action).await
    }

    /// Call a conversation (1:1 or group).
    pub async fn call_to_user(
        &self,
        instance: &Instance,
        conversation_id: &str,
    ) -> Result<Call, CallError> {
        self.start_call(instance, &CallRequest::for_conversation(conversation_id))
            .await
    }

    /// Video call a conversation.
    pub async fn video_call_to_user(
        &self,
        instance: &Instance,
        conversation_id: &str,
    ) -> Result<Call, CallError> {
        self.start_video_call(instance, &CallRequest::for_conversation(conversation_id))
            .await
    }

    pub async fn accept_next_incoming_call(&self, instance: &Instance) -> Result<Call, CallError> {
        self.accept_next(instance, &CallRequest::default()).await
    }

    pub async fn accept_next_incoming_video_call(
        &self,
        instance: &Instance,
    ) -> Result<Call, CallError> {
        self.accept_next_video(instance, &CallRequest::default())
            .await
    }

    /// Decline the incoming call from a conversation.
    pub async fn decline_call(
        &self,
        instance: &Instance,
        conversation_id: &str,
    ) -> Result<Call, CallError> {
        self.decline(instance, &CallRequest::for_conversation(conversation_id))
            .await
    }
}
