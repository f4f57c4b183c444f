//! JSON fixtures in the calling service wire format.

use serde_json::{json, Value};

/// Basic-auth user the mock service expects.
pub const TEST_USER: &str = "qa";

/// Basic-auth password the mock service expects.
pub const TEST_PASSWORD: &str = "test-basic-auth-password";

/// Minimal instance document.
pub fn instance_json(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "status": status,
    })
}

/// Instance document carrying a display name, as returned by fleet listings.
pub fn named_instance_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "status": "STARTED",
        "name": name,
        "email": format!("{id}@example.com"),
        "instanceType": "chrome",
    })
}

/// Instance document with a running call.
pub fn instance_with_call_json(id: &str, call_id: &str, call_status: &str) -> Value {
    json!({
        "id": id,
        "status": "STARTED",
        "currentCall": call_json(call_id, call_status),
    })
}

/// Instance document with a base64 live preview frame.
pub fn instance_with_preview_json(id: &str, screenshot: &str) -> Value {
    json!({
        "id": id,
        "status": "STARTED",
        "screenshot": screenshot,
    })
}

pub fn call_json(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "status": status,
    })
}

/// Flow counters in the order sent/received audio, sent/received video.
pub fn flow_json(remote_user_id: &str, counters: [i64; 4]) -> Value {
    let [audio_sent, audio_received, video_sent, video_received] = counters;
    json!({
        "remoteUserId": remote_user_id,
        "audioPacketsSent": audio_sent,
        "audioPacketsReceived": audio_received,
        "videoPacketsSent": video_sent,
        "videoPacketsReceived": video_received,
    })
}

pub fn packets_json(src: &str, dst: &str) -> Value {
    json!({
        "src": src,
        "dst": dst,
    })
}
