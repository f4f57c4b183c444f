//! Media diagnostics reported by a running instance.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Packet counter value meaning "no data yet".
pub const EMPTY_COUNTER: i64 = -1;

/// Per-peer media flow counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Flow {
    pub remote_user_id: String,

    #[serde(default = "empty_counter")]
    pub audio_packets_sent: i64,

    #[serde(default = "empty_counter")]
    pub audio_packets_received: i64,

    #[serde(default = "empty_counter")]
    pub video_packets_sent: i64,

    #[serde(default = "empty_counter")]
    pub video_packets_received: i64,
}

fn empty_counter() -> i64 {
    EMPTY_COUNTER
}

/// Which counters to compare when checking flow progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaDirections {
    pub audio_sent: bool,
    pub audio_received: bool,
    pub video_sent: bool,
    pub video_received: bool,
}

impl MediaDirections {
    pub const AUDIO: Self = Self {
        audio_sent: true,
        audio_received: true,
        video_sent: false,
        video_received: false,
    };

    pub const AUDIO_AND_VIDEO: Self = Self {
        audio_sent: true,
        audio_received: true,
        video_sent: true,
        video_received: true,
    };
}

impl Flow {
    /// Whether every counter is still unset.
    pub fn is_empty(&self) -> bool {
        self.audio_packets_sent == EMPTY_COUNTER
            && self.audio_packets_received == EMPTY_COUNTER
            && self.video_packets_sent == EMPTY_COUNTER
            && self.video_packets_received == EMPTY_COUNTER
    }

    /// Whether every selected counter strictly increased since `before`.
    ///
    /// Flows for different peers are never compared.
    pub fn progressed_since(&self, before: &Flow, directions: MediaDirections) -> bool {
        if self.remote_user_id != before.remote_user_id {
            return false;
        }
        let checks = [
            (
                directions.audio_sent,
                self.audio_packets_sent,
                before.audio_packets_sent,
            ),
            (
                directions.audio_received,
                self.audio_packets_received,
                before.audio_packets_received,
            ),
            (
                directions.video_sent,
                self.video_packets_sent,
                before.video_packets_sent,
            ),
            (
                directions.video_received,
                self.video_packets_received,
                before.video_packets_received,
            ),
        ];
        checks
            .iter()
            .filter(|(selected, _, _)| *selected)
            .all(|(_, now, then)| now > then)
    }

    /// Whether any flow in `after` progressed against its peer's entry in `before`.
    pub fn any_progressed_since(
        before: &[Flow],
        after: &[Flow],
        directions: MediaDirections,
    ) -> bool {
        after.iter().any(|now| {
            before
                .iter()
                .find(|then| then.remote_user_id == now.remote_user_id)
                .is_some_and(|then| now.progressed_since(then, directions))
        })
    }
}

/// Packet sizes captured on an instance.
///
/// Both directions are space-separated lists of packet lengths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PacketCapture {
    #[serde(default)]
    pub src: String,

    #[serde(default)]
    pub dst: String,
}

impl PacketCapture {
    /// Count of each distinct packet length sent.
    pub fn src_size_histogram(&self) -> BTreeMap<String, usize> {
        histogram(&self.src)
    }

    /// Count of each distinct packet length received.
    pub fn dst_size_histogram(&self) -> BTreeMap<String, usize> {
        histogram(&self.dst)
    }

    /// Constant bitrate audio produces a single packet length per direction.
    pub fn is_constant_bitrate(&self) -> bool {
        self.src_size_histogram().len() == 1 && self.dst_size_histogram().len() == 1
    }
}

fn histogram(lengths: &str) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for token in lengths.split_whitespace() {
        *counts.entry(token.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Outcome of fetching an instance log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceLog {
    Available(String),
    /// The service has no log for this instance (404).
    NotFound,
}

impl InstanceLog {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            InstanceLog::Available(text) => Some(text),
            InstanceLog::NotFound => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn flow(peer: &str, [audio_sent, audio_received, video_sent, video_received]: [i64; 4]) -> Flow {
        Flow {
            remote_user_id: peer.to_string(),
            audio_packets_sent: audio_sent,
            audio_packets_received: audio_received,
            video_packets_sent: video_sent,
            video_packets_received: video_received,
        }
    }

    #[test]
    fn test_flow_missing_counters_default_to_empty() {
        let json = r#"{"remoteUserId": "bob"}"#;

        let parsed: Flow = serde_json::from_str(json).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_flow_with_counters_is_not_empty() {
        let json = r#"{
            "remoteUserId": "bob",
            "audioPacketsSent": 10,
            "audioPacketsReceived": 12,
            "videoPacketsSent": -1,
            "videoPacketsReceived": -1
        }"#;

        let parsed: Flow = serde_json::from_str(json).unwrap();
        assert!(!parsed.is_empty());
        assert_eq!(parsed.audio_packets_received, 12);
    }

    #[test]
    fn test_audio_progress_ignores_video() {
        let before = flow("bob", [10, 10, -1, -1]);
        let after = flow("bob", [20, 25, -1, -1]);

        assert!(after.progressed_since(&before, MediaDirections::AUDIO));
        assert!(!after.progressed_since(&before, MediaDirections::AUDIO_AND_VIDEO));
    }

    #[test]
    fn test_progress_requires_strict_increase() {
        let before = flow("bob", [10, 10, 5, 5]);
        let stalled = flow("bob", [20, 10, 6, 6]);

        assert!(!stalled.progressed_since(&before, MediaDirections::AUDIO));
    }

    #[test]
    fn test_progress_never_compares_different_peers() {
        let before = flow("bob", [0, 0, 0, 0]);
        let after = flow("carol", [50, 50, 50, 50]);

        assert!(!after.progressed_since(&before, MediaDirections::AUDIO_AND_VIDEO));
    }

    #[test]
    fn test_any_progressed_matches_by_peer() {
        let before = vec![flow("bob", [10, 10, 0, 0]), flow("carol", [10, 10, 0, 0])];
        let after = vec![flow("carol", [11, 11, 0, 0]), flow("bob", [10, 10, 0, 0])];

        assert!(Flow::any_progressed_since(&before, &after, MediaDirections::AUDIO));
        assert!(!Flow::any_progressed_since(&before, &[], MediaDirections::AUDIO));
    }

    #[test]
    fn test_packet_capture_constant_bitrate() {
        let cbr = PacketCapture {
            src: "160 160 160".to_string(),
            dst: "160 160".to_string(),
        };
        assert!(cbr.is_constant_bitrate());

        let vbr = PacketCapture {
            src: "160 120 160".to_string(),
            dst: "160".to_string(),
        };
        assert!(!vbr.is_constant_bitrate());
        assert_eq!(vbr.src_size_histogram().get("160"), Some(&2));
        assert_eq!(vbr.src_size_histogram().get("120"), Some(&1));
    }

    #[test]
    fn test_empty_packet_capture_is_not_constant() {
        let parsed: PacketCapture = serde_json::from_str("{}").unwrap();
        assert!(!parsed.is_constant_bitrate());
    }

    #[test]
    fn test_instance_log_as_text() {
        assert_eq!(
            InstanceLog::Available("line".to_string()).as_text(),
            Some("line")
        );
        assert_eq!(InstanceLog::NotFound.as_text(), None);
    }
}
