use replay_proto::PageRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ChannelError, ChannelResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehaviorPhase {
    Start,
    Done,
}

/// Frames written by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ws_type")]
pub enum ClientFrame {
    #[serde(rename = "behaviorStat")]
    BehaviorStat { phase: BehaviorPhase, name: String },
    #[serde(rename = "page")]
    Page { page: PageRecord },
    #[serde(rename = "set_cookie")]
    SetCookie {
        name: String,
        value: String,
        domain: String,
    },
    #[serde(rename = "skipreq")]
    SkipRequest { url: String },
    #[serde(rename = "load")]
    StatsUrls { stats_urls: Vec<String> },
}

impl ClientFrame {
    /// Pages and cookies land in a recording, so they need a capture mode.
    pub fn requires_capture(&self) -> bool {
        matches!(self, ClientFrame::Page { .. } | ClientFrame::SetCookie { .. })
    }
}

/// Frames pushed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ws_type", rename_all = "snake_case")]
pub enum ServerFrame {
    Status {
        #[serde(default)]
        size: u64,
        #[serde(default)]
        pending_size: u64,
        #[serde(default)]
        stats: Value,
    },
    RemoteUrl {
        url: String,
        #[serde(default)]
        timestamp: Option<String>,
    },
    #[serde(other)]
    Other,
}

pub fn parse_server_frame(text: &str) -> ChannelResult<ServerFrame> {
    serde_json::from_str(text).map_err(|err| ChannelError::Malformed(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cookie_frame_wire_shape() {
        let frame = ClientFrame::SetCookie {
            name: "sid".into(),
            value: "1".into(),
            domain: "example.com".into(),
        };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"ws_type": "set_cookie", "name": "sid", "value": "1", "domain": "example.com"})
        );
        assert!(frame.requires_capture());
        assert!(!ClientFrame::SkipRequest { url: "u".into() }.requires_capture());
    }

    #[test]
    fn stats_frame_uses_load_type() {
        let frame = ClientFrame::StatsUrls {
            stats_urls: vec!["http://example.com/".into()],
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["ws_type"], "load");
        assert_eq!(value["stats_urls"][0], "http://example.com/");
    }

    #[test]
    fn parses_status_frame() {
        let frame = parse_server_frame(r#"{"ws_type":"status","size":1024}"#).unwrap();
        assert!(matches!(frame, ServerFrame::Status { size: 1024, pending_size: 0, .. }));
    }

    #[test]
    fn unknown_server_frames_are_tolerated() {
        let frame = parse_server_frame(r#"{"ws_type":"snapshot","x":1}"#).unwrap();
        assert_eq!(frame, ServerFrame::Other);
        assert!(matches!(
            parse_server_frame("not json"),
            Err(ChannelError::Malformed(_))
        ));
    }
}
