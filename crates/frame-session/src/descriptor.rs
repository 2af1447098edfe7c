use std::sync::Arc;

use parking_lot::RwLock;
use replay_proto::Mode;
use serde::Serialize;

/// What the frame's inner content reads when it starts up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionDescriptor {
    pub collection_id: String,
    pub url: String,
    pub capture_url: String,
    pub content_prefix: String,
    pub outer_prefix: String,
    pub requested_timestamp: Option<String>,
    pub current_timestamp: Option<String>,
    pub mode: Mode,
    pub is_frame: bool,
    pub frame_modifier: String,
    pub replay_modifier: String,
    pub sources: Vec<String>,
    pub inverse_sources: String,
}

impl SessionDescriptor {
    pub fn new(
        collection_id: impl Into<String>,
        url: impl Into<String>,
        content_prefix: impl Into<String>,
        requested_timestamp: Option<String>,
        mode: Mode,
    ) -> Self {
        Self {
            collection_id: collection_id.into(),
            url: url.into(),
            capture_url: String::new(),
            content_prefix: content_prefix.into(),
            outer_prefix: String::new(),
            current_timestamp: requested_timestamp.clone(),
            requested_timestamp,
            mode,
            is_frame: true,
            frame_modifier: String::new(),
            replay_modifier: String::new(),
            sources: Vec::new(),
            inverse_sources: String::new(),
        }
    }
}

/// Shared handle to one frame's descriptor. The controller holds the only
/// writer; the frame gets a clone at launch and reads through it.
#[derive(Debug, Clone)]
pub struct SessionHandle(Arc<RwLock<SessionDescriptor>>);

impl SessionHandle {
    pub fn publish(descriptor: SessionDescriptor) -> Self {
        Self(Arc::new(RwLock::new(descriptor)))
    }

    pub fn snapshot(&self) -> SessionDescriptor {
        self.0.read().clone()
    }

    pub fn current_timestamp(&self) -> Option<String> {
        self.0.read().current_timestamp.clone()
    }

    pub fn mode(&self) -> Mode {
        self.0.read().mode.clone()
    }

    pub(crate) fn set_timestamp(&self, timestamp: &str) {
        self.0.write().current_timestamp = Some(timestamp.to_string());
    }

    pub(crate) fn set_mode(&self, mode: Mode) {
        self.0.write().mode = mode;
    }
}
