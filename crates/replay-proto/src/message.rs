use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kinds accepted from any window of the content origin. They may be posted
/// by a nested sub-frame rather than the top content window.
pub const PRIVILEGED_KINDS: [&str; 3] = ["cookie", "skipreq", "bug-report"];

/// Messages posted by the replay frame into the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "wb_type")]
pub enum FrameMessage {
    #[serde(rename = "behaviorDone")]
    BehaviorDone,
    #[serde(rename = "behaviorStop")]
    BehaviorStop,
    #[serde(rename = "behaviorStep")]
    BehaviorStep {
        #[serde(default)]
        result: Value,
    },
    #[serde(rename = "load")]
    Load(PageState),
    #[serde(rename = "cookie")]
    Cookie {
        cookie: String,
        #[serde(default)]
        domain: String,
    },
    #[serde(rename = "snapshot")]
    Snapshot,
    #[serde(rename = "skipreq")]
    SkipRequest { url: String },
    #[serde(rename = "hashchange")]
    HashChange {
        #[serde(default)]
        hash: Option<String>,
    },
    #[serde(rename = "replace-url")]
    ReplaceUrl(PageState),
    #[serde(rename = "bug-report")]
    BugReport,
    #[serde(other)]
    Unknown,
}

impl FrameMessage {
    /// Reads the `wb_type` discriminator without decoding the rest.
    pub fn kind_of(payload: &Value) -> Option<&str> {
        payload.get("wb_type").and_then(Value::as_str)
    }

    pub fn is_privileged_kind(kind: &str) -> bool {
        PRIVILEGED_KINDS.contains(&kind)
    }
}

/// Navigation state reported with `load` and `replace-url`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default, rename = "readyState")]
    pub ready_state: Option<ReadyState>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, rename = "newPage")]
    pub new_page: bool,
}

impl PageState {
    /// Frame timestamp, with the empty string treated as absent.
    pub fn timestamp(&self) -> Option<&str> {
        self.ts.as_deref().filter(|ts| !ts.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
    #[serde(other)]
    Other,
}

/// Commands posted from the host into the frame window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "wb_type", rename_all = "snake_case")]
pub enum FrameCommand {
    Behavior {
        name: Option<String>,
        url: String,
        start: bool,
    },
}
