//! Shared protocol definitions for host ↔ replay frame communication.
//! Keeping this in a dedicated crate lets the frame bootstrap, the realtime
//! channel and the fallback reporter agree on payloads without pulling in
//! heavier runtime code.

mod action;
mod message;

pub use action::{AutopilotStatus, NavMethod, StoreAction};
pub use message::{FrameCommand, FrameMessage, PageState, ReadyState, PRIVILEGED_KINDS};

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Operating mode of the replay frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Mode {
    Record,
    Patch,
    Extract,
    ExtractOnly,
    Replay,
    ReplayColl,
    Live,
    Other(String),
}

impl Mode {
    pub fn as_str(&self) -> &str {
        match self {
            Mode::Record => "record",
            Mode::Patch => "patch",
            Mode::Extract => "extract",
            Mode::ExtractOnly => "extract_only",
            Mode::Replay => "replay",
            Mode::ReplayColl => "replay-coll",
            Mode::Live => "live",
            Mode::Other(name) => name,
        }
    }

    /// Modes that write into a recording.
    pub fn is_capture(&self) -> bool {
        matches!(
            self,
            Mode::Record | Mode::Patch | Mode::Extract | Mode::ExtractOnly
        )
    }

    /// Any mode whose name mentions `replay`, including custom ones.
    pub fn is_replay_family(&self) -> bool {
        self.as_str().contains("replay")
    }

    /// Modes whose page loads are reconciled as archive browsing.
    pub fn is_replay(&self) -> bool {
        matches!(self, Mode::Replay | Mode::ReplayColl)
    }

    /// Title label used while capturing.
    pub fn capture_label(&self) -> &'static str {
        match self {
            Mode::Record => "recording",
            Mode::Patch => "Patching",
            Mode::Extract => "Extracting",
            _ => "",
        }
    }
}

impl From<String> for Mode {
    fn from(value: String) -> Self {
        match value.as_str() {
            "record" => Mode::Record,
            "patch" => Mode::Patch,
            "extract" => Mode::Extract,
            "extract_only" => Mode::ExtractOnly,
            "replay" => Mode::Replay,
            "replay-coll" => Mode::ReplayColl,
            "live" => Mode::Live,
            _ => Mode::Other(value),
        }
    }
}

impl From<Mode> for String {
    fn from(value: Mode) -> Self {
        match value {
            Mode::Other(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl FromStr for Mode {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Mode::from(s.to_string()))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifiers of the recording session a frame is bound to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionParams {
    pub user: String,
    pub coll: String,
    #[serde(default)]
    pub rec: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationIdentity {
    pub url: String,
    pub timestamp: Option<String>,
    pub mode: Mode,
}

/// One navigation eligible for durable persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    pub url: String,
    pub timestamp: Option<String>,
    pub title: Option<String>,
    pub is_new_page: bool,
    pub is_error: bool,
}

impl From<&PageState> for PageRecord {
    fn from(state: &PageState) -> Self {
        Self {
            url: state.url.clone(),
            timestamp: state.timestamp().map(str::to_string),
            title: state.title.clone(),
            is_new_page: state.new_page,
            is_error: state.is_error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieAssignment {
    pub name: String,
    pub value: String,
    pub domain: String,
}

impl CookieAssignment {
    /// Extracts the leading `name=value` pair of a `Set-Cookie` style string.
    ///
    /// Attributes after the first `;` are ignored. Returns `None` when the
    /// leading segment is empty or carries no `=`.
    pub fn parse(raw: &str, domain: &str) -> Option<Self> {
        let pair = raw.split(';').next().unwrap_or_default();
        let (name, value) = pair.split_once('=')?;
        Some(Self {
            name: name.to_string(),
            value: value.to_string(),
            domain: domain.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipRequest {
    pub url: String,
}
