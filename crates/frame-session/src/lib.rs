//! Frame session: the host-side controller for one embedded replay frame.
//!
//! Responsibilities:
//! - publishing the session descriptor the frame bootstraps from
//! - validating and dispatching messages the frame posts to the host
//! - keeping host URL/timestamp and frame navigation in step without echo loops
//! - persisting pages, cookies and skipped requests live, or through the fallback queue

mod controller;
mod descriptor;
mod prefix;
mod sync;
mod uri;

pub use controller::{DropReason, FrameSession, HostProps, MessageOutcome, SessionConfig};
pub use descriptor::{SessionDescriptor, SessionHandle};
pub use prefix::{Prefix, PrefixResolvers};
pub use sync::{ChangeOrigin, NavSync};
pub use uri::decode_uri;

use std::sync::Arc;

use fallback_sdk::FallbackQueue;
use frame_bus::{MessageBus, WindowId};
use replay_channel::{ChannelResult, LiveChannel};
use replay_proto::{FrameCommand, Mode, SessionParams, StoreAction};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is closed")]
    Closed,
    #[error("frame launch failed: {0}")]
    Launch(String),
    #[error("frame transport error: {0}")]
    Transport(String),
}

pub type FrameResult<T> = Result<T, FrameError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Channel(#[from] replay_channel::ChannelError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// What the frame needs to start loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInit {
    pub url: String,
    pub app_prefix: String,
    pub content_prefix: String,
    pub request_ts: Option<String>,
}

/// The embedded content frame, as seen from the host.
pub trait ContentFrame: Send {
    /// Window whose posts count as coming from this frame.
    fn window(&self) -> WindowId;
    fn load_url(&mut self, url: &str, timestamp: Option<&str>) -> FrameResult<()>;
    fn set_prefixes(&mut self, app_prefix: String, content_prefix: String);
    /// Posts a command into the frame window; no origin restriction applies.
    fn post_command(&self, command: &FrameCommand) -> FrameResult<()>;
    fn close(&mut self) -> FrameResult<()>;
}

pub trait FrameLauncher: Send + Sync {
    fn launch(&self, init: FrameInit, session: SessionHandle) -> FrameResult<Box<dyn ContentFrame>>;
}

/// Receives the state transitions the controller issues.
pub trait StateStore: Send + Sync {
    fn dispatch(&self, action: StoreAction);
}

impl<F> StateStore for F
where
    F: Fn(StoreAction) + Send + Sync,
{
    fn dispatch(&self, action: StoreAction) {
        (self)(action)
    }
}

pub trait DocumentTitle: Send + Sync {
    fn set_title(&self, label: &str, url: &str, title: Option<&str>);
}

/// Opens the realtime channel for a mounted frame.
pub trait ChannelFactory: Send + Sync {
    fn open(&self, params: &SessionParams, mode: &Mode) -> ChannelResult<Arc<dyn LiveChannel>>;
}

/// Everything a session talks to besides the frame's own messages.
#[derive(Clone)]
pub struct Collaborators {
    pub launcher: Arc<dyn FrameLauncher>,
    pub channels: Arc<dyn ChannelFactory>,
    pub bus: Arc<dyn MessageBus>,
    pub store: Arc<dyn StateStore>,
    pub title: Arc<dyn DocumentTitle>,
    pub fallback: FallbackQueue,
}
