//! Realtime channel between the host and the recording backend.
//!
//! Responsibilities:
//! - keeping one duplex socket open per mounted frame, bound to a session and mode
//! - reporting pages, cookies, skipped requests and behavior stats with low latency
//! - telling callers synchronously whether a write was accepted so they can fall back

pub mod realtime;
mod wire;

pub use realtime::{RealtimeClient, RealtimeConfig};
pub use wire::{parse_server_frame, BehaviorPhase, ClientFrame, ServerFrame};

use replay_proto::PageRecord;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("invalid realtime endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("realtime transport error: {0}")]
    Transport(String),
    #[error("malformed realtime frame: {0}")]
    Malformed(String),
}

pub type ChannelResult<T> = Result<T, ChannelError>;

/// Fire-and-report operations of the realtime channel.
///
/// Writes never block. The returned flag says whether the live connection
/// took the write; `false` means the caller should use its fallback path.
pub trait LiveChannel: Send + Sync {
    fn behavior_stat(&self, phase: BehaviorPhase, name: &str);
    fn add_page(&self, record: &PageRecord) -> bool;
    fn add_cookie(&self, name: &str, value: &str, domain: &str) -> bool;
    fn add_skip_req(&self, url: &str) -> bool;
    fn set_stats_urls(&self, urls: &[String]);
    fn close(&self) -> ChannelResult<()>;
}
