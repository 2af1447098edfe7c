use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;
use uuid::Uuid;

/// Identity of a browsing context that can post messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(pub Uuid);

impl WindowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WindowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A cross-boundary message as observed by the host: who claims to have sent
/// it, which window it came from, and the raw structured payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameEnvelope {
    pub origin: String,
    pub source: WindowId,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus channel closed")]
    Closed,
    #[error("listener {0:?} is not registered")]
    UnknownListener(ListenerId),
}

pub type BusResult<T> = Result<T, BusError>;

pub trait MessageBus: Send + Sync {
    /// Registers a listener. Messages posted afterwards are delivered to it in
    /// post order until it is removed.
    fn add_listener(&self) -> (ListenerId, mpsc::UnboundedReceiver<FrameEnvelope>);
    fn remove_listener(&self, id: ListenerId) -> BusResult<()>;
    /// Fans the envelope out to every live listener, returning how many got it.
    fn post(&self, envelope: FrameEnvelope) -> BusResult<usize>;
}

/// In-process bus standing in for the window message channel.
#[derive(Debug, Default)]
pub struct LocalMessageBus {
    listeners: parking_lot::RwLock<Vec<(ListenerId, mpsc::UnboundedSender<FrameEnvelope>)>>,
    next_id: AtomicU64,
}

impl LocalMessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl MessageBus for LocalMessageBus {
    fn add_listener(&self) -> (ListenerId, mpsc::UnboundedReceiver<FrameEnvelope>) {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.write().push((id, tx));
        (id, rx)
    }

    fn remove_listener(&self, id: ListenerId) -> BusResult<()> {
        let mut guard = self.listeners.write();
        let before = guard.len();
        guard.retain(|(existing, _)| *existing != id);
        if guard.len() == before {
            return Err(BusError::UnknownListener(id));
        }
        Ok(())
    }

    fn post(&self, envelope: FrameEnvelope) -> BusResult<usize> {
        let mut guard = self.listeners.write();
        guard.retain(|(_, tx)| !tx.is_closed());
        if guard.is_empty() {
            return Err(BusError::Closed);
        }
        let mut delivered = 0;
        for (id, tx) in guard.iter() {
            if tx.send(envelope.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!(target = "frame.bus", listener = ?id, "listener dropped during post");
            }
        }
        Ok(delivered)
    }
}

/// Checks a declared sender origin against the configured content host.
///
/// `content_host` is `host` or `host:port`; the origin must parse as a URL
/// whose authority equals it exactly.
pub fn origin_matches(origin: &str, content_host: &str) -> bool {
    let Ok(parsed) = Url::parse(origin) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    match parsed.port() {
        Some(port) => content_host == format!("{host}:{port}"),
        None => content_host == host,
    }
}
