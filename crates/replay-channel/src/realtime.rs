use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use replay_proto::{Mode, PageRecord, SessionParams};
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};
use url::Url;

use crate::wire::{parse_server_frame, BehaviorPhase, ClientFrame, ServerFrame};
use crate::{ChannelError, ChannelResult, LiveChannel};

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// `ws://` or `wss://` base the `_client_ws` endpoint is resolved against.
    pub ws_base: Url,
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
}

impl RealtimeConfig {
    pub fn new(ws_base: Url) -> Self {
        Self {
            ws_base,
            reconnect_attempts: 5,
            reconnect_delay: Duration::from_millis(1000),
        }
    }
}

/// Builds the socket URL for a session bound to `mode`.
pub fn endpoint(base: &Url, params: &SessionParams, mode: &Mode) -> ChannelResult<Url> {
    match base.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(ChannelError::InvalidEndpoint(format!(
                "unsupported scheme {other}"
            )))
        }
    }
    let mut url = base
        .join("_client_ws")
        .map_err(|err| ChannelError::InvalidEndpoint(err.to_string()))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("user", &params.user);
        query.append_pair("coll", &params.coll);
        if let Some(rec) = params.rec.as_deref() {
            query.append_pair("rec", rec);
        }
        query.append_pair("type", mode.as_str());
    }
    Ok(url)
}

/// WebSocket-backed [`LiveChannel`].
///
/// The socket lives in a background task; writes are queued to it only while
/// the connection is open, so a `false` return is immediate and never waits
/// on the network.
pub struct RealtimeClient {
    mode: Mode,
    open: Arc<AtomicBool>,
    outbound: Mutex<Option<mpsc::UnboundedSender<ClientFrame>>>,
    events: Mutex<Option<mpsc::UnboundedReceiver<ServerFrame>>>,
    shutdown: watch::Sender<bool>,
}

impl RealtimeClient {
    /// Starts connecting in the background. Must be called inside a Tokio runtime.
    pub fn connect(config: RealtimeConfig, params: &SessionParams, mode: Mode) -> ChannelResult<Self> {
        let url = endpoint(&config.ws_base, params, &mode)?;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let open = Arc::new(AtomicBool::new(false));

        tokio::spawn(run_connection(
            url,
            config,
            outbound_rx,
            events_tx,
            open.clone(),
            shutdown_rx,
        ));

        Ok(Self {
            mode,
            open,
            outbound: Mutex::new(Some(outbound_tx)),
            events: Mutex::new(Some(events_rx)),
            shutdown,
        })
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Hands out the stream of backend frames. Only the first caller gets it.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<ServerFrame>> {
        self.events.lock().take()
    }

    fn send(&self, frame: ClientFrame) -> bool {
        if frame.requires_capture() && !self.mode.is_capture() {
            debug!(target = "realtime", mode = %self.mode, "write not supported in mode");
            return false;
        }
        if !self.is_open() {
            return false;
        }
        match self.outbound.lock().as_ref() {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }
}

impl LiveChannel for RealtimeClient {
    fn behavior_stat(&self, phase: BehaviorPhase, name: &str) {
        if !self.send(ClientFrame::BehaviorStat {
            phase,
            name: name.to_string(),
        }) {
            debug!(target = "realtime", ?phase, behavior = name, "behavior stat dropped");
        }
    }

    fn add_page(&self, record: &PageRecord) -> bool {
        self.send(ClientFrame::Page {
            page: record.clone(),
        })
    }

    fn add_cookie(&self, name: &str, value: &str, domain: &str) -> bool {
        self.send(ClientFrame::SetCookie {
            name: name.to_string(),
            value: value.to_string(),
            domain: domain.to_string(),
        })
    }

    fn add_skip_req(&self, url: &str) -> bool {
        self.send(ClientFrame::SkipRequest {
            url: url.to_string(),
        })
    }

    fn set_stats_urls(&self, urls: &[String]) {
        self.send(ClientFrame::StatsUrls {
            stats_urls: urls.to_vec(),
        });
    }

    fn close(&self) -> ChannelResult<()> {
        self.open.store(false, Ordering::Release);
        if self.outbound.lock().take().is_some() {
            info!(target = "realtime", mode = %self.mode, "closing realtime channel");
        }
        // The task may already be gone after giving up on reconnects.
        let _ = self.shutdown.send(true);
        Ok(())
    }
}

enum PumpEnd {
    Closed,
    Disconnected,
}

async fn run_connection(
    url: Url,
    config: RealtimeConfig,
    mut outbound: mpsc::UnboundedReceiver<ClientFrame>,
    events: mpsc::UnboundedSender<ServerFrame>,
    open: Arc<AtomicBool>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut failures = 0u32;
    loop {
        let connected = tokio::select! {
            result = connect_async(url.as_str()) => result,
            _ = shutdown.changed() => break,
        };

        match connected {
            Ok((stream, _)) => {
                failures = 0;
                open.store(true, Ordering::Release);
                info!(target = "realtime", url = %url, "realtime channel open");
                let ended = pump(stream, &mut outbound, &events, &mut shutdown).await;
                open.store(false, Ordering::Release);
                match ended {
                    PumpEnd::Closed => break,
                    PumpEnd::Disconnected => {
                        info!(target = "realtime", url = %url, "realtime channel dropped")
                    }
                }
            }
            Err(err) => {
                warn!(
                    target = "realtime",
                    url = %url,
                    error = %err,
                    attempt = failures + 1,
                    "realtime connect failed"
                );
            }
        }

        failures += 1;
        if failures > config.reconnect_attempts {
            warn!(target = "realtime", url = %url, "giving up on realtime channel");
            break;
        }
        tokio::select! {
            _ = sleep(config.reconnect_delay) => {}
            _ = shutdown.changed() => break,
        }
    }
    open.store(false, Ordering::Release);
}

async fn pump<S>(
    stream: S,
    outbound: &mut mpsc::UnboundedReceiver<ClientFrame>,
    events: &mpsc::UnboundedSender<ServerFrame>,
    shutdown: &mut watch::Receiver<bool>,
) -> PumpEnd
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
{
    let (mut sink, mut source) = stream.split();
    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    let text = match serde_json::to_string(&frame) {
                        Ok(text) => text,
                        Err(err) => {
                            warn!(target = "realtime", error = %err, "failed to encode realtime frame");
                            continue;
                        }
                    };
                    if let Err(err) = sink.send(Message::Text(text)).await {
                        warn!(target = "realtime", error = %err, "realtime write failed");
                        return PumpEnd::Disconnected;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    return PumpEnd::Closed;
                }
            },
            _ = shutdown.changed() => {
                let _ = sink.send(Message::Close(None)).await;
                return PumpEnd::Closed;
            }
            message = source.next() => match message {
                Some(Ok(Message::Text(text))) => match parse_server_frame(&text) {
                    Ok(frame) => {
                        let _ = events.send(frame);
                    }
                    Err(err) => {
                        debug!(target = "realtime", error = %err, "ignoring realtime frame");
                    }
                },
                Some(Ok(Message::Close(_))) | None => return PumpEnd::Disconnected,
                Some(Err(err)) => {
                    warn!(target = "realtime", error = %err, "realtime read failed");
                    return PumpEnd::Disconnected;
                }
                Some(Ok(_)) => {}
            },
        }
    }
}
