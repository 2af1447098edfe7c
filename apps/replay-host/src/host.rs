use std::sync::Arc;

use anyhow::{Context, Result};
use fallback_sdk::{spawn_fallback_worker, HttpFallbackReporter};
use frame_bus::{FrameEnvelope, LocalMessageBus, MessageBus, WindowId};
use frame_session::{ChannelFactory, Collaborators, FrameSession, HostProps, SessionConfig};
use replay_channel::{ChannelResult, LiveChannel, RealtimeClient, RealtimeConfig, ServerFrame};
use replay_proto::{Mode, SessionParams, StoreAction};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use crate::cli::RunArgs;
use crate::config::Config;
use crate::stdio::{spawn_writer, HostEvent, StdioLauncher, StdioTitle};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// One stdin line. Bare objects are posts from the frame window itself.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InboundLine {
    Navigate { navigate: Navigate },
    Envelope(PostedEnvelope),
    Bare(Value),
}

/// Host-side navigation, as if the user typed into the address bar.
#[derive(Debug, Deserialize)]
struct Navigate {
    url: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    mode: Option<Mode>,
    /// Absent leaves the running behavior alone; `null` stops it.
    #[serde(default, deserialize_with = "present")]
    behavior: Option<Option<String>>,
    #[serde(default)]
    bookmark: Option<String>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Post with an explicit origin, optionally from a nested window.
#[derive(Debug, Deserialize)]
struct PostedEnvelope {
    origin: String,
    #[serde(default)]
    nested: bool,
    data: Value,
}

/// Opens a [`RealtimeClient`] and logs what the backend pushes on it.
struct RealtimeChannels {
    config: RealtimeConfig,
}

impl ChannelFactory for RealtimeChannels {
    fn open(&self, params: &SessionParams, mode: &Mode) -> ChannelResult<Arc<dyn LiveChannel>> {
        let client = RealtimeClient::connect(self.config.clone(), params, mode.clone())?;
        if let Some(mut events) = client.take_events() {
            tokio::spawn(async move {
                while let Some(frame) = events.recv().await {
                    match frame {
                        ServerFrame::Status {
                            size, pending_size, ..
                        } => {
                            debug!(target = "realtime", size, pending_size, "recording status");
                        }
                        ServerFrame::RemoteUrl { url, timestamp } => {
                            info!(target = "realtime", %url, ?timestamp, "remote browser navigated");
                        }
                        ServerFrame::Other => {}
                    }
                }
            });
        }
        Ok(Arc::new(client))
    }
}

enum Input {
    Post(FrameEnvelope),
    Navigate(Navigate),
}

fn classify(line: InboundLine, window: WindowId, origin: &str) -> Input {
    match line {
        InboundLine::Navigate { navigate } => Input::Navigate(navigate),
        InboundLine::Envelope(posted) => Input::Post(FrameEnvelope {
            origin: posted.origin,
            source: if posted.nested { WindowId::new() } else { window },
            data: posted.data,
        }),
        InboundLine::Bare(data) => Input::Post(FrameEnvelope {
            origin: origin.to_string(),
            source: window,
            data,
        }),
    }
}

/// Applies one dispatched transition to host props.
fn fold_action(props: &mut HostProps, action: &StoreAction) {
    match action {
        StoreAction::UpdateUrl(url) => props.url = url.clone(),
        StoreAction::UpdateTimestamp(ts) => props.timestamp = ts.clone(),
        StoreAction::ToggleAutopilot { .. } => props.behavior = None,
        _ => {}
    }
}

/// Folds every transition dispatched so far into a single props update.
///
/// One frame message yields at most one update. A reported url and timestamp
/// share a single frame-originated acknowledgement.
fn settle_store(session: &mut FrameSession, actions: &mut mpsc::UnboundedReceiver<StoreAction>) {
    let mut next = session.props().clone();
    while let Ok(action) = actions.try_recv() {
        fold_action(&mut next, &action);
    }
    if next != *session.props() {
        session.update(next);
    }
}

fn handle_frame_post(
    session: &mut FrameSession,
    envelope: &FrameEnvelope,
    actions: &mut mpsc::UnboundedReceiver<StoreAction>,
) {
    let outcome = session.handle_inbound_message(envelope);
    debug!(target = "replay_host", ?outcome, "frame message handled");
    settle_store(session, actions);
}

fn apply_navigate(props: &HostProps, navigate: Navigate) -> HostProps {
    let mut next = props.clone();
    if let Some(url) = navigate.url {
        next.url = url;
    }
    if navigate.ts.is_some() {
        next.timestamp = navigate.ts;
    }
    if let Some(mode) = navigate.mode {
        next.mode = mode;
    }
    if let Some(behavior) = navigate.behavior {
        next.behavior = behavior;
    }
    if navigate.bookmark.is_some() {
        next.active_bookmark_id = navigate.bookmark;
    }
    next
}

pub async fn run(config: Config, args: RunArgs) -> Result<()> {
    let params = args.session_params();
    let realtime = config.realtime()?;
    let api_base = config.api_base_url()?;
    let origin = config.content_origin();
    let window = WindowId::new();

    let (output, writer) = spawn_writer(tokio::io::stdout());
    let (fallback, fallback_worker) =
        spawn_fallback_worker(Arc::new(HttpFallbackReporter::new(api_base)));
    let bus = Arc::new(LocalMessageBus::new());

    let (actions_tx, mut actions) = mpsc::unbounded_channel::<StoreAction>();
    let store = {
        let output = output.clone();
        move |action: StoreAction| {
            output.emit(HostEvent::Action(action.clone()));
            let _ = actions_tx.send(action);
        }
    };

    let (mut session, mut inbound) = FrameSession::mount(
        HostProps {
            url: args.url.clone(),
            timestamp: args.ts.clone(),
            mode: args.mode.clone(),
            behavior: None,
            active_bookmark_id: None,
        },
        params.clone(),
        config.prefixes(&params),
        SessionConfig {
            content_host: config.content_host.clone(),
            auth_user: args.auth_user.clone(),
        },
        Collaborators {
            launcher: Arc::new(StdioLauncher::new(window, output.clone())),
            channels: Arc::new(RealtimeChannels { config: realtime }),
            bus: bus.clone(),
            store: Arc::new(store),
            title: Arc::new(StdioTitle::new(output.clone())),
            fallback,
        },
    )
    .context("failed to mount frame session")?;
    info!(target = "replay_host", %window, mode = %args.mode, "session running");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let parsed = match serde_json::from_str::<InboundLine>(&line) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        warn!(target = "replay_host", error = %err, "ignoring unparseable input line");
                        continue;
                    }
                };
                match classify(parsed, window, &origin) {
                    Input::Post(envelope) => {
                        if let Err(err) = bus.post(envelope) {
                            warn!(target = "replay_host", error = %err, "bus rejected post");
                        }
                    }
                    Input::Navigate(navigate) => {
                        let next = apply_navigate(session.props(), navigate);
                        session.update(next);
                        settle_store(&mut session, &mut actions);
                    }
                }
            }
            Some(envelope) = inbound.recv() => {
                handle_frame_post(&mut session, &envelope, &mut actions);
            }
            _ = tokio::signal::ctrl_c() => {
                info!(target = "replay_host", "interrupted");
                break;
            }
        }
    }

    session.unmount();
    drop(output);
    drop(actions);

    if timeout(DRAIN_TIMEOUT, fallback_worker).await.is_err() {
        warn!(target = "fallback", "fallback writes still pending at exit");
    }
    if timeout(DRAIN_TIMEOUT, writer).await.is_err() {
        warn!(target = "replay_host", "stdout writer did not finish");
    }
    Ok(())
}
