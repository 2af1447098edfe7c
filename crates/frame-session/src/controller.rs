use std::sync::Arc;

use fallback_sdk::{FallbackJob, FallbackQueue};
use frame_bus::{origin_matches, FrameEnvelope, ListenerId, MessageBus};
use replay_channel::{BehaviorPhase, LiveChannel};
use replay_proto::{
    AutopilotStatus, CookieAssignment, FrameCommand, FrameMessage, Mode, NavMethod,
    NavigationIdentity, PageRecord, PageState, ReadyState, SessionParams, StoreAction,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::descriptor::{SessionDescriptor, SessionHandle};
use crate::prefix::PrefixResolvers;
use crate::sync::{ChangeOrigin, NavSync};
use crate::uri::decode_uri;
use crate::{
    Collaborators, ContentFrame, DocumentTitle, FrameInit, SessionResult, StateStore,
};

const REPLAY_TITLE: &str = "Archives";

/// Host-owned inputs of a session. Each [`FrameSession::update`] receives the
/// full current set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostProps {
    pub url: String,
    pub timestamp: Option<String>,
    pub mode: Mode,
    pub behavior: Option<String>,
    pub active_bookmark_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// `host[:port]` the frame content is served from.
    pub content_host: String,
    /// Account that owns cookie fallbacks; defaults to the session user.
    pub auth_user: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Unmounted,
    UntrustedOrigin,
    NotStructured,
    ForeignWindow,
    Malformed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Dropped(DropReason),
    Dispatched,
}

/// Controller for one mounted replay frame.
pub struct FrameSession {
    config: SessionConfig,
    params: SessionParams,
    props: HostProps,
    prefixes: PrefixResolvers,
    descriptor: SessionHandle,
    frame: Box<dyn ContentFrame>,
    channel: Arc<dyn LiveChannel>,
    bus: Arc<dyn MessageBus>,
    listener: Option<ListenerId>,
    store: Arc<dyn StateStore>,
    title: Arc<dyn DocumentTitle>,
    fallback: FallbackQueue,
    observed: NavigationIdentity,
    sync: NavSync,
    initial_request: bool,
    mounted: bool,
}

impl FrameSession {
    /// Publishes the descriptor, launches the frame, opens the realtime channel
    /// and registers the message listener. The returned receiver carries the
    /// envelopes to feed into [`FrameSession::handle_inbound_message`].
    pub fn mount(
        props: HostProps,
        params: SessionParams,
        prefixes: PrefixResolvers,
        config: SessionConfig,
        deps: Collaborators,
    ) -> SessionResult<(Self, mpsc::UnboundedReceiver<FrameEnvelope>)> {
        let (app_prefix, content_prefix) = prefixes.resolve();
        let descriptor = SessionHandle::publish(SessionDescriptor::new(
            params.coll.clone(),
            props.url.clone(),
            content_prefix.clone(),
            params.ts.clone(),
            props.mode.clone(),
        ));

        let mut frame = deps.launcher.launch(
            FrameInit {
                url: props.url.clone(),
                app_prefix,
                content_prefix,
                request_ts: params.ts.clone(),
            },
            descriptor.clone(),
        )?;

        let channel = match deps.channels.open(&params, &props.mode) {
            Ok(channel) => channel,
            Err(err) => {
                if let Err(close_err) = frame.close() {
                    warn!(target = "frame.session", error = %close_err, "failed to close frame after channel error");
                }
                return Err(err.into());
            }
        };

        let (listener, inbound) = deps.bus.add_listener();
        info!(
            target = "frame.session",
            window = %frame.window(),
            mode = %props.mode,
            coll = %params.coll,
            "frame session mounted"
        );

        let observed = NavigationIdentity {
            url: props.url.clone(),
            timestamp: props.timestamp.clone(),
            mode: props.mode.clone(),
        };

        Ok((
            Self {
                config,
                params,
                props,
                prefixes,
                descriptor,
                frame,
                channel,
                bus: deps.bus,
                listener: Some(listener),
                store: deps.store,
                title: deps.title,
                fallback: deps.fallback,
                observed,
                sync: NavSync::Idle,
                initial_request: true,
                mounted: true,
            },
            inbound,
        ))
    }

    pub fn props(&self) -> &HostProps {
        &self.props
    }

    /// Navigation identity as the host currently renders it.
    pub fn identity(&self) -> NavigationIdentity {
        NavigationIdentity {
            url: self.props.url.clone(),
            timestamp: self.props.timestamp.clone(),
            mode: self.props.mode.clone(),
        }
    }

    /// Navigation identity last reported by the frame.
    pub fn observed_identity(&self) -> &NavigationIdentity {
        &self.observed
    }

    pub fn descriptor(&self) -> &SessionHandle {
        &self.descriptor
    }

    pub fn nav_sync(&self) -> NavSync {
        self.sync
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Reconciles new host props against the previous ones.
    pub fn update(&mut self, next: HostProps) {
        let prev = std::mem::replace(&mut self.props, next);

        if prev.mode != self.props.mode {
            self.descriptor.set_mode(self.props.mode.clone());
        }

        if prev.behavior != self.props.behavior {
            let starting = self
                .props
                .behavior
                .as_deref()
                .filter(|name| !name.is_empty());
            let command = FrameCommand::Behavior {
                name: self.props.behavior.clone(),
                url: self.props.url.clone(),
                start: starting.is_some(),
            };
            if let Err(err) = self.frame.post_command(&command) {
                warn!(target = "frame.session", error = %err, "failed to post behavior command");
            }
            if let Some(name) = starting {
                self.channel.behavior_stat(BehaviorPhase::Start, name);
            }
        }

        if prev.url != self.props.url
            || prev.timestamp != self.props.timestamp
            || prev.active_bookmark_id != self.props.active_bookmark_id
        {
            match self.sync.settle() {
                ChangeOrigin::Frame => {
                    debug!(target = "frame.session", url = %self.props.url, "navigation came from frame");
                }
                ChangeOrigin::Host => {
                    // Recomputed even when mode is unchanged; computed prefixes may move.
                    if self.props.mode.is_replay_family() {
                        let (app_prefix, content_prefix) = self.prefixes.resolve();
                        self.frame.set_prefixes(app_prefix, content_prefix);
                    }
                    if let Err(err) = self
                        .frame
                        .load_url(&self.props.url, self.props.timestamp.as_deref())
                    {
                        warn!(target = "frame.session", url = %self.props.url, error = %err, "frame load failed");
                    }
                }
            }
        }
    }

    /// Validates and dispatches one message posted by the frame.
    pub fn handle_inbound_message(&mut self, envelope: &FrameEnvelope) -> MessageOutcome {
        if !self.mounted {
            return MessageOutcome::Dropped(DropReason::Unmounted);
        }
        if !origin_matches(&envelope.origin, &self.config.content_host) {
            debug!(target = "frame.session", origin = %envelope.origin, "dropping message from untrusted origin");
            return MessageOutcome::Dropped(DropReason::UntrustedOrigin);
        }
        if !envelope.data.is_object() {
            return MessageOutcome::Dropped(DropReason::NotStructured);
        }
        let privileged = FrameMessage::kind_of(&envelope.data)
            .map(FrameMessage::is_privileged_kind)
            .unwrap_or(false);
        if envelope.source != self.frame.window() && !privileged {
            debug!(target = "frame.session", source = %envelope.source, "dropping message from foreign window");
            return MessageOutcome::Dropped(DropReason::ForeignWindow);
        }

        let message = match serde_json::from_value::<FrameMessage>(envelope.data.clone()) {
            Ok(message) => message,
            Err(err) => {
                debug!(target = "frame.session", error = %err, "dropping malformed frame message");
                return MessageOutcome::Dropped(DropReason::Malformed);
            }
        };
        self.dispatch(message);
        MessageOutcome::Dispatched
    }

    fn dispatch(&mut self, message: FrameMessage) {
        match message {
            FrameMessage::BehaviorDone => {
                let name = self.props.behavior.clone().unwrap_or_default();
                self.channel.behavior_stat(BehaviorPhase::Done, &name);
                self.store.dispatch(StoreAction::ToggleAutopilot {
                    id: None,
                    status: AutopilotStatus::Complete,
                    url: self.props.url.clone(),
                });
                self.store
                    .dispatch(StoreAction::UpdateBehaviorMessage("Behavior Done".into()));
            }
            FrameMessage::BehaviorStop => {
                self.store.dispatch(StoreAction::ToggleAutopilot {
                    id: None,
                    status: AutopilotStatus::Stopped,
                    url: self.props.url.clone(),
                });
                self.store.dispatch(StoreAction::UpdateBehaviorMessage(
                    "Behavior Stopped By User".into(),
                ));
            }
            FrameMessage::BehaviorStep { result } => {
                self.store.dispatch(StoreAction::UpdateBehaviorState(result));
            }
            FrameMessage::Load(mut state) => match state.ready_state {
                Some(ReadyState::Interactive) => {
                    self.store
                        .dispatch(StoreAction::SetMethod(NavMethod::Navigation));
                    // Frames do not flag new pages themselves yet.
                    state.new_page = true;
                    self.add_new_page(&state, true);
                }
                Some(ReadyState::Complete) => self.store.dispatch(StoreAction::AutopilotReady),
                Some(ReadyState::Loading) | Some(ReadyState::Other) | None => {}
            },
            FrameMessage::Cookie { cookie, domain } => self.assign_cookie(&cookie, &domain),
            FrameMessage::Snapshot => {}
            FrameMessage::SkipRequest { url } => self.report_skip(url),
            FrameMessage::HashChange { hash } => {
                let base = self.props.url.split('#').next().unwrap_or_default();
                let url = match hash.as_deref().filter(|hash| !hash.is_empty()) {
                    Some(hash) => format!("{base}{hash}"),
                    None => base.to_string(),
                };
                self.store.dispatch(StoreAction::SetMethod(NavMethod::Hash));
                self.set_url(&url, false);
            }
            FrameMessage::ReplaceUrl(state) => {
                self.store.dispatch(StoreAction::SetMethod(NavMethod::History));
                self.add_new_page(&state, false);
            }
            FrameMessage::BugReport => self.store.dispatch(StoreAction::ToggleBugReportModal(true)),
            FrameMessage::Unknown => {}
        }
    }

    /// Pushes a frame-reported URL into host state. Unlike a throwing
    /// `decodeURI`, an undecodable URL is still dispatched, verbatim.
    fn set_url(&mut self, url: &str, suppress_stats: bool) {
        let raw = decode_uri(url);
        if self.props.url != raw {
            self.sync.frame_originated();
            self.store.dispatch(StoreAction::UpdateUrl(raw.clone()));
        }
        self.observed.url = raw.clone();
        if !suppress_stats {
            self.channel.set_stats_urls(&[raw]);
        }
    }

    fn set_timestamp(&mut self, timestamp: Option<&str>) {
        if self.props.timestamp.as_deref() != timestamp {
            self.sync.frame_originated();
            self.store
                .dispatch(StoreAction::UpdateTimestamp(timestamp.map(str::to_string)));
        }
        self.observed.timestamp = timestamp.map(str::to_string);
    }

    fn add_new_page(&mut self, state: &PageState, do_add: bool) {
        let mode = self.props.mode.clone();
        if state.is_error {
            self.set_url(&state.url, false);
        } else if mode.is_capture() {
            if let Some(ts) = state.timestamp() {
                self.set_timestamp(Some(ts));
                self.descriptor.set_timestamp(ts);
            }
            self.set_url(&state.url, true);
            self.title
                .set_title(mode.capture_label(), &state.url, state.title.as_deref());

            if do_add && state.new_page && (state.timestamp().is_some() || mode != Mode::Patch) {
                self.persist_page(PageRecord::from(state));
            }
        } else if mode.is_replay() {
            // The first load echoes the navigation the host asked for.
            if !self.initial_request {
                self.set_timestamp(state.timestamp());
                self.set_url(&state.url, false);
                self.title
                    .set_title(REPLAY_TITLE, &state.url, state.title.as_deref());
            }
        }
        self.initial_request = false;
    }

    fn persist_page(&self, record: PageRecord) {
        if self.channel.add_page(&record) {
            return;
        }
        debug!(target = "frame.session", url = %record.url, "realtime rejected page; using fallback");
        self.fallback.submit(FallbackJob::Page {
            rec: self.params.rec.clone().unwrap_or_default(),
            user: self.params.user.clone(),
            coll: self.params.coll.clone(),
            record,
        });
    }

    fn assign_cookie(&self, raw: &str, domain: &str) {
        let Some(cookie) = CookieAssignment::parse(raw, domain) else {
            debug!(target = "frame.session", domain, "cookie without name=value pair");
            return;
        };
        if self
            .channel
            .add_cookie(&cookie.name, &cookie.value, &cookie.domain)
        {
            return;
        }
        let user = self
            .config
            .auth_user
            .as_deref()
            .unwrap_or(&self.params.user);
        self.fallback
            .submit(FallbackJob::cookie(user, self.params.rec.as_deref(), &cookie));
    }

    fn report_skip(&self, url: String) {
        if !self.channel.add_skip_req(&url) {
            self.fallback.submit(FallbackJob::SkipRequest { url });
        }
    }

    /// Closes the frame, removes the listener and closes the realtime channel.
    /// Every step runs even when an earlier one fails.
    pub fn unmount(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;

        if let Err(err) = self.frame.close() {
            warn!(target = "frame.session", error = %err, "frame close failed");
        }
        if let Some(listener) = self.listener.take() {
            if let Err(err) = self.bus.remove_listener(listener) {
                warn!(target = "frame.session", error = %err, "listener removal failed");
            }
        }
        if let Err(err) = self.channel.close() {
            warn!(target = "frame.session", error = %err, "realtime close failed");
        }
        info!(target = "frame.session", coll = %self.params.coll, "frame session unmounted");
    }
}

impl Drop for FrameSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

