//! Stdout side of the host: everything the controller tells the frame, the
//! store or the title bar is written as one JSON object per line.

use frame_bus::WindowId;
use frame_session::{
    ContentFrame, DocumentTitle, FrameError, FrameInit, FrameLauncher, FrameResult,
    SessionDescriptor, SessionHandle,
};
use replay_proto::{FrameCommand, StoreAction};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    Launch {
        window: WindowId,
        url: String,
        app_prefix: String,
        content_prefix: String,
        request_ts: Option<String>,
        descriptor: SessionDescriptor,
    },
    Load {
        url: String,
        ts: Option<String>,
    },
    Prefixes {
        app_prefix: String,
        content_prefix: String,
    },
    Command(FrameCommand),
    Action(StoreAction),
    Title {
        label: String,
        url: String,
        title: Option<String>,
    },
    Close,
}

#[derive(Debug, Clone)]
pub struct Output {
    tx: mpsc::UnboundedSender<HostEvent>,
}

impl Output {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: HostEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Serializes events to `writer` until every [`Output`] handle is dropped.
pub fn spawn_writer<W>(writer: W) -> (Output, JoinHandle<()>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (output, rx) = Output::channel();
    let handle = tokio::spawn(write_events(writer, rx));
    (output, handle)
}

async fn write_events<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<HostEvent>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = rx.recv().await {
        let mut line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(err) => {
                warn!(target = "replay_host", error = %err, "failed to encode host event");
                continue;
            }
        };
        line.push('\n');
        if let Err(err) = writer.write_all(line.as_bytes()).await {
            warn!(target = "replay_host", error = %err, "stdout closed");
            return;
        }
        if let Err(err) = writer.flush().await {
            warn!(target = "replay_host", error = %err, "stdout flush failed");
            return;
        }
    }
}

/// Frame whose window lives on the other end of stdin/stdout.
pub struct StdioFrame {
    window: WindowId,
    output: Output,
    closed: bool,
}

impl StdioFrame {
    fn emit(&self, event: HostEvent) -> FrameResult<()> {
        if self.closed {
            return Err(FrameError::Closed);
        }
        if self.output.emit(event) {
            Ok(())
        } else {
            Err(FrameError::Transport("stdout writer stopped".into()))
        }
    }
}

impl ContentFrame for StdioFrame {
    fn window(&self) -> WindowId {
        self.window
    }

    fn load_url(&mut self, url: &str, timestamp: Option<&str>) -> FrameResult<()> {
        self.emit(HostEvent::Load {
            url: url.to_string(),
            ts: timestamp.map(str::to_string),
        })
    }

    fn set_prefixes(&mut self, app_prefix: String, content_prefix: String) {
        if let Err(err) = self.emit(HostEvent::Prefixes {
            app_prefix,
            content_prefix,
        }) {
            debug!(target = "replay_host", error = %err, "prefix update not delivered");
        }
    }

    fn post_command(&self, command: &FrameCommand) -> FrameResult<()> {
        self.emit(HostEvent::Command(command.clone()))
    }

    fn close(&mut self) -> FrameResult<()> {
        let result = self.emit(HostEvent::Close);
        self.closed = true;
        result
    }
}

pub struct StdioLauncher {
    window: WindowId,
    output: Output,
}

impl StdioLauncher {
    pub fn new(window: WindowId, output: Output) -> Self {
        Self { window, output }
    }
}

impl FrameLauncher for StdioLauncher {
    fn launch(&self, init: FrameInit, session: SessionHandle) -> FrameResult<Box<dyn ContentFrame>> {
        let launched = self.output.emit(HostEvent::Launch {
            window: self.window,
            url: init.url,
            app_prefix: init.app_prefix,
            content_prefix: init.content_prefix,
            request_ts: init.request_ts,
            descriptor: session.snapshot(),
        });
        if !launched {
            return Err(FrameError::Launch("stdout writer stopped".into()));
        }
        Ok(Box::new(StdioFrame {
            window: self.window,
            output: self.output.clone(),
            closed: false,
        }))
    }
}

pub struct StdioTitle {
    output: Output,
}

impl StdioTitle {
    pub fn new(output: Output) -> Self {
        Self { output }
    }
}

impl DocumentTitle for StdioTitle {
    fn set_title(&self, label: &str, url: &str, title: Option<&str>) {
        self.output.emit(HostEvent::Title {
            label: label.to_string(),
            url: url.to_string(),
            title: title.map(str::to_string),
        });
    }
}
