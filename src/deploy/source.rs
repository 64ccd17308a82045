//! Filesystem event sources.
//!
//! # Responsibilities
//! - Turn watch notifications into created/modified/removed events
//! - Hand them over as an async stream the deployer can `select!` on
//!
//! # Design Decisions
//! - A source can be reopened; each `open` replaces the previous watch
//! - Watch errors travel in the stream so the consumer decides to stop
//! - Tests drive the deployer with `ChannelSource`, no filesystem needed

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::GatewayError;

/// A change to a file in the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
}

impl DeployEvent {
    pub fn path(&self) -> &Path {
        match self {
            Self::Created(p) | Self::Modified(p) | Self::Removed(p) => p,
        }
    }
}

pub type EventStream = mpsc::UnboundedReceiver<Result<DeployEvent, GatewayError>>;
pub type EventSender = mpsc::UnboundedSender<Result<DeployEvent, GatewayError>>;

/// Produces the change events of one directory.
pub trait EventSource: Send {
    fn open(&mut self, dir: &Path) -> Result<EventStream, GatewayError>;
}

/// `notify`-backed source.
pub struct NotifySource {
    poll_interval: Duration,
    watcher: Option<RecommendedWatcher>,
}

impl NotifySource {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            watcher: None,
        }
    }
}

impl EventSource for NotifySource {
    fn open(&mut self, dir: &Path) -> Result<EventStream, GatewayError> {
        self.watcher = None;
        let (tx, rx) = mpsc::unbounded_channel();
        let watched = dir.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for event in translate(event) {
                        let _ = tx.send(Ok(event));
                    }
                }
                Err(e) => {
                    let path = e.paths.first().cloned().unwrap_or_else(|| watched.clone());
                    let _ = tx.send(Err(GatewayError::Watch {
                        path,
                        reason: e.to_string(),
                    }));
                }
            },
            Config::default().with_poll_interval(self.poll_interval),
        )
        .map_err(|e| watch_error(dir, e))?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| watch_error(dir, e))?;

        tracing::info!(path = ?dir, "Directory watcher started");
        self.watcher = Some(watcher);
        Ok(rx)
    }
}

fn watch_error(dir: &Path, e: notify::Error) -> GatewayError {
    GatewayError::Watch {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    }
}

/// Map a raw notification to deploy events.
fn translate(event: Event) -> Vec<DeployEvent> {
    let paths = event.paths;
    match event.kind {
        EventKind::Create(_) => paths.into_iter().map(DeployEvent::Created).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            paths.into_iter().map(DeployEvent::Removed).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.into_iter().map(DeployEvent::Created).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = paths.into_iter();
            let mut events = Vec::new();
            if let Some(from) = paths.next() {
                events.push(DeployEvent::Removed(from));
            }
            events.extend(paths.map(DeployEvent::Created));
            events
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => paths.into_iter().map(DeployEvent::Modified).collect(),
        EventKind::Remove(_) => paths.into_iter().map(DeployEvent::Removed).collect(),
        _ => Vec::new(),
    }
}

/// Source fed by hand through an [`EventSender`].
pub struct ChannelSource {
    stream: Option<EventStream>,
}

impl ChannelSource {
    pub fn new() -> (Self, EventSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { stream: Some(rx) }, tx)
    }
}

impl EventSource for ChannelSource {
    fn open(&mut self, dir: &Path) -> Result<EventStream, GatewayError> {
        self.stream.take().ok_or_else(|| GatewayError::Watch {
            path: dir.to_path_buf(),
            reason: "channel source can only be opened once".into(),
        })
    }
}
