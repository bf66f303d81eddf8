//! Change events raised by the poll loop.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::catalog::FileHandle;

/// Capacity of each channel handed out by [`EventEmitter::subscribe`].
const SUBSCRIBER_CAPACITY: usize = 1000;

/// Kind of change detected during a poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EventKind {
    /// Path was absent from the snapshot when checked.
    New = 0,

    /// Path was present with an older recorded time.
    Modified = 1,
}

impl EventKind {
    /// Stable numeric identifier.
    pub fn id(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => f.write_str("new"),
            Self::Modified => f.write_str("modified"),
        }
    }
}

/// A detected change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEvent {
    /// The kind of event.
    pub kind: EventKind,

    /// Path to the affected file.
    pub path: PathBuf,

    /// Modification time that triggered the event, in Unix epoch seconds.
    pub modified: i64,

    /// When the event was raised.
    pub timestamp: DateTime<Utc>,
}

impl FileEvent {
    /// Create a new file event.
    pub fn new(kind: EventKind, path: impl Into<PathBuf>, modified: i64) -> Self {
        Self {
            kind,
            path: path.into(),
            modified,
            timestamp: Utc::now(),
        }
    }
}

/// Callback invoked with the handle of a changed file.
pub type Listener = Arc<dyn Fn(&FileHandle) + Send + Sync>;

/// Dispatches events to listeners and channel subscribers.
///
/// Listeners for a kind accumulate and run synchronously in registration
/// order on the polling task.
#[derive(Default)]
pub struct EventEmitter {
    listeners: HashMap<EventKind, Vec<Listener>>,
    subscribers: Vec<mpsc::Sender<FileEvent>>,
}

impl EventEmitter {
    /// Create an emitter with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `kind`.
    pub fn on<F>(&mut self, kind: EventKind, listener: F)
    where
        F: Fn(&FileHandle) + Send + Sync + 'static,
    {
        self.listeners
            .entry(kind)
            .or_default()
            .push(Arc::new(listener));
    }

    /// Registered listeners, by kind.
    pub fn listeners(&self) -> &HashMap<EventKind, Vec<Listener>> {
        &self.listeners
    }

    /// Number of listeners registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Open a channel that receives every emitted event.
    pub fn subscribe(&mut self) -> mpsc::Receiver<FileEvent> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.subscribers.push(tx);
        rx
    }

    /// Deliver `event` to listeners of its kind, then to subscribers.
    ///
    /// Never blocks: a full subscriber channel drops the event.
    pub fn emit(&self, event: &FileEvent, handle: &FileHandle) {
        if let Some(listeners) = self.listeners.get(&event.kind) {
            for listener in listeners {
                listener(handle);
            }
        }

        for tx in &self.subscribers {
            match tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => warn!(
                    "Subscriber channel full, dropping {} event for {}",
                    event.kind,
                    event.path.display()
                ),
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("Subscriber gone, skipping {}", event.path.display());
                }
            }
        }
    }

    /// Number of subscribers whose receiver is still alive.
    pub fn active_subscribers(&self) -> usize {
        self.subscribers.iter().filter(|tx| !tx.is_closed()).count()
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("new_listeners", &self.listener_count(EventKind::New))
            .field("modified_listeners", &self.listener_count(EventKind::Modified))
            .field("subscribers", &self.active_subscribers())
            .finish()
    }
}
