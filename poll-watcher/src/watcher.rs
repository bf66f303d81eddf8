//! Polling watch loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::catalog::{FileHandle, ResourceCatalog};
use crate::config::{DEFAULT_POLL_INTERVAL_MICROS, WatchConfig};
use crate::error::Result;
use crate::event::{EventEmitter, EventKind, FileEvent, Listener};

/// A catalog shared between a watcher and its owner.
pub type SharedCatalog = Arc<RwLock<ResourceCatalog>>;

/// Watcher that re-reads modification times on a fixed interval and reports
/// new and modified files.
///
/// [`PollingWatcher::watch`] blocks the calling task until
/// [`PollingWatcher::stop`] is observed at the top of a cycle. Once stopped,
/// a watcher never runs again.
#[derive(Debug)]
pub struct PollingWatcher {
    /// Catalog being watched.
    catalog: SharedCatalog,

    /// Sleep between poll cycles.
    poll_interval: Duration,

    /// Listener and subscriber dispatch.
    emitter: EventEmitter,

    /// Cancelled by [`PollingWatcher::stop`].
    cancel: CancellationToken,
}

impl PollingWatcher {
    /// Create a watcher over `catalog` with the default one second interval.
    pub fn new(catalog: SharedCatalog) -> Self {
        Self {
            catalog,
            poll_interval: Duration::from_micros(DEFAULT_POLL_INTERVAL_MICROS),
            emitter: EventEmitter::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Build a catalog and watcher from a config.
    pub fn from_config(config: &WatchConfig) -> Result<Self> {
        config.validate()?;
        let catalog = ResourceCatalog::from_config(config)?;

        Ok(Self::new(Arc::new(RwLock::new(catalog))).with_poll_interval(config.poll_interval()))
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// The watched catalog.
    pub fn catalog(&self) -> &SharedCatalog {
        &self.catalog
    }

    /// Sleep between poll cycles.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Register a callback for files absent from the snapshot.
    pub fn on_new<F>(&mut self, callback: F)
    where
        F: Fn(&FileHandle) + Send + Sync + 'static,
    {
        self.emitter.on(EventKind::New, callback);
    }

    /// Register a callback for files whose modification time moved forward.
    pub fn on_modified<F>(&mut self, callback: F)
    where
        F: Fn(&FileHandle) + Send + Sync + 'static,
    {
        self.emitter.on(EventKind::Modified, callback);
    }

    /// Registered callbacks, by kind.
    pub fn actions(&self) -> &HashMap<EventKind, Vec<Listener>> {
        self.emitter.listeners()
    }

    /// Receive every event over a channel.
    pub fn subscribe(&mut self) -> mpsc::Receiver<FileEvent> {
        self.emitter.subscribe()
    }

    /// Request the loop to end after the current cycle.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            info!("Stopping watcher");
        }
        self.cancel.cancel();
    }

    /// Whether [`PollingWatcher::stop`] has been called.
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token that stops this watcher when cancelled, for use inside callbacks.
    pub fn stop_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Poll until stopped.
    pub async fn watch(&self) -> Result<()> {
        self.watch_with_tick(|_| {}).await
    }

    /// Poll until stopped, calling `on_tick` after every cycle's sleep.
    pub async fn watch_with_tick<F>(&self, mut on_tick: F) -> Result<()>
    where
        F: FnMut(&Self),
    {
        if self.is_stopped() {
            debug!("Watcher already stopped, not polling");
            return Ok(());
        }

        // Files created after this point are never picked up
        let mut working_set = {
            let mut catalog = self.catalog.write().await;
            catalog.initialize()?;
            info!(
                "Watching {} ({} files, every {:?})",
                catalog.root().display(),
                catalog.entries().len(),
                self.poll_interval
            );
            catalog.entries().to_vec()
        };

        while !self.cancel.is_cancelled() {
            let summary = self.poll_once(&mut working_set).await;
            if summary.new > 0 || summary.modified > 0 {
                debug!(
                    "Poll cycle: {} new, {} modified, {} watched",
                    summary.new,
                    summary.modified,
                    working_set.len()
                );
            }

            tokio::time::sleep(self.poll_interval).await;
            on_tick(self);
        }

        info!("Watcher stopped");
        Ok(())
    }

    /// Run a single poll cycle over `working_set`.
    ///
    /// Each path is checked against the patterns current at that moment, so a
    /// pattern added by a callback applies to the rest of the cycle. Filtered
    /// paths are dropped from the set for good. Paths whose modification time
    /// cannot be read count as unchanged.
    pub(crate) async fn poll_once(&self, working_set: &mut Vec<FileHandle>) -> CycleSummary {
        let mut summary = CycleSummary::default();
        let mut index = 0;

        while index < working_set.len() {
            let filtered = self
                .catalog
                .read()
                .await
                .is_filtered(working_set[index].path());
            if filtered {
                let handle = working_set.remove(index);
                debug!("Dropping filtered path {handle}");
                continue;
            }

            let handle = working_set[index].clone();
            index += 1;

            let time = match handle.modified_secs() {
                Ok(time) => time,
                Err(e) => {
                    debug!("Cannot read modification time of {handle}: {e}");
                    continue;
                }
            };

            let kind = {
                let mut catalog = self.catalog.write().await;
                let kind = match catalog.snapshot_time(handle.path()) {
                    None => Some(EventKind::New),
                    Some(last) if time > last => Some(EventKind::Modified),
                    Some(_) => None,
                };
                if kind.is_some() {
                    catalog.update_snapshot(handle.path(), time);
                }
                kind
            };

            let Some(kind) = kind else {
                continue;
            };

            match kind {
                EventKind::New => summary.new += 1,
                EventKind::Modified => summary.modified += 1,
            }

            debug!("{kind} file: {handle}");
            self.emitter
                .emit(&FileEvent::new(kind, handle.path(), time), &handle);
        }

        summary
    }
}

/// Events raised by one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CycleSummary {
    /// Number of NEW events.
    pub new: usize,

    /// Number of MODIFIED events.
    pub modified: usize,
}
