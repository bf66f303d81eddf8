//! # Poll Watcher
//!
//! This crate watches a file or directory by periodically re-reading
//! modification times, without OS change-notification APIs. It is used to
//! trigger rebuilds and reloads when files change.
//!
//! ## Features
//!
//! - **Resource Catalog**: Enumerates files under a root and remembers the
//!   last modification time seen for each
//! - **Substring Filters**: Exclude and include patterns matched anywhere in a path
//! - **Polling Loop**: Diffs live timestamps against the snapshot every interval
//! - **Callbacks and Channels**: NEW and MODIFIED events delivered synchronously
//!   to callbacks, and to channel subscribers
//!
//! ## Architecture
//!
//! ```text
//! WatchConfig ──► ResourceCatalog ──► PollingWatcher ──► EventEmitter
//!                      │                    │                  │
//!                      ▼                    ▼                  ▼
//!              exclude/include        snapshot diff      callbacks and
//!                 patterns                               subscribers
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use codex_poll_watcher::{PollingWatcher, WatchConfig};
//!
//! let mut watcher = PollingWatcher::from_config(&WatchConfig::new("src").exclude("target"))?;
//! watcher.on_modified(|file| println!("changed: {file}"));
//! watcher.watch().await?;
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod event;
pub mod watcher;

pub use catalog::{FileHandle, ResourceCatalog};
pub use config::{DEFAULT_POLL_INTERVAL_MICROS, WatchConfig};
pub use error::{Result, WatcherError};
pub use event::{EventEmitter, EventKind, FileEvent, Listener};
pub use watcher::{PollingWatcher, SharedCatalog};
