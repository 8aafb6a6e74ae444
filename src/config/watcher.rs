//! Hot reload of the config file.
//!
//! # Responsibilities
//! - Watch the directory holding the config file, so editors that replace
//!   the file by rename are still seen
//! - Ignore events for other files and for access-only changes
//! - Collapse a burst of writes into one reload once the file settles
//! - Push only configs that load and validate; keep the running one otherwise
//!
//! # Data Flow
//! ```text
//! notify event ──(relevant?)──► settle ──► load_config ──► update channel
//!                                              │
//!                                              └─ invalid: log, keep current
//! ```

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GatewayConfig;

/// Quiet period after the last file event before reloading.
const SETTLE: Duration = Duration::from_millis(250);

pub struct ConfigWatcher {
    path: PathBuf,
    settle: Duration,
    updates: mpsc::UnboundedSender<GatewayConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the channel validated configs arrive on.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GatewayConfig>) {
        let (updates, updates_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            settle: SETTLE,
            updates,
        };
        (watcher, updates_rx)
    }

    /// Start watching. Must be called inside a tokio runtime.
    ///
    /// Reloads stop when the returned handle is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let target = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches(&event, &target) => {
                    let _ = changes_tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, settle = ?self.settle, "Config watcher started");
        tokio::spawn(reload_on_change(self.path, self.settle, changes_rx, self.updates));
        Ok(watcher)
    }
}

/// Whether `event` is a write or create of the config file itself.
fn touches(event: &Event, target: &Path) -> bool {
    if !(event.kind.is_modify() || event.kind.is_create()) {
        return false;
    }
    let Some(name) = target.file_name() else {
        return false;
    };
    event.paths.iter().any(|p| p.file_name() == Some(name))
}

async fn reload_on_change(
    path: PathBuf,
    settle: Duration,
    mut changes: mpsc::UnboundedReceiver<()>,
    updates: mpsc::UnboundedSender<GatewayConfig>,
) {
    while changes.recv().await.is_some() {
        loop {
            match tokio::time::timeout(settle, changes.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        match load_config(&path) {
            Ok(config) => {
                tracing::info!(path = ?path, backends = config.backends.len(), "Config file changed, reloaded");
                if updates.send(config).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::error!(path = ?path, error = %e, "Failed to reload config, keeping current configuration");
            }
        }
    }
}
