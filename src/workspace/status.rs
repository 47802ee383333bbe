//! Background git status polling for a status bar.

use crate::types::GitStatusSnapshot;
use crate::workspace::engine::WorkspaceEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::warn;

/// Polls [`WorkspaceEngine::git_status`] and publishes the latest snapshot.
///
/// A failed poll is logged and the previous value stays published. The task
/// stops when the poller is dropped.
pub struct StatusPoller {
    receiver: watch::Receiver<Option<GitStatusSnapshot>>,
    handle: JoinHandle<()>,
}

impl StatusPoller {
    /// Start polling; the first poll runs immediately. Must be called inside a
    /// tokio runtime.
    pub fn spawn(engine: Arc<WorkspaceEngine>, interval: Duration) -> Self {
        let (sender, receiver) = watch::channel(None);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match engine.git_status().await {
                    Ok(status) => {
                        if sender.send(Some(status)).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(root = %engine.root(), error = %e, "Git status poll failed"),
                }
            }
        });
        Self { receiver, handle }
    }

    /// Most recent snapshot, `None` until the first successful poll.
    pub fn latest(&self) -> Option<GitStatusSnapshot> {
        self.receiver.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<GitStatusSnapshot>> {
        self.receiver.clone()
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
