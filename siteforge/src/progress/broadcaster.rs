//! Process-wide registry of live progress listeners.
//!
//! One long-lived broadcaster instance owns a concurrent map of job id to
//! open channels. Publishing is best-effort and non-blocking: a channel
//! whose transport fails is logged and dropped, never allowed to affect
//! sibling listeners or the pipeline. There is no backlog or replay; a
//! listener opened after an event was published never receives it — late
//! subscribers must query persisted attempt/step state to catch up.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use super::{ProgressEvent, ProgressUpdate};

/// Per-listener channel capacity. A listener that falls this far behind
/// is dropped rather than allowed to stall the pipeline.
const LISTENER_BUFFER: usize = 64;

/// A live subscription to one job's progress stream.
#[derive(Debug)]
pub struct ProgressListener {
    rx: mpsc::Receiver<ProgressUpdate>,
}

impl ProgressListener {
    /// Receives the next update, or `None` once the channel is closed.
    pub async fn recv(&mut self) -> Option<ProgressUpdate> {
        self.rx.recv().await
    }

    /// Non-blocking receive for polling consumers.
    pub fn try_recv(&mut self) -> Option<ProgressUpdate> {
        self.rx.try_recv().ok()
    }
}

/// Fans out ephemeral progress events to every open listener per job.
#[derive(Debug, Default)]
pub struct ProgressBroadcaster {
    channels: DashMap<Uuid, Vec<mpsc::Sender<ProgressUpdate>>>,
}

impl ProgressBroadcaster {
    /// Creates an empty broadcaster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new listener channel for a job.
    ///
    /// Multiple simultaneous listeners per job are supported; each
    /// receives its own copy of every subsequent event.
    #[must_use]
    pub fn open(&self, job_id: Uuid) -> ProgressListener {
        let (tx, rx) = mpsc::channel(LISTENER_BUFFER);
        self.channels.entry(job_id).or_default().push(tx);
        ProgressListener { rx }
    }

    /// Publishes an event to every open listener for a job.
    ///
    /// Channels that reject the send (closed or full) are dropped from
    /// the registry. Absent any listener this is a no-op.
    pub fn publish(&self, job_id: Uuid, event: &ProgressEvent) {
        let Some(mut senders) = self.channels.get_mut(&job_id) else {
            return;
        };

        senders.retain(|tx| {
            match tx.try_send(ProgressUpdate::Event(event.clone())) {
                Ok(()) => true,
                Err(err) => {
                    warn!(%job_id, error = %err, "dropping progress listener");
                    false
                }
            }
        });
    }

    /// Sends the terminal marker and removes all channels for a job.
    pub fn close_all(&self, job_id: Uuid) {
        if let Some((_, senders)) = self.channels.remove(&job_id) {
            for tx in senders {
                // Best-effort: a listener gone before the terminal marker
                // is indistinguishable from one that never subscribed.
                let _ = tx.try_send(ProgressUpdate::Closed);
            }
        }
    }

    /// Number of open listeners for a job.
    #[must_use]
    pub fn listener_count(&self, job_id: Uuid) -> usize {
        self.channels.get(&job_id).map_or(0, |v| v.len())
    }
}
