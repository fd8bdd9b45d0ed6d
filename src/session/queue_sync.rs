//! Queue mirror and its reconciliation against the daemon's queue version.

use log::{debug, warn};

use crate::backends::{DaemonConnector, DaemonStatus};
use crate::protocol::{Message, ViewKind, ViewMessage};
use crate::session::Client;
use crate::song::{QueuedSong, Song};

/// How a poll's queue version is brought into the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePlan {
    /// No baseline yet, or the version went backwards: load everything.
    FullLoad,
    /// Nothing to do.
    Unchanged,
    /// Exactly the one change this client made and already mirrored.
    Confirm,
    /// Replay entries changed after `since`, then truncate.
    Replay { since: u32 },
}

/// Decides how to reconcile `current` against the `baseline` version.
///
/// Replay is skipped only when the change was expected and is exactly one
/// version ahead. Any other increase replays.
pub fn plan_reconcile(baseline: Option<u32>, current: u32, expect_update: bool) -> ReconcilePlan {
    let Some(previous) = baseline else {
        return ReconcilePlan::FullLoad;
    };
    if current < previous {
        warn!(
            "Session: queue version went backwards ({} -> {}), reloading",
            previous, current
        );
        return ReconcilePlan::FullLoad;
    }
    let next = previous.saturating_add(1);
    if current > next || (current > previous && !expect_update) {
        ReconcilePlan::Replay { since: previous }
    } else if current == next && current > previous {
        ReconcilePlan::Confirm
    } else {
        ReconcilePlan::Unchanged
    }
}

/// Local copy of the daemon queue, in queue order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueMirror {
    songs: Vec<Song>,
}

impl QueueMirror {
    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Song> {
        self.songs.get(position)
    }

    pub fn contains_uri(&self, uri: &str) -> bool {
        self.songs.iter().any(|song| song.uri == uri)
    }

    /// Writes changed entries into their slots. Returns `false` when an entry
    /// lands past the end of the mirror, leaving a gap the changes cannot fill.
    pub fn apply_changes(&mut self, changes: Vec<QueuedSong>) -> bool {
        for QueuedSong { position, song } in changes {
            if position < self.songs.len() {
                self.songs[position] = song;
            } else if position == self.songs.len() {
                self.songs.push(song);
            } else {
                return false;
            }
        }
        true
    }

    pub fn truncate(&mut self, length: usize) {
        self.songs.truncate(length);
    }

    pub fn push(&mut self, song: Song) {
        self.songs.push(song);
    }

    pub fn insert(&mut self, position: usize, song: Song) {
        let position = position.min(self.songs.len());
        self.songs.insert(position, song);
    }

    pub fn remove(&mut self, position: usize) {
        if position < self.songs.len() {
            self.songs.remove(position);
        }
    }

    /// Removes the half-open range `start..end`, clamped to the mirror.
    pub fn remove_range(&mut self, start: usize, end: usize) {
        let end = end.min(self.songs.len());
        if start < end {
            self.songs.drain(start..end);
        }
    }

    pub fn move_entry(&mut self, from: usize, to: usize) {
        if from < self.songs.len() && to < self.songs.len() {
            let song = self.songs.remove(from);
            self.songs.insert(to, song);
        }
    }

    pub fn clear(&mut self) {
        self.songs.clear();
    }
}

impl<C: DaemonConnector> Client<C> {
    /// Brings the mirror to `status.queue_version`.
    pub(super) fn reconcile_queue(&mut self, status: &DaemonStatus, expect_update: bool) {
        let plan = plan_reconcile(self.queue_version, status.queue_version, expect_update);
        match plan {
            ReconcilePlan::Unchanged | ReconcilePlan::Confirm => {}
            ReconcilePlan::Replay { since } => {
                debug!(
                    "Session: replaying queue changes {} -> {}",
                    since, status.queue_version
                );
                if !self.replay_queue_changes(since, status.queue_length) {
                    return;
                }
            }
            ReconcilePlan::FullLoad => {
                debug!("Session: loading queue at version {}", status.queue_version);
                self.queue.clear();
                if !self.replay_queue_changes(0, status.queue_length) {
                    return;
                }
            }
        }
        self.queue_version = Some(status.queue_version);
    }

    fn replay_queue_changes(&mut self, since: u32, queue_length: usize) -> bool {
        let Some(changes) = self.call(|connection| connection.queue_changes(since)) else {
            return false;
        };
        if !self.queue.apply_changes(changes) {
            warn!("Session: queue changes left a gap, reloading the whole queue");
            self.queue.clear();
            let Some(all) = self.call(|connection| connection.queue_changes(0)) else {
                return false;
            };
            self.queue.apply_changes(all);
        }
        self.queue.truncate(queue_length);
        self.publish(Message::View(ViewMessage::Redraw(ViewKind::Queue)));
        true
    }

    /// Read-only view of the mirrored queue.
    pub fn queue(&self) -> &[Song] {
        self.queue.songs()
    }

    /// Version the mirror corresponds to; `None` before the first poll.
    pub fn queue_version(&self) -> Option<u32> {
        self.queue_version
    }
}
