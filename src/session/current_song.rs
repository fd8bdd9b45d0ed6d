//! Queue position of the playing song and its bounded re-identification.

use log::debug;

use crate::backends::DaemonConnector;
use crate::session::{Client, QueueMirror};
use crate::song::Song;

/// Playing song snapshot and its position in the mirrored queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentSong {
    /// Position as last known; may be stale between polls.
    pub position: Option<usize>,
    pub song: Option<Song>,
}

impl CurrentSong {
    pub fn set(&mut self, position: usize, song: Song) {
        self.position = Some(position);
        self.song = Some(song);
    }

    pub fn clear(&mut self) {
        self.position = None;
        self.song = None;
    }

    pub fn uri(&self) -> Option<&str> {
        self.song.as_ref().map(|song| song.uri.as_str())
    }

    /// An entry was inserted at `position`.
    pub fn on_insert(&mut self, position: usize) {
        if let Some(current) = self.position.as_mut() {
            if position <= *current {
                *current += 1;
            }
        }
    }

    /// The entry at `position` was deleted.
    pub fn on_delete(&mut self, position: usize) {
        if let Some(current) = self.position.as_mut() {
            if position < *current {
                *current -= 1;
            }
        }
    }

    /// Entries `start..end` were deleted. A range reaching the tracked
    /// position collapses it to `start`.
    pub fn on_delete_range(&mut self, start: usize, end: usize) {
        if end <= start {
            return;
        }
        if let Some(current) = self.position.as_mut() {
            if start < *current && end < *current {
                *current -= end - start;
            } else if start <= *current && end >= *current {
                *current = start;
            }
        }
    }

    /// Re-checks the tracked position against `queue` without asking the daemon.
    ///
    /// When the entry at the tracked position is no longer the cached song,
    /// the position is dropped and only `window` (the visible rows) is
    /// searched for it. Returns `true` when the position changed.
    pub fn reidentify(&mut self, queue: &QueueMirror, window: std::ops::Range<usize>) -> bool {
        let (Some(song), Some(position)) = (self.song.as_ref(), self.position) else {
            return false;
        };
        let still_there = match queue.get(position) {
            Some(entry) => entry.uri == song.uri,
            None => return false,
        };
        if still_there {
            return false;
        }
        self.position = window
            .take_while(|index| *index < queue.len())
            .find(|index| queue.get(*index).is_some_and(|entry| entry.uri == song.uri));
        true
    }
}

impl<C: DaemonConnector> Client<C> {
    /// Corrects the current-song position after an out-of-band reorder.
    pub fn update_current_song_position(&mut self) {
        let first = self.viewport.first_line;
        let window = first..first.saturating_add(self.viewport.rows);
        if self.current.reidentify(&self.queue, window) {
            debug!(
                "Session: current song position re-identified as {:?}",
                self.current.position
            );
        }
    }

    /// Cheap display correction run on every redraw tick.
    pub fn update_display(&mut self) {
        self.update_current_song_position();
    }

    pub fn current_song_position(&self) -> Option<usize> {
        self.current.position
    }

    pub fn current_song_uri(&self) -> Option<&str> {
        self.current.uri()
    }

    pub fn current_song(&self) -> Option<&Song> {
        self.current.song.as_ref()
    }
}
