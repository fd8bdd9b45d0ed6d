//! Authoritative status polls and the current-song refresh heuristic.

use log::{debug, trace};

use crate::backends::{DaemonConnector, DaemonStatus};
use crate::playback_state::PlaybackState;
use crate::session::Client;

/// Tolerance around both ends of a song inside which a boundary is suspected.
pub const SONG_BOUNDARY_WINDOW_SECS: u32 = 3;

/// What the refresh decision looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshInputs {
    /// State from the previous poll.
    pub previous_state: PlaybackState,
    /// Elapsed from the previous poll.
    pub previous_elapsed_secs: u32,
    pub reported_state: PlaybackState,
    pub reported_elapsed_secs: u32,
    /// Duration of the cached current song, `None` when no song is cached.
    pub cached_duration_secs: Option<u32>,
    pub estimated_elapsed_secs: u32,
}

/// Whether the current song has to be fetched again after a poll.
///
/// A refetch happens when the state changed, when the daemon is not stopped
/// but nothing is cached, or when a song is cached and one of these holds:
/// the estimate is within the boundary window of its end, the daemon's
/// elapsed went backwards, or the daemon's elapsed is within the window of
/// the start. Songs shorter than twice the window can match both ends.
pub fn needs_song_refresh(inputs: &RefreshInputs) -> bool {
    if inputs.previous_state != inputs.reported_state {
        return true;
    }
    let Some(duration) = inputs.cached_duration_secs else {
        return inputs.previous_state != PlaybackState::Stopped;
    };
    let near_end = duration
        .checked_sub(SONG_BOUNDARY_WINDOW_SECS)
        .is_some_and(|threshold| inputs.estimated_elapsed_secs >= threshold);
    near_end
        || inputs.reported_elapsed_secs < inputs.previous_elapsed_secs
        || inputs.reported_elapsed_secs <= SONG_BOUNDARY_WINDOW_SECS
}

impl<C: DaemonConnector> Client<C> {
    /// Replaces the cached status with a fresh one from the daemon.
    ///
    /// `expect_update` marks a queue change this client made itself and has
    /// already applied to the mirror. Does nothing while disconnected or
    /// inside a batch.
    pub fn update_status(&mut self, expect_update: bool) {
        self.clear_command();
        if !self.connected() || self.list_mode {
            return;
        }

        self.clock.start_poll();
        let Some(status) = self.call(|connection| connection.status()) else {
            return;
        };
        trace!("Session: status {:?}", status);
        self.apply_status(status, expect_update);
    }

    fn apply_status(&mut self, status: DaemonStatus, expect_update: bool) {
        let generation = self.generation;
        self.options.apply(&status);

        let refresh = needs_song_refresh(&RefreshInputs {
            previous_state: self.player.reported(),
            previous_elapsed_secs: self.clock.reported_secs(),
            reported_state: status.state,
            reported_elapsed_secs: status.elapsed_secs,
            cached_duration_secs: self.current.song.as_ref().map(|song| song.duration_secs),
            estimated_elapsed_secs: self.clock.estimated_secs(),
        });

        self.player.apply_report(status.state);
        self.clock.record_poll(status.elapsed_secs);
        self.last_status = Some(status.clone());

        if refresh {
            self.update_current_song(status.state);
            if !self.connected() || self.generation != generation {
                return;
            }
        }

        self.reconcile_queue(&status, expect_update);
    }

    /// Refetches the playing song. Nothing is fetched when `state` is stopped.
    pub(super) fn update_current_song(&mut self, state: PlaybackState) {
        if !self.connected() || self.list_mode {
            return;
        }
        self.current.clear();
        if state == PlaybackState::Stopped {
            return;
        }
        self.clear_command();
        self.clock.song_refreshed();
        if let Some(Some(queued)) = self.call(|connection| connection.current_song()) {
            debug!(
                "Session: current song {} at {}",
                queued.song.uri, queued.position
            );
            self.current.set(queued.position, queued.song);
        }
    }
}
