//! Elapsed-time extrapolation between status polls.

use crate::backends::DaemonConnector;
use crate::session::Client;

/// Unpolled drift after which an estimate that ran past the song end forces a poll.
pub const FORCED_POLL_DRIFT_MS: u64 = 1_000;

/// Wall-clock counters and the derived elapsed estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ElapsedClock {
    since_update_ms: u64,
    since_song_ms: u64,
    reported_secs: u32,
    estimated_secs: u32,
}

impl ElapsedClock {
    /// Advances both counters by `delta_ms`.
    ///
    /// While `playing`, the estimate is the polled elapsed plus whole seconds
    /// since that poll. An estimate past a known `duration_secs` drops to zero,
    /// and once [`FORCED_POLL_DRIFT_MS`] went by unpolled the return value asks
    /// for a status poll. A zero duration means unknown and is never exceeded.
    pub fn advance(&mut self, delta_ms: u64, playing: bool, duration_secs: Option<u32>) -> bool {
        self.since_update_ms = self.since_update_ms.saturating_add(delta_ms);
        self.since_song_ms = self.since_song_ms.saturating_add(delta_ms);

        if playing {
            let drift_secs = u32::try_from(self.since_update_ms / 1_000).unwrap_or(u32::MAX);
            self.estimated_secs = self.reported_secs.saturating_add(drift_secs);
        }

        match duration_secs {
            Some(duration) if duration > 0 && self.estimated_secs > duration => {
                self.estimated_secs = 0;
                self.since_update_ms >= FORCED_POLL_DRIFT_MS
            }
            _ => false,
        }
    }

    /// Starts a poll: drift is measured from here.
    pub fn start_poll(&mut self) {
        self.since_update_ms = 0;
    }

    pub fn record_poll(&mut self, reported_secs: u32) {
        self.reported_secs = reported_secs;
        self.estimated_secs = reported_secs;
    }

    pub fn song_refreshed(&mut self) {
        self.since_song_ms = 0;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn since_update_ms(&self) -> u64 {
        self.since_update_ms
    }

    pub fn since_song_ms(&self) -> u64 {
        self.since_song_ms
    }

    pub fn reported_secs(&self) -> u32 {
        self.reported_secs
    }

    pub fn estimated_secs(&self) -> u32 {
        self.estimated_secs
    }
}

impl<C: DaemonConnector> Client<C> {
    /// Feeds `delta_ms` of wall-clock time into the elapsed estimate.
    pub fn increment_time(&mut self, delta_ms: u64) {
        let duration = self.current.song.as_ref().map(|song| song.duration_secs);
        let playing = self.player.is_playing();
        if self.clock.advance(delta_ms, playing, duration) {
            self.update_status(false);
        }
    }

    /// Milliseconds since the last status poll.
    pub fn time_since_update(&self) -> u64 {
        self.clock.since_update_ms()
    }

    /// Estimated seconds into the current song.
    pub fn elapsed(&self) -> u32 {
        self.clock.estimated_secs()
    }
}
