//! Playback state as seen by the session, with explicit transition rules.
//!
//! The session keeps two views of the same state: the optimistic local one,
//! updated immediately by the commands this client issues, and the one last
//! reported by the daemon, updated only by status polls. A poll overwrites
//! both.

/// Daemon playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Unknown,
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    /// Human readable label used by the status views.
    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Stopped => "Stopped",
            Self::Playing => "Playing",
            Self::Paused => "Paused",
        }
    }
}

/// Local and daemon-reported playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerState {
    local: PlaybackState,
    reported: PlaybackState,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            local: PlaybackState::Stopped,
            reported: PlaybackState::Unknown,
        }
    }
}

impl PlayerState {
    /// State to act on, including optimistic local changes.
    pub fn current(&self) -> PlaybackState {
        self.local
    }

    /// State the daemon reported at the last poll.
    pub fn reported(&self) -> PlaybackState {
        self.reported
    }

    pub fn is_playing(&self) -> bool {
        self.local == PlaybackState::Playing
    }

    /// Records a polled state. Returns `true` when it differs from the previous report.
    pub fn apply_report(&mut self, state: PlaybackState) -> bool {
        let changed = self.reported != state;
        self.reported = state;
        self.local = state;
        changed
    }

    pub fn play(&mut self) {
        self.local = PlaybackState::Playing;
    }

    /// Pause toggles between playing and paused; other states are left alone.
    pub fn toggle_pause(&mut self) {
        self.local = match self.local {
            PlaybackState::Playing => PlaybackState::Paused,
            PlaybackState::Paused => PlaybackState::Playing,
            other => other,
        };
    }

    pub fn stop(&mut self) {
        self.local = PlaybackState::Stopped;
    }

    /// Back to the state of a session that has never polled.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
