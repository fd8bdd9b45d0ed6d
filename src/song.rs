//! Song metadata snapshots shared by the queue mirror and the current-song tracker.

const UNKNOWN_TAG: &str = "Unknown";

/// Owned metadata snapshot of one queue or database entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Song {
    pub uri: String,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    pub track: Option<String>,
    /// Length in whole seconds, `0` when the daemon does not know it.
    pub duration_secs: u32,
}

impl Song {
    /// Creates an untagged song for `uri`.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_track(mut self, track: impl Into<String>) -> Self {
        self.track = Some(track.into());
        self
    }

    pub fn with_duration(mut self, duration_secs: u32) -> Self {
        self.duration_secs = duration_secs;
        self
    }

    /// Artist tag, or `Unknown` when the file carries none.
    pub fn artist_or_unknown(&self) -> &str {
        self.artist.as_deref().unwrap_or(UNKNOWN_TAG)
    }

    /// Title tag, or `Unknown` when the file carries none.
    pub fn title_or_unknown(&self) -> &str {
        self.title.as_deref().unwrap_or(UNKNOWN_TAG)
    }
}

/// A song together with the queue position the daemon reported for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedSong {
    pub position: usize,
    pub song: Song,
}
