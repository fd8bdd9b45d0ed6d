//! Daemon protocol abstractions and the concrete text-protocol adapter.
//!
//! The session engine only talks to the daemon through [`DaemonConnection`].
//! Every call is synchronous and fallible. Commands are written with
//! [`DaemonConnection::send_command`] and their response stays pending until
//! [`DaemonConnection::finish_response`] drains it, so a command list can
//! queue many commands and collect one answer.

use std::fmt;
use std::time::Duration;

use crate::error::ProtocolError;
use crate::playback_state::PlaybackState;
use crate::song::{QueuedSong, Song};

pub mod mpd;
#[cfg(test)]
pub(crate) mod scripted;

/// Port used when neither the caller nor the environment supplies one.
pub const DEFAULT_PORT: u16 = 6600;

/// Protocol version announced by the daemon greeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ProtocolVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// `delete START:END` exists since protocol 0.16.
    pub fn supports_range_delete(&self) -> bool {
        (self.major, self.minor) >= (0, 16)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Resolved connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

/// Snapshot returned by the `status` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaemonStatus {
    /// `None` when the daemon has no mixer.
    pub volume: Option<u8>,
    pub random: bool,
    pub repeat: bool,
    pub single: bool,
    pub consume: bool,
    pub crossfade_secs: u32,
    pub state: PlaybackState,
    pub elapsed_secs: u32,
    pub queue_version: u32,
    pub queue_length: usize,
    pub song_position: Option<usize>,
}

/// Tag a search is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Any,
    Artist,
    Genre,
    Album,
    Title,
}

impl SearchField {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Artist => "artist",
            Self::Genre => "genre",
            Self::Album => "album",
            Self::Title => "title",
        }
    }
}

/// Database query. `exact` matches whole tag values, otherwise substrings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub field: SearchField,
    pub term: String,
    pub exact: bool,
}

/// Commands that produce no payload, only `OK` or an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonCommand {
    Password(String),
    PlayPosition(usize),
    TogglePause,
    Stop,
    Next,
    Previous,
    SeekPosition { position: usize, seconds: u32 },
    SetRandom(bool),
    SetSingle(bool),
    SetConsume(bool),
    SetRepeat(bool),
    SetCrossfade(u32),
    SetVolume(u8),
    Shuffle,
    Move { from: usize, to: usize },
    Swap { first: usize, second: usize },
    Add(String),
    AddAt { uri: String, position: usize },
    Delete(usize),
    /// Half open range `start..end`.
    DeleteRange { start: usize, end: usize },
    Clear,
    SavePlaylist(String),
    ClearPlaylist(String),
    LoadPlaylist(String),
    RemovePlaylist(String),
    PlaylistAdd { name: String, uri: String },
    EnableOutput(u32),
    DisableOutput(u32),
    Rescan,
    Update,
}

/// An open, strictly ordered request/response channel to the daemon.
pub trait DaemonConnection {
    /// Version from the greeting, if it could be parsed.
    fn server_version(&self) -> Option<ProtocolVersion>;
    /// Writes `command`; its response stays pending.
    fn send_command(&mut self, command: &DaemonCommand) -> Result<(), ProtocolError>;
    /// Reads every pending response, returning the first error seen.
    fn finish_response(&mut self) -> Result<(), ProtocolError>;
    fn begin_command_list(&mut self) -> Result<(), ProtocolError>;
    /// Closes the list; the whole list then has a single pending response.
    fn end_command_list(&mut self) -> Result<(), ProtocolError>;
    fn status(&mut self) -> Result<DaemonStatus, ProtocolError>;
    fn current_song(&mut self) -> Result<Option<QueuedSong>, ProtocolError>;
    /// Entries changed after queue version `since`, in position order.
    fn queue_changes(&mut self, since: u32) -> Result<Vec<QueuedSong>, ProtocolError>;
    fn search(&mut self, query: &SearchQuery) -> Result<Vec<Song>, ProtocolError>;
    /// Starts waiting for daemon events without blocking.
    fn send_idle(&mut self) -> Result<(), ProtocolError>;
    /// Ends the wait. Returns `true` when the daemon reported changes meanwhile.
    fn cancel_idle(&mut self) -> Result<bool, ProtocolError>;
}

/// Opens daemon connections.
pub trait DaemonConnector {
    fn connect(&mut self, target: &ConnectTarget)
        -> Result<Box<dyn DaemonConnection>, ProtocolError>;
}
