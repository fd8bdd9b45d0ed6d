//! Event-bus protocol between the session engine and the UI.
//!
//! The engine only ever produces these messages. Rendering, view switching and
//! key handling live on the consuming side of the bus.

use crate::status_line::StatusLine;

/// Top-level envelope for all bus traffic.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Session(SessionMessage),
    View(ViewMessage),
}

/// Connection lifecycle as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// Published right before the blocking connect call.
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
        }
    }
}

/// Session notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionMessage {
    StateChanged(ConnectionState),
    StatusLine(StatusLine),
    /// Output of the single error sink.
    Error(String),
}

/// Views the UI can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Library,
    Queue,
    Browse,
    Search,
    Playlists,
    Outputs,
}

impl ViewKind {
    /// Library and queue are redrawn after every connect regardless of focus.
    pub fn is_always_refreshed(self) -> bool {
        matches!(self, Self::Library | Self::Queue)
    }
}

/// Redraw requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMessage {
    InvalidateAll,
    Redraw(ViewKind),
}
