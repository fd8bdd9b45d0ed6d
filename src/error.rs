//! Error types for the daemon protocol boundary and the session error sink.

use thiserror::Error;

/// Failure reported by a daemon protocol connection.
///
/// `Server` errors are the daemon rejecting one command; the channel stays
/// usable afterwards. Every other variant leaves the channel in an unknown
/// state and forces the session to tear the connection down.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The daemon answered with `ACK [code@index] {command} message`.
    #[error("{message} ({command}, code {code})")]
    Server {
        code: u32,
        command_index: u32,
        command: String,
        message: String,
    },

    /// Socket level failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The daemon closed the connection.
    #[error("connection closed")]
    Closed,

    /// The daemon sent something that is not valid protocol.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// No connection could be established to the target.
    #[error("connection refused: {0}")]
    ConnectRefused(String),
}

impl ProtocolError {
    /// Returns `true` when the error can be cleared without dropping the connection.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Server { .. })
    }
}

impl From<mpd::error::Error> for ProtocolError {
    fn from(error: mpd::error::Error) -> Self {
        match error {
            mpd::error::Error::Server(server) => Self::Server {
                code: server.code as u32,
                command_index: server.pos as u32,
                command: server.command,
                message: server.detail,
            },
            mpd::error::Error::Io(io_error) => Self::Io(io_error),
            other => Self::Malformed(other.to_string()),
        }
    }
}

/// Errors funneled through the session's single reporting sink.
#[derive(Debug, Error)]
pub enum SessionError {
    /// An operation was attempted while disconnected.
    #[error("Not connected to the daemon")]
    NoConnection,

    /// The protocol channel reported an error.
    #[error("Client Error: {source}")]
    Protocol {
        recoverable: bool,
        #[source]
        source: ProtocolError,
    },
}

impl From<ProtocolError> for SessionError {
    fn from(source: ProtocolError) -> Self {
        Self::Protocol {
            recoverable: source.is_recoverable(),
            source,
        }
    }
}
