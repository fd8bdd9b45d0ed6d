//! Client-side session engine for an MPD-style music daemon.
//!
//! [`Client`] keeps a local mirror of the daemon's playback state and queue,
//! forwards user commands over the protocol connection and publishes
//! [`Message`]s on a broadcast bus for the UI to render.

pub mod backends;
pub mod config;
pub mod config_persistence;
pub mod error;
pub mod playback_state;
pub mod protocol;
pub mod session;
pub mod song;
pub mod status_line;

pub use backends::mpd::MpdConnector;
pub use config::Config;
pub use error::{ProtocolError, SessionError};
pub use protocol::{Message, SessionMessage, ViewMessage};
pub use session::{Client, SessionSettings};
pub use song::Song;
