//! Session engine keeping a local mirror of the daemon's state.
//!
//! [`Client`] owns the protocol connection and everything derived from it:
//! playback options, the tracked current song, the elapsed-time estimate and
//! the mirrored queue. It is driven from a single thread. Public operations
//! never return errors; failures go through one reporting sink that logs and
//! publishes [`SessionMessage::Error`] on the bus.

mod batch;
mod commands;
mod connection;
mod current_song;
mod elapsed;
mod idle;
mod queue_sync;
mod status_poll;

use std::time::Duration;

use log::{error, warn};
use tokio::sync::broadcast;

use crate::backends::{DaemonConnection, DaemonConnector, DaemonStatus, ProtocolVersion};
use crate::config::Config;
use crate::error::SessionError;
use crate::playback_state::PlayerState;
use crate::protocol::{ConnectionState, Message, SessionMessage, ViewKind};

pub use batch::CommandBatch;
pub use connection::{resolve_connect_target, ResolvedTarget};
pub use current_song::CurrentSong;
pub use elapsed::{ElapsedClock, FORCED_POLL_DRIFT_MS};
pub use idle::IdleGate;
pub use queue_sync::{plan_reconcile, QueueMirror, ReconcilePlan};
pub use status_poll::{needs_song_refresh, RefreshInputs, SONG_BOUNDARY_WINDOW_SECS};

/// Behavior switches taken from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Reconnect once after a fatal protocol error.
    pub reconnect: bool,
    /// Poll on a timer instead of waiting on daemon events.
    pub polling: bool,
    /// Status line shows time remaining instead of time elapsed.
    pub time_remaining: bool,
    pub connect_timeout: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            reconnect: config.connection.reconnect,
            polling: config.playback.polling,
            time_remaining: config.playback.time_remaining,
            connect_timeout: Duration::from_millis(config.connection.connect_timeout_ms),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Daemon options mirrored from the last status poll plus local edits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PlaybackOptions {
    volume: Option<u8>,
    random: bool,
    repeat: bool,
    single: bool,
    consume: bool,
    crossfade: bool,
    /// Last non-zero crossfade, re-applied when crossfade is switched back on.
    crossfade_secs: u32,
}

impl PlaybackOptions {
    fn apply(&mut self, status: &DaemonStatus) {
        self.volume = status.volume;
        self.random = status.random;
        self.repeat = status.repeat;
        self.single = status.single;
        self.consume = status.consume;
        self.crossfade = status.crossfade_secs > 0;
        if self.crossfade {
            self.crossfade_secs = status.crossfade_secs;
        }
    }

    /// Disconnected values. The remembered crossfade duration survives.
    fn reset(&mut self) {
        *self = Self {
            crossfade_secs: self.crossfade_secs,
            ..Self::default()
        };
    }
}

/// UI state the engine needs: which view is active and which queue rows are visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Viewport {
    active: ViewKind,
    first_line: usize,
    rows: usize,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            active: ViewKind::Queue,
            first_line: 0,
            rows: 0,
        }
    }
}

/// Client session against one daemon.
pub struct Client<C: DaemonConnector> {
    connector: C,
    settings: SessionSettings,
    bus_producer: broadcast::Sender<Message>,

    connection: Option<Box<dyn DaemonConnection>>,
    connection_state: ConnectionState,
    /// Bumped on every established connection.
    generation: u64,
    hostname: String,
    port: u16,
    password: Option<String>,
    version: Option<ProtocolVersion>,
    retried: bool,

    options: PlaybackOptions,
    player: PlayerState,
    clock: ElapsedClock,
    current: CurrentSong,
    last_status: Option<DaemonStatus>,

    queue: QueueMirror,
    queue_version: Option<u32>,

    list_mode: bool,
    /// The open command list holds an edit whose queue version bump is unknown.
    batch_unexpected: bool,
    idle: IdleGate,
    viewport: Viewport,
}

impl<C: DaemonConnector> Client<C> {
    pub fn new(
        connector: C,
        settings: SessionSettings,
        bus_producer: broadcast::Sender<Message>,
    ) -> Self {
        Self {
            connector,
            settings,
            bus_producer,
            connection: None,
            connection_state: ConnectionState::Disconnected,
            generation: 0,
            hostname: String::new(),
            port: 0,
            password: None,
            version: None,
            retried: false,
            options: PlaybackOptions::default(),
            player: PlayerState::default(),
            clock: ElapsedClock::default(),
            current: CurrentSong::default(),
            last_status: None,
            queue: QueueMirror::default(),
            queue_version: None,
            list_mode: false,
            batch_unexpected: false,
            idle: IdleGate::default(),
            viewport: Viewport::default(),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: SessionSettings) {
        self.settings = settings;
    }

    /// `true` exactly when a connection handle is held.
    pub fn connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn active_view(&self) -> ViewKind {
        self.viewport.active
    }

    pub fn set_active_view(&mut self, view: ViewKind) {
        self.viewport.active = view;
    }

    /// Visible queue rows, used to bound the current-song search.
    pub fn set_viewport(&mut self, first_line: usize, rows: usize) {
        self.viewport.first_line = first_line;
        self.viewport.rows = rows;
    }

    fn publish(&self, message: Message) {
        let _ = self.bus_producer.send(message);
    }

    fn set_connection_state(&mut self, state: ConnectionState) {
        if self.connection_state == state {
            return;
        }
        self.connection_state = state;
        self.publish(Message::Session(SessionMessage::StateChanged(state)));
    }

    /// The single error sink.
    fn report_error(&self, session_error: SessionError) {
        match &session_error {
            SessionError::Protocol {
                recoverable: false, ..
            } => error!("Session: {}", session_error),
            _ => warn!("Session: {}", session_error),
        }
        self.publish(Message::Session(SessionMessage::Error(
            session_error.to_string(),
        )));
    }
}
