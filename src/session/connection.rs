//! Connection lifecycle: target resolution, connect, teardown and the one-shot retry.

use log::{debug, info};

use crate::backends::{
    ConnectTarget, DaemonCommand, DaemonConnection, DaemonConnector, DEFAULT_PORT,
};
use crate::error::{ProtocolError, SessionError};
use crate::protocol::{ConnectionState, Message, ViewKind, ViewMessage};
use crate::session::Client;

const DEFAULT_HOST: &str = "localhost";

/// Connection target plus the password found in the host string, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub target: ConnectTarget,
    pub password: Option<String>,
}

/// Picks the host and port to connect to.
///
/// An explicit (non-empty) host wins over `env_host`, which wins over
/// `localhost`. Either host form may carry a `password@` prefix, split at the
/// last `@`. A zero port falls back to `env_port`; a missing, zero or
/// unparseable value there means the protocol default.
pub fn resolve_connect_target(
    host: &str,
    port: u16,
    env_host: Option<&str>,
    env_port: Option<&str>,
    timeout: std::time::Duration,
) -> ResolvedTarget {
    let host_spec = if !host.is_empty() {
        host
    } else {
        env_host
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_HOST)
    };
    let (password, host) = match host_spec.rsplit_once('@') {
        Some((password, host)) => (Some(password.to_string()), host.to_string()),
        None => (None, host_spec.to_string()),
    };
    let port = if port != 0 {
        port
    } else {
        env_port
            .and_then(|value| value.trim().parse::<u16>().ok())
            .filter(|value| *value != 0)
            .unwrap_or(DEFAULT_PORT)
    };
    ResolvedTarget {
        target: ConnectTarget {
            host,
            port,
            timeout,
        },
        password: password.filter(|password| !password.is_empty()),
    }
}

impl<C: DaemonConnector> Client<C> {
    /// Connects to `host`/`port`, falling back to `MPD_HOST`/`MPD_PORT` and the defaults.
    ///
    /// Blocks the calling thread. `Connecting` is published on the bus first so
    /// the UI can show it before the wait.
    pub fn connect(&mut self, host: &str, port: u16) {
        let env_host = std::env::var("MPD_HOST").ok();
        let env_port = std::env::var("MPD_PORT").ok();
        let resolved = resolve_connect_target(
            host,
            port,
            env_host.as_deref(),
            env_port.as_deref(),
            self.settings.connect_timeout,
        );
        self.retried = false;
        self.connect_to(resolved);
    }

    /// Tears down the connection if there is one.
    pub fn disconnect(&mut self) {
        if self.connected() {
            info!("Session: disconnecting from {}:{}", self.hostname, self.port);
            self.delete_connection();
        }
    }

    /// Disconnects, then connects again to the stored host, port and password.
    pub fn reconnect(&mut self) {
        self.disconnect();
        let resolved = self.stored_target();
        self.retried = false;
        self.connect_to(resolved);
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub(super) fn connect_to(&mut self, resolved: ResolvedTarget) {
        self.delete_connection();
        let ResolvedTarget { target, password } = resolved;
        self.hostname = target.host.clone();
        self.port = target.port;
        self.password = password;

        self.set_connection_state(ConnectionState::Connecting);
        info!("Session: connecting to {}:{}", target.host, target.port);

        match self.connector.connect(&target) {
            Ok(connection) => self.connection = Some(connection),
            Err(connect_error) => {
                self.handle_protocol_error(connect_error);
                return;
            }
        }
        self.generation += 1;
        let generation = self.generation;

        self.set_connection_state(ConnectionState::Connected);
        self.display_song_information();
        self.fetch_version();
        self.update_status(false);
        if !self.connected() || self.generation != generation {
            return;
        }

        self.publish(Message::View(ViewMessage::InvalidateAll));
        self.publish(Message::View(ViewMessage::Redraw(ViewKind::Library)));
        self.publish(Message::View(ViewMessage::Redraw(ViewKind::Queue)));
        let active = self.viewport.active;
        if !active.is_always_refreshed() {
            self.publish(Message::View(ViewMessage::Redraw(active)));
        }

        if let Some(password) = self.password.clone() {
            self.password(&password);
        }
        if self.connected() && self.generation == generation {
            self.retried = false;
        }
    }

    fn stored_target(&self) -> ResolvedTarget {
        ResolvedTarget {
            target: ConnectTarget {
                host: self.hostname.clone(),
                port: self.port,
                timeout: self.settings.connect_timeout,
            },
            password: self.password.clone(),
        }
    }

    fn reconnect_after_failure(&mut self) {
        let resolved = self.stored_target();
        info!(
            "Session: reconnecting to {}:{} after a fatal error",
            resolved.target.host, resolved.target.port
        );
        self.connect_to(resolved);
    }

    /// Drops the handle and resets every cached value to its disconnected state.
    pub(super) fn delete_connection(&mut self) {
        self.list_mode = false;
        self.batch_unexpected = false;
        self.idle.reset();
        self.options.reset();
        self.version = None;
        self.queue_version = None;
        self.player.reset();
        self.clock.reset();
        self.current.clear();
        self.last_status = None;
        self.queue.clear();
        if self.connection.take().is_some() {
            debug!("Session: connection handle released");
        }
        self.set_connection_state(ConnectionState::Disconnected);
    }

    /// Reports `protocol_error`; fatal errors tear the session down and may retry once.
    pub(super) fn handle_protocol_error(&mut self, protocol_error: ProtocolError) {
        let recoverable = protocol_error.is_recoverable();
        self.report_error(SessionError::from(protocol_error));
        if recoverable {
            return;
        }
        self.delete_connection();
        if self.settings.reconnect && !self.retried {
            self.retried = true;
            self.reconnect_after_failure();
        }
    }

    /// Runs `operation` on the connection. `None` when disconnected or on error;
    /// errors have already been handled when this returns.
    pub(super) fn call<T>(
        &mut self,
        operation: impl FnOnce(&mut dyn DaemonConnection) -> Result<T, ProtocolError>,
    ) -> Option<T> {
        let connection = self.connection.as_mut()?;
        match operation(&mut **connection) {
            Ok(value) => Some(value),
            Err(protocol_error) => {
                self.handle_protocol_error(protocol_error);
                None
            }
        }
    }

    /// `false` (after reporting it) when there is no connection.
    pub(super) fn require_connection(&self) -> bool {
        if self.connected() {
            return true;
        }
        self.report_error(SessionError::NoConnection);
        false
    }

    /// Drains the pending response so the next request can be sent.
    ///
    /// An outstanding idle wait is cancelled first; any events it reported are
    /// kept for the next [`Client::had_events`].
    pub(super) fn clear_command(&mut self) {
        if self.list_mode || !self.connected() {
            return;
        }
        if self.idle.is_waiting() {
            self.idle.stop_waiting();
            if let Some(true) = self.call(|connection| connection.cancel_idle()) {
                self.idle.remember_events();
            }
        }
        self.call(|connection| connection.finish_response());
    }

    /// Writes `command`; the response is drained by the next request.
    pub(super) fn send(&mut self, command: DaemonCommand) -> bool {
        self.clear_command();
        self.call(|connection| connection.send_command(&command))
            .is_some()
    }

    /// Writes `command` and waits for its answer. Inside a batch the answer
    /// comes with the batch, so only the write is checked.
    pub(super) fn submit(&mut self, command: DaemonCommand) -> bool {
        if !self.send(command) {
            return false;
        }
        if self.list_mode {
            return true;
        }
        self.call(|connection| connection.finish_response())
            .is_some()
    }

    pub(super) fn fetch_version(&mut self) {
        self.version = self
            .connection
            .as_ref()
            .and_then(|connection| connection.server_version());
        match self.version {
            Some(version) => info!("Session: daemon speaks protocol {}", version),
            None => debug!("Session: daemon protocol version unknown"),
        }
    }
}
