//! Persistent client configuration model and defaults.

/// Root configuration persisted to `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Daemon address and connection resiliency.
    pub connection: ConnectionConfig,
    #[serde(default)]
    /// Status polling and display preferences.
    pub playback: PlaybackConfig,
    #[serde(default)]
    /// Log verbosity.
    pub logging: LoggingConfig,
}

/// Daemon address and reconnect behavior.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ConnectionConfig {
    /// Host, optionally `password@host`. Falls back to `MPD_HOST` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Falls back to `MPD_PORT` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Reconnect once after a fatal protocol error.
    #[serde(default = "default_true")]
    pub reconnect: bool,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

/// Status refresh strategy and timer display.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PlaybackConfig {
    /// Poll status on a timer instead of waiting on daemon idle events.
    #[serde(default)]
    pub polling: bool,
    /// Show time remaining instead of time elapsed.
    #[serde(default)]
    pub time_remaining: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

/// Log filter applied at startup.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl LoggingConfig {
    /// Parsed level filter; unknown names fall back to `Info`.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            reconnect: true,
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            polling: false,
            time_remaining: false,
            poll_interval_ms: default_poll_interval_ms(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_tick_interval_ms() -> u64 {
    250
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Clamps intervals to values the tick loop can honor.
pub fn sanitize_config(config: Config) -> Config {
    let tick_interval_ms = config.playback.tick_interval_ms.clamp(10, 1_000);
    let poll_interval_ms = config.playback.poll_interval_ms.max(tick_interval_ms);
    let connect_timeout_ms = config.connection.connect_timeout_ms.clamp(100, 60_000);
    Config {
        connection: ConnectionConfig {
            connect_timeout_ms,
            ..config.connection
        },
        playback: PlaybackConfig {
            tick_interval_ms,
            poll_interval_ms,
            ..config.playback
        },
        logging: config.logging,
    }
}
