use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use tokio::sync::broadcast::{self, error::TryRecvError};

use mpd_mirror::config::{sanitize_config, Config};
use mpd_mirror::config_persistence::{default_config_path, ensure_config_file, load_config_file};
use mpd_mirror::protocol::{Message, SessionMessage, ViewMessage};
use mpd_mirror::status_line::StatusLine;
use mpd_mirror::{Client, MpdConnector, SessionSettings};

fn load_config() -> Config {
    let Some(path) = default_config_path() else {
        warn!("No config directory on this platform. Using defaults.");
        return Config::default();
    };
    if let Err(error) = ensure_config_file(&path) {
        warn!(
            "Failed to create config file {}: {}",
            path.display(),
            error
        );
    }
    sanitize_config(load_config_file(&path))
}

/// Prints bus traffic to the terminal. Status lines are only printed when they change.
fn print_message(message: Message, shown_line: &mut StatusLine) {
    match message {
        Message::Session(SessionMessage::StatusLine(line)) => {
            if line == *shown_line {
                return;
            }
            if !line.is_empty() {
                println!("{} {}", line.song, line.timer);
            }
            *shown_line = line;
        }
        Message::Session(SessionMessage::StateChanged(state)) => {
            println!("[{}]", state.label());
        }
        Message::Session(SessionMessage::Error(text)) => {
            eprintln!("{}", text);
        }
        Message::View(ViewMessage::InvalidateAll) => debug!("View: invalidate all"),
        Message::View(ViewMessage::Redraw(view)) => debug!("View: redraw {:?}", view),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Trace);
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let config = load_config();
    log::set_max_level(config.logging.level_filter());

    let (bus_sender, mut bus_receiver) = broadcast::channel(1024);
    let mut client = Client::new(
        MpdConnector::default(),
        SessionSettings::from_config(&config),
        bus_sender,
    );

    let host = config.connection.host.clone().unwrap_or_default();
    let port = config.connection.port.unwrap_or(0);
    client.connect(&host, port);

    let tick = Duration::from_millis(config.playback.tick_interval_ms);
    let poll_interval_ms = config.playback.poll_interval_ms;
    let mut last_tick = Instant::now();
    let mut shown_line = StatusLine::empty();
    info!(
        "Main: running, tick={}ms polling={}",
        tick.as_millis(),
        config.playback.polling
    );

    loop {
        std::thread::sleep(tick);
        let now = Instant::now();
        let delta_ms =
            u64::try_from(now.duration_since(last_tick).as_millis()).unwrap_or(u64::MAX);
        last_tick = now;

        if client.settings().polling {
            client.increment_time(delta_ms);
            if client.time_since_update() >= poll_interval_ms {
                client.update_status(false);
            }
        } else {
            if client.had_events() {
                client.update_status(false);
            } else {
                client.increment_time(delta_ms);
            }
            client.idle_mode();
        }

        client.update_display();
        client.display_song_information();

        loop {
            match bus_receiver.try_recv() {
                Ok(message) => print_message(message, &mut shown_line),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Main: bus receiver lagged, skipped {} messages", skipped);
                }
                Err(TryRecvError::Closed) => {
                    error!("Main: bus closed");
                    return Ok(());
                }
            }
        }
    }
}
