//! In-memory daemon used by the session tests.
//!
//! Commands mutate a shared [`ScriptedDaemon`] the same way the real daemon
//! would, including the queue version counter and per-position change
//! tracking behind `plchanges`. Every response read counts as one round trip.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::backends::{
    ConnectTarget, DaemonCommand, DaemonConnection, DaemonConnector, DaemonStatus,
    ProtocolVersion, SearchQuery,
};
use crate::error::ProtocolError;
use crate::playback_state::PlaybackState;
use crate::song::{QueuedSong, Song};

pub(crate) type SharedDaemon = Rc<RefCell<ScriptedDaemon>>;

pub(crate) struct ScriptedDaemon {
    pub queue: Vec<Song>,
    /// Queue version at which each position last changed.
    pub changed_at: Vec<u32>,
    pub version: u32,
    pub state: PlaybackState,
    pub elapsed_secs: u32,
    pub current: Option<usize>,
    pub volume: Option<u8>,
    pub random: bool,
    pub repeat: bool,
    pub single: bool,
    pub consume: bool,
    pub crossfade_secs: u32,
    pub protocol_version: Option<ProtocolVersion>,
    pub stored_playlists: BTreeMap<String, Vec<Song>>,
    pub outputs: BTreeMap<u32, bool>,
    pub search_results: Vec<Song>,

    pub connect_attempts: usize,
    pub last_target: Option<ConnectTarget>,
    pub refuse_connects: bool,
    pub round_trips: usize,
    /// Pending responses drained, one per command or command list.
    pub finishes: usize,
    pub status_polls: usize,
    pub current_song_fetches: usize,
    pub change_queries: Vec<u32>,
    pub sent: Vec<DaemonCommand>,
    pub idle_requests: usize,
    pub idle_events: bool,
    pub last_search: Option<SearchQuery>,
    pub fail_next_finish: Option<ProtocolError>,
    pub fail_next_status: Vec<ProtocolError>,
}

impl ScriptedDaemon {
    pub fn new() -> Self {
        Self {
            queue: Vec::new(),
            changed_at: Vec::new(),
            version: 1,
            state: PlaybackState::Stopped,
            elapsed_secs: 0,
            current: None,
            volume: Some(50),
            random: false,
            repeat: false,
            single: false,
            consume: false,
            crossfade_secs: 0,
            protocol_version: Some(ProtocolVersion::new(0, 23, 5)),
            stored_playlists: BTreeMap::new(),
            outputs: BTreeMap::new(),
            search_results: Vec::new(),
            connect_attempts: 0,
            last_target: None,
            refuse_connects: false,
            round_trips: 0,
            finishes: 0,
            status_polls: 0,
            current_song_fetches: 0,
            change_queries: Vec::new(),
            sent: Vec::new(),
            idle_requests: 0,
            idle_events: false,
            last_search: None,
            fail_next_finish: None,
            fail_next_status: Vec::new(),
        }
    }

    /// Daemon whose queue holds `count` songs of 200 seconds at `version`.
    pub fn with_queue(count: usize, version: u32) -> SharedDaemon {
        let mut daemon = Self::new();
        daemon.queue = (0..count).map(sample_song).collect();
        daemon.changed_at = vec![version; count];
        daemon.version = version;
        Rc::new(RefCell::new(daemon))
    }

    pub fn set_playing(&mut self, position: usize, elapsed_secs: u32) {
        self.state = PlaybackState::Playing;
        self.current = Some(position);
        self.elapsed_secs = elapsed_secs;
    }

    /// Another client deleted `position`.
    pub fn external_delete(&mut self, position: usize) {
        let _ = self.apply(&DaemonCommand::Delete(position));
    }

    /// Another client appended `song`.
    pub fn external_add(&mut self, song: Song) {
        self.bump();
        self.queue.push(song);
        self.changed_at.push(self.version);
    }

    fn bump(&mut self) {
        self.version += 1;
    }

    fn touch_from(&mut self, start: usize) {
        self.changed_at.resize(self.queue.len(), self.version);
        for changed in self.changed_at.iter_mut().skip(start) {
            *changed = self.version;
        }
    }

    fn bad_index(command: &str) -> ProtocolError {
        ProtocolError::Server {
            code: 2,
            command_index: 0,
            command: command.to_string(),
            message: "Bad song index".to_string(),
        }
    }

    fn lookup(&self, uri: &str) -> Song {
        self.queue
            .iter()
            .chain(self.search_results.iter())
            .find(|song| song.uri == uri)
            .cloned()
            .unwrap_or_else(|| Song::new(uri))
    }

    fn apply(&mut self, command: &DaemonCommand) -> Result<(), ProtocolError> {
        match command {
            DaemonCommand::Password(_) | DaemonCommand::Rescan | DaemonCommand::Update => {}
            DaemonCommand::PlayPosition(position) => {
                if *position >= self.queue.len() {
                    return Err(Self::bad_index("play"));
                }
                self.set_playing(*position, 0);
            }
            DaemonCommand::TogglePause => {
                self.state = match self.state {
                    PlaybackState::Playing => PlaybackState::Paused,
                    PlaybackState::Paused => PlaybackState::Playing,
                    other => other,
                };
            }
            DaemonCommand::Stop => {
                self.state = PlaybackState::Stopped;
                self.elapsed_secs = 0;
            }
            DaemonCommand::Next => {
                if let Some(current) = self.current {
                    if current + 1 < self.queue.len() {
                        self.set_playing(current + 1, 0);
                    } else {
                        self.state = PlaybackState::Stopped;
                        self.current = None;
                    }
                }
            }
            DaemonCommand::Previous => {
                if let Some(current) = self.current {
                    self.set_playing(current.saturating_sub(1), 0);
                }
            }
            DaemonCommand::SeekPosition { position, seconds } => {
                if *position >= self.queue.len() {
                    return Err(Self::bad_index("seek"));
                }
                self.set_playing(*position, *seconds);
            }
            DaemonCommand::SetRandom(value) => self.random = *value,
            DaemonCommand::SetSingle(value) => self.single = *value,
            DaemonCommand::SetConsume(value) => self.consume = *value,
            DaemonCommand::SetRepeat(value) => self.repeat = *value,
            DaemonCommand::SetCrossfade(seconds) => self.crossfade_secs = *seconds,
            DaemonCommand::SetVolume(volume) => self.volume = Some(*volume),
            DaemonCommand::Shuffle => {
                self.queue.reverse();
                let last = self.queue.len().saturating_sub(1);
                self.current = self.current.map(|current| last - current);
                self.bump();
                self.touch_from(0);
            }
            DaemonCommand::Move { from, to } => {
                if *from >= self.queue.len() || *to >= self.queue.len() {
                    return Err(Self::bad_index("move"));
                }
                let song = self.queue.remove(*from);
                self.queue.insert(*to, song);
                self.bump();
                self.touch_from((*from).min(*to));
            }
            DaemonCommand::Swap { first, second } => {
                if *first >= self.queue.len() || *second >= self.queue.len() {
                    return Err(Self::bad_index("swap"));
                }
                self.queue.swap(*first, *second);
                self.bump();
                self.touch_from((*first).min(*second));
            }
            DaemonCommand::Add(uri) => {
                let song = self.lookup(uri);
                self.queue.push(song);
                self.bump();
                self.touch_from(self.queue.len() - 1);
            }
            DaemonCommand::AddAt { uri, position } => {
                if *position > self.queue.len() {
                    return Err(Self::bad_index("addid"));
                }
                let song = self.lookup(uri);
                self.queue.insert(*position, song);
                if let Some(current) = self.current.as_mut() {
                    if *position <= *current {
                        *current += 1;
                    }
                }
                self.bump();
                self.touch_from(*position);
            }
            DaemonCommand::Delete(position) => {
                if *position >= self.queue.len() {
                    return Err(Self::bad_index("delete"));
                }
                self.queue.remove(*position);
                self.changed_at.remove(*position);
                self.current = match self.current {
                    Some(current) if *position < current => Some(current - 1),
                    Some(current) if *position == current => {
                        self.state = PlaybackState::Stopped;
                        None
                    }
                    other => other,
                };
                self.bump();
                self.touch_from(*position);
            }
            DaemonCommand::DeleteRange { start, end } => {
                if *start >= self.queue.len() || end <= start {
                    return Err(Self::bad_index("delete"));
                }
                let end = (*end).min(self.queue.len());
                self.queue.drain(*start..end);
                self.changed_at.drain(*start..end);
                self.current = match self.current {
                    Some(current) if current >= end => Some(current - (end - start)),
                    Some(current) if current >= *start => {
                        self.state = PlaybackState::Stopped;
                        None
                    }
                    other => other,
                };
                self.bump();
                self.touch_from(*start);
            }
            DaemonCommand::Clear => {
                self.queue.clear();
                self.changed_at.clear();
                self.current = None;
                self.state = PlaybackState::Stopped;
                self.bump();
            }
            DaemonCommand::SavePlaylist(name) => {
                self.stored_playlists.insert(name.clone(), self.queue.clone());
            }
            DaemonCommand::ClearPlaylist(name) => {
                self.stored_playlists.entry(name.clone()).or_default().clear();
            }
            DaemonCommand::LoadPlaylist(name) => {
                let Some(songs) = self.stored_playlists.get(name).cloned() else {
                    return Err(ProtocolError::Server {
                        code: 50,
                        command_index: 0,
                        command: "load".to_string(),
                        message: "No such playlist".to_string(),
                    });
                };
                let start = self.queue.len();
                self.queue.extend(songs);
                self.bump();
                self.touch_from(start);
            }
            DaemonCommand::RemovePlaylist(name) => {
                self.stored_playlists.remove(name);
            }
            DaemonCommand::PlaylistAdd { name, uri } => {
                let song = self.lookup(uri);
                self.stored_playlists.entry(name.clone()).or_default().push(song);
            }
            DaemonCommand::EnableOutput(id) => {
                self.outputs.insert(*id, true);
            }
            DaemonCommand::DisableOutput(id) => {
                self.outputs.insert(*id, false);
            }
        }
        Ok(())
    }

    fn status(&self) -> DaemonStatus {
        DaemonStatus {
            volume: self.volume,
            random: self.random,
            repeat: self.repeat,
            single: self.single,
            consume: self.consume,
            crossfade_secs: self.crossfade_secs,
            state: self.state,
            elapsed_secs: self.elapsed_secs,
            queue_version: self.version,
            queue_length: self.queue.len(),
            song_position: self.current,
        }
    }
}

/// `song-N.flac` by `Artist`, titled `Song N`, 200 seconds long.
pub(crate) fn sample_song(index: usize) -> Song {
    Song::new(format!("song-{index}.flac"))
        .with_artist("Artist")
        .with_title(format!("Song {index}"))
        .with_duration(200)
}

pub(crate) struct ScriptedConnector {
    daemon: SharedDaemon,
}

impl ScriptedConnector {
    pub fn new(daemon: &SharedDaemon) -> Self {
        Self {
            daemon: Rc::clone(daemon),
        }
    }
}

impl DaemonConnector for ScriptedConnector {
    fn connect(
        &mut self,
        target: &ConnectTarget,
    ) -> Result<Box<dyn DaemonConnection>, ProtocolError> {
        let mut daemon = self.daemon.borrow_mut();
        daemon.connect_attempts += 1;
        daemon.last_target = Some(target.clone());
        if daemon.refuse_connects {
            return Err(ProtocolError::ConnectRefused(format!(
                "{}:{}",
                target.host, target.port
            )));
        }
        Ok(Box::new(ScriptedConnection {
            daemon: Rc::clone(&self.daemon),
            pending: 0,
            pending_error: None,
            list: None,
            idle: false,
        }))
    }
}

struct ScriptedConnection {
    daemon: SharedDaemon,
    pending: usize,
    pending_error: Option<ProtocolError>,
    list: Option<Vec<DaemonCommand>>,
    idle: bool,
}

impl ScriptedConnection {
    fn record_result(&mut self, result: Result<(), ProtocolError>) {
        if let Err(error) = result {
            self.pending_error.get_or_insert(error);
        }
    }
}

impl DaemonConnection for ScriptedConnection {
    fn server_version(&self) -> Option<ProtocolVersion> {
        self.daemon.borrow().protocol_version
    }

    fn send_command(&mut self, command: &DaemonCommand) -> Result<(), ProtocolError> {
        self.daemon.borrow_mut().sent.push(command.clone());
        if let Some(list) = self.list.as_mut() {
            list.push(command.clone());
            return Ok(());
        }
        let result = self.daemon.borrow_mut().apply(command);
        self.record_result(result);
        self.pending += 1;
        Ok(())
    }

    fn finish_response(&mut self) -> Result<(), ProtocolError> {
        if self.pending == 0 {
            return Ok(());
        }
        self.pending = 0;
        let mut daemon = self.daemon.borrow_mut();
        daemon.round_trips += 1;
        daemon.finishes += 1;
        if let Some(error) = daemon.fail_next_finish.take() {
            self.pending_error = None;
            return Err(error);
        }
        match self.pending_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn begin_command_list(&mut self) -> Result<(), ProtocolError> {
        self.list = Some(Vec::new());
        Ok(())
    }

    fn end_command_list(&mut self) -> Result<(), ProtocolError> {
        let commands = self.list.take().unwrap_or_default();
        for command in &commands {
            let result = self.daemon.borrow_mut().apply(command);
            if result.is_err() {
                self.record_result(result);
                break;
            }
        }
        self.pending += 1;
        Ok(())
    }

    fn status(&mut self) -> Result<DaemonStatus, ProtocolError> {
        let mut daemon = self.daemon.borrow_mut();
        daemon.round_trips += 1;
        daemon.status_polls += 1;
        if !daemon.fail_next_status.is_empty() {
            return Err(daemon.fail_next_status.remove(0));
        }
        Ok(daemon.status())
    }

    fn current_song(&mut self) -> Result<Option<QueuedSong>, ProtocolError> {
        let mut daemon = self.daemon.borrow_mut();
        daemon.round_trips += 1;
        daemon.current_song_fetches += 1;
        Ok(daemon.current.and_then(|position| {
            daemon.queue.get(position).map(|song| QueuedSong {
                position,
                song: song.clone(),
            })
        }))
    }

    fn queue_changes(&mut self, since: u32) -> Result<Vec<QueuedSong>, ProtocolError> {
        let mut daemon = self.daemon.borrow_mut();
        daemon.round_trips += 1;
        daemon.change_queries.push(since);
        Ok(daemon
            .queue
            .iter()
            .zip(daemon.changed_at.iter())
            .enumerate()
            .filter(|(_, (_, changed))| **changed > since)
            .map(|(position, (song, _))| QueuedSong {
                position,
                song: song.clone(),
            })
            .collect())
    }

    fn search(&mut self, query: &SearchQuery) -> Result<Vec<Song>, ProtocolError> {
        let mut daemon = self.daemon.borrow_mut();
        daemon.round_trips += 1;
        daemon.last_search = Some(query.clone());
        Ok(daemon.search_results.clone())
    }

    fn send_idle(&mut self) -> Result<(), ProtocolError> {
        self.daemon.borrow_mut().idle_requests += 1;
        self.idle = true;
        Ok(())
    }

    fn cancel_idle(&mut self) -> Result<bool, ProtocolError> {
        if !self.idle {
            return Ok(false);
        }
        self.idle = false;
        let mut daemon = self.daemon.borrow_mut();
        daemon.round_trips += 1;
        Ok(std::mem::take(&mut daemon.idle_events))
    }
}
