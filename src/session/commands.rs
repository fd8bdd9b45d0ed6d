//! Operations forwarded to the daemon, with their optimistic local updates.
//!
//! Each operation reports `NoConnection` and does nothing while disconnected.
//! Queue edits this client makes are applied to the mirror locally and then
//! confirmed with an expected-change poll; edits whose outcome the client
//! cannot predict are polled as unexpected so the changed entries are
//! replayed.

use log::debug;

use crate::backends::{DaemonCommand, DaemonConnector, ProtocolVersion, SearchField, SearchQuery};
use crate::playback_state::PlaybackState;
use crate::protocol::{ConnectionState, Message, SessionMessage};
use crate::session::Client;
use crate::song::Song;
use crate::status_line::{format_song, format_timer, StatusLine};

const MAX_VOLUME: u8 = 100;

impl<C: DaemonConnector> Client<C> {
    pub fn password(&mut self, secret: &str) {
        if !self.require_connection() {
            return;
        }
        self.send(DaemonCommand::Password(secret.to_string()));
    }

    // Playback

    /// Starts playback at queue `position`.
    pub fn play(&mut self, position: usize) {
        if !self.require_connection() {
            return;
        }
        if !self.send(DaemonCommand::PlayPosition(position)) {
            return;
        }
        self.current.position = Some(position);
        self.player.play();
        self.update_status(false);
    }

    /// Toggles between playing and paused.
    pub fn pause(&mut self) {
        if !self.require_connection() {
            return;
        }
        if self.send(DaemonCommand::TogglePause) {
            self.player.toggle_pause();
        }
    }

    pub fn stop(&mut self) {
        if !self.require_connection() {
            return;
        }
        if self.send(DaemonCommand::Stop) {
            self.player.stop();
            self.current.clear();
        }
    }

    pub fn next(&mut self) {
        if !self.require_connection() {
            return;
        }
        if self.send(DaemonCommand::Next) {
            self.update_status(false);
        }
    }

    pub fn previous(&mut self) {
        if !self.require_connection() {
            return;
        }
        if self.send(DaemonCommand::Previous) {
            self.update_status(false);
        }
    }

    /// Seeks `offset_secs` relative to the estimated position in the current song.
    pub fn seek(&mut self, offset_secs: i32) {
        let target = i64::from(self.clock.estimated_secs()) + i64::from(offset_secs);
        let target = u32::try_from(target.max(0)).unwrap_or(u32::MAX);
        self.seek_to(target);
    }

    /// Seeks to `seconds` into the current song.
    pub fn seek_to(&mut self, seconds: u32) {
        if !self.require_connection() {
            return;
        }
        let Some(position) = self.current.position else {
            debug!("Session: seek ignored, no current song");
            return;
        };
        self.send(DaemonCommand::SeekPosition { position, seconds });
    }

    // Options

    pub fn random(&self) -> bool {
        self.options.random
    }

    pub fn set_random(&mut self, random: bool) {
        if !self.require_connection() {
            return;
        }
        if self.send(DaemonCommand::SetRandom(random)) {
            self.options.random = random;
        }
    }

    pub fn single(&self) -> bool {
        self.options.single
    }

    pub fn set_single(&mut self, single: bool) {
        if !self.require_connection() {
            return;
        }
        if self.send(DaemonCommand::SetSingle(single)) {
            self.options.single = single;
        }
    }

    pub fn consume(&self) -> bool {
        self.options.consume
    }

    pub fn set_consume(&mut self, consume: bool) {
        if !self.require_connection() {
            return;
        }
        if self.send(DaemonCommand::SetConsume(consume)) {
            self.options.consume = consume;
        }
    }

    pub fn repeat(&self) -> bool {
        self.options.repeat
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        if !self.require_connection() {
            return;
        }
        if self.send(DaemonCommand::SetRepeat(repeat)) {
            self.options.repeat = repeat;
        }
    }

    /// Crossfade in seconds, `0` when disabled.
    pub fn crossfade(&self) -> u32 {
        if self.options.crossfade {
            self.options.crossfade_secs
        } else {
            0
        }
    }

    /// Switches crossfade on with the last used duration, or off.
    pub fn set_crossfade_enabled(&mut self, enabled: bool) {
        let seconds = if enabled {
            self.options.crossfade_secs
        } else {
            0
        };
        self.set_crossfade(seconds);
    }

    pub fn set_crossfade(&mut self, seconds: u32) {
        if !self.require_connection() {
            return;
        }
        if !self.send(DaemonCommand::SetCrossfade(seconds)) {
            return;
        }
        self.options.crossfade = seconds != 0;
        if self.options.crossfade {
            self.options.crossfade_secs = seconds;
        }
    }

    /// Mixer volume, `None` while disconnected or without a mixer.
    pub fn volume(&self) -> Option<u8> {
        self.options.volume
    }

    pub fn set_volume(&mut self, volume: u8) {
        if !self.require_connection() {
            return;
        }
        let volume = volume.min(MAX_VOLUME);
        if self.send(DaemonCommand::SetVolume(volume)) {
            self.options.volume = Some(volume);
        }
    }

    // Queue

    /// Appends `song`. Returns the index of the last queue entry.
    pub fn add(&mut self, song: &Song) -> usize {
        if self.require_connection() && self.submit(DaemonCommand::Add(song.uri.clone())) {
            self.queue.push(song.clone());
            self.update_status(true);
        }
        self.last_queue_index()
    }

    /// Inserts `song` at `position`. Returns the index of the last queue entry.
    pub fn add_at(&mut self, song: &Song, position: usize) -> usize {
        if self.require_connection()
            && self.submit(DaemonCommand::AddAt {
                uri: song.uri.clone(),
                position,
            })
        {
            self.current.on_insert(position);
            self.queue.insert(position, song.clone());
            self.update_status(true);
        }
        self.last_queue_index()
    }

    /// Adds `uri`, which may be a directory, so the result is read back from the daemon.
    pub fn add_uri(&mut self, uri: &str) -> usize {
        if self.require_connection() && self.send(DaemonCommand::Add(uri.to_string())) {
            self.note_unpredicted_edit();
            self.update_status(false);
        }
        self.last_queue_index()
    }

    /// Adds the whole database. The change is picked up by the next poll.
    pub fn add_all_songs(&mut self) -> usize {
        if self.require_connection() && self.send(DaemonCommand::Add("/".to_string())) {
            self.note_unpredicted_edit();
        }
        self.last_queue_index()
    }

    pub fn delete(&mut self, position: usize) {
        if !self.require_connection() || self.total_number_of_songs() == 0 {
            return;
        }
        if !self.submit(DaemonCommand::Delete(position)) {
            return;
        }
        self.current.on_delete(position);
        self.queue.remove(position);
        self.update_status(true);
    }

    /// Deletes the half-open range `start..end`.
    ///
    /// Daemons without range delete get one single delete per entry, sent as
    /// one batch.
    pub fn delete_range(&mut self, start: usize, end: usize) {
        if !self.require_connection() {
            return;
        }
        let total = self.total_number_of_songs();
        let end = end.min(total);
        if total == 0 || end <= start {
            return;
        }

        let native = self
            .version
            .is_some_and(|version| version.supports_range_delete());
        if !native {
            let open_batch = !self.list_mode;
            let mut batch = self.batch(open_batch);
            for _ in start..end {
                batch.delete(start);
            }
            return;
        }

        if !self.submit(DaemonCommand::DeleteRange { start, end }) {
            return;
        }
        self.current.on_delete_range(start, end);
        self.queue.remove_range(start, end);
        self.update_status(true);
    }

    pub fn clear(&mut self) {
        if !self.require_connection() {
            return;
        }
        if !self.submit(DaemonCommand::Clear) {
            return;
        }
        self.queue.clear();
        self.current.clear();
        self.update_status(true);
    }

    /// Moves the entry at `from` to `to`.
    pub fn move_entry(&mut self, from: usize, to: usize) {
        if !self.require_connection() {
            return;
        }
        if !self.submit(DaemonCommand::Move { from, to }) {
            return;
        }
        self.queue.move_entry(from, to);
        self.update_status(true);
    }

    pub fn swap(&mut self, first: usize, second: usize) {
        if !self.require_connection() {
            return;
        }
        if self.send(DaemonCommand::Swap { first, second }) {
            self.note_unpredicted_edit();
            self.update_status(false);
        }
    }

    pub fn shuffle(&mut self) {
        if !self.require_connection() {
            return;
        }
        if self.send(DaemonCommand::Shuffle) {
            self.note_unpredicted_edit();
            self.update_status(false);
        }
    }

    // Stored playlists

    /// Creates an empty stored playlist called `name`.
    pub fn create_playlist(&mut self, name: &str) {
        if !self.require_connection() {
            return;
        }
        if self.send(DaemonCommand::SavePlaylist(name.to_string())) {
            self.send(DaemonCommand::ClearPlaylist(name.to_string()));
        }
    }

    /// Saves the queue as stored playlist `name`.
    pub fn save_playlist(&mut self, name: &str) {
        if !self.require_connection() {
            return;
        }
        self.send(DaemonCommand::SavePlaylist(name.to_string()));
    }

    /// Replaces the queue with stored playlist `name`.
    pub fn load_playlist(&mut self, name: &str) {
        if !self.require_connection() {
            return;
        }
        self.clear();
        if self.send(DaemonCommand::LoadPlaylist(name.to_string())) {
            self.note_unpredicted_edit();
            self.update_status(false);
        }
    }

    pub fn remove_playlist(&mut self, name: &str) {
        if !self.require_connection() {
            return;
        }
        self.send(DaemonCommand::RemovePlaylist(name.to_string()));
    }

    pub fn add_to_named_playlist(&mut self, name: &str, song: &Song) {
        if !self.require_connection() {
            return;
        }
        self.send(DaemonCommand::PlaylistAdd {
            name: name.to_string(),
            uri: song.uri.clone(),
        });
    }

    // Outputs

    pub fn set_output_enabled(&mut self, output_id: u32, enabled: bool) {
        if enabled {
            self.enable_output(output_id);
        } else {
            self.disable_output(output_id);
        }
    }

    pub fn enable_output(&mut self, output_id: u32) {
        if !self.require_connection() {
            return;
        }
        self.send(DaemonCommand::EnableOutput(output_id));
    }

    pub fn disable_output(&mut self, output_id: u32) {
        if !self.require_connection() {
            return;
        }
        self.send(DaemonCommand::DisableOutput(output_id));
    }

    // Database

    pub fn rescan(&mut self) {
        if !self.require_connection() {
            return;
        }
        self.send(DaemonCommand::Rescan);
    }

    pub fn update_database(&mut self) {
        if !self.require_connection() {
            return;
        }
        self.send(DaemonCommand::Update);
    }

    /// Searches the database. Empty when disconnected, inside a batch or on failure.
    pub fn search(&mut self, field: SearchField, term: &str, exact: bool) -> Vec<Song> {
        if !self.require_connection() || self.list_mode {
            return Vec::new();
        }
        self.clear_command();
        let query = SearchQuery {
            field,
            term: term.to_string(),
            exact,
        };
        self.call(|connection| connection.search(&query))
            .unwrap_or_default()
    }

    // Queries

    /// Text shown for the session state.
    pub fn current_state(&self) -> &'static str {
        match self.connection_state {
            ConnectionState::Connected if self.last_status.is_some() => {
                self.player.current().label()
            }
            ConnectionState::Connected | ConnectionState::Connecting => {
                ConnectionState::Connecting.label()
            }
            ConnectionState::Disconnected => ConnectionState::Disconnected.label(),
        }
    }

    /// Queue length from the last poll, `0` while disconnected.
    pub fn total_number_of_songs(&self) -> usize {
        if !self.connected() {
            return 0;
        }
        self.last_status
            .as_ref()
            .map_or(0, |status| status.queue_length)
    }

    fn last_queue_index(&self) -> usize {
        self.total_number_of_songs().saturating_sub(1)
    }

    pub fn song_is_in_queue(&self, song: &Song) -> bool {
        self.queue.contains_uri(&song.uri)
    }

    pub fn server_version(&self) -> Option<ProtocolVersion> {
        self.version
    }

    /// Publishes the status line for the current song.
    ///
    /// Stopped or disconnected sessions publish an empty line. A playing
    /// session whose song has not been fetched yet publishes nothing.
    pub fn display_song_information(&self) {
        let stopped = self.player.current() == PlaybackState::Stopped;
        if !self.connected() || stopped {
            self.publish(Message::Session(SessionMessage::StatusLine(
                StatusLine::empty(),
            )));
            return;
        }
        let (Some(song), Some(_)) = (self.current.song.as_ref(), self.last_status.as_ref()) else {
            return;
        };
        let line = StatusLine {
            song: format_song(
                self.current.position,
                song.artist_or_unknown(),
                song.title_or_unknown(),
            ),
            timer: format_timer(
                self.clock.estimated_secs(),
                song.duration_secs,
                self.settings.time_remaining,
            ),
        };
        self.publish(Message::Session(SessionMessage::StatusLine(line)));
    }
}
