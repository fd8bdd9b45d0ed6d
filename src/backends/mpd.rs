//! Blocking daemon adapter built on the `mpd` client crate.
//!
//! Queries with a payload (`status`, `currentsong`, `plchanges`, searches)
//! go through [`mpd::Client`]. The crate answers every command before
//! returning, so the write-only commands whose response the session defers,
//! command lists and the outstanding `idle` use a raw line channel on a clone
//! of the same socket. Raw responses are always drained before the client
//! issues its next request, which keeps both readers aligned.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, trace};
use mpd::{Query, Term};

use crate::backends::{
    ConnectTarget, DaemonCommand, DaemonConnection, DaemonConnector, DaemonStatus,
    ProtocolVersion, SearchField, SearchQuery,
};
use crate::error::ProtocolError;
use crate::playback_state::PlaybackState;
use crate::song::{QueuedSong, Song};

/// Upper bound on the songs one search returns.
const SEARCH_WINDOW: u32 = 10_000;

/// Opens [`MpdConnection`]s over TCP.
#[derive(Debug, Default)]
pub struct MpdConnector;

impl DaemonConnector for MpdConnector {
    fn connect(
        &mut self,
        target: &ConnectTarget,
    ) -> Result<Box<dyn DaemonConnection>, ProtocolError> {
        let connection = MpdConnection::open(target)?;
        Ok(Box::new(connection))
    }
}

/// Line channel for the requests the client crate cannot defer.
struct RawChannel {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl RawChannel {
    fn write_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        trace!("MpdConnection: > {}", line);
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<String, ProtocolError> {
        let mut bytes = Vec::new();
        if self.reader.read_until(b'\n', &mut bytes)? == 0 {
            return Err(ProtocolError::Closed);
        }
        let line = String::from_utf8_lossy(&bytes)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        trace!("MpdConnection: < {}", line);
        Ok(line)
    }

    /// Reads one response. Returns the keys of its `key: value` lines.
    fn read_response(&mut self) -> Result<Vec<String>, ProtocolError> {
        let mut keys = Vec::new();
        loop {
            let line = self.read_line()?;
            if line == "OK" {
                return Ok(keys);
            }
            if line == "list_OK" {
                continue;
            }
            if line.starts_with("ACK ") {
                return Err(parse_ack(&line));
            }
            match line.split_once(": ") {
                Some((key, _)) => keys.push(key.to_string()),
                None => return Err(ProtocolError::Malformed(line)),
            }
        }
    }
}

/// One TCP session with the daemon.
pub struct MpdConnection {
    client: mpd::Client<TcpStream>,
    raw: RawChannel,
    version: ProtocolVersion,
    pending_responses: usize,
    in_command_list: bool,
    idle: bool,
}

impl MpdConnection {
    /// Connects to `target` within its timeout and consumes the greeting.
    pub fn open(target: &ConnectTarget) -> Result<Self, ProtocolError> {
        let label = format!("{}:{}", target.host, target.port);
        let addresses = (target.host.as_str(), target.port)
            .to_socket_addrs()
            .map_err(|error| ProtocolError::ConnectRefused(format!("{label}: {error}")))?;

        let mut last_error = None;
        let mut stream = None;
        for address in addresses {
            match TcpStream::connect_timeout(&address, target.timeout) {
                Ok(connected) => {
                    stream = Some(connected);
                    break;
                }
                Err(error) => last_error = Some(error),
            }
        }
        let stream = stream.ok_or_else(|| match last_error {
            Some(error) => ProtocolError::ConnectRefused(format!("{label}: {error}")),
            None => ProtocolError::ConnectRefused(format!("{label}: no address")),
        })?;

        let writer = stream.try_clone()?;
        let reader = BufReader::new(writer.try_clone()?);
        let client = mpd::Client::new(stream)?;
        let version = ProtocolVersion::new(
            u32::from(client.version.0),
            u32::from(client.version.1),
            u32::from(client.version.2),
        );
        debug!("MpdConnection: connected to {} (protocol {})", label, version);
        Ok(Self {
            client,
            raw: RawChannel { reader, writer },
            version,
            pending_responses: 0,
            in_command_list: false,
            idle: false,
        })
    }
}

impl DaemonConnection for MpdConnection {
    fn server_version(&self) -> Option<ProtocolVersion> {
        Some(self.version)
    }

    fn send_command(&mut self, command: &DaemonCommand) -> Result<(), ProtocolError> {
        self.raw.write_line(&command_line(command))?;
        if !self.in_command_list {
            self.pending_responses += 1;
        }
        Ok(())
    }

    fn finish_response(&mut self) -> Result<(), ProtocolError> {
        let mut first_error = None;
        while self.pending_responses > 0 {
            self.pending_responses -= 1;
            if let Err(error) = self.raw.read_response() {
                if !error.is_recoverable() {
                    self.pending_responses = 0;
                    return Err(error);
                }
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn begin_command_list(&mut self) -> Result<(), ProtocolError> {
        self.raw.write_line("command_list_begin")?;
        self.in_command_list = true;
        Ok(())
    }

    fn end_command_list(&mut self) -> Result<(), ProtocolError> {
        self.in_command_list = false;
        self.raw.write_line("command_list_end")?;
        self.pending_responses += 1;
        Ok(())
    }

    fn status(&mut self) -> Result<DaemonStatus, ProtocolError> {
        self.finish_response()?;
        let status = self.client.status()?;
        Ok(status_from(&status))
    }

    fn current_song(&mut self) -> Result<Option<QueuedSong>, ProtocolError> {
        self.finish_response()?;
        match self.client.currentsong()? {
            Some(song) => queued_song_from(song).map(Some),
            None => Ok(None),
        }
    }

    fn queue_changes(&mut self, since: u32) -> Result<Vec<QueuedSong>, ProtocolError> {
        self.finish_response()?;
        self.client
            .changes(since)?
            .into_iter()
            .map(queued_song_from)
            .collect()
    }

    fn search(&mut self, query: &SearchQuery) -> Result<Vec<Song>, ProtocolError> {
        self.finish_response()?;
        let term = match query.field {
            SearchField::Any => Term::Any,
            field => Term::Tag(field.tag().into()),
        };
        let mut mpd_query = Query::new();
        mpd_query.and(term, query.term.as_str());
        let songs = if query.exact {
            self.client.find(&mpd_query, (0, SEARCH_WINDOW))?
        } else {
            self.client.search(&mpd_query, (0, SEARCH_WINDOW))?
        };
        Ok(songs.into_iter().map(|song| song_from(song).0).collect())
    }

    fn send_idle(&mut self) -> Result<(), ProtocolError> {
        self.finish_response()?;
        self.raw.write_line("idle")?;
        self.idle = true;
        Ok(())
    }

    fn cancel_idle(&mut self) -> Result<bool, ProtocolError> {
        if !self.idle {
            return Ok(false);
        }
        self.idle = false;
        self.raw.write_line("noidle")?;
        let keys = self.raw.read_response()?;
        Ok(keys.iter().any(|key| key == "changed"))
    }
}

impl Drop for MpdConnection {
    fn drop(&mut self) {
        let _ = self.raw.write_line("close");
    }
}

/// Quotes a command argument.
pub fn quote(argument: &str) -> String {
    let mut quoted = String::with_capacity(argument.len() + 2);
    quoted.push('"');
    for character in argument.chars() {
        if character == '"' || character == '\\' {
            quoted.push('\\');
        }
        quoted.push(character);
    }
    quoted.push('"');
    quoted
}

fn flag(value: bool) -> u8 {
    u8::from(value)
}

/// Request line for `command`.
pub fn command_line(command: &DaemonCommand) -> String {
    match command {
        DaemonCommand::Password(secret) => format!("password {}", quote(secret)),
        DaemonCommand::PlayPosition(position) => format!("play {position}"),
        DaemonCommand::TogglePause => "pause".to_string(),
        DaemonCommand::Stop => "stop".to_string(),
        DaemonCommand::Next => "next".to_string(),
        DaemonCommand::Previous => "previous".to_string(),
        DaemonCommand::SeekPosition { position, seconds } => {
            format!("seek {position} {seconds}")
        }
        DaemonCommand::SetRandom(value) => format!("random {}", flag(*value)),
        DaemonCommand::SetSingle(value) => format!("single {}", flag(*value)),
        DaemonCommand::SetConsume(value) => format!("consume {}", flag(*value)),
        DaemonCommand::SetRepeat(value) => format!("repeat {}", flag(*value)),
        DaemonCommand::SetCrossfade(seconds) => format!("crossfade {seconds}"),
        DaemonCommand::SetVolume(volume) => format!("setvol {volume}"),
        DaemonCommand::Shuffle => "shuffle".to_string(),
        DaemonCommand::Move { from, to } => format!("move {from} {to}"),
        DaemonCommand::Swap { first, second } => format!("swap {first} {second}"),
        DaemonCommand::Add(uri) => format!("add {}", quote(uri)),
        DaemonCommand::AddAt { uri, position } => format!("addid {} {position}", quote(uri)),
        DaemonCommand::Delete(position) => format!("delete {position}"),
        DaemonCommand::DeleteRange { start, end } => format!("delete {start}:{end}"),
        DaemonCommand::Clear => "clear".to_string(),
        DaemonCommand::SavePlaylist(name) => format!("save {}", quote(name)),
        DaemonCommand::ClearPlaylist(name) => format!("playlistclear {}", quote(name)),
        DaemonCommand::LoadPlaylist(name) => format!("load {}", quote(name)),
        DaemonCommand::RemovePlaylist(name) => format!("rm {}", quote(name)),
        DaemonCommand::PlaylistAdd { name, uri } => {
            format!("playlistadd {} {}", quote(name), quote(uri))
        }
        DaemonCommand::EnableOutput(id) => format!("enableoutput {id}"),
        DaemonCommand::DisableOutput(id) => format!("disableoutput {id}"),
        DaemonCommand::Rescan => "rescan".to_string(),
        DaemonCommand::Update => "update".to_string(),
    }
}

/// Parses `ACK [code@index] {command} message`.
pub fn parse_ack(line: &str) -> ProtocolError {
    let parsed = (|| {
        let rest = line.strip_prefix("ACK [")?;
        let (code, rest) = rest.split_once('@')?;
        let (index, rest) = rest.split_once("] {")?;
        let (command, message) = rest.split_once('}')?;
        Some(ProtocolError::Server {
            code: code.parse().ok()?,
            command_index: index.parse().ok()?,
            command: command.to_string(),
            message: message.trim_start().to_string(),
        })
    })();
    parsed.unwrap_or_else(|| ProtocolError::Malformed(line.to_string()))
}

fn whole_seconds(duration: Duration) -> u32 {
    u32::try_from(duration.as_secs()).unwrap_or(u32::MAX)
}

fn status_from(status: &mpd::Status) -> DaemonStatus {
    DaemonStatus {
        volume: u8::try_from(status.volume)
            .ok()
            .map(|volume| volume.min(100)),
        random: status.random,
        repeat: status.repeat,
        single: status.single,
        consume: status.consume,
        crossfade_secs: status.crossfade.map_or(0, whole_seconds),
        state: match status.state {
            mpd::State::Play => PlaybackState::Playing,
            mpd::State::Pause => PlaybackState::Paused,
            mpd::State::Stop => PlaybackState::Stopped,
        },
        elapsed_secs: status.elapsed.map_or(0, whole_seconds),
        queue_version: status.queue_version,
        queue_length: status.queue_len as usize,
        song_position: status.song.as_ref().map(|place| place.pos as usize),
    }
}

/// Converts a crate song. The position is `None` outside queue listings.
pub fn song_from(song: mpd::Song) -> (Song, Option<usize>) {
    let tag = |name: &str| {
        song.tags
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    };
    let album = tag("Album");
    let track = tag("Track");
    let position = song.place.as_ref().map(|place| place.pos as usize);
    let converted = Song {
        uri: song.file,
        artist: song.artist,
        title: song.title,
        album,
        track,
        duration_secs: song.duration.map_or(0, whole_seconds),
    };
    (converted, position)
}

fn queued_song_from(song: mpd::Song) -> Result<QueuedSong, ProtocolError> {
    match song_from(song) {
        (song, Some(position)) => Ok(QueuedSong { position, song }),
        (song, None) => Err(ProtocolError::Malformed(format!(
            "queue entry without position: {}",
            song.uri
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::time::Duration;

    use super::{command_line, parse_ack, quote, song_from, MpdConnection};
    use crate::backends::{
        ConnectTarget, DaemonCommand, DaemonConnection, ProtocolVersion, SearchField,
        SearchQuery,
    };
    use crate::error::ProtocolError;
    use crate::playback_state::PlaybackState;

    #[test]
    fn test_quote_escapes_quotes_and_backslashes() {
        assert_eq!(quote(r#"a "b" \c"#), r#""a \"b\" \\c""#);
        assert_eq!(
            command_line(&DaemonCommand::PlaylistAdd {
                name: "road trip".to_string(),
                uri: "x/y.mp3".to_string(),
            }),
            r#"playlistadd "road trip" "x/y.mp3""#
        );
        assert_eq!(
            command_line(&DaemonCommand::DeleteRange { start: 2, end: 5 }),
            "delete 2:5"
        );
        assert_eq!(command_line(&DaemonCommand::SetRandom(true)), "random 1");
    }

    #[test]
    fn test_parse_ack_extracts_fields() {
        let ProtocolError::Server {
            code,
            command_index,
            command,
            message,
        } = parse_ack("ACK [50@1] {load} No such playlist")
        else {
            panic!("expected server error");
        };
        assert_eq!(code, 50);
        assert_eq!(command_index, 1);
        assert_eq!(command, "load");
        assert_eq!(message, "No such playlist");
        assert!(matches!(parse_ack("ACK nonsense"), ProtocolError::Malformed(_)));
    }

    #[test]
    fn test_song_from_reads_tags_and_duration() {
        let song = mpd::Song {
            file: "low/things.flac".to_string(),
            artist: Some("Low".to_string()),
            title: Some("Things".to_string()),
            duration: Some(Duration::from_millis(61_500)),
            tags: vec![
                ("Album".to_string(), "Double Negative".to_string()),
                ("Track".to_string(), "3".to_string()),
            ],
            ..Default::default()
        };

        let (converted, position) = song_from(song);

        assert_eq!(converted.uri, "low/things.flac");
        assert_eq!(converted.artist.as_deref(), Some("Low"));
        assert_eq!(converted.album.as_deref(), Some("Double Negative"));
        assert_eq!(converted.track.as_deref(), Some("3"));
        assert_eq!(converted.duration_secs, 61);
        assert_eq!(position, None);
    }

    #[test]
    fn test_loopback_session_round_trips() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        let port = listener.local_addr().expect("listener address").port();
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().expect("client should connect");
            let mut writer = stream.try_clone().expect("stream should clone");
            let mut reader = BufReader::new(stream);
            writer.write_all(b"OK MPD 0.21.2\n").expect("greeting");
            let mut received = Vec::new();
            let mut in_list = false;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    break;
                }
                let line = line.trim_end().to_string();
                received.push(line.clone());
                let reply: &[u8] = match line.as_str() {
                    "close" => break,
                    "command_list_begin" => {
                        in_list = true;
                        continue;
                    }
                    "command_list_end" => {
                        in_list = false;
                        b"OK\n"
                    }
                    _ if in_list => continue,
                    "play 9" => b"ACK [2@0] {play} Bad song index\n",
                    "status" => {
                        b"volume: 40\nrepeat: 0\nrandom: 1\nsingle: 0\nconsume: 0\n\
                          playlist: 7\nplaylistlength: 3\nxfade: 0\nstate: pause\n\
                          song: 1\nsongid: 2\nelapsed: 12.500\nOK\n"
                    }
                    "noidle" => b"changed: \xffplaylist\nOK\n",
                    "idle" => continue,
                    _ if line.starts_with("search ") => b"OK\n",
                    _ => b"OK\n",
                };
                writer.write_all(reply).expect("reply");
            }
            received
        });

        let target = ConnectTarget {
            host: "127.0.0.1".to_string(),
            port,
            timeout: Duration::from_secs(2),
        };
        {
            let mut connection = MpdConnection::open(&target).expect("connection should open");
            assert_eq!(
                connection.server_version(),
                Some(ProtocolVersion::new(0, 21, 2))
            );

            connection
                .send_command(&DaemonCommand::PlayPosition(9))
                .expect("send should succeed");
            let error = connection
                .finish_response()
                .expect_err("daemon should reject the command");
            assert!(error.is_recoverable());

            connection.begin_command_list().expect("list begins");
            connection
                .send_command(&DaemonCommand::Delete(0))
                .expect("queued");
            connection
                .send_command(&DaemonCommand::Delete(0))
                .expect("queued");
            connection.end_command_list().expect("list ends");
            connection.finish_response().expect("list succeeds");

            let status = connection.status().expect("status should parse");
            assert_eq!(status.state, PlaybackState::Paused);
            assert_eq!(status.queue_version, 7);
            assert_eq!(status.queue_length, 3);
            assert_eq!(status.volume, Some(40));
            assert!(status.random);
            assert_eq!(status.elapsed_secs, 12);
            assert_eq!(status.song_position, Some(1));

            let found = connection
                .search(&SearchQuery {
                    field: SearchField::Artist,
                    term: "low".to_string(),
                    exact: false,
                })
                .expect("search should succeed");
            assert!(found.is_empty());

            connection.send_idle().expect("idle starts");
            assert!(connection
                .cancel_idle()
                .expect("invalid utf-8 is tolerated"));
            assert!(!connection.cancel_idle().expect("not idle"));
        }

        let received = server.join().expect("server thread should finish");
        let search_line = received
            .iter()
            .find(|line| line.starts_with("search "))
            .cloned()
            .expect("search request sent");
        assert!(search_line.contains("artist"));
        assert!(search_line.contains("low"));
        let others: Vec<&str> = received
            .iter()
            .map(String::as_str)
            .filter(|line| !line.starts_with("search "))
            .collect();
        assert_eq!(
            others,
            vec![
                "play 9",
                "command_list_begin",
                "delete 0",
                "delete 0",
                "command_list_end",
                "status",
                "idle",
                "noidle",
                "close",
            ]
        );
    }
}
