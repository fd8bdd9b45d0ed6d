//! Status-line formatting for the currently playing song.

/// Whole minutes in `duration_secs`.
pub fn seconds_to_minutes(duration_secs: u32) -> u32 {
    duration_secs / 60
}

/// Seconds left over after the whole minutes of `duration_secs`.
pub fn remaining_seconds(duration_secs: u32) -> u32 {
    duration_secs % 60
}

/// Text published for the bottom status bar.
///
/// `song` is the left aligned part (`[  pos] artist - title`), `timer` the
/// right aligned one. Both are empty when nothing is playing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusLine {
    pub song: String,
    pub timer: String,
}

impl StatusLine {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.song.is_empty() && self.timer.is_empty()
    }
}

/// Song part of the status line. `position` is zero based; unknown renders as `0`.
pub fn format_song(position: Option<usize>, artist: &str, title: &str) -> String {
    let shown = position.map_or(0, |position| position + 1);
    format!("[{shown:>5}] {artist} - {title}")
}

/// Timer part of the status line.
///
/// With `time_remaining` the first field counts down towards the end of the song.
pub fn format_timer(elapsed_secs: u32, duration_secs: u32, time_remaining: bool) -> String {
    let duration_minutes = seconds_to_minutes(duration_secs);
    let duration_seconds = remaining_seconds(duration_secs);
    if time_remaining {
        let left = duration_secs.saturating_sub(elapsed_secs);
        format!(
            "[-{:>2}:{:02} |{:>2}:{:02}]",
            seconds_to_minutes(left),
            remaining_seconds(left),
            duration_minutes,
            duration_seconds
        )
    } else {
        format!(
            "[{:>2}:{:02} |{:>2}:{:02}]",
            seconds_to_minutes(elapsed_secs),
            remaining_seconds(elapsed_secs),
            duration_minutes,
            duration_seconds
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{format_song, format_timer, remaining_seconds, seconds_to_minutes};

    #[test]
    fn test_minute_split() {
        assert_eq!(seconds_to_minutes(200), 3);
        assert_eq!(remaining_seconds(200), 20);
        assert_eq!(seconds_to_minutes(59), 0);
        assert_eq!(remaining_seconds(0), 0);
    }

    #[test]
    fn test_song_part_is_one_based_and_padded() {
        assert_eq!(format_song(Some(4), "Low", "Words"), "[    5] Low - Words");
        assert_eq!(format_song(None, "Unknown", "Unknown"), "[    0] Unknown - Unknown");
    }

    #[test]
    fn test_timer_elapsed_and_remaining_forms() {
        assert_eq!(format_timer(31, 200, false), "[ 0:31 | 3:20]");
        assert_eq!(format_timer(31, 200, true), "[- 2:49 | 3:20]");
        assert_eq!(format_timer(250, 200, true), "[- 0:00 | 3:20]");
    }
}
