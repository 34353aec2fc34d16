use crate::error::{CodecError, EventError, FormatError, FormatErrorKind};
use crate::model::event::{EventKind, TimedEvent, TrackRef};
use crate::model::sequence::EventSequence;
use crate::model::song::{Song, Track};
use log::{debug, info, warn};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::str::{FromStr, Lines};

const TRACK_MARKER: &str = "track";
const SONG_MARKER: &str = "song";
const MAX_VOLUME: i64 = 127;

/// Writes `song` to `path`, replacing whatever was there.
pub fn save_song<P: AsRef<Path>>(path: P, song: &Song) -> Result<(), CodecError> {
    let text = encode(song)?;
    fs::write(path.as_ref(), text)?;

    info!(
        "Saved song with {} track(s) and {} event(s) to '{}'..!",
        song.track_count(),
        song.event_count(),
        path.as_ref().display()
    );

    Ok(())
}

/// Reads a song from `path`. Nothing is returned unless the whole file decoded.
pub fn load_song<P: AsRef<Path>>(path: P) -> Result<Song, CodecError> {
    let text = fs::read_to_string(path.as_ref())?;
    let song = decode(&text)?;

    info!(
        "Loaded song with {} track(s) and {} event(s) from '{}'..!",
        song.track_count(),
        song.event_count(),
        path.as_ref().display()
    );

    Ok(song)
}

/// Replaces `song` with the one stored at `path`.
///
/// The file is decoded in full before `song` is touched, so a failed load leaves the current
/// song exactly as it was.
pub fn reload_song<P: AsRef<Path>>(song: &mut Song, path: P) -> Result<(), CodecError> {
    let loaded = load_song(path)?;
    *song = loaded;

    Ok(())
}

/// Renders `song` in the line-per-token song file format.
///
/// Layout: tempo, track count, then per track the `track` marker, index, instrument, volume,
/// length and event count followed by its event records; then the `song` marker, master
/// length, master event count and the master records. Every record is six lines: kind, label,
/// time, channel and two kind-specific slots (change: value, 0; note: pitch, duration;
/// track: 0, duration).
pub fn encode(song: &Song) -> Result<String, CodecError> {
    let mut out = String::new();

    push_line(&mut out, song.tempo);
    push_line(&mut out, song.track_count());

    for (index, track) in song.tracks.iter().enumerate() {
        push_line(&mut out, TRACK_MARKER);
        push_line(&mut out, index);
        push_line(&mut out, track.instrument);
        push_line(&mut out, track.volume);
        push_line(&mut out, track.sequence.length());
        push_line(&mut out, track.sequence.event_count());
        encode_events(&mut out, &track.sequence)?;
    }

    push_line(&mut out, SONG_MARKER);
    push_line(&mut out, song.master.length());
    push_line(&mut out, song.master.event_count());
    encode_events(&mut out, &song.master)?;

    Ok(out)
}

fn encode_events(out: &mut String, sequence: &EventSequence) -> Result<(), CodecError> {
    for event in sequence {
        if event.label().contains(['\n', '\r']) {
            return Err(CodecError::InvalidLabel(event.label().to_owned()));
        }

        let (slot_a, slot_b): (i64, u32) = match event.kind() {
            EventKind::Change { value } => (*value as i64, 0),
            EventKind::Note { duration, pitch } => (*pitch as i64, *duration),
            EventKind::TrackTrigger { duration, .. } => (0, *duration),
        };

        push_line(out, event.kind().tag());
        push_line(out, event.label());
        push_line(out, event.time());
        push_line(out, event.channel());
        push_line(out, slot_a);
        push_line(out, slot_b);
    }

    Ok(())
}

fn push_line(out: &mut String, token: impl std::fmt::Display) {
    // writing into a String cannot fail
    let _ = writeln!(out, "{}", token);
}

/// Parses a whole song file.
///
/// Track blocks are decoded before the master block, and trigger records are checked against
/// the tracks decoded so far: a trigger inside track block `n` may only start tracks `0..n`,
/// and a master trigger may start any track.
pub fn decode(text: &str) -> Result<Song, FormatError> {
    let mut reader = TokenReader::new(text);

    let tempo: u32 = reader.number("tempo")?;
    let track_count: usize = reader.number("track count")?;
    let mut song = Song::new(tempo);

    for index in 0..track_count {
        reader.track = Some(index);
        reader.marker(TRACK_MARKER)?;

        let found: usize = reader.number("track index")?;
        if found != index {
            return Err(reader.error(FormatErrorKind::TrackOutOfOrder {
                expected: index,
                found,
            }));
        }

        let instrument: u32 = reader.number("instrument")?;
        let volume: i64 = reader.number("volume")?;
        if !(0..=MAX_VOLUME).contains(&volume) {
            return Err(reader.error(FormatErrorKind::OutOfRange {
                field: "volume",
                value: volume,
            }));
        }

        let length: u32 = reader.number("track length")?;
        let event_count: usize = reader.number("event count")?;

        let mut track = Track::new(index as u32);
        track.instrument = instrument;
        track.volume = volume as u8;
        track.sequence.set_length(length);

        for _ in 0..event_count {
            let event = reader.event(index)?;
            track.sequence.add(event);
        }

        debug!(
            "Decoded track {}: instrument {}, volume {}, {} beat(s), {} event(s)",
            index, instrument, volume, length, event_count
        );
        song.tracks.append(track);
    }

    reader.track = None;
    reader.marker(SONG_MARKER)?;
    let length: u32 = reader.number("song length")?;
    let event_count: usize = reader.number("event count")?;

    song.master.set_length(length);
    for _ in 0..event_count {
        let event = reader.event(track_count)?;
        song.master.add(event);
    }

    if reader.has_trailing_content() {
        warn!(
            "Ignoring content after the song block (from line {})..!",
            reader.line + 1
        );
    }

    Ok(song)
}

struct TokenReader<'a> {
    lines: Lines<'a>,
    line: usize,
    track: Option<usize>,
}

impl<'a> TokenReader<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines(),
            line: 0,
            track: None,
        }
    }

    fn error(&self, kind: FormatErrorKind) -> FormatError {
        FormatError {
            record: self.line,
            track: self.track,
            kind,
        }
    }

    fn token(&mut self, expected: &'static str) -> Result<&'a str, FormatError> {
        match self.lines.next() {
            Some(line) => {
                self.line += 1;
                Ok(line)
            }
            None => Err(FormatError {
                record: self.line + 1,
                track: self.track,
                kind: FormatErrorKind::UnexpectedEof { expected },
            }),
        }
    }

    fn number<T: FromStr>(&mut self, expected: &'static str) -> Result<T, FormatError> {
        let token = self.token(expected)?;

        token.trim().parse::<T>().map_err(|_| {
            self.error(FormatErrorKind::BadNumber {
                expected,
                token: token.to_owned(),
            })
        })
    }

    fn marker(&mut self, expected: &'static str) -> Result<(), FormatError> {
        let token = self.token(expected)?;

        if token.trim() != expected {
            return Err(self.error(FormatErrorKind::MissingMarker {
                expected,
                found: token.to_owned(),
            }));
        }

        Ok(())
    }

    /// Reads one six-line record. Triggers may reference tracks `0..available`.
    fn event(&mut self, available: usize) -> Result<TimedEvent, FormatError> {
        let tag = self.token("event kind")?.trim();
        if !matches!(tag, "change" | "note" | "track") {
            return Err(self.error(FormatErrorKind::UnknownKind(tag.to_owned())));
        }

        let label = self.token("event label")?;
        let time: u32 = self.number("event time")?;
        let channel: u32 = self.number("event channel")?;
        let channel_line = self.line;
        let slot_a: i64 = self.number("value or pitch")?;
        let slot_b: u32 = self.number("duration")?;

        let event = match tag {
            "change" => {
                let value = i32::try_from(slot_a).map_err(|_| {
                    self.error(FormatErrorKind::OutOfRange {
                        field: "change value",
                        value: slot_a,
                    })
                })?;
                Ok(TimedEvent::change(time, label, channel, value))
            }
            "note" => u8::try_from(slot_a)
                .map_err(|_| EventError::PitchOutOfRange(slot_a))
                .and_then(|pitch| TimedEvent::note(time, label, channel, slot_b, pitch)),
            _ => {
                let index = channel as usize;
                if index >= available {
                    return Err(FormatError {
                        record: channel_line,
                        track: self.track,
                        kind: FormatErrorKind::UnresolvedTrack { index, available },
                    });
                }
                TimedEvent::track_trigger(time, label, TrackRef(index), slot_b)
            }
        };

        event.map_err(|e| self.error(FormatErrorKind::InvalidEvent(e)))
    }

    fn has_trailing_content(&mut self) -> bool {
        self.lines.any(|line| !line.trim().is_empty())
    }
}
