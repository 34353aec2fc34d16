use std::fmt;
use thiserror::Error;

/// A container access outside the live range. Always a caller bug.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("index {index} out of range for length {len}")]
pub struct IndexOutOfRange {
    pub index: usize,
    pub len: usize,
}

/// A field value that no event may carry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("pitch {0} is outside 0..=127")]
    PitchOutOfRange(i64),

    #[error("{0} events need a duration greater than zero")]
    ZeroDuration(&'static str),
}

#[derive(Error, Debug)]
pub enum SequencerError {
    /// Passed through untouched from the synthesizer device.
    #[error(transparent)]
    Device(#[from] anyhow::Error),

    #[error(transparent)]
    IndexOutOfRange(#[from] IndexOutOfRange),

    #[error(transparent)]
    InvalidEvent(#[from] EventError),

    #[error("no track {index} (song has {count})")]
    UnknownTrack { index: usize, count: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatErrorKind {
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: &'static str },

    #[error("expected {expected}, found '{token}'")]
    BadNumber { expected: &'static str, token: String },

    #[error("{field} {value} is out of range")]
    OutOfRange { field: &'static str, value: i64 },

    #[error("track block {found} where track {expected} was expected")]
    TrackOutOfOrder { expected: usize, found: usize },

    #[error("unknown event kind '{0}'")]
    UnknownKind(String),

    #[error("expected marker '{expected}', found '{found}'")]
    MissingMarker { expected: &'static str, found: String },

    #[error("trigger references track {index} but only {available} are available")]
    UnresolvedTrack { index: usize, available: usize },

    #[error(transparent)]
    InvalidEvent(#[from] EventError),
}

/// A malformed or incomplete song file.
///
/// `record` is the 1-based line of the token that failed; `track` is the track block being
/// decoded when it happened, `None` for the header and the master block.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct FormatError {
    pub record: usize,
    pub track: Option<usize>,
    pub kind: FormatErrorKind,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.track {
            Some(track) => write!(f, "line {} (track {}): {}", self.record, track, self.kind),
            None => write!(f, "line {}: {}", self.record, self.kind),
        }
    }
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("malformed song file, {0}")]
    Format(#[from] FormatError),

    #[error("song file i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("label '{0}' cannot be stored, labels must fit on one line")]
    InvalidLabel(String),
}
