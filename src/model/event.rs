use crate::engine::Stage;
use crate::error::{EventError, SequencerError};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

pub const MAX_PITCH: u8 = 127;

/// Index of a track in its song. Triggers hold one of these instead of the track's sequence, and
/// it is resolved against the song only when the trigger fires.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackRef(pub usize);

impl TrackRef {
    pub fn index(self) -> usize {
        self.0
    }

    pub fn channel(self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Display for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track {}", self.0)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// A parameter change. Carries a value for whoever reads it; fires nothing on the device.
    Change { value: i32 },

    Note { duration: u32, pitch: u8 },

    /// Starts playback of another track's sequence.
    TrackTrigger { duration: u32, nested: TrackRef },
}

impl EventKind {
    /// Tie-break among events at the same time: changes first, then notes, then triggers.
    pub fn rank(&self) -> u8 {
        match self {
            EventKind::Change { .. } => 0,
            EventKind::Note { .. } => 1,
            EventKind::TrackTrigger { .. } => 2,
        }
    }

    /// The tag used for this kind in song files.
    pub fn tag(&self) -> &'static str {
        match self {
            EventKind::Change { .. } => "change",
            EventKind::Note { .. } => "note",
            EventKind::TrackTrigger { .. } => "track",
        }
    }
}

/// Something that happens at a point on a track's beat grid.
///
/// Events are immutable once built. The device and any nested sequence are handed in through a
/// [`Stage`] when the sequencer runs a lifecycle call; events never own either.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TimedEvent {
    time: u32,
    label: String,
    channel: u32,
    #[serde(flatten)]
    kind: EventKind,
}

impl TimedEvent {
    pub fn note(
        time: u32,
        label: impl Into<String>,
        channel: u32,
        duration: u32,
        pitch: u8,
    ) -> Result<Self, EventError> {
        if pitch > MAX_PITCH {
            return Err(EventError::PitchOutOfRange(pitch as i64));
        }
        if duration == 0 {
            return Err(EventError::ZeroDuration("note"));
        }

        Ok(Self {
            time,
            label: label.into(),
            channel,
            kind: EventKind::Note { duration, pitch },
        })
    }

    pub fn change(time: u32, label: impl Into<String>, channel: u32, value: i32) -> Self {
        Self {
            time,
            label: label.into(),
            channel,
            kind: EventKind::Change { value },
        }
    }

    /// A trigger lives on the channel of the track it starts.
    pub fn track_trigger(
        time: u32,
        label: impl Into<String>,
        nested: TrackRef,
        duration: u32,
    ) -> Result<Self, EventError> {
        if duration == 0 {
            return Err(EventError::ZeroDuration("track"));
        }

        Ok(Self {
            time,
            label: label.into(),
            channel: nested.channel(),
            kind: EventKind::TrackTrigger { duration, nested },
        })
    }

    pub fn time(&self) -> u32 {
        self.time
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn channel(&self) -> u32 {
        self.channel
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// Beats until natural completion. Changes complete on the beat they fire.
    pub fn duration(&self) -> u32 {
        match self.kind {
            EventKind::Change { .. } => 0,
            EventKind::Note { duration, .. } | EventKind::TrackTrigger { duration, .. } => duration,
        }
    }

    pub fn end_time(&self) -> u32 {
        self.time.saturating_add(self.duration())
    }

    pub fn pitch(&self) -> Option<u8> {
        match self.kind {
            EventKind::Note { pitch, .. } => Some(pitch),
            _ => None,
        }
    }

    pub fn nested(&self) -> Option<TrackRef> {
        match self.kind {
            EventKind::TrackTrigger { nested, .. } => Some(nested),
            _ => None,
        }
    }

    /// Scheduling order: `time` first, then [`EventKind::rank`].
    ///
    /// Looser than `==`: two different notes on the same beat compare `Equal` here while still
    /// being distinct values, so `TimedEvent` has no `Ord`.
    pub fn compare(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.kind.rank().cmp(&other.kind.rank()))
    }

    /// Begins the event's effect: note-on for notes, nested playback for triggers.
    pub fn execute<S: Stage + ?Sized>(&self, stage: &mut S) -> Result<(), SequencerError> {
        match &self.kind {
            EventKind::Note { pitch, .. } => stage.synth().note_on(self.channel, *pitch)?,
            EventKind::Change { .. } => {}
            EventKind::TrackTrigger { nested, .. } => stage.start_track(*nested)?,
        }

        Ok(())
    }

    /// Called when the event's duration has elapsed.
    ///
    /// Triggers do nothing here: a started track keeps looping past the trigger's duration
    /// until [`TimedEvent::cancel`] stops it.
    pub fn complete<S: Stage + ?Sized>(&self, stage: &mut S) -> Result<(), SequencerError> {
        if let EventKind::Note { pitch, .. } = self.kind {
            stage.synth().note_off(self.channel, pitch)?;
        }

        Ok(())
    }

    /// Called when playback is interrupted before the event completed. Safe to call after
    /// `complete`; the device only sees another note-off.
    pub fn cancel<S: Stage + ?Sized>(&self, stage: &mut S) -> Result<(), SequencerError> {
        match &self.kind {
            EventKind::Note { pitch, .. } => stage.synth().note_off(self.channel, *pitch)?,
            EventKind::Change { .. } => {}
            EventKind::TrackTrigger { nested, .. } => stage.stop_track(*nested)?,
        }

        Ok(())
    }
}

impl fmt::Display for TimedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EventKind::Change { value } => {
                write!(f, "{}[{}, {}, {}]", self.label, self.channel, self.time, value)
            }
            EventKind::Note { duration, pitch } => write!(
                f,
                "{}[{}, {}, {}, {}]",
                self.label, self.channel, self.time, duration, pitch
            ),
            EventKind::TrackTrigger { duration, nested } => write!(
                f,
                "{}[{}, {}, {}, -> {}]",
                self.label, self.channel, self.time, duration, nested
            ),
        }
    }
}
