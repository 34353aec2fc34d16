use crate::engine::Synthesizer;
use crate::error::{EventError, SequencerError};
use crate::model::dynamic::DynamicSequence;
use crate::model::event::{EventKind, TimedEvent, TrackRef};
use crate::model::sequence::{DEFAULT_LENGTH, EventSequence};
use serde::Serialize;

pub const DEFAULT_TEMPO: u32 = 120;
pub const DEFAULT_TRACK_VOLUME: u8 = 100;

pub const NOTE_LABEL: &str = "Note";
pub const TRIGGER_LABEL: &str = "TrackEvent";

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Track {
    pub number: u32,
    pub instrument: u32,
    pub volume: u8,
    pub muted: bool,
    pub sequence: EventSequence,
}

impl Track {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            instrument: 0,
            volume: DEFAULT_TRACK_VOLUME,
            muted: false,
            sequence: EventSequence::new(DEFAULT_LENGTH),
        }
    }

    /// Adds a note on this track's channel at a grid cell.
    pub fn place_note(&mut self, time: u32, pitch: u8, duration: u32) -> Result<(), EventError> {
        let note = TimedEvent::note(time, NOTE_LABEL, self.number, duration, pitch)?;
        self.sequence.add(note);

        Ok(())
    }

    /// Removes the note that starts at `time` with `pitch`, if there is one.
    pub fn erase_note(&mut self, pitch: u8, time: u32) -> Option<TimedEvent> {
        self.sequence
            .remove_where(|e| e.time() == time && e.pitch() == Some(pitch))
    }

    /// Pushes this track's volume, mute and instrument to the device.
    pub fn apply_to(&self, synth: &dyn Synthesizer) -> anyhow::Result<()> {
        synth.set_volume(self.number, self.volume)?;
        synth.set_mute(self.number, self.muted)?;
        synth.set_instrument(self.number, self.instrument)?;

        Ok(())
    }
}

/// A whole song: tempo, the tracks, and the master sequence that triggers them.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Song {
    pub tempo: u32,
    pub tracks: DynamicSequence<Track>,
    pub master: EventSequence,
}

impl Song {
    pub fn new(tempo: u32) -> Self {
        Self {
            tempo,
            tracks: DynamicSequence::new(),
            master: EventSequence::new(DEFAULT_LENGTH),
        }
    }

    /// Appends an empty track numbered after the existing ones.
    pub fn add_track(&mut self) -> TrackRef {
        let track = TrackRef(self.tracks.len());
        self.tracks.append(Track::new(track.channel()));

        track
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn track(&self, track: TrackRef) -> Result<&Track, SequencerError> {
        let count = self.tracks.len();
        self.tracks
            .get(track.index())
            .map_err(|_| SequencerError::UnknownTrack {
                index: track.index(),
                count,
            })
    }

    pub fn track_mut(&mut self, track: TrackRef) -> Result<&mut Track, SequencerError> {
        let count = self.tracks.len();
        self.tracks
            .get_mut(track.index())
            .map_err(|_| SequencerError::UnknownTrack {
                index: track.index(),
                count,
            })
    }

    /// The sequence a trigger for `track` would start.
    pub fn resolve(&self, track: TrackRef) -> Result<&EventSequence, SequencerError> {
        self.track(track).map(|t| &t.sequence)
    }

    /// Adds a trigger for `track` to the master sequence.
    pub fn place_trigger(
        &mut self,
        track: TrackRef,
        time: u32,
        duration: u32,
    ) -> Result<(), SequencerError> {
        self.track(track)?;

        let trigger = TimedEvent::track_trigger(time, TRIGGER_LABEL, track, duration)?;
        self.master.add(trigger);

        Ok(())
    }

    /// Removes the master trigger for `track` that starts at `time`, if there is one.
    pub fn erase_trigger(&mut self, track: TrackRef, time: u32) -> Option<TimedEvent> {
        self.master.remove_where(|e| {
            e.time() == time
                && matches!(e.kind(), EventKind::TrackTrigger { nested, .. } if *nested == track)
        })
    }

    /// Pushes every track's channel settings to the device.
    pub fn apply_to(&self, synth: &dyn Synthesizer) -> anyhow::Result<()> {
        for track in &self.tracks {
            track.apply_to(synth)?;
        }

        Ok(())
    }

    /// Drops every track and master event. Tempo and master length are kept.
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.master.clear();
    }

    pub fn event_count(&self) -> usize {
        self.master.event_count()
            + self
                .tracks
                .iter()
                .map(|t| t.sequence.event_count())
                .sum::<usize>()
    }
}

impl Default for Song {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPO)
    }
}
