use crate::error::SequencerError;
use crate::model::event::TrackRef;

pub mod console;

/// The sound device a song plays on. Channels are track numbers.
///
/// Implementations are shared with the playback thread, so they take `&self` and keep any
/// mutable state behind their own locks. A redundant `note_off` must never be an error.
pub trait Synthesizer: Send + Sync {
    fn note_on(&self, channel: u32, pitch: u8) -> anyhow::Result<()>;

    fn note_off(&self, channel: u32, pitch: u8) -> anyhow::Result<()>;

    fn set_volume(&self, channel: u32, level: u8) -> anyhow::Result<()>;

    fn volume(&self, channel: u32) -> u8;

    fn set_mute(&self, channel: u32, muted: bool) -> anyhow::Result<()>;

    fn set_instrument(&self, channel: u32, id: u32) -> anyhow::Result<()>;

    /// Instrument names, indexed by instrument id.
    fn instrument_names(&self) -> Vec<String>;

    fn instrument_name(&self, id: u32) -> Option<String> {
        self.instrument_names().into_iter().nth(id as usize)
    }
}

/// What an event's lifecycle calls act on while the sequencer runs them.
///
/// The sequencer hands itself in as the stage, so events reach the device and nested tracks
/// without holding references to either.
pub trait Stage {
    fn synth(&self) -> &dyn Synthesizer;

    /// Starts (or restarts from its first beat) playback of a track's sequence.
    fn start_track(&mut self, track: TrackRef) -> Result<(), SequencerError>;

    /// Stops a track's sequence, cancelling whatever it has sounding.
    fn stop_track(&mut self, track: TrackRef) -> Result<(), SequencerError>;
}
