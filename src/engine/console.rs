use crate::engine::Synthesizer;
use anyhow::{anyhow, bail};
use log::{debug, info};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

pub const DEFAULT_VOLUME: u8 = 100;
pub const MAX_VOLUME: u8 = 127;

/// General MIDI program names, indexed by program number.
pub const GM_INSTRUMENTS: [&str; 128] = [
    "Acoustic Grand Piano", "Bright Acoustic Piano", "Electric Grand Piano", "Honky-tonk Piano",
    "Electric Piano 1", "Electric Piano 2", "Harpsichord", "Clavinet",
    "Celesta", "Glockenspiel", "Music Box", "Vibraphone",
    "Marimba", "Xylophone", "Tubular Bells", "Dulcimer",
    "Drawbar Organ", "Percussive Organ", "Rock Organ", "Church Organ",
    "Reed Organ", "Accordion", "Harmonica", "Tango Accordion",
    "Acoustic Guitar (nylon)", "Acoustic Guitar (steel)",
    "Electric Guitar (jazz)", "Electric Guitar (clean)",
    "Electric Guitar (muted)", "Overdriven Guitar", "Distortion Guitar", "Guitar Harmonics",
    "Acoustic Bass", "Electric Bass (finger)", "Electric Bass (pick)", "Fretless Bass",
    "Slap Bass 1", "Slap Bass 2", "Synth Bass 1", "Synth Bass 2",
    "Violin", "Viola", "Cello", "Contrabass",
    "Tremolo Strings", "Pizzicato Strings", "Orchestral Harp", "Timpani",
    "String Ensemble 1", "String Ensemble 2", "Synth Strings 1", "Synth Strings 2",
    "Choir Aahs", "Voice Oohs", "Synth Voice", "Orchestra Hit",
    "Trumpet", "Trombone", "Tuba", "Muted Trumpet",
    "French Horn", "Brass Section", "Synth Brass 1", "Synth Brass 2",
    "Soprano Sax", "Alto Sax", "Tenor Sax", "Baritone Sax",
    "Oboe", "English Horn", "Bassoon", "Clarinet",
    "Piccolo", "Flute", "Recorder", "Pan Flute",
    "Blown Bottle", "Shakuhachi", "Whistle", "Ocarina",
    "Lead 1 (square)", "Lead 2 (sawtooth)", "Lead 3 (calliope)", "Lead 4 (chiff)",
    "Lead 5 (charang)", "Lead 6 (voice)", "Lead 7 (fifths)", "Lead 8 (bass + lead)",
    "Pad 1 (new age)", "Pad 2 (warm)", "Pad 3 (polysynth)", "Pad 4 (choir)",
    "Pad 5 (bowed)", "Pad 6 (metallic)", "Pad 7 (halo)", "Pad 8 (sweep)",
    "FX 1 (rain)", "FX 2 (soundtrack)", "FX 3 (crystal)", "FX 4 (atmosphere)",
    "FX 5 (brightness)", "FX 6 (goblins)", "FX 7 (echoes)", "FX 8 (sci-fi)",
    "Sitar", "Banjo", "Shamisen", "Koto",
    "Kalimba", "Bagpipe", "Fiddle", "Shanai",
    "Tinkle Bell", "Agogo", "Steel Drums", "Woodblock",
    "Taiko Drum", "Melodic Tom", "Synth Drum", "Reverse Cymbal",
    "Guitar Fret Noise", "Breath Noise", "Seashore", "Bird Tweet",
    "Telephone Ring", "Helicopter", "Applause", "Gunshot",
];

#[derive(Debug, Clone)]
struct ChannelState {
    volume: u8,
    muted: bool,
    instrument: u32,
    sounding: BTreeSet<u8>,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            muted: false,
            instrument: 0,
            sounding: BTreeSet::new(),
        }
    }
}

/// A headless synthesizer that renders nothing and reports everything through `log`.
///
/// It keeps per-channel volume, mute, instrument and sounding notes, so it is usable for dry
/// runs and for checking that playback leaves no note hanging.
#[derive(Debug, Default)]
pub struct ConsoleSynth {
    channels: Mutex<HashMap<u32, ChannelState>>,
}

impl ConsoleSynth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pitches currently held on `channel`, lowest first.
    pub fn sounding(&self, channel: u32) -> Vec<u8> {
        self.with_channel(channel, |state| state.sounding.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_muted(&self, channel: u32) -> bool {
        self.with_channel(channel, |state| state.muted)
            .unwrap_or(false)
    }

    pub fn instrument(&self, channel: u32) -> u32 {
        self.with_channel(channel, |state| state.instrument)
            .unwrap_or(0)
    }

    fn with_channel<R>(
        &self,
        channel: u32,
        f: impl FnOnce(&mut ChannelState) -> R,
    ) -> anyhow::Result<R> {
        let Ok(mut channels) = self.channels.lock() else {
            bail!("Failed to lock synth channels..!");
        };

        Ok(f(channels.entry(channel).or_default()))
    }
}

impl Synthesizer for ConsoleSynth {
    fn note_on(&self, channel: u32, pitch: u8) -> anyhow::Result<()> {
        let muted = self.with_channel(channel, |state| {
            state.sounding.insert(pitch);
            state.muted
        })?;

        if muted {
            debug!("note_on ch{} pitch {} (muted)", channel, pitch);
        } else {
            debug!("note_on ch{} pitch {}", channel, pitch);
        }

        Ok(())
    }

    fn note_off(&self, channel: u32, pitch: u8) -> anyhow::Result<()> {
        let was_sounding = self.with_channel(channel, |state| state.sounding.remove(&pitch))?;

        if was_sounding {
            debug!("note_off ch{} pitch {}", channel, pitch);
        }

        Ok(())
    }

    fn set_volume(&self, channel: u32, level: u8) -> anyhow::Result<()> {
        if level > MAX_VOLUME {
            return Err(anyhow!(
                "Volume {} is above the maximum of {}..!",
                level,
                MAX_VOLUME
            ));
        }

        self.with_channel(channel, |state| state.volume = level)?;
        debug!("Channel {} volume -> {}", channel, level);

        Ok(())
    }

    fn volume(&self, channel: u32) -> u8 {
        self.with_channel(channel, |state| state.volume)
            .unwrap_or(DEFAULT_VOLUME)
    }

    fn set_mute(&self, channel: u32, muted: bool) -> anyhow::Result<()> {
        self.with_channel(channel, |state| state.muted = muted)?;
        debug!("Channel {} {}", channel, if muted { "muted" } else { "unmuted" });

        Ok(())
    }

    fn set_instrument(&self, channel: u32, id: u32) -> anyhow::Result<()> {
        let Some(name) = GM_INSTRUMENTS.get(id as usize) else {
            bail!("No instrument with id {}..!", id);
        };

        self.with_channel(channel, |state| state.instrument = id)?;
        info!("Channel {} instrument -> {} ({})", channel, id, name);

        Ok(())
    }

    fn instrument_names(&self) -> Vec<String> {
        GM_INSTRUMENTS.iter().map(|name| name.to_string()).collect()
    }
}
