use crate::engine::{Stage, Synthesizer};
use crate::error::SequencerError;
use crate::model::event::{TimedEvent, TrackRef};
use crate::model::song::Song;
use log::{debug, info, warn};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    Master,
    Track(TrackRef),
}

#[derive(Debug)]
struct LaneState {
    lane: Lane,
    events: Arc<[TimedEvent]>,
    length: u32,
    started_at: u64,
    fired_at: Option<u64>,
    playing: bool,
}

/// An executed event waiting for its natural completion.
#[derive(Debug)]
struct Voice {
    lane: Lane,
    events: Arc<[TimedEvent]>,
    index: usize,
    ends_at: u64,
}

impl Voice {
    fn event(&self) -> &TimedEvent {
        &self.events[self.index]
    }
}

/// Steps a song one beat at a time and runs event lifecycles in order.
///
/// The master sequence plays from beat 0 to its length (restarting if looping). A trigger
/// starts its track's sequence, which then loops on its own length until the trigger is
/// cancelled or the song ends. Each lane writes its position into its sequence's `elapsed`.
///
/// Not reentrant: one caller drives `step`/`stop`, and the song it owns is a snapshot nobody
/// else mutates during playback.
pub struct Transport<'a> {
    synth: &'a dyn Synthesizer,
    song: Song,
    lanes: Vec<LaneState>,
    voices: Vec<Voice>,
    tick: u64,
    looping: bool,
    finished: bool,
}

impl<'a> Transport<'a> {
    pub fn new(song: Song, synth: &'a dyn Synthesizer) -> Self {
        let master = LaneState {
            lane: Lane::Master,
            events: song.master.sorted().into(),
            length: song.master.length(),
            started_at: 0,
            fired_at: None,
            playing: true,
        };

        Self {
            synth,
            song,
            lanes: vec![master],
            voices: Vec::new(),
            tick: 0,
            looping: false,
            finished: false,
        }
    }

    pub fn song(&self) -> &Song {
        &self.song
    }

    /// Beats stepped so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Position of the master sequence.
    pub fn elapsed(&self) -> u32 {
        self.song.master.elapsed()
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_playing(&self, lane: Lane) -> bool {
        self.lanes.iter().any(|l| l.lane == lane && l.playing)
    }

    /// Plays one beat: completes what is due, then fires every event that starts on it.
    pub fn step(&mut self) -> Result<(), SequencerError> {
        if self.finished {
            return Ok(());
        }

        let tick = self.tick;
        let (due, waiting): (Vec<Voice>, Vec<Voice>) = std::mem::take(&mut self.voices)
            .into_iter()
            .partition(|v| v.ends_at <= tick);
        self.voices = waiting;

        for voice in &due {
            voice.event().complete(self)?;
        }

        // lanes started during this beat are appended and picked up by the same loop
        while let Some(index) = self
            .lanes
            .iter()
            .position(|l| l.playing && l.fired_at != Some(tick))
        {
            self.fire_lane(index)?;

            if self.finished {
                return Ok(());
            }
        }

        self.tick += 1;

        Ok(())
    }

    /// Cancels everything still sounding and halts every lane. Every voice is cancelled even if
    /// one fails; the first failure is returned.
    pub fn stop(&mut self) -> Result<(), SequencerError> {
        let voices = std::mem::take(&mut self.voices);
        let mut result = Ok(());

        for voice in voices.iter().rev() {
            if let Err(why) = voice.event().cancel(self) {
                warn!("Failed to cancel {}: {}", voice.event(), why);
                if result.is_ok() {
                    result = Err(why);
                }
            }
        }

        for lane in &mut self.lanes {
            lane.playing = false;
        }
        self.finished = true;

        result
    }

    fn fire_lane(&mut self, index: usize) -> Result<(), SequencerError> {
        let tick = self.tick;
        let looping = self.looping;
        let lane = &mut self.lanes[index];
        lane.fired_at = Some(tick);

        if lane.length == 0 {
            lane.playing = false;
            if lane.lane == Lane::Master {
                info!("Master sequence is empty, nothing to play..!");
                return self.stop();
            }
            return Ok(());
        }

        let mut position = tick - lane.started_at;
        match lane.lane {
            Lane::Master if position >= lane.length as u64 => {
                if looping {
                    debug!("Master sequence looping at beat {}..!", tick);
                    lane.started_at = tick;
                    position = 0;
                } else {
                    info!("Master sequence finished after {} beat(s)..!", tick);
                    return self.stop();
                }
            }
            Lane::Master => {}
            Lane::Track(_) => position %= lane.length as u64,
        }

        let position = position as u32;
        let lane_id = lane.lane;
        let events = Arc::clone(&lane.events);

        match lane_id {
            Lane::Master => self.song.master.set_elapsed(position),
            Lane::Track(track) => self.song.track_mut(track)?.sequence.set_elapsed(position),
        }

        for (index, event) in events.iter().enumerate() {
            if event.time() != position {
                continue;
            }

            event.execute(self)?;

            if event.duration() == 0 {
                event.complete(self)?;
            } else {
                self.voices.push(Voice {
                    lane: lane_id,
                    events: Arc::clone(&events),
                    index,
                    ends_at: tick + event.duration() as u64,
                });
            }
        }

        Ok(())
    }
}

impl Stage for Transport<'_> {
    fn synth(&self) -> &dyn Synthesizer {
        self.synth
    }

    fn start_track(&mut self, track: TrackRef) -> Result<(), SequencerError> {
        let sequence = self.song.resolve(track)?;
        let tick = self.tick;

        let existing = self
            .lanes
            .iter()
            .position(|l| l.lane == Lane::Track(track));

        match existing {
            // already started on this beat; restarting again could never settle
            Some(index) if self.lanes[index].playing && self.lanes[index].started_at == tick => {}
            Some(index) => {
                self.stop_track(track)?;
                let lane = &mut self.lanes[index];
                lane.started_at = tick;
                lane.fired_at = None;
                lane.playing = true;
            }
            None => {
                let lane = LaneState {
                    lane: Lane::Track(track),
                    events: sequence.sorted().into(),
                    length: sequence.length(),
                    started_at: tick,
                    fired_at: None,
                    playing: true,
                };
                self.lanes.push(lane);
            }
        }

        debug!("Started {} at beat {}", track, tick);

        Ok(())
    }

    fn stop_track(&mut self, track: TrackRef) -> Result<(), SequencerError> {
        let lane_id = Lane::Track(track);
        if let Some(lane) = self.lanes.iter_mut().find(|l| l.lane == lane_id) {
            lane.playing = false;
        }

        let (stopped, kept): (Vec<Voice>, Vec<Voice>) = std::mem::take(&mut self.voices)
            .into_iter()
            .partition(|v| v.lane == lane_id);
        self.voices = kept;

        for voice in stopped.iter().rev() {
            voice.event().cancel(self)?;
        }

        debug!("Stopped {} at beat {}", track, self.tick);

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::event::test::{Call, RecordingSynth};

    fn run(transport: &mut Transport, beats: usize) {
        for _ in 0..beats {
            transport.step().unwrap();
        }
    }

    /// One track with a note at beat `note_at`, triggered at beat 0 by the master.
    fn triggered_song(
        track_len: u32,
        note_at: u32,
        note_len: u32,
        trigger_len: u32,
        master_len: u32,
    ) -> Song {
        let mut song = Song::default();
        let t = song.add_track();
        let track = song.track_mut(t).unwrap();
        track.sequence.set_length(track_len);
        track.place_note(note_at, 60, note_len).unwrap();

        song.master.set_length(master_len);
        song.place_trigger(t, 0, trigger_len).unwrap();
        song
    }

    #[test]
    fn trigger_plays_nested_track() {
        env_logger::try_init().unwrap_or(());
        let synth = RecordingSynth::default();
        let mut transport = Transport::new(triggered_song(4, 1, 2, 4, 4), &synth);

        run(&mut transport, 4);
        assert_eq!(synth.calls(), vec![Call::NoteOn(0, 60), Call::NoteOff(0, 60)]);
        assert!(!transport.is_finished());
        assert!(transport.is_playing(Lane::Track(TrackRef(0))));

        transport.step().unwrap();
        assert!(transport.is_finished());
        assert!(!transport.is_playing(Lane::Track(TrackRef(0))));
    }

    #[test]
    fn nested_track_outlives_its_trigger() {
        let synth = RecordingSynth::default();
        let mut transport = Transport::new(triggered_song(4, 2, 1, 1, 8), &synth);

        run(&mut transport, 8);

        // the trigger completed at beat 1, yet the track kept looping
        assert_eq!(
            synth.calls(),
            vec![
                Call::NoteOn(0, 60),
                Call::NoteOff(0, 60),
                Call::NoteOn(0, 60),
                Call::NoteOff(0, 60),
            ]
        );
        assert!(transport.is_playing(Lane::Track(TrackRef(0))));
    }

    #[test]
    fn stop_cancels_sounding_notes_and_nested_tracks() {
        let synth = RecordingSynth::default();
        let mut transport = Transport::new(triggered_song(16, 1, 8, 16, 16), &synth);

        run(&mut transport, 3);
        assert_eq!(synth.calls(), vec![Call::NoteOn(0, 60)]);

        transport.stop().unwrap();
        assert_eq!(synth.calls(), vec![Call::NoteOn(0, 60), Call::NoteOff(0, 60)]);
        assert!(transport.is_finished());
        assert!(!transport.is_playing(Lane::Track(TrackRef(0))));

        // stepping a stopped transport does nothing
        run(&mut transport, 4);
        assert_eq!(synth.calls().len(), 2);
    }

    #[test]
    fn looping_master_restarts() {
        let synth = RecordingSynth::default();
        let mut song = Song::default();
        song.master.set_length(2);
        song.master
            .add(TimedEvent::note(0, "Note", 0, 1, 50).unwrap());

        let mut transport = Transport::new(song, &synth);
        transport.set_looping(true);
        run(&mut transport, 4);

        assert_eq!(
            synth.calls(),
            vec![
                Call::NoteOn(0, 50),
                Call::NoteOff(0, 50),
                Call::NoteOn(0, 50),
                Call::NoteOff(0, 50),
            ]
        );
        assert!(!transport.is_finished());
        assert_eq!(transport.elapsed(), 1);
    }

    #[test]
    fn same_beat_fires_in_precedence_order() {
        let synth = RecordingSynth::default();
        let mut song = Song::default();
        let t = song.add_track();
        song.track_mut(t).unwrap().place_note(0, 70, 1).unwrap();

        // inserted backwards on purpose
        song.place_trigger(t, 0, 4).unwrap();
        song.master
            .add(TimedEvent::note(0, "Note", 5, 1, 50).unwrap());
        song.master.add(TimedEvent::change(0, "Volume", 5, 90));

        let mut transport = Transport::new(song, &synth);
        transport.step().unwrap();

        assert_eq!(synth.calls(), vec![Call::NoteOn(5, 50), Call::NoteOn(0, 70)]);
    }

    #[test]
    fn writes_elapsed_into_sequences() {
        let synth = RecordingSynth::default();
        let mut transport = Transport::new(triggered_song(3, 0, 1, 8, 8), &synth);

        run(&mut transport, 5);

        assert_eq!(transport.tick(), 5);
        assert_eq!(transport.elapsed(), 4);
        assert_eq!(transport.song().resolve(TrackRef(0)).unwrap().elapsed(), 1);
    }

    #[test]
    fn empty_master_finishes_at_once() {
        let synth = RecordingSynth::default();
        let mut song = Song::default();
        song.master.set_length(0);

        let mut transport = Transport::new(song, &synth);
        transport.step().unwrap();

        assert!(transport.is_finished());
        assert!(!transport.is_playing(Lane::Master));
        assert_eq!(transport.tick(), 0);
    }

    #[test]
    fn zero_length_track_stays_silent() {
        let synth = RecordingSynth::default();
        let mut song = triggered_song(4, 0, 1, 4, 8);
        song.track_mut(TrackRef(0)).unwrap().sequence.set_length(0);

        let mut transport = Transport::new(song, &synth);
        run(&mut transport, 2);

        assert!(synth.calls().is_empty());
        assert!(!transport.is_playing(Lane::Track(TrackRef(0))));
        assert!(!transport.is_finished());
    }

    #[test]
    fn trigger_for_missing_track_fails() {
        let synth = RecordingSynth::default();
        let mut song = Song::default();
        song.master
            .add(TimedEvent::track_trigger(0, "TrackEvent", TrackRef(3), 2).unwrap());

        let mut transport = Transport::new(song, &synth);
        assert!(matches!(
            transport.step(),
            Err(SequencerError::UnknownTrack { index: 3, count: 0 })
        ));
    }

    #[test]
    fn self_trigger_does_not_spin() {
        let synth = RecordingSynth::default();
        let mut song = Song::default();
        let t = song.add_track();
        let track = song.track_mut(t).unwrap();
        track.place_note(0, 64, 1).unwrap();
        track
            .sequence
            .add(TimedEvent::track_trigger(0, "TrackEvent", t, 1).unwrap());
        song.place_trigger(t, 0, 1).unwrap();

        let mut transport = Transport::new(song, &synth);
        transport.step().unwrap();

        assert_eq!(synth.calls(), vec![Call::NoteOn(0, 64)]);
    }
}
