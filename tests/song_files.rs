// Save/load cycle against real files, then playback of what was loaded.

use sound_sketcher::{
    CodecError, ConsoleSynth, FormatErrorKind, Lane, Song, TimedEvent, Transport, TrackRef,
    load_song, reload_song, save_song,
};
use std::fs;
use tempfile::tempdir;

fn two_track_song() -> Song {
    let mut song = Song::new(140);
    let drums = song.add_track();
    let bass = song.add_track();

    let track = song.track_mut(drums).unwrap();
    track.instrument = 118;
    track.sequence.set_length(4);
    track.place_note(0, 36, 1).unwrap();
    track.place_note(2, 38, 1).unwrap();

    let track = song.track_mut(bass).unwrap();
    track.instrument = 33;
    track.volume = 90;
    track.sequence.set_length(8);
    track.place_note(0, 40, 3).unwrap();
    track.sequence.add(TimedEvent::change(4, "Volume", 1, -10));

    song.master.set_length(16);
    song.place_trigger(bass, 0, 8).unwrap();

    song
}

#[test]
fn test_save_and_load_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("groove.song");
    let song = two_track_song();

    save_song(&path, &song).unwrap();
    let loaded = load_song(&path).unwrap();

    assert_eq!(loaded, song);
    assert_eq!(loaded.tempo, 140);
    assert_eq!(loaded.track_count(), 2);
    assert_eq!(loaded.event_count(), 5);

    let trigger = loaded.master.iter().next().unwrap();
    assert_eq!(trigger.nested(), Some(TrackRef(1)));
    assert_eq!(loaded.resolve(TrackRef(1)).unwrap().length(), 8);
}

#[test]
fn test_failed_reload_keeps_current_song() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.song");

    save_song(&path, &two_track_song()).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    // point the master trigger at a track that does not exist
    let broken = text.replace("TrackEvent\n0\n1\n", "TrackEvent\n0\n7\n");
    fs::write(&path, broken).unwrap();

    let mut current = Song::new(90);
    current.add_track();
    let before = current.clone();

    match reload_song(&mut current, &path) {
        Err(CodecError::Format(err)) => {
            assert_eq!(err.track, None);
            assert_eq!(
                err.kind,
                FormatErrorKind::UnresolvedTrack {
                    index: 7,
                    available: 2
                }
            );
        }
        other => panic!("expected a format error, got {:?}", other),
    }

    assert_eq!(current, before);
}

#[test]
fn test_reload_replaces_song() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("groove.song");
    save_song(&path, &two_track_song()).unwrap();

    let mut current = Song::default();
    reload_song(&mut current, &path).unwrap();

    assert_eq!(current, two_track_song());
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempdir().unwrap();

    assert!(matches!(
        load_song(dir.path().join("nowhere.song")),
        Err(CodecError::Io(_))
    ));
}

#[test]
fn test_loaded_song_plays() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("groove.song");
    save_song(&path, &two_track_song()).unwrap();

    let synth = ConsoleSynth::new();
    let mut transport = Transport::new(load_song(&path).unwrap(), &synth);

    transport.step().unwrap();
    assert!(transport.is_playing(Lane::Track(TrackRef(1))));
    assert!(!transport.is_playing(Lane::Track(TrackRef(0))));
    assert_eq!(synth.sounding(1), vec![40]);

    for _ in 0..3 {
        transport.step().unwrap();
    }
    assert!(synth.sounding(1).is_empty());

    transport.stop().unwrap();
    assert!(transport.is_finished());
}
