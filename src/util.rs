use crate::model::song::Song;
use std::time::Duration;

/// Wall-clock length of one beat at `tempo` bpm. A tempo of 0 is treated as 1.
pub fn beat_duration(tempo: u32) -> Duration {
    Duration::from_secs_f64(60.0 / tempo.max(1) as f64)
}

/// Human-readable summary of a song: a header, one line per track, then at most `max_events`
/// events in playback order, each prefixed by where it lives.
pub fn preview(song: &Song, max_events: usize) -> Vec<String> {
    let mut lines = vec![format!(
        "Song: {} bpm, {} track(s), master length {} beat(s)",
        song.tempo,
        song.track_count(),
        song.master.length()
    )];

    for track in &song.tracks {
        lines.push(format!(
            "Track {}: instrument {}, volume {}, {} beat(s), {} event(s)",
            track.number,
            track.instrument,
            track.volume,
            track.sequence.length(),
            track.sequence.event_count()
        ));
    }

    let tracks = song
        .tracks
        .iter()
        .flat_map(|t| {
            t.sequence
                .sorted()
                .into_iter()
                .map(move |e| (format!("track {}", t.number), e))
        });
    let master = song
        .master
        .sorted()
        .into_iter()
        .map(|e| ("master".to_owned(), e));

    for (i, (place, event)) in tracks.chain(master).enumerate() {
        if i >= max_events {
            lines.push(format!("... {} more", song.event_count() - max_events));
            break;
        }
        lines.push(format!("{:>8} | {}", place, event));
    }

    lines
}
