use crate::model::dynamic::DynamicSequence;
use crate::model::event::TimedEvent;
use serde::Serialize;

pub const DEFAULT_LENGTH: u32 = 16;

/// The events of one track (or of the song's master lane) plus its length in beats.
///
/// Events are kept in insertion order. Call [`EventSequence::sort`] or use
/// [`EventSequence::sorted`] before playing; the sequence does not keep itself ordered.
/// `elapsed` is the current playback position. It is written by whatever drives playback and
/// only stored here.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct EventSequence {
    length: u32,
    #[serde(skip)]
    elapsed: u32,
    events: DynamicSequence<TimedEvent>,
}

impl EventSequence {
    pub fn new(length: u32) -> Self {
        Self {
            length,
            elapsed: 0,
            events: DynamicSequence::new(),
        }
    }

    pub fn add(&mut self, event: TimedEvent) {
        self.events.append(event);
    }

    /// Removes the first event equal to `event` in every field. Returns whether one was found.
    pub fn remove(&mut self, event: &TimedEvent) -> bool {
        self.events.remove_value(event).is_some()
    }

    /// Removes the first event matching `predicate`.
    pub fn remove_where<F>(&mut self, predicate: F) -> Option<TimedEvent>
    where
        F: FnMut(&TimedEvent) -> bool,
    {
        self.events.remove_first_where(predicate)
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.elapsed = 0;
    }

    /// Replaces every event with `events`, keeping the length.
    pub fn replace_all<I: IntoIterator<Item = TimedEvent>>(&mut self, events: I) {
        self.clear();
        for event in events {
            self.add(event);
        }
    }

    /// Orders events by [`TimedEvent::compare`]. Ties keep insertion order.
    pub fn sort(&mut self) {
        self.events.sort_by(TimedEvent::compare);
    }

    /// A copy of the events in playback order, leaving this sequence as it is.
    pub fn sorted(&self) -> Vec<TimedEvent> {
        let mut events = self.events.as_slice().to_vec();
        events.sort_by(TimedEvent::compare);
        events
    }

    pub fn set_length(&mut self, length: u32) {
        self.length = length;
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }

    pub fn set_elapsed(&mut self, beats: u32) {
        self.elapsed = beats;
    }

    /// Beats until the last event finishes, or the length if that is longer.
    pub fn duration(&self) -> u32 {
        self.events
            .iter()
            .map(TimedEvent::end_time)
            .max()
            .unwrap_or(0)
            .max(self.length)
    }

    pub fn events(&self) -> &DynamicSequence<TimedEvent> {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimedEvent> {
        self.events.iter()
    }
}

impl Default for EventSequence {
    fn default() -> Self {
        Self::new(DEFAULT_LENGTH)
    }
}

impl<'a> IntoIterator for &'a EventSequence {
    type Item = &'a TimedEvent;
    type IntoIter = std::slice::Iter<'a, TimedEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::event::{EventKind, TrackRef};

    fn note(time: u32, pitch: u8) -> TimedEvent {
        TimedEvent::note(time, "Note", 0, 2, pitch).unwrap()
    }

    #[test]
    fn add_keeps_insertion_order_until_sorted() {
        let mut seq = EventSequence::new(16);
        seq.add(note(8, 60));
        seq.add(TimedEvent::track_trigger(4, "TrackEvent", TrackRef(0), 2).unwrap());
        seq.add(note(4, 62));
        seq.add(TimedEvent::change(4, "Volume", 0, 90));

        let times: Vec<u32> = seq.iter().map(TimedEvent::time).collect();
        assert_eq!(times, vec![8, 4, 4, 4]);

        seq.sort();
        let order: Vec<(u32, &str)> = seq.iter().map(|e| (e.time(), e.kind().tag())).collect();
        assert_eq!(
            order,
            vec![(4, "change"), (4, "note"), (4, "track"), (8, "note")]
        );
    }

    #[test]
    fn sorted_leaves_original_alone() {
        let mut seq = EventSequence::new(16);
        seq.add(note(3, 60));
        seq.add(note(1, 61));

        let sorted = seq.sorted();
        assert_eq!(sorted[0].time(), 1);
        assert_eq!(seq.events().get(0).unwrap().time(), 3);
    }

    #[test]
    fn remove_matches_every_field() {
        let mut seq = EventSequence::new(16);
        seq.add(note(4, 60));
        seq.add(note(4, 64));

        // same time and kind, so `compare` says Equal, but a different pitch
        assert!(!seq.remove(&note(4, 67)));
        assert_eq!(seq.event_count(), 2);

        assert!(seq.remove(&note(4, 64)));
        assert_eq!(seq.event_count(), 1);
        assert_eq!(
            seq.events().get(0).unwrap().kind(),
            &EventKind::Note {
                duration: 2,
                pitch: 60
            }
        );
    }

    #[test]
    fn length_and_elapsed_are_stored_not_advanced() {
        let mut seq = EventSequence::default();
        assert_eq!(seq.length(), DEFAULT_LENGTH);

        seq.set_length(32);
        seq.set_elapsed(5);
        seq.add(note(30, 60));

        assert_eq!(seq.length(), 32);
        assert_eq!(seq.elapsed(), 5);
        assert_eq!(seq.duration(), 32);

        seq.add(note(31, 60));
        assert_eq!(seq.duration(), 33);
    }

    #[test]
    fn replace_all_swaps_contents() {
        let mut seq = EventSequence::new(8);
        seq.add(note(0, 60));
        seq.replace_all(vec![note(1, 61), note(2, 62)]);

        assert_eq!(seq.event_count(), 2);
        assert_eq!(seq.length(), 8);
        assert!(seq.iter().all(|e| e.time() > 0));
    }
}
