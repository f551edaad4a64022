//! The `songplays` fact table.

use std::collections::HashMap;

use cadenza_core::distinct::distinct;
use cadenza_core::model::{EventRecord, SongRecord, SongplayRecord};

/// Default tolerance, in seconds, when matching event length to catalog
/// duration.
pub const DEFAULT_DURATION_TOLERANCE: f64 = 0.001;

/// Fact rows plus the number of events that found no catalog match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactTable {
    pub songplays: Vec<SongplayRecord>,
    pub unmatched_events: usize,
}

/// Joins song-play events against the catalog.
///
/// An event matches a catalog song when the artist name and title are equal
/// and the durations differ by at most the tolerance. Events without a
/// match produce no fact row.
#[derive(Debug, Clone, Copy)]
pub struct FactBuilder {
    tolerance: f64,
}

impl Default for FactBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_DURATION_TOLERANCE)
    }
}

impl FactBuilder {
    #[must_use]
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    #[must_use]
    pub fn durations_match(&self, duration: f64, length: f64) -> bool {
        (duration - length).abs() <= self.tolerance
    }

    pub fn songplays(&self, events: &[EventRecord], catalog: &[SongRecord]) -> FactTable {
        let mut index: HashMap<(&str, &str), Vec<&SongRecord>> = HashMap::new();
        for song in catalog {
            index
                .entry((song.artist_name.as_str(), song.title.as_str()))
                .or_default()
                .push(song);
        }

        let mut unmatched_events = 0;
        let mut rows = Vec::new();
        for event in events {
            let before = rows.len();
            if let Some(candidates) = index.get(&(event.artist.as_str(), event.song.as_str())) {
                rows.extend(
                    candidates
                        .iter()
                        .filter(|song| self.durations_match(song.duration, event.length))
                        .map(|song| SongplayRecord::new(event, song)),
                );
            }
            if rows.len() == before {
                unmatched_events += 1;
            }
        }

        let songplays = distinct(rows);
        log::info!(
            "Songplays: {} rows from {} events ({} without a catalog match)",
            songplays.len(),
            events.len(),
            unmatched_events
        );

        FactTable {
            songplays,
            unmatched_events,
        }
    }
}
