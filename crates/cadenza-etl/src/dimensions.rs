//! Dimension tables: `songs`, `artists`, `users`, `time`.
//!
//! Each dimension is a projection followed by a full-row distinct. `songs`
//! and `artists` then collapse conflicting rows that share a key down to one
//! canonical row, so the result is the same for any input order.

use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use cadenza_core::distinct::distinct;
use cadenza_core::model::{ArtistRecord, EventRecord, SongRecord, SongRow, TimeRecord, UserRecord};
use serde::{Deserialize, Serialize};

/// How the `users` dimension treats a user whose level changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserGranularity {
    /// One row per distinct (user, level) tuple.
    #[default]
    History,
    /// One row per user, with the level of their most recent event.
    Latest,
}

/// Keep one row per key, choosing the smallest under `cmp`.
///
/// Returns the rows ordered by key and the number of keys that had more
/// than one candidate.
fn collapse_by<T, K, F, C>(rows: Vec<T>, key: F, cmp: C) -> (Vec<T>, usize)
where
    K: Ord,
    F: Fn(&T) -> K,
    C: Fn(&T, &T) -> Ordering,
{
    let mut chosen: BTreeMap<K, (T, bool)> = BTreeMap::new();
    for row in rows {
        match chosen.entry(key(&row)) {
            Entry::Vacant(slot) => {
                slot.insert((row, false));
            }
            Entry::Occupied(mut slot) => {
                let (current, conflicted) = slot.get_mut();
                *conflicted = true;
                if cmp(&row, current) == Ordering::Less {
                    *current = row;
                }
            }
        }
    }

    let conflicts = chosen.values().filter(|(_, conflicted)| *conflicted).count();
    (chosen.into_values().map(|(row, _)| row).collect(), conflicts)
}

/// Most recent event first; the greater level breaks `ts` ties.
fn most_recent_first(a: &&EventRecord, b: &&EventRecord) -> Ordering {
    b.ts.cmp(&a.ts).then_with(|| b.level.cmp(&a.level))
}

/// Builds the dimension tables from reader output.
#[derive(Debug, Clone, Copy, Default)]
pub struct DimensionBuilder {
    user_granularity: UserGranularity,
}

impl DimensionBuilder {
    #[must_use]
    pub fn new(user_granularity: UserGranularity) -> Self {
        Self { user_granularity }
    }

    /// One row per `song_id`.
    pub fn songs(&self, catalog: &[SongRecord]) -> Vec<SongRow> {
        let rows = distinct(catalog.iter().map(SongRecord::song_row));
        let (songs, conflicts) = collapse_by(rows, |r| r.song_id.clone(), SongRow::canonical_cmp);
        if conflicts > 0 {
            log::warn!("{conflicts} song ids carry conflicting attributes; kept one row each");
        }
        songs
    }

    /// One row per `artist_id`.
    pub fn artists(&self, catalog: &[SongRecord]) -> Vec<ArtistRecord> {
        let rows = distinct(catalog.iter().map(SongRecord::artist));
        let (artists, conflicts) =
            collapse_by(rows, |r| r.artist_id.clone(), ArtistRecord::canonical_cmp);
        if conflicts > 0 {
            log::debug!("{conflicts} artist ids had differing attributes; kept the most complete");
        }
        artists
    }

    /// Users seen in song-play events, per the configured granularity.
    pub fn users(&self, events: &[EventRecord]) -> Vec<UserRecord> {
        match self.user_granularity {
            UserGranularity::History => distinct(events.iter().map(EventRecord::user)),
            UserGranularity::Latest => {
                let plays: Vec<&EventRecord> = events.iter().collect();
                let (chosen, _) = collapse_by(plays, |e| e.user_id.clone(), most_recent_first);
                chosen.into_iter().map(EventRecord::user).collect()
            }
        }
    }

    /// One row per distinct `start_time`, with derived calendar fields.
    pub fn time(&self, events: &[EventRecord]) -> Vec<TimeRecord> {
        distinct(events.iter().map(EventRecord::time))
    }
}
