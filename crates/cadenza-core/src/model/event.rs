use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::time::TimeRecord;
use crate::model::user::UserRecord;

/// Page action that marks a song play. Every other page action is
/// navigation or session bookkeeping.
pub const NEXT_SONG: &str = "NextSong";

/// A song-play event from the listening log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub artist: String,
    pub song: String,
    /// Track length in seconds, as reported by the player.
    pub length: f64,
    pub level: String,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
    /// Epoch milliseconds.
    pub ts: i64,
    /// `ts` as a UTC instant.
    pub start_time: DateTime<Utc>,
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub page: String,
}

impl EventRecord {
    #[must_use]
    pub fn is_song_play(&self) -> bool {
        self.page == NEXT_SONG
    }

    /// Projection onto the `users` dimension.
    #[must_use]
    pub fn user(&self) -> UserRecord {
        UserRecord {
            user_id: self.user_id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            gender: self.gender.clone(),
            level: self.level.clone(),
        }
    }

    /// Projection onto the `time` dimension.
    #[must_use]
    pub fn time(&self) -> TimeRecord {
        TimeRecord::from_start_time(self.start_time)
    }
}
