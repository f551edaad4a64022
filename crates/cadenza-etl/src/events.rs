//! Event reader: newline-delimited listening events.
//!
//! The page action is checked before anything else. Events for pages other
//! than `NextSong` are filtered out and never validated, so a login record
//! with no song fields is an exclusion rather than a parse failure.

use std::path::Path;

use cadenza_core::model::{EventRecord, NEXT_SONG};
use cadenza_core::table::utc_millis;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{EtlError, EtlResult};
use crate::source::{self, ParsePolicy, Parsed};

/// An id that some producers emit as a JSON string and others as a number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdValue {
    Int(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    artist: Option<String>,
    song: Option<String>,
    length: Option<f64>,
    level: Option<String>,
    session_id: Option<IdValue>,
    location: Option<String>,
    user_agent: Option<String>,
    ts: Option<i64>,
    user_id: Option<IdValue>,
    first_name: Option<String>,
    last_name: Option<String>,
    gender: Option<String>,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, String> {
    value.ok_or_else(|| format!("missing field `{field}`"))
}

impl RawEvent {
    fn into_record(self, page: String) -> Result<EventRecord, String> {
        let ts = required(self.ts, "ts")?;
        let start_time =
            utc_millis(ts).ok_or_else(|| format!("ts {ts} is outside the representable range"))?;

        let session_id = match required(self.session_id, "sessionId")? {
            IdValue::Int(id) => id,
            IdValue::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| format!("sessionId `{text}` is not an integer"))?,
        };

        let user_id = match required(self.user_id, "userId")? {
            IdValue::Int(id) => id.to_string(),
            IdValue::Text(text) if text.trim().is_empty() => {
                return Err("empty `userId`".to_string())
            }
            IdValue::Text(text) => text,
        };

        Ok(EventRecord {
            artist: required(self.artist, "artist")?,
            song: required(self.song, "song")?,
            length: required(self.length, "length")?,
            level: required(self.level, "level")?,
            session_id,
            location: self.location,
            user_agent: self.user_agent,
            ts,
            start_time,
            user_id,
            first_name: self.first_name,
            last_name: self.last_name,
            gender: self.gender,
            page,
        })
    }
}

/// Parse one event line.
///
/// Returns `Ok(None)` for events whose page is not `NextSong`.
pub fn parse_event(line: &str) -> Result<Option<EventRecord>, String> {
    let value: Value = serde_json::from_str(line).map_err(|e| e.to_string())?;
    let page = required(value.get("page").and_then(Value::as_str), "page")?;
    if page != NEXT_SONG {
        return Ok(None);
    }
    let page = page.to_string();
    let raw: RawEvent = serde_json::from_value(value).map_err(|e| e.to_string())?;
    raw.into_record(page).map(Some)
}

/// Song-play events plus counts of what was left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventBatch {
    pub events: Vec<EventRecord>,
    /// Events dropped by the page-action filter.
    pub filtered: usize,
    /// Malformed events dropped under [`ParsePolicy::Skip`].
    pub skipped: usize,
}

/// Reads event logs into `NextSong` [`EventRecord`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventReader {
    policy: ParsePolicy,
}

impl EventReader {
    #[must_use]
    pub fn new(policy: ParsePolicy) -> Self {
        Self { policy }
    }

    /// Read every `*.json` file under `root`.
    pub fn read_dir(&self, root: &Path) -> EtlResult<EventBatch> {
        let mut batch = EventBatch::default();
        let files = source::json_files(root)?;
        log::debug!("Reading {} event files under {}", files.len(), root.display());

        for path in &files {
            let content = source::read_to_string(path)?;
            let next = self.read_str(&path.display().to_string(), &content)?;
            batch.events.extend(next.events);
            batch.filtered += next.filtered;
            batch.skipped += next.skipped;
        }

        log::info!(
            "Events: {} song plays from {} files ({} filtered by page, {} skipped)",
            batch.events.len(),
            files.len(),
            batch.filtered,
            batch.skipped
        );
        Ok(batch)
    }

    /// Parse one newline-delimited document. `origin` names it in errors.
    pub fn read_str(&self, origin: &str, content: &str) -> EtlResult<EventBatch> {
        let mut parsed = Parsed::default();
        let mut filtered = 0;

        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let result = match parse_event(line) {
                Ok(Some(event)) => Ok(event),
                Ok(None) => {
                    filtered += 1;
                    continue;
                }
                Err(message) => Err(EtlError::parse(format!("{origin} line {}", idx + 1), message)),
            };
            parsed.accept(self.policy, result)?;
        }

        Ok(EventBatch {
            events: parsed.records,
            filtered,
            skipped: parsed.skipped,
        })
    }
}
