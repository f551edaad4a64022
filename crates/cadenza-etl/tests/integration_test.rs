//! Integration tests for the full song_data → log_data → commit pipeline.
//!
//! Each test lays out catalog and event files in a temp directory, runs the
//! workflow against a fresh state store, and reads the published tables
//! back from Parquet.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use cadenza_core::model::{ArtistRecord, SongRow, SongplayRecord, TimeRecord, UserRecord};
use cadenza_etl::config::Credentials;
use cadenza_etl::{
    build_pipeline, read_table, run_to_completion, BatchRun, EtlError, ParsePolicy, RunLedger,
    Settings, UserGranularity, ALL_TABLES,
};
use tempfile::TempDir;

fn song_json(song_id: &str, title: &str, duration: f64, location: &str) -> String {
    format!(
        r#"{{"num_songs": 1, "artist_id": "A1", "artist_latitude": null, "artist_longitude": null, "artist_location": "{location}", "artist_name": "Eminem", "song_id": "{song_id}", "title": "{title}", "duration": {duration}, "year": 2002}}"#
    )
}

fn event_json(page: &str, length: f64, ts: i64, level: &str) -> String {
    format!(
        r#"{{"artist":"Eminem","auth":"Logged In","firstName":"Jacob","gender":"M","itemInSession":0,"lastName":"Klein","length":{length},"level":"{level}","location":"X","method":"PUT","page":"{page}","registration":1540558108796.0,"sessionId":100,"song":"Lose Yourself","status":200,"ts":{ts},"userAgent":"UA","userId":"26"}}"#
    )
}

fn settings(root: &Path) -> Settings {
    Settings {
        credentials: Credentials {
            access_key_id: "id".to_string(),
            secret_access_key: "secret".to_string(),
        },
        input_data: root.join("input"),
        output_data: root.join("output"),
        catalog_dir: "song_data".to_string(),
        events_dir: "event_log".to_string(),
        on_malformed: ParsePolicy::Abort,
        user_granularity: UserGranularity::History,
        duration_tolerance_secs: 0.001,
        state_path: root.join("pipeline.db"),
    }
}

fn write_catalog(settings: &Settings, name: &str, content: &str) {
    let dir = settings.catalog_root().join("A").join("A");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), content).unwrap();
}

fn write_events(settings: &Settings, name: &str, lines: &[String]) {
    let dir = settings.events_root().join("2018").join("11");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), lines.join("\n")).unwrap();
}

async fn run_job(settings: Settings) -> (Arc<RunLedger>, Result<(), EtlError>) {
    let settings = Arc::new(settings);
    let ledger = Arc::new(RunLedger::new());
    let workflow = build_pipeline(Arc::clone(&settings), Arc::clone(&ledger)).unwrap();
    let mut store = treadle::SqliteStateStore::open(&settings.state_path)
        .await
        .unwrap();

    let run = BatchRun::new();
    // Stage failures are asserted through the ledger check below.
    if let Err(e) = run_to_completion(&workflow, &run, &mut store, &ledger).await {
        eprintln!("workflow stopped: {e}");
    }
    let result = ledger.ensure_published(ALL_TABLES);
    (ledger, result)
}

/// Test that the pipeline can be built and wired correctly
#[tokio::test]
async fn test_pipeline_construction() {
    let temp_dir = TempDir::new().unwrap();
    let result = build_pipeline(
        Arc::new(settings(temp_dir.path())),
        Arc::new(RunLedger::new()),
    );
    assert!(result.is_ok(), "Pipeline should build successfully");
}

#[tokio::test]
async fn test_end_to_end_publishes_every_table() {
    let temp_dir = TempDir::new().unwrap();
    let settings = settings(temp_dir.path());
    write_catalog(
        &settings,
        "TRAAAAW128F429D538.json",
        &song_json("S1", "Lose Yourself", 326.43, "Detroit"),
    );
    write_events(
        &settings,
        "2018-11-03-events.json",
        &[
            event_json("NextSong", 326.43, 1_541_207_953_796, "free"),
            event_json("Login", 326.43, 1_541_207_000_000, "free"),
        ],
    );
    let output = settings.output_data.clone();

    let (ledger, result) = run_job(settings).await;
    result.unwrap();
    assert_eq!(ledger.published().len(), ALL_TABLES.len());

    // Scenario A: exactly one fact row carrying the catalog ids.
    let plays: Vec<SongplayRecord> = read_table(&output).unwrap();
    assert_eq!(plays.len(), 1);
    let play = &plays[0];
    assert_eq!(play.song_id, "S1");
    assert_eq!(play.artist_id, "A1");
    assert_eq!(play.user_id, "26");
    assert_eq!(play.level, "free");
    assert_eq!(play.session_id, 100);
    assert!(output.join("songplay/year=2018/month=11").is_dir());

    // Scenario B: the Login event contributes nothing.
    let users: Vec<UserRecord> = read_table(&output).unwrap();
    let time: Vec<TimeRecord> = read_table(&output).unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(time.len(), 1);
    assert_eq!(time[0].start_time.timestamp_millis(), 1_541_207_953_796);
    assert_eq!((time[0].day, time[0].weekday, time[0].week), (3, 6, 44));

    let songs: Vec<SongRow> = read_table(&output).unwrap();
    let artists: Vec<ArtistRecord> = read_table(&output).unwrap();
    assert_eq!(songs.len(), 1);
    assert_eq!(artists.len(), 1);
    assert!(output.join("songs/year=2002/artist_id=A1").is_dir());
    assert!(!output.join("_staging").exists());
}

#[tokio::test]
async fn test_duplicate_catalog_rows_collapse() {
    // Scenario C: only an unused field differs, by whitespace.
    let temp_dir = TempDir::new().unwrap();
    let settings = settings(temp_dir.path());
    write_catalog(
        &settings,
        "a.json",
        &song_json("S1", "Lose Yourself", 326.43, "Detroit"),
    );
    write_catalog(
        &settings,
        "b.json",
        &song_json("S1", "Lose Yourself", 326.43, "Detroit "),
    );
    write_events(&settings, "events.json", &[]);
    let output = settings.output_data.clone();

    let (_, result) = run_job(settings).await;
    result.unwrap();

    let songs: Vec<SongRow> = read_table(&output).unwrap();
    assert_eq!(songs.len(), 1);
    let artists: Vec<ArtistRecord> = read_table(&output).unwrap();
    assert_eq!(artists.len(), 1);
    assert!(read_table::<SongplayRecord>(&output).unwrap().is_empty());
}

#[tokio::test]
async fn test_length_beyond_tolerance_is_excluded() {
    // Scenario D: 0.01 s off the catalog duration.
    let temp_dir = TempDir::new().unwrap();
    let settings = settings(temp_dir.path());
    write_catalog(
        &settings,
        "a.json",
        &song_json("S1", "Lose Yourself", 326.43, "Detroit"),
    );
    write_events(
        &settings,
        "events.json",
        &[event_json("NextSong", 326.44, 1_541_207_953_796, "free")],
    );
    let output = settings.output_data.clone();

    let (_, result) = run_job(settings).await;
    result.unwrap();

    assert!(read_table::<SongplayRecord>(&output).unwrap().is_empty());
    // The event still counts as a song play for the other dimensions.
    assert_eq!(read_table::<UserRecord>(&output).unwrap().len(), 1);
    assert_eq!(read_table::<TimeRecord>(&output).unwrap().len(), 1);
}

#[tokio::test]
async fn test_rerun_yields_same_tables() {
    let temp_dir = TempDir::new().unwrap();
    let mut settings = settings(temp_dir.path());
    settings.user_granularity = UserGranularity::Latest;
    write_catalog(
        &settings,
        "a.json",
        &song_json("S1", "Lose Yourself", 326.43, "Detroit"),
    );
    write_events(
        &settings,
        "events.json",
        &[
            event_json("NextSong", 326.43, 1_541_207_953_796, "free"),
            event_json("NextSong", 326.43, 1_541_300_000_000, "paid"),
        ],
    );
    let output = settings.output_data.clone();

    let (_, first) = run_job(settings.clone()).await;
    first.unwrap();
    let mut plays_first: Vec<SongplayRecord> = read_table(&output).unwrap();
    let users_first: Vec<UserRecord> = read_table(&output).unwrap();

    let (_, second) = run_job(settings).await;
    second.unwrap();
    let mut plays_second: Vec<SongplayRecord> = read_table(&output).unwrap();
    let users_second: Vec<UserRecord> = read_table(&output).unwrap();

    plays_first.sort_by_key(|p| p.start_time);
    plays_second.sort_by_key(|p| p.start_time);
    assert_eq!(plays_first.len(), 2);
    assert_eq!(plays_first, plays_second);
    assert_eq!(users_first, users_second);
    assert_eq!(users_first.len(), 1);
    assert_eq!(users_first[0].level, "paid");
}

#[tokio::test]
async fn test_malformed_input_leaves_prior_output_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let settings = settings(temp_dir.path());
    write_catalog(
        &settings,
        "a.json",
        &song_json("S1", "Lose Yourself", 326.43, "Detroit"),
    );
    write_events(
        &settings,
        "events.json",
        &[event_json("NextSong", 326.43, 1_541_207_953_796, "free")],
    );
    let output = settings.output_data.clone();

    let (_, first) = run_job(settings.clone()).await;
    first.unwrap();

    write_events(&settings, "zz-broken.json", &["{not json".to_string()]);
    let (ledger, second) = run_job(settings).await;

    assert!(matches!(second, Err(EtlError::Incomplete { .. })));
    assert!(ledger.published().is_empty());
    let plays: Vec<SongplayRecord> = read_table(&output).unwrap();
    assert_eq!(plays.len(), 1);
    // The failed run leaves no staged tables behind.
    assert!(!output.join("_staging").exists());
}
