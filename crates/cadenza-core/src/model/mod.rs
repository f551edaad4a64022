pub mod artist;
pub mod event;
pub mod song;
pub mod songplay;
pub mod time;
pub mod user;

pub use artist::ArtistRecord;
pub use event::{EventRecord, NEXT_SONG};
pub use song::{SongRecord, SongRow};
pub use songplay::SongplayRecord;
pub use time::TimeRecord;
pub use user::UserRecord;
