use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, Row, params};
use thiserror::Error;

use crate::player::PlaybackState;

#[derive(Debug, Error)]
pub enum ConstraintViolation {
    #[error("an episode with guid `{0}` already exists")]
    DuplicateGuid(String),
}

/// One podcast episode with its playback and download status.
///
/// `id` is the store-assigned surrogate key: zero until the record has been
/// inserted, immutable afterwards. `guid` is unique across the collection and
/// doubles as the media id of the playback session. An empty `audio` field
/// means the episode has no playable content.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Episode {
    pub id: i64,
    pub podcast_id: i64,
    pub guid: String,
    pub title: String,
    pub description: String,
    pub audio: String,
    pub cover: String,
    pub small_cover: String,
    pub publication_date: i64,
    pub playback_state: PlaybackState,
    pub playback_position: i64,
    pub duration: i64,
    pub manually_downloaded: bool,
    pub manually_deleted: bool,
    pub remote_cover_file_location: String,
    pub remote_audio_file_location: String,
}

/// Looks up an episode by media id in an in-memory collection slice.
///
/// A missing id yields the default record, whose empty `audio` field marks it
/// as not playable. Callers deciding staleness key off `audio` alone.
pub fn episode_for_media_id(episodes: &[Episode], media_id: &str) -> Episode {
    episodes
        .iter()
        .find(|episode| episode.guid == media_id)
        .cloned()
        .unwrap_or_default()
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS episodes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                podcast_id INTEGER NOT NULL,
                guid TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                audio TEXT NOT NULL,
                cover TEXT NOT NULL,
                small_cover TEXT NOT NULL,
                publication_date INTEGER NOT NULL,
                playback_state INTEGER NOT NULL,
                playback_position INTEGER NOT NULL,
                duration INTEGER NOT NULL,
                manually_downloaded INTEGER NOT NULL,
                manually_deleted INTEGER NOT NULL,
                remote_cover_file_location TEXT NOT NULL,
                remote_audio_file_location TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_episodes_guid ON episodes(guid);
            CREATE INDEX IF NOT EXISTS idx_episodes_publication_date
                ON episodes(publication_date DESC);
            "#,
        )?;
        Ok(())
    }

    /// Inserts a new episode and returns its store-assigned id. Inserting a
    /// second record with an existing guid fails with `ConstraintViolation`
    /// and leaves the first record untouched.
    pub fn insert_episode(&self, episode: &Episode) -> Result<i64> {
        let inserted = self.conn.execute(
            r#"
            INSERT INTO episodes (
                podcast_id, guid, title, description, audio, cover, small_cover,
                publication_date, playback_state, playback_position, duration,
                manually_downloaded, manually_deleted,
                remote_cover_file_location, remote_audio_file_location
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                episode.podcast_id,
                episode.guid,
                episode.title,
                episode.description,
                episode.audio,
                episode.cover,
                episode.small_cover,
                episode.publication_date,
                episode.playback_state.code(),
                episode.playback_position,
                episode.duration,
                episode.manually_downloaded,
                episode.manually_deleted,
                episode.remote_cover_file_location,
                episode.remote_audio_file_location,
            ],
        );
        match inserted {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(ConstraintViolation::DuplicateGuid(episode.guid.clone()).into())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn episode_by_guid(&self, guid: &str) -> Result<Option<Episode>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, podcast_id, guid, title, description, audio, cover, small_cover,
                    publication_date, playback_state, playback_position, duration,
                    manually_downloaded, manually_deleted,
                    remote_cover_file_location, remote_audio_file_location
             FROM episodes WHERE guid = ?1",
        )?;
        let mut rows = stmt.query(params![guid])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(episode_from_row(row)?));
        }
        Ok(None)
    }

    pub fn list_episodes(&self) -> Result<Vec<Episode>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, podcast_id, guid, title, description, audio, cover, small_cover,
                    publication_date, playback_state, playback_position, duration,
                    manually_downloaded, manually_deleted,
                    remote_cover_file_location, remote_audio_file_location
             FROM episodes ORDER BY publication_date DESC",
        )?;
        let rows = stmt.query_map([], episode_from_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn update_playback_progress(
        &self,
        guid: &str,
        state: PlaybackState,
        position: i64,
        duration: i64,
    ) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE episodes
             SET playback_state = ?2, playback_position = ?3, duration = ?4
             WHERE guid = ?1",
            params![guid, state.code(), position, duration],
        )?;
        Ok(changed > 0)
    }

    pub fn set_manually_downloaded(&self, guid: &str, downloaded: bool) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE episodes SET manually_downloaded = ?2 WHERE guid = ?1",
            params![guid, downloaded],
        )?;
        Ok(changed > 0)
    }

    /// Marking an episode as manually deleted also clears its local audio
    /// location, which in turn invalidates any player snapshot pointing at it.
    pub fn set_manually_deleted(&self, guid: &str, deleted: bool) -> Result<bool> {
        let changed = if deleted {
            self.conn.execute(
                "UPDATE episodes SET manually_deleted = 1, audio = '' WHERE guid = ?1",
                params![guid],
            )?
        } else {
            self.conn.execute(
                "UPDATE episodes SET manually_deleted = 0 WHERE guid = ?1",
                params![guid],
            )?
        };
        Ok(changed > 0)
    }
}

fn episode_from_row(row: &Row) -> rusqlite::Result<Episode> {
    Ok(Episode {
        id: row.get(0)?,
        podcast_id: row.get(1)?,
        guid: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        audio: row.get(5)?,
        cover: row.get(6)?,
        small_cover: row.get(7)?,
        publication_date: row.get(8)?,
        playback_state: PlaybackState::from_code(row.get(9)?),
        playback_position: row.get(10)?,
        duration: row.get(11)?,
        manually_downloaded: row.get(12)?,
        manually_deleted: row.get(13)?,
        remote_cover_file_location: row.get(14)?,
        remote_audio_file_location: row.get(15)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_episode(guid: &str) -> Episode {
        Episode {
            podcast_id: 1,
            guid: guid.to_string(),
            title: format!("Episode {guid}"),
            description: "A test episode".to_string(),
            audio: format!("/audio/{guid}.mp3"),
            cover: "/covers/large.jpg".to_string(),
            small_cover: "/covers/small.jpg".to_string(),
            publication_date: 1_700_000_000,
            playback_state: PlaybackState::Stopped,
            remote_cover_file_location: "https://example.org/cover.jpg".to_string(),
            remote_audio_file_location: format!("https://example.org/{guid}.mp3"),
            ..Episode::default()
        }
    }

    fn open_db() -> Database {
        let db = Database::open_in_memory().expect("in-memory database");
        db.migrate().expect("migration should succeed");
        db
    }

    #[test]
    fn insert_assigns_surrogate_key() {
        let db = open_db();
        let first = db.insert_episode(&sample_episode("guid-1")).unwrap();
        let second = db.insert_episode(&sample_episode("guid-2")).unwrap();
        assert!(first > 0);
        assert!(second > first);

        let stored = db.episode_by_guid("guid-1").unwrap().expect("episode exists");
        assert_eq!(stored.id, first);
        assert_eq!(stored.title, "Episode guid-1");
    }

    #[test]
    fn duplicate_guid_fails_and_keeps_first_record() {
        let db = open_db();
        db.insert_episode(&sample_episode("guid-1")).unwrap();

        let mut duplicate = sample_episode("guid-1");
        duplicate.title = "Impostor".to_string();
        let err = db.insert_episode(&duplicate).expect_err("duplicate should fail");
        assert!(err.downcast_ref::<ConstraintViolation>().is_some());

        let stored = db.episode_by_guid("guid-1").unwrap().expect("episode exists");
        assert_eq!(stored.title, "Episode guid-1");
    }

    #[test]
    fn list_orders_by_publication_date_descending() {
        let db = open_db();
        let mut older = sample_episode("older");
        older.publication_date = 1_600_000_000;
        let mut newer = sample_episode("newer");
        newer.publication_date = 1_800_000_000;
        db.insert_episode(&older).unwrap();
        db.insert_episode(&newer).unwrap();

        let listed = db.list_episodes().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].guid, "newer");
        assert_eq!(listed[1].guid, "older");
    }

    #[test]
    fn playback_progress_updates_round_trip() {
        let db = open_db();
        db.insert_episode(&sample_episode("guid-1")).unwrap();

        let changed = db
            .update_playback_progress("guid-1", PlaybackState::Paused, 90_000, 3_600_000)
            .unwrap();
        assert!(changed);

        let stored = db.episode_by_guid("guid-1").unwrap().expect("episode exists");
        assert_eq!(stored.playback_state, PlaybackState::Paused);
        assert_eq!(stored.playback_position, 90_000);
        assert_eq!(stored.duration, 3_600_000);

        let missing = db
            .update_playback_progress("no-such", PlaybackState::Playing, 0, 0)
            .unwrap();
        assert!(!missing);
    }

    #[test]
    fn manual_deletion_clears_audio_location() {
        let db = open_db();
        db.insert_episode(&sample_episode("guid-1")).unwrap();

        assert!(db.set_manually_deleted("guid-1", true).unwrap());
        let stored = db.episode_by_guid("guid-1").unwrap().expect("episode exists");
        assert!(stored.manually_deleted);
        assert!(stored.audio.is_empty());
    }

    #[test]
    fn episode_for_media_id_defaults_to_empty_record() {
        let episodes = vec![sample_episode("guid-1")];
        let found = episode_for_media_id(&episodes, "guid-1");
        assert!(!found.audio.is_empty());

        let missing = episode_for_media_id(&episodes, "guid-2");
        assert_eq!(missing, Episode::default());
        assert!(missing.audio.is_empty());
    }
}
