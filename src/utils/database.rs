//! The sound archive: named sounds per server, stored in SQLite.
//!
//! A sound is either a local file (played as a one-shot direct item) or a
//! remote media URL (resolved and queued like any other link).

use rusqlite::{Connection, OptionalExtension, Result as SqlResult, params};
use serenity::model::id::GuildId;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// What kind of reference an archived sound holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundKind {
    Local,
    Remote,
}

impl SoundKind {
    fn as_str(self) -> &'static str {
        match self {
            SoundKind::Local => "local",
            SoundKind::Remote => "remote",
        }
    }

    fn parse(kind: &str) -> Option<Self> {
        match kind {
            "local" => Some(SoundKind::Local),
            "remote" => Some(SoundKind::Remote),
            _ => None,
        }
    }
}

/// A sound looked up from the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playable {
    pub name: String,
    pub kind: SoundKind,
    /// File path for local sounds, URL for remote ones.
    pub reference: String,
}

pub struct SoundArchive {
    conn: Mutex<Connection>,
}

impl SoundArchive {
    /// Open (or create) the archive at `path`.
    pub fn open(path: impl AsRef<Path>) -> SqlResult<Self> {
        let archive = Self::from_connection(Connection::open(path.as_ref())?)?;
        info!("Opened sound archive at {}", path.as_ref().display());
        Ok(archive)
    }

    pub fn open_in_memory() -> SqlResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> SqlResult<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS sounds (
                guild_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                reference TEXT NOT NULL,
                PRIMARY KEY (guild_id, name)
            )",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves nothing half-written in SQLite
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Find the sound called `name` in `guild_id`'s archive.
    pub fn lookup_playable(&self, guild_id: GuildId, name: &str) -> SqlResult<Option<Playable>> {
        let conn = self.conn();
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT kind, reference FROM sounds WHERE guild_id = ?1 AND name = ?2",
                params![guild_id.get(), name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(row.and_then(|(kind, reference)| {
            let kind = SoundKind::parse(&kind)?;
            Some(Playable {
                name: name.to_string(),
                kind,
                reference,
            })
        }))
    }

    /// Insert or replace a sound.
    pub fn save_sound(
        &self,
        guild_id: GuildId,
        name: &str,
        kind: SoundKind,
        reference: &str,
    ) -> SqlResult<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO sounds (guild_id, name, kind, reference) VALUES (?1, ?2, ?3, ?4)",
            params![guild_id.get(), name, kind.as_str(), reference],
        )?;
        debug!("Saved {} sound '{}' in guild {}", kind.as_str(), name, guild_id);
        Ok(())
    }

    /// Returns whether a sound was removed.
    pub fn remove_sound(&self, guild_id: GuildId, name: &str) -> SqlResult<bool> {
        let removed = self.conn().execute(
            "DELETE FROM sounds WHERE guild_id = ?1 AND name = ?2",
            params![guild_id.get(), name],
        )?;
        Ok(removed > 0)
    }

    /// Names of the sounds starting with `prefix`, sorted.
    pub fn list_sounds(&self, guild_id: GuildId, prefix: &str) -> SqlResult<Vec<String>> {
        let conn = self.conn();
        let mut statement = conn.prepare(
            "SELECT name FROM sounds WHERE guild_id = ?1 AND substr(name, 1, length(?2)) = ?2 ORDER BY name",
        )?;
        let names = statement
            .query_map(params![guild_id.get(), prefix], |row| row.get(0))?
            .collect::<SqlResult<Vec<String>>>()?;
        Ok(names)
    }
}
