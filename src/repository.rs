//! Repository for the note aggregate and registered videos.
//!
//! All writes that touch more than one table run in a single transaction.
//! Every user-supplied value reaches SQLite through bound parameters.

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use crate::Database;
use crate::models::{
    CategoryCount, Note, NoteChildren, NoteClip, NoteDetail, NoteHighlight, NoteId, NoteItem,
    NoteTackle, NoteTiming, NoteVideo, NoteZone, TackleClipSource, TackleOutcome, TackleStat,
    Video, VideoId,
};

/// Errors surfaced at the repository boundary.
#[derive(Debug, Error)]
pub enum RepoError {
    /// No row matched the given id or key.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Input rejected before reaching the database.
    #[error("{0}")]
    Validation(String),

    /// Underlying SQLite failure.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl RepoError {
    fn not_found(entity: &'static str, id: impl ToString) -> Self {
        RepoError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    fn validation(message: impl Into<String>) -> Self {
        RepoError::Validation(message.into())
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository owning the database handle.
///
/// The repository is the only code that writes SQL for the note aggregate.
/// It is used from the single-threaded event loop, so the connection is
/// never shared across threads.
///
/// # Examples
///
/// ```
/// use tagging_rugby::{Database, NoteRepository};
///
/// # fn main() -> anyhow::Result<()> {
/// let db = Database::in_memory()?;
/// let repo = NoteRepository::new(db);
/// assert!(repo.list_notes()?.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct NoteRepository {
    db: Database,
}

impl NoteRepository {
    /// Creates a repository over the given database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    fn conn(&self) -> &Connection {
        self.db.connection()
    }

    // --- Videos ---

    /// Registers a video path, or refreshes its metadata if already known.
    ///
    /// A non-positive `duration_s` never overwrites a known duration, and
    /// `stopped_at_s` is preserved across upserts.
    pub fn upsert_video(
        &self,
        path: &str,
        duration_s: f64,
        format: &str,
        size_bytes: i64,
    ) -> RepoResult<Video> {
        if path.trim().is_empty() {
            return Err(RepoError::validation("video path cannot be empty"));
        }
        self.conn().execute(
            "INSERT INTO videos (path, duration_s, format, size_bytes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(path) DO UPDATE SET
                 format = excluded.format,
                 size_bytes = excluded.size_bytes,
                 duration_s = CASE WHEN excluded.duration_s > 0
                                   THEN excluded.duration_s
                                   ELSE videos.duration_s END",
            params![path, duration_s.max(0.0), format, size_bytes, now_unix()],
        )?;
        self.get_video_by_path(path)?
            .ok_or_else(|| RepoError::not_found("video", path))
    }

    /// Looks up a registered video by path.
    pub fn get_video_by_path(&self, path: &str) -> RepoResult<Option<Video>> {
        let video = self
            .conn()
            .query_row(
                "SELECT id, path, duration_s, format, size_bytes, stopped_at_s
                 FROM videos WHERE path = ?1",
                [path],
                |row| {
                    Ok(Video {
                        id: VideoId::new(row.get(0)?),
                        path: row.get(1)?,
                        duration_s: row.get(2)?,
                        format: row.get(3)?,
                        size_bytes: row.get(4)?,
                        stopped_at_s: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(video)
    }

    /// Records the duration reported by the player.
    pub fn update_video_duration(&self, path: &str, duration_s: f64) -> RepoResult<()> {
        let changed = self.conn().execute(
            "UPDATE videos SET duration_s = ?2 WHERE path = ?1",
            params![path, duration_s],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("video", path));
        }
        Ok(())
    }

    /// Persists the last observed playback position (resume hint).
    pub fn update_stopped_at(&self, path: &str, stopped_at_s: f64) -> RepoResult<()> {
        let changed = self.conn().execute(
            "UPDATE videos SET stopped_at_s = ?2 WHERE path = ?1",
            params![path, stopped_at_s.max(0.0)],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("video", path));
        }
        Ok(())
    }

    // --- Aggregate writes ---

    /// Inserts a note and all of its children atomically.
    ///
    /// Validation runs before the transaction opens. Any failure after that
    /// rolls back, so no row bearing the would-be id survives.
    pub fn insert_note_with_children(
        &self,
        category: &str,
        children: &NoteChildren,
    ) -> RepoResult<NoteId> {
        validate_insert(category, children)?;

        let tx = self.conn().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO notes (category, created_at) VALUES (?1, ?2)",
            params![category, now_unix()],
        )?;
        let note_id = NoteId::new(tx.last_insert_rowid());

        for timing in &children.timings {
            insert_timing(&tx, note_id, timing)?;
        }
        for video in &children.videos {
            tx.execute(
                "INSERT INTO note_videos (note_id, path, duration_s, format) VALUES (?1, ?2, ?3, ?4)",
                params![note_id.get(), video.path, video.duration_s, video.format],
            )?;
        }
        insert_editable_children(&tx, note_id, children)?;
        for clip in &children.clips {
            tx.execute(
                "INSERT INTO note_clips (note_id, name, duration_s, started_at, finished_at, error_at, error_text)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    note_id.get(),
                    clip.name,
                    clip.duration_s,
                    clip.started_at.map(OffsetDateTime::unix_timestamp),
                    clip.finished_at.map(OffsetDateTime::unix_timestamp),
                    clip.error_at.map(OffsetDateTime::unix_timestamp),
                    clip.error_text,
                ],
            )?;
        }

        tx.commit()?;
        debug!(note_id = note_id.get(), category, "inserted note");
        Ok(note_id)
    }

    /// Rewrites the editable children of a note.
    ///
    /// Deletes every row in `note_details`, `note_zones`, `note_highlights`
    /// and `note_tackles` for the note, then inserts the given vectors.
    /// Timing, video and clip rows are left untouched.
    pub fn update_note_with_children(
        &self,
        note_id: NoteId,
        children: &NoteChildren,
    ) -> RepoResult<()> {
        let note = self
            .get_note(note_id)?
            .ok_or_else(|| RepoError::not_found("note", note_id))?;
        validate_tackles(&note.category, &children.tackles)?;
        validate_singletons(children, false)?;

        let tx = self.conn().unchecked_transaction()?;
        for table in ["note_details", "note_zones", "note_highlights", "note_tackles"] {
            tx.execute(
                &format!("DELETE FROM {table} WHERE note_id = ?1"),
                [note_id.get()],
            )?;
        }
        insert_editable_children(&tx, note_id, children)?;
        tx.commit()?;
        debug!(note_id = note_id.get(), "rewrote note children");
        Ok(())
    }

    /// Moves a note in time.
    ///
    /// Returns `NotFound` when the note has no timing row.
    pub fn update_note_timing(&self, note_id: NoteId, start_s: f64, end_s: f64) -> RepoResult<()> {
        let timing = NoteTiming::new(start_s, end_s);
        if !timing.is_valid() {
            return Err(RepoError::validation(format!(
                "invalid timing {start_s}..{end_s}"
            )));
        }
        let changed = self.conn().execute(
            "UPDATE note_timing SET start_s = ?2, end_s = ?3 WHERE note_id = ?1",
            params![note_id.get(), start_s, end_s],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("note timing", note_id));
        }
        Ok(())
    }

    /// Deletes a note; children go with it through `ON DELETE CASCADE`.
    pub fn delete_note(&self, note_id: NoteId) -> RepoResult<()> {
        let changed = self
            .conn()
            .execute("DELETE FROM notes WHERE id = ?1", [note_id.get()])?;
        if changed == 0 {
            return Err(RepoError::not_found("note", note_id));
        }
        Ok(())
    }

    // --- Reads ---

    /// Retrieves a note by id, `None` when it does not exist.
    pub fn get_note(&self, note_id: NoteId) -> RepoResult<Option<Note>> {
        let note = self
            .conn()
            .query_row(
                "SELECT id, category, created_at FROM notes WHERE id = ?1",
                [note_id.get()],
                map_note,
            )
            .optional()?;
        Ok(note)
    }

    /// Lists every note, newest first.
    pub fn list_notes(&self) -> RepoResult<Vec<Note>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id, category, created_at FROM notes ORDER BY created_at DESC, id DESC")?;
        let notes = stmt.query_map([], map_note)?.collect::<Result<_, _>>()?;
        Ok(notes)
    }

    pub fn select_note_timing_by_note(&self, note_id: NoteId) -> RepoResult<Option<NoteTiming>> {
        let timing = self
            .conn()
            .query_row(
                "SELECT start_s, end_s FROM note_timing WHERE note_id = ?1",
                [note_id.get()],
                |row| Ok(NoteTiming::new(row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(timing)
    }

    pub fn select_note_videos_by_note(&self, note_id: NoteId) -> RepoResult<Vec<NoteVideo>> {
        let mut stmt = self.conn().prepare(
            "SELECT path, duration_s, format FROM note_videos WHERE note_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([note_id.get()], |row| {
                Ok(NoteVideo {
                    path: row.get(0)?,
                    duration_s: row.get(1)?,
                    format: row.get(2)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    pub fn select_note_tackles_by_note(&self, note_id: NoteId) -> RepoResult<Vec<NoteTackle>> {
        let mut stmt = self.conn().prepare(
            "SELECT player, team, attempt, outcome FROM note_tackles WHERE note_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([note_id.get()], |row| {
                Ok(NoteTackle {
                    player: row.get(0)?,
                    team: row.get(1)?,
                    attempt: row.get(2)?,
                    outcome: outcome_column(row, 3)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    pub fn select_note_zones_by_note(&self, note_id: NoteId) -> RepoResult<Vec<NoteZone>> {
        let mut stmt = self.conn().prepare(
            "SELECT horizontal, vertical FROM note_zones WHERE note_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([note_id.get()], |row| {
                Ok(NoteZone {
                    horizontal: row.get(0)?,
                    vertical: row.get(1)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    pub fn select_note_details_by_note(&self, note_id: NoteId) -> RepoResult<Vec<NoteDetail>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT type, body FROM note_details WHERE note_id = ?1 ORDER BY id")?;
        let rows = stmt
            .query_map([note_id.get()], |row| {
                Ok(NoteDetail {
                    kind: row.get(0)?,
                    body: row.get(1)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    pub fn select_note_highlights_by_note(
        &self,
        note_id: NoteId,
    ) -> RepoResult<Vec<NoteHighlight>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT type FROM note_highlights WHERE note_id = ?1 ORDER BY id")?;
        let rows = stmt
            .query_map([note_id.get()], |row| Ok(NoteHighlight { kind: row.get(0)? }))?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    pub fn select_note_clips_by_note(&self, note_id: NoteId) -> RepoResult<Vec<NoteClip>> {
        let mut stmt = self.conn().prepare(
            "SELECT name, duration_s, started_at, finished_at, error_at, error_text
             FROM note_clips WHERE note_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([note_id.get()], |row| {
                Ok(NoteClip {
                    name: row.get(0)?,
                    duration_s: row.get(1)?,
                    started_at: timestamp_column(row, 2)?,
                    finished_at: timestamp_column(row, 3)?,
                    error_at: timestamp_column(row, 4)?,
                    error_text: row.get(5)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    /// Loads every child kind of a note into one value.
    pub fn select_note_children(&self, note_id: NoteId) -> RepoResult<NoteChildren> {
        Ok(NoteChildren {
            timings: self
                .select_note_timing_by_note(note_id)?
                .into_iter()
                .collect(),
            videos: self.select_note_videos_by_note(note_id)?,
            tackles: self.select_note_tackles_by_note(note_id)?,
            zones: self.select_note_zones_by_note(note_id)?,
            details: self.select_note_details_by_note(note_id)?,
            highlights: self.select_note_highlights_by_note(note_id)?,
            clips: self.select_note_clips_by_note(note_id)?,
        })
    }

    /// Lists the notes captured against a video, in timeline order.
    pub fn list_video_items(&self, video_path: &str) -> RepoResult<Vec<NoteItem>> {
        let mut stmt = self.conn().prepare(
            "SELECT n.id, n.category,
                    COALESCE(tm.start_s, 0), COALESCE(tm.end_s, 0),
                    COALESCE(
                        (SELECT d.body FROM note_details d
                         WHERE d.note_id = n.id AND d.type IN ('text', 'notes')
                         ORDER BY d.id LIMIT 1),
                        (SELECT c.name FROM note_clips c WHERE c.note_id = n.id ORDER BY c.id LIMIT 1),
                        ''),
                    tk.player, tk.team, tk.attempt, tk.outcome,
                    EXISTS(SELECT 1 FROM note_highlights h WHERE h.note_id = n.id AND h.type = 'star')
             FROM notes n
             JOIN note_videos v ON v.note_id = n.id
             LEFT JOIN note_timing tm ON tm.note_id = n.id
             LEFT JOIN note_tackles tk ON tk.note_id = n.id
             WHERE v.path = ?1
             ORDER BY COALESCE(tm.start_s, 0), n.id",
        )?;
        let rows = stmt
            .query_map([video_path], |row| {
                let outcome = match row.get::<_, Option<String>>(8)? {
                    Some(_) => Some(outcome_column(row, 8)?),
                    None => None,
                };
                Ok(NoteItem {
                    id: NoteId::new(row.get(0)?),
                    category: row.get(1)?,
                    start_s: row.get(2)?,
                    end_s: row.get(3)?,
                    text: row.get(4)?,
                    player: row.get(5)?,
                    team: row.get(6)?,
                    attempt: row.get(7)?,
                    outcome,
                    starred: row.get(9)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    /// Aggregates tackles per player.
    ///
    /// With `Some(path)` only tackles on that video count; with `None` the
    /// aggregate spans every video. Rows come back ordered by player name.
    pub fn tackle_stats(&self, video_path: Option<&str>) -> RepoResult<Vec<TackleStat>> {
        let mut stmt = self.conn().prepare(
            "SELECT t.player,
                    COUNT(*),
                    SUM(CASE WHEN t.outcome = 'completed' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN t.outcome = 'missed' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN t.outcome = 'possible' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN t.outcome = 'other' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN EXISTS(
                            SELECT 1 FROM note_highlights h
                            WHERE h.note_id = t.note_id AND h.type = 'star')
                        THEN 1 ELSE 0 END)
             FROM note_tackles t
             JOIN notes n ON n.id = t.note_id
             JOIN note_videos v ON v.note_id = t.note_id
             WHERE ?1 IS NULL OR v.path = ?1
             GROUP BY t.player
             ORDER BY t.player",
        )?;
        let rows = stmt
            .query_map([video_path], |row| {
                Ok(TackleStat {
                    player: row.get(0)?,
                    total: row.get(1)?,
                    completed: row.get(2)?,
                    missed: row.get(3)?,
                    possible: row.get(4)?,
                    other: row.get(5)?,
                    starred: row.get(6)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    /// Counts notes per category, most frequent first, ties by name.
    pub fn category_counts(&self, video_path: Option<&str>) -> RepoResult<Vec<CategoryCount>> {
        let mut stmt = self.conn().prepare(
            "SELECT n.category, COUNT(*) AS cnt
             FROM notes n
             JOIN note_videos v ON v.note_id = n.id
             WHERE ?1 IS NULL OR v.path = ?1
             GROUP BY n.category
             ORDER BY cnt DESC, n.category ASC",
        )?;
        let rows = stmt
            .query_map([video_path], |row| {
                Ok(CategoryCount {
                    category: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    /// Lists the tackles on a video joined with timing, in timeline order.
    pub fn tackles_for_export(&self, video_path: &str) -> RepoResult<Vec<TackleClipSource>> {
        let mut stmt = self.conn().prepare(
            "SELECT n.id, tk.player, tm.start_s, tm.end_s, v.path
             FROM notes n
             JOIN note_tackles tk ON tk.note_id = n.id
             JOIN note_timing tm ON tm.note_id = n.id
             JOIN note_videos v ON v.note_id = n.id
             WHERE n.category = 'tackle' AND v.path = ?1
             ORDER BY tm.start_s, n.id",
        )?;
        let rows = stmt
            .query_map([video_path], |row| {
                Ok(TackleClipSource {
                    note_id: NoteId::new(row.get(0)?),
                    player: row.get(1)?,
                    start_s: row.get(2)?,
                    end_s: row.get(3)?,
                    video_path: row.get(4)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }
}

fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

fn map_note(row: &Row<'_>) -> rusqlite::Result<Note> {
    let created_at: i64 = row.get(2)?;
    Ok(Note {
        id: NoteId::new(row.get(0)?),
        category: row.get(1)?,
        created_at: OffsetDateTime::from_unix_timestamp(created_at)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Integer, Box::new(e)))?,
    })
}

fn outcome_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<TackleOutcome> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<OffsetDateTime>> {
    let raw: Option<i64> = row.get(idx)?;
    raw.map(|ts| {
        OffsetDateTime::from_unix_timestamp(ts)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
    })
    .transpose()
}

fn insert_timing(conn: &Connection, note_id: NoteId, timing: &NoteTiming) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO note_timing (note_id, start_s, end_s) VALUES (?1, ?2, ?3)",
        params![note_id.get(), timing.start_s, timing.end_s],
    )?;
    Ok(())
}

/// Inserts the child kinds that the edit path rewrites.
fn insert_editable_children(
    conn: &Connection,
    note_id: NoteId,
    children: &NoteChildren,
) -> RepoResult<()> {
    for tackle in &children.tackles {
        conn.execute(
            "INSERT INTO note_tackles (note_id, player, team, attempt, outcome) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                note_id.get(),
                tackle.player.trim(),
                tackle.team.trim(),
                tackle.attempt,
                tackle.outcome.as_str()
            ],
        )?;
    }
    for zone in &children.zones {
        conn.execute(
            "INSERT INTO note_zones (note_id, horizontal, vertical) VALUES (?1, ?2, ?3)",
            params![note_id.get(), zone.horizontal, zone.vertical],
        )?;
    }
    for detail in &children.details {
        conn.execute(
            "INSERT INTO note_details (note_id, type, body) VALUES (?1, ?2, ?3)",
            params![note_id.get(), detail.kind, detail.body],
        )?;
    }
    for highlight in &children.highlights {
        conn.execute(
            "INSERT INTO note_highlights (note_id, type) VALUES (?1, ?2)",
            params![note_id.get(), highlight.kind],
        )?;
    }
    Ok(())
}

fn validate_insert(category: &str, children: &NoteChildren) -> RepoResult<()> {
    if category.trim().is_empty() {
        return Err(RepoError::validation("category cannot be empty"));
    }
    if children.videos.len() != 1 {
        return Err(RepoError::validation("a note needs exactly one video"));
    }
    if children.videos[0].path.trim().is_empty() {
        return Err(RepoError::validation("video path cannot be empty"));
    }
    if children.timings.len() > 1 {
        return Err(RepoError::validation("a note has at most one timing"));
    }
    if let Some(timing) = children.timings.first()
        && !timing.is_valid()
    {
        return Err(RepoError::validation(format!(
            "invalid timing {}..{}",
            timing.start_s, timing.end_s
        )));
    }
    if !children.clips.is_empty() && category != Note::CLIP {
        return Err(RepoError::validation("clip rows require the clip category"));
    }
    validate_tackles(category, &children.tackles)?;
    validate_singletons(children, true)
}

fn validate_tackles(category: &str, tackles: &[NoteTackle]) -> RepoResult<()> {
    if category == Note::TACKLE && tackles.len() != 1 {
        return Err(RepoError::validation("a tackle needs exactly one tackle row"));
    }
    if category != Note::TACKLE && !tackles.is_empty() {
        return Err(RepoError::validation(format!(
            "tackle rows are not allowed on a {category}"
        )));
    }
    for tackle in tackles {
        if tackle.player.trim().is_empty() {
            return Err(RepoError::validation("player cannot be empty"));
        }
        if tackle.attempt < 1 {
            return Err(RepoError::validation("attempt must be at least 1"));
        }
    }
    Ok(())
}

fn validate_singletons(children: &NoteChildren, check_clips: bool) -> RepoResult<()> {
    if children.zones.len() > 1 {
        return Err(RepoError::validation("a note has at most one zone"));
    }
    if check_clips && children.clips.len() > 1 {
        return Err(RepoError::validation("a note has at most one clip"));
    }
    Ok(())
}
