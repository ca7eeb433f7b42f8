//! SQLite-backed store.
//!
//! A single connection behind a mutex, WAL mode, foreign keys enforced.
//! Embedding vectors are stored as little-endian f32 BLOBs and validated
//! against the configured dimension at insert.

use super::{
    bytes_to_embedding, embedding_to_bytes, AudioChunk, DeletedVideo, DownloadStatus, Generation,
    NewChunk, NewQuestion, NewVideo, Question, QuestionUpdate, Transcription, Video,
};
use crate::error::{DependentResource, LekseError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS videos (
    id INTEGER PRIMARY KEY,
    video_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    thumbnail_url TEXT,
    audio_path TEXT,
    download_status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY,
    video_id TEXT NOT NULL REFERENCES videos(video_id) ON DELETE CASCADE,
    chunk_index INTEGER NOT NULL,
    file_path TEXT NOT NULL,
    file_size INTEGER NOT NULL,
    start_ms INTEGER NOT NULL,
    end_ms INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(video_id, chunk_index)
);

CREATE INDEX IF NOT EXISTS idx_chunks_video_id ON chunks(video_id);

CREATE TABLE IF NOT EXISTS transcriptions (
    id INTEGER PRIMARY KEY,
    video_id TEXT NOT NULL REFERENCES videos(video_id) ON DELETE CASCADE,
    transcription_text TEXT NOT NULL,
    embedding BLOB,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transcriptions_video_id ON transcriptions(video_id);

CREATE TABLE IF NOT EXISTS generations (
    id INTEGER PRIMARY KEY,
    video_ids TEXT NOT NULL,
    question_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS questions (
    id INTEGER PRIMARY KEY,
    generation_id INTEGER NOT NULL REFERENCES generations(id) ON DELETE CASCADE,
    video_id TEXT NOT NULL REFERENCES videos(video_id) ON DELETE CASCADE,
    question_text TEXT NOT NULL,
    answer TEXT,
    context TEXT,
    difficulty TEXT,
    question_type TEXT,
    order_index INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_questions_generation_id ON questions(generation_id);
CREATE INDEX IF NOT EXISTS idx_questions_video_id ON questions(video_id);
CREATE INDEX IF NOT EXISTS idx_questions_order ON questions(generation_id, order_index);
"#;

/// SQLite-backed store for all Lekse entities.
pub struct Store {
    conn: Mutex<Connection>,
    embedding_dim: usize,
}

impl Store {
    /// Open (and if necessary create) the database at `path`.
    #[instrument(skip_all)]
    pub fn open(path: &Path, embedding_dim: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Opened store at {:?} (embedding dim {})", path, embedding_dim);

        Ok(Self {
            conn: Mutex::new(conn),
            embedding_dim,
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory(embedding_dim: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            embedding_dim,
        })
    }

    /// Configured vector width.
    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LekseError::Store(format!("Failed to acquire lock: {}", e)))
    }

    /// Verify the database answers queries.
    pub fn health_check(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    // === Videos ===

    /// Insert a video row. Fails with `Duplicate` when the external id is
    /// already present.
    #[instrument(skip(self, new), fields(video_id = %new.video_id))]
    pub fn insert_video(&self, new: &NewVideo) -> Result<Video> {
        let conn = self.conn()?;

        let exists: bool = conn
            .query_row(
                "SELECT 1 FROM videos WHERE video_id = ?1",
                params![new.video_id],
                |_| Ok(true),
            )
            .or_else(no_rows_as(false))?;
        if exists {
            return Err(LekseError::Duplicate(format!(
                "Video {} already exists",
                new.video_id
            )));
        }

        conn.execute(
            r#"
            INSERT INTO videos (video_id, title, thumbnail_url, audio_path, download_status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                new.video_id,
                new.title,
                new.thumbnail_url,
                new.audio_path,
                new.download_status.to_string(),
                Utc::now().to_rfc3339(),
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!("Inserted video {} (row {})", new.video_id, id);

        conn.query_row(
            &format!("SELECT {} FROM videos WHERE id = ?1", VIDEO_COLUMNS),
            params![id],
            video_from_row,
        )
        .map_err(Into::into)
    }

    /// Look up a video by its external id.
    pub fn get_video(&self, external_id: &str) -> Result<Option<Video>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM videos WHERE video_id = ?1", VIDEO_COLUMNS),
            params![external_id],
            video_from_row,
        )
        .map(Some)
        .or_else(no_rows_as(None))
        .map_err(Into::into)
    }

    /// List videos, newest first.
    pub fn list_videos(&self, skip: u32, limit: u32) -> Result<Vec<Video>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM videos ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
            VIDEO_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit, skip], video_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete a video row.
    ///
    /// Without `cascade`, the delete is refused with a listing of dependent
    /// rows. With `cascade`, the database removes chunks, transcriptions,
    /// and questions; affected generation counts are recomputed. The caller
    /// is responsible for deleting the returned file paths.
    #[instrument(skip(self))]
    pub fn delete_video(&self, external_id: &str, cascade: bool) -> Result<DeletedVideo> {
        let conn = self.conn()?;

        let video = conn
            .query_row(
                &format!("SELECT {} FROM videos WHERE video_id = ?1", VIDEO_COLUMNS),
                params![external_id],
                video_from_row,
            )
            .or_else(not_found(|| format!("Video {} not found", external_id)))?;

        let mut chunk_ids = Vec::new();
        let mut chunk_paths = Vec::new();
        {
            let mut stmt =
                conn.prepare("SELECT id, file_path FROM chunks WHERE video_id = ?1 ORDER BY chunk_index")?;
            let rows = stmt.query_map(params![external_id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (id, path) = row?;
                chunk_ids.push(id);
                chunk_paths.push(path);
            }
        }

        let transcription_ids = collect_ids(
            &conn,
            "SELECT id FROM transcriptions WHERE video_id = ?1 ORDER BY id",
            external_id,
        )?;
        let question_ids = collect_ids(
            &conn,
            "SELECT id FROM questions WHERE video_id = ?1 ORDER BY id",
            external_id,
        )?;

        if !cascade
            && (!chunk_ids.is_empty() || !transcription_ids.is_empty() || !question_ids.is_empty())
        {
            let mut resources = Vec::new();
            resources.extend(chunk_ids.iter().map(|id| DependentResource::new("chunk", *id)));
            resources.extend(
                transcription_ids
                    .iter()
                    .map(|id| DependentResource::new("transcription", *id)),
            );
            resources.extend(
                question_ids
                    .iter()
                    .map(|id| DependentResource::new("question", *id)),
            );
            return Err(LekseError::DependencyViolation {
                message: format!(
                    "Video {} has {} dependent resource(s); pass cascade=true to delete them",
                    external_id,
                    resources.len()
                ),
                resources,
            });
        }

        let affected_generations = collect_ids(
            &conn,
            "SELECT DISTINCT generation_id FROM questions WHERE video_id = ?1",
            external_id,
        )?;

        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM videos WHERE video_id = ?1", params![external_id])?;
        for generation_id in &affected_generations {
            tx.execute(
                r#"
                UPDATE generations
                SET question_count = (SELECT COUNT(*) FROM questions WHERE generation_id = ?1),
                    updated_at = ?2
                WHERE id = ?1
                "#,
                params![generation_id, Utc::now().to_rfc3339()],
            )?;
        }
        tx.commit()?;

        info!(
            "Deleted video {} ({} chunks, {} transcriptions, {} questions)",
            external_id,
            chunk_ids.len(),
            transcription_ids.len(),
            question_ids.len()
        );

        Ok(DeletedVideo { video, chunk_paths })
    }

    // === Chunks ===

    /// Persist a video's chunk set in one transaction.
    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    pub fn insert_chunks(&self, external_id: &str, chunks: &[NewChunk]) -> Result<Vec<AudioChunk>> {
        let conn = self.conn()?;

        conn.query_row(
            "SELECT 1 FROM videos WHERE video_id = ?1",
            params![external_id],
            |_| Ok(()),
        )
        .or_else(not_found(|| format!("Video {} not found", external_id)))?;

        let tx = conn.unchecked_transaction()?;
        let now = Utc::now().to_rfc3339();
        for chunk in chunks {
            tx.execute(
                r#"
                INSERT INTO chunks (video_id, chunk_index, file_path, file_size, start_ms, end_ms, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    external_id,
                    chunk.chunk_index,
                    chunk.file_path,
                    chunk.file_size,
                    chunk.start_ms,
                    chunk.end_ms,
                    now,
                ],
            )?;
        }
        tx.commit()?;

        drop(conn);
        self.chunks_for_video(external_id)
    }

    /// All chunks of a video, ordered by index.
    pub fn chunks_for_video(&self, external_id: &str) -> Result<Vec<AudioChunk>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM chunks WHERE video_id = ?1 ORDER BY chunk_index",
            CHUNK_COLUMNS
        ))?;
        let rows = stmt.query_map(params![external_id], chunk_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // === Transcriptions ===

    /// Insert a transcription row. The vector, when present, must match the
    /// configured dimension exactly.
    #[instrument(skip(self, text, vector), fields(video_id = %external_id))]
    pub fn insert_transcription(
        &self,
        external_id: &str,
        text: &str,
        vector: Option<&[f32]>,
        status: &str,
    ) -> Result<Transcription> {
        if let Some(v) = vector {
            if v.len() != self.embedding_dim {
                return Err(LekseError::Validation(format!(
                    "Embedding has {} dimensions, store is configured for {}",
                    v.len(),
                    self.embedding_dim
                )));
            }
        }

        let conn = self.conn()?;

        conn.query_row(
            "SELECT 1 FROM videos WHERE video_id = ?1",
            params![external_id],
            |_| Ok(()),
        )
        .or_else(not_found(|| format!("Video {} not found", external_id)))?;

        conn.execute(
            r#"
            INSERT INTO transcriptions (video_id, transcription_text, embedding, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                external_id,
                text,
                vector.map(embedding_to_bytes),
                status,
                Utc::now().to_rfc3339(),
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!("Inserted transcription {} for video {}", id, external_id);

        conn.query_row(
            &format!("SELECT {} FROM transcriptions WHERE id = ?1", TRANSCRIPTION_COLUMNS),
            params![id],
            transcription_from_row,
        )
        .map_err(Into::into)
    }

    /// Look up a transcription by row id.
    pub fn get_transcription(&self, id: i64) -> Result<Option<Transcription>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM transcriptions WHERE id = ?1", TRANSCRIPTION_COLUMNS),
            params![id],
            transcription_from_row,
        )
        .map(Some)
        .or_else(no_rows_as(None))
        .map_err(Into::into)
    }

    /// All transcriptions of a video, newest first.
    pub fn transcriptions_for_video(&self, external_id: &str) -> Result<Vec<Transcription>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transcriptions WHERE video_id = ?1 ORDER BY created_at DESC, id DESC",
            TRANSCRIPTION_COLUMNS
        ))?;
        let rows = stmt.query_map(params![external_id], transcription_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// The most recent transcription of a video, if any.
    pub fn latest_transcription_for_video(&self, external_id: &str) -> Result<Option<Transcription>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM transcriptions WHERE video_id = ?1 ORDER BY created_at DESC, id DESC LIMIT 1",
                TRANSCRIPTION_COLUMNS
            ),
            params![external_id],
            transcription_from_row,
        )
        .map(Some)
        .or_else(no_rows_as(None))
        .map_err(Into::into)
    }

    /// List transcriptions, newest first, optionally filtered by video.
    pub fn list_transcriptions(
        &self,
        skip: u32,
        limit: u32,
        video_id: Option<&str>,
    ) -> Result<Vec<Transcription>> {
        let conn = self.conn()?;
        match video_id {
            Some(vid) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM transcriptions WHERE video_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
                    TRANSCRIPTION_COLUMNS
                ))?;
                let rows = stmt.query_map(params![vid, limit, skip], transcription_from_row)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM transcriptions ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
                    TRANSCRIPTION_COLUMNS
                ))?;
                let rows = stmt.query_map(params![limit, skip], transcription_from_row)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            }
        }
    }

    /// Delete a transcription by id.
    pub fn delete_transcription(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM transcriptions WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(LekseError::NotFound(format!("Transcription {} not found", id)));
        }
        Ok(())
    }

    // === Generations ===

    /// Create a generation row with no questions yet.
    pub fn insert_generation(&self, video_ids: &[String]) -> Result<Generation> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO generations (video_ids, question_count, created_at, updated_at) VALUES (?1, 0, ?2, ?2)",
            params![serde_json::to_string(video_ids)?, now],
        )?;

        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("SELECT {} FROM generations WHERE id = ?1", GENERATION_COLUMNS),
            params![id],
            generation_from_row,
        )
        .map_err(Into::into)
    }

    /// List generations, newest first, with the total row count.
    pub fn list_generations(&self, skip: u32, limit: u32) -> Result<(Vec<Generation>, u64)> {
        let conn = self.conn()?;
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM generations", [], |row| row.get(0))?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM generations ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
            GENERATION_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit, skip], generation_from_row)?;
        Ok((rows.collect::<rusqlite::Result<Vec<_>>>()?, total as u64))
    }

    /// Look up a generation by id.
    pub fn get_generation(&self, id: i64) -> Result<Option<Generation>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM generations WHERE id = ?1", GENERATION_COLUMNS),
            params![id],
            generation_from_row,
        )
        .map(Some)
        .or_else(no_rows_as(None))
        .map_err(Into::into)
    }

    /// Delete a generation and (via cascade) its questions.
    pub fn delete_generation(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM generations WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(LekseError::NotFound(format!("Generation {} not found", id)));
        }
        Ok(())
    }

    // === Questions ===

    /// Insert a generation's questions in one transaction, assigning
    /// `order_index` from list position and updating the generation count.
    #[instrument(skip(self, questions), fields(count = questions.len()))]
    pub fn insert_questions(
        &self,
        generation_id: i64,
        questions: &[NewQuestion],
    ) -> Result<Vec<Question>> {
        let conn = self.conn()?;

        conn.query_row(
            "SELECT 1 FROM generations WHERE id = ?1",
            params![generation_id],
            |_| Ok(()),
        )
        .or_else(not_found(|| format!("Generation {} not found", generation_id)))?;

        let tx = conn.unchecked_transaction()?;
        let now = Utc::now().to_rfc3339();
        for (position, question) in questions.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO questions
                    (generation_id, video_id, question_text, answer, context, difficulty, question_type, order_index, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                "#,
                params![
                    generation_id,
                    question.video_id,
                    question.question_text,
                    question.answer,
                    question.context,
                    question.difficulty.map(|d| d.to_string()),
                    question.question_type.map(|t| t.to_string()),
                    position as i64,
                    now,
                ],
            )?;
        }
        tx.execute(
            r#"
            UPDATE generations
            SET question_count = (SELECT COUNT(*) FROM questions WHERE generation_id = ?1),
                updated_at = ?2
            WHERE id = ?1
            "#,
            params![generation_id, now],
        )?;
        tx.commit()?;

        drop(conn);
        self.questions_for_generation(generation_id)
    }

    /// A generation's questions, ordered by `order_index`.
    pub fn questions_for_generation(&self, generation_id: i64) -> Result<Vec<Question>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM questions WHERE generation_id = ?1 ORDER BY order_index, id",
            QUESTION_COLUMNS
        ))?;
        let rows = stmt.query_map(params![generation_id], question_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Look up a question within a generation.
    pub fn get_question(&self, generation_id: i64, question_id: i64) -> Result<Option<Question>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM questions WHERE id = ?1 AND generation_id = ?2",
                QUESTION_COLUMNS
            ),
            params![question_id, generation_id],
            question_from_row,
        )
        .map(Some)
        .or_else(no_rows_as(None))
        .map_err(Into::into)
    }

    /// Apply a partial update to a question.
    pub fn update_question(
        &self,
        generation_id: i64,
        question_id: i64,
        update: &QuestionUpdate,
    ) -> Result<Question> {
        let conn = self.conn()?;

        let mut question = conn
            .query_row(
                &format!(
                    "SELECT {} FROM questions WHERE id = ?1 AND generation_id = ?2",
                    QUESTION_COLUMNS
                ),
                params![question_id, generation_id],
                question_from_row,
            )
            .or_else(not_found(|| {
                format!("Question {} not found in generation {}", question_id, generation_id)
            }))?;

        if update.is_empty() {
            return Ok(question);
        }

        if let Some(text) = &update.question_text {
            question.question_text = text.clone();
        }
        if let Some(answer) = &update.answer {
            question.answer = Some(answer.clone());
        }
        if let Some(context) = &update.context {
            question.context = Some(context.clone());
        }
        if let Some(difficulty) = update.difficulty {
            question.difficulty = Some(difficulty);
        }
        if let Some(question_type) = update.question_type {
            question.question_type = Some(question_type);
        }
        if let Some(order_index) = update.order_index {
            question.order_index = order_index;
        }

        let now = Utc::now();
        conn.execute(
            r#"
            UPDATE questions
            SET question_text = ?1, answer = ?2, context = ?3, difficulty = ?4,
                question_type = ?5, order_index = ?6, updated_at = ?7
            WHERE id = ?8
            "#,
            params![
                question.question_text,
                question.answer,
                question.context,
                question.difficulty.map(|d| d.to_string()),
                question.question_type.map(|t| t.to_string()),
                question.order_index,
                now.to_rfc3339(),
                question_id,
            ],
        )?;
        question.updated_at = now;

        Ok(question)
    }

    /// Delete a question and decrement its generation's count.
    pub fn delete_question(&self, generation_id: i64, question_id: i64) -> Result<()> {
        let conn = self.conn()?;

        let tx = conn.unchecked_transaction()?;
        let deleted = tx.execute(
            "DELETE FROM questions WHERE id = ?1 AND generation_id = ?2",
            params![question_id, generation_id],
        )?;
        if deleted == 0 {
            return Err(LekseError::NotFound(format!(
                "Question {} not found in generation {}",
                question_id, generation_id
            )));
        }
        tx.execute(
            r#"
            UPDATE generations
            SET question_count = MAX(0, question_count - 1), updated_at = ?2
            WHERE id = ?1
            "#,
            params![generation_id, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        Ok(())
    }

    /// Atomically reassign `order_index` from the position of each id in
    /// `question_ids`.
    ///
    /// The id list must equal the generation's question set exactly (same
    /// cardinality, same membership); any mismatch is rejected and the
    /// existing order is left untouched.
    #[instrument(skip(self, question_ids), fields(count = question_ids.len()))]
    pub fn reorder_questions(&self, generation_id: i64, question_ids: &[i64]) -> Result<Vec<Question>> {
        let conn = self.conn()?;

        conn.query_row(
            "SELECT 1 FROM generations WHERE id = ?1",
            params![generation_id],
            |_| Ok(()),
        )
        .or_else(not_found(|| format!("Generation {} not found", generation_id)))?;

        let existing: Vec<i64> = {
            let mut stmt =
                conn.prepare("SELECT id FROM questions WHERE generation_id = ?1 ORDER BY id")?;
            let rows = stmt.query_map(params![generation_id], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let existing_set: std::collections::HashSet<i64> = existing.iter().copied().collect();
        let requested_set: std::collections::HashSet<i64> = question_ids.iter().copied().collect();

        if question_ids.len() != existing.len() || requested_set != existing_set {
            return Err(LekseError::Validation(format!(
                "Reorder list must contain exactly the {} question id(s) of generation {}",
                existing.len(),
                generation_id
            )));
        }

        let tx = conn.unchecked_transaction()?;
        let now = Utc::now().to_rfc3339();
        for (position, question_id) in question_ids.iter().enumerate() {
            tx.execute(
                "UPDATE questions SET order_index = ?1, updated_at = ?2 WHERE id = ?3",
                params![position as i64, now, question_id],
            )?;
        }
        tx.execute(
            "UPDATE generations SET updated_at = ?1 WHERE id = ?2",
            params![now, generation_id],
        )?;
        tx.commit()?;

        debug!("Reordered {} questions in generation {}", question_ids.len(), generation_id);

        drop(conn);
        self.questions_for_generation(generation_id)
    }
}

const VIDEO_COLUMNS: &str = "id, video_id, title, thumbnail_url, audio_path, download_status, created_at";
const CHUNK_COLUMNS: &str = "id, video_id, chunk_index, file_path, file_size, start_ms, end_ms, created_at";
const TRANSCRIPTION_COLUMNS: &str = "id, video_id, transcription_text, embedding, status, created_at";
const GENERATION_COLUMNS: &str = "id, video_ids, question_count, created_at, updated_at";
const QUESTION_COLUMNS: &str =
    "id, generation_id, video_id, question_text, answer, context, difficulty, question_type, order_index, created_at, updated_at";

fn parse_timestamp(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn video_from_row(row: &Row) -> rusqlite::Result<Video> {
    let status_raw: String = row.get(5)?;
    let created_raw: String = row.get(6)?;
    Ok(Video {
        id: row.get(0)?,
        video_id: row.get(1)?,
        title: row.get(2)?,
        thumbnail_url: row.get(3)?,
        audio_path: row.get(4)?,
        download_status: status_raw.parse().unwrap_or(DownloadStatus::Failed),
        created_at: parse_timestamp(created_raw),
    })
}

fn chunk_from_row(row: &Row) -> rusqlite::Result<AudioChunk> {
    let created_raw: String = row.get(7)?;
    Ok(AudioChunk {
        id: row.get(0)?,
        video_id: row.get(1)?,
        chunk_index: row.get(2)?,
        file_path: row.get(3)?,
        file_size: row.get(4)?,
        start_ms: row.get(5)?,
        end_ms: row.get(6)?,
        created_at: parse_timestamp(created_raw),
    })
}

fn transcription_from_row(row: &Row) -> rusqlite::Result<Transcription> {
    let embedding_raw: Option<Vec<u8>> = row.get(3)?;
    let created_raw: String = row.get(5)?;
    Ok(Transcription {
        id: row.get(0)?,
        video_id: row.get(1)?,
        transcription_text: row.get(2)?,
        embedding: embedding_raw.map(|bytes| bytes_to_embedding(&bytes)),
        status: row.get(4)?,
        created_at: parse_timestamp(created_raw),
    })
}

fn generation_from_row(row: &Row) -> rusqlite::Result<Generation> {
    let ids_raw: String = row.get(1)?;
    let created_raw: String = row.get(3)?;
    let updated_raw: String = row.get(4)?;
    Ok(Generation {
        id: row.get(0)?,
        video_ids: serde_json::from_str(&ids_raw).unwrap_or_default(),
        question_count: row.get(2)?,
        created_at: parse_timestamp(created_raw),
        updated_at: parse_timestamp(updated_raw),
    })
}

fn question_from_row(row: &Row) -> rusqlite::Result<Question> {
    let difficulty_raw: Option<String> = row.get(6)?;
    let type_raw: Option<String> = row.get(7)?;
    let created_raw: String = row.get(9)?;
    let updated_raw: String = row.get(10)?;
    Ok(Question {
        id: row.get(0)?,
        generation_id: row.get(1)?,
        video_id: row.get(2)?,
        question_text: row.get(3)?,
        answer: row.get(4)?,
        context: row.get(5)?,
        difficulty: difficulty_raw.and_then(|s| s.parse().ok()),
        question_type: type_raw.and_then(|s| s.parse().ok()),
        order_index: row.get(8)?,
        created_at: parse_timestamp(created_raw),
        updated_at: parse_timestamp(updated_raw),
    })
}

/// Map `QueryReturnedNoRows` to a fallback value, pass other errors through.
fn no_rows_as<T>(fallback: T) -> impl FnOnce(rusqlite::Error) -> rusqlite::Result<T> {
    move |e| match e {
        rusqlite::Error::QueryReturnedNoRows => Ok(fallback),
        other => Err(other),
    }
}

/// Map `QueryReturnedNoRows` to a `NotFound` error.
fn not_found<T, F>(message: F) -> impl FnOnce(rusqlite::Error) -> Result<T>
where
    F: FnOnce() -> String,
{
    move |e| match e {
        rusqlite::Error::QueryReturnedNoRows => Err(LekseError::NotFound(message())),
        other => Err(other.into()),
    }
}

fn collect_ids(conn: &Connection, sql: &str, param: &str) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![param], |row| row.get(0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
