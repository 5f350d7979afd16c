//! SQLite persistence for uploads, conversations, quizzes and study sessions.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use crate::error::StoreError;
use crate::models::{
    Activity, ActivityKind, Conversation, ProgressReport, Quiz, QuizQuestion, QuizScore,
    QuizSummary, StudySession, UploadedDocument, format_duration,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    filename TEXT NOT NULL,
    original_name TEXT NOT NULL,
    upload_date TEXT NOT NULL,
    file_size INTEGER NOT NULL,
    chunk_count INTEGER NOT NULL,
    content_preview TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS conversations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query TEXT NOT NULL,
    response TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS quizzes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    topic TEXT NOT NULL,
    num_questions INTEGER NOT NULL,
    questions TEXT NOT NULL,
    created_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS quiz_scores (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    quiz_id INTEGER NOT NULL REFERENCES quizzes(id),
    score INTEGER NOT NULL,
    total_questions INTEGER NOT NULL,
    percentage REAL NOT NULL,
    completed_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS study_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    topic TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT,
    duration INTEGER
);

CREATE INDEX IF NOT EXISTS idx_documents_upload_date ON documents(upload_date);
CREATE INDEX IF NOT EXISTS idx_quizzes_created_date ON quizzes(created_date);
CREATE INDEX IF NOT EXISTS idx_study_sessions_start_time ON study_sessions(start_time);
"#;

const RECENT_ACTIVITY_LIMIT: usize = 5;
const ACTIVITY_CANDIDATES: i64 = 3;

/// Application records. Active study sessions are rows without an end time.
pub struct TutorStore {
    conn: Mutex<Connection>,
}

/// UTC timestamp in the format every table uses; sorts lexicographically.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl TutorStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = %path.display(), "opened tutor store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    // Conversations

    pub fn record_conversation(
        &self,
        query: &str,
        response: &str,
    ) -> Result<Conversation, StoreError> {
        let conn = self.lock()?;
        let timestamp = timestamp_now();
        conn.execute(
            "INSERT INTO conversations (query, response, timestamp) VALUES (?1, ?2, ?3)",
            params![query, response, timestamp],
        )?;
        Ok(Conversation {
            id: conn.last_insert_rowid(),
            query: query.to_string(),
            response: response.to_string(),
            timestamp,
        })
    }

    /// Newest first.
    pub fn recent_conversations(&self, limit: usize) -> Result<Vec<Conversation>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, query, response, timestamp FROM conversations
             ORDER BY timestamp DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(Conversation {
                id: row.get(0)?,
                query: row.get(1)?,
                response: row.get(2)?,
                timestamp: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // Uploaded documents

    /// Insert or replace the record with the same id.
    pub fn insert_document(&self, document: &UploadedDocument) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO documents
             (id, filename, original_name, upload_date, file_size, chunk_count, content_preview)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                document.id,
                document.filename,
                document.original_name,
                document.upload_date,
                document.file_size as i64,
                document.chunk_count,
                document.content_preview,
            ],
        )?;
        Ok(())
    }

    /// Newest first.
    pub fn list_documents(&self) -> Result<Vec<UploadedDocument>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, filename, original_name, upload_date, file_size, chunk_count, content_preview
             FROM documents ORDER BY upload_date DESC, rowid DESC",
        )?;
        let rows = stmt.query_map([], document_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_document(&self, id: &str) -> Result<Option<UploadedDocument>, StoreError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT id, filename, original_name, upload_date, file_size, chunk_count, content_preview
                 FROM documents WHERE id = ?1",
                params![id],
                document_from_row,
            )
            .optional()?)
    }

    /// Returns false when no record had this id.
    pub fn delete_document(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    // Quizzes

    /// Store a quiz. `num_questions` is the count the caller asked for, which
    /// can differ from `questions.len()` when the model returns fewer.
    pub fn insert_quiz(
        &self,
        topic: &str,
        num_questions: u32,
        questions: &[QuizQuestion],
    ) -> Result<Quiz, StoreError> {
        let json = serde_json::to_string(questions)?;
        let conn = self.lock()?;
        let created_date = timestamp_now();
        conn.execute(
            "INSERT INTO quizzes (topic, num_questions, questions, created_date)
             VALUES (?1, ?2, ?3, ?4)",
            params![topic, num_questions, json, created_date],
        )?;
        Ok(Quiz {
            id: conn.last_insert_rowid(),
            topic: topic.to_string(),
            num_questions,
            questions: questions.to_vec(),
            created_date,
        })
    }

    pub fn get_quiz(&self, id: i64) -> Result<Option<Quiz>, StoreError> {
        let row = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT id, topic, num_questions, questions, created_date FROM quizzes WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?
        };

        match row {
            Some((id, topic, num_questions, questions, created_date)) => Ok(Some(Quiz {
                id,
                topic,
                num_questions,
                questions: serde_json::from_str(&questions)?,
                created_date,
            })),
            None => Ok(None),
        }
    }

    /// Newest first.
    pub fn quiz_history(&self, limit: usize) -> Result<Vec<QuizSummary>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, topic, num_questions, created_date FROM quizzes
             ORDER BY created_date DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(QuizSummary {
                id: row.get(0)?,
                topic: row.get(1)?,
                num_questions: row.get(2)?,
                created_date: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn insert_quiz_score(&self, quiz_id: i64, score: &QuizScore) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO quiz_scores (quiz_id, score, total_questions, percentage, completed_date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![quiz_id, score.score, score.total, score.percentage, timestamp_now()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    // Study sessions

    pub fn start_study_session(&self, topic: &str) -> Result<StudySession, StoreError> {
        let conn = self.lock()?;
        let start_time = timestamp_now();
        conn.execute(
            "INSERT INTO study_sessions (topic, start_time) VALUES (?1, ?2)",
            params![topic, start_time],
        )?;
        Ok(StudySession {
            id: conn.last_insert_rowid(),
            topic: topic.to_string(),
            start_time,
            end_time: None,
            duration: None,
        })
    }

    /// End an active session. `None` if the id is unknown or already stopped.
    pub fn stop_study_session(&self, id: i64) -> Result<Option<StudySession>, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let active: Option<(String, String)> = tx
            .query_row(
                "SELECT topic, start_time FROM study_sessions WHERE id = ?1 AND end_time IS NULL",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((topic, start_time)) = active else {
            return Ok(None);
        };

        let end = Utc::now();
        let duration = DateTime::parse_from_rfc3339(&start_time)
            .map(|start| (end - start.with_timezone(&Utc)).num_seconds().max(0))
            .unwrap_or(0);
        let end_time = end.to_rfc3339_opts(SecondsFormat::Millis, true);

        tx.execute(
            "UPDATE study_sessions SET end_time = ?1, duration = ?2 WHERE id = ?3",
            params![end_time, duration, id],
        )?;
        tx.commit()?;

        Ok(Some(StudySession {
            id,
            topic,
            start_time,
            end_time: Some(end_time),
            duration: Some(duration),
        }))
    }

    /// Completed sessions, most recently started first.
    pub fn completed_sessions(&self, limit: usize) -> Result<Vec<StudySession>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, topic, start_time, end_time, duration FROM study_sessions
             WHERE end_time IS NOT NULL ORDER BY start_time DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(StudySession {
                id: row.get(0)?,
                topic: row.get(1)?,
                start_time: row.get(2)?,
                end_time: row.get(3)?,
                duration: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // Progress

    pub fn progress(&self) -> Result<ProgressReport, StoreError> {
        let conn = self.lock()?;

        let count = |sql: &str| -> Result<u64, StoreError> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as u64)
        };
        let documents_uploaded = count("SELECT COUNT(*) FROM documents")?;
        let quizzes_generated = count("SELECT COUNT(*) FROM quizzes")?;
        let study_sessions =
            count("SELECT COUNT(*) FROM study_sessions WHERE end_time IS NOT NULL")?;
        let conversations = count("SELECT COUNT(*) FROM conversations")?;

        let total_study_time: i64 = conn.query_row(
            "SELECT COALESCE(SUM(duration), 0) FROM study_sessions WHERE duration IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT DISTINCT topic FROM study_sessions WHERE end_time IS NOT NULL ORDER BY topic",
        )?;
        let topics_studied = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut recent_activity = Vec::new();
        let mut collect = |sql: &str, kind: ActivityKind, label: &str| -> Result<(), StoreError> {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map(params![ACTIVITY_CANDIDATES], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (name, date) = row?;
                recent_activity.push(Activity {
                    kind,
                    name: format!("{}{}", label, name),
                    date,
                });
            }
            Ok(())
        };
        collect(
            "SELECT original_name, upload_date FROM documents
             ORDER BY upload_date DESC, rowid DESC LIMIT ?1",
            ActivityKind::Document,
            "",
        )?;
        collect(
            "SELECT topic, created_date FROM quizzes ORDER BY created_date DESC, id DESC LIMIT ?1",
            ActivityKind::Quiz,
            "Quiz: ",
        )?;
        collect(
            "SELECT topic, start_time FROM study_sessions WHERE end_time IS NOT NULL
             ORDER BY start_time DESC, id DESC LIMIT ?1",
            ActivityKind::Study,
            "Study: ",
        )?;

        recent_activity.sort_by(|a, b| b.date.cmp(&a.date));
        recent_activity.truncate(RECENT_ACTIVITY_LIMIT);

        Ok(ProgressReport {
            documents_uploaded,
            quizzes_generated,
            study_sessions,
            conversations,
            total_study_time,
            total_study_time_formatted: format_duration(total_study_time),
            topics_studied,
            recent_activity,
        })
    }
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<UploadedDocument> {
    Ok(UploadedDocument {
        id: row.get(0)?,
        filename: row.get(1)?,
        original_name: row.get(2)?,
        upload_date: row.get(3)?,
        file_size: row.get::<_, i64>(4)? as u64,
        chunk_count: row.get(5)?,
        content_preview: row.get(6)?,
    })
}
