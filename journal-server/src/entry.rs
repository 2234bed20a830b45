//! Journal entry storage.
//!
//! An entry carries at most one analysis, embedded in its own row. Each store
//! call is a single SQL statement, so writes are atomic per call.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use journal_analysis::AnalysisResult;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Default page size for listings.
pub const DEFAULT_LIST_LIMIT: u32 = 20;
/// Largest page size accepted for listings.
pub const MAX_LIST_LIMIT: u32 = 100;

const ENTRY_COLUMNS: &str = "id, user_id, title, content, mood, mood_score, top_emotions, summary, analysis_completed, created_at, updated_at";

/// A journal entry with its embedded analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub mood: Option<String>,
    pub mood_score: Option<f64>,
    pub top_emotions: Vec<String>,
    pub summary: Option<String>,
    pub analysis_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing filters. Applied to the owner's entries only.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryFilter {
    /// Case-insensitive substring of the mood
    pub mood: Option<String>,
    pub min_mood_score: Option<f64>,
    pub max_mood_score: Option<f64>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for EntryFilter {
    fn default() -> Self {
        Self {
            mood: None,
            min_mood_score: None,
            max_mood_score: None,
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }
}

/// Persistence for journal entries.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Insert a new, unanalyzed entry.
    async fn create_entry(&self, user_id: &str, title: &str, content: &str) -> Result<JournalEntry>;

    async fn get_entry(&self, id: &str, user_id: &str) -> Result<Option<JournalEntry>>;

    /// Newest first.
    async fn list_entries(&self, user_id: &str, filter: &EntryFilter) -> Result<Vec<JournalEntry>>;

    /// Replace title and content. Analysis fields are left as they are.
    async fn update_entry_content(
        &self,
        id: &str,
        user_id: &str,
        title: &str,
        content: &str,
    ) -> Result<Option<JournalEntry>>;

    /// Write all analysis fields and the completed flag together.
    /// `None` clears them. Both bump `updated_at`.
    async fn update_entry_analysis(
        &self,
        id: &str,
        user_id: &str,
        analysis: Option<&AnalysisResult>,
    ) -> Result<Option<JournalEntry>>;

    /// Remove the entry with its analysis.
    async fn delete_entry(&self, id: &str, user_id: &str) -> Result<bool>;
}

/// Entry store backed by SQLite.
#[derive(Clone)]
pub struct SqliteEntryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEntryStore {
    /// Open (or create) the entry table in the given database.
    pub fn new(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS journal_entries (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                mood TEXT,
                mood_score REAL,
                top_emotions TEXT NOT NULL DEFAULT '[]',
                summary TEXT,
                analysis_completed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_entries_user_created ON journal_entries(user_id, created_at);
            ",
        )
        .context("Failed to create journal_entries table")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("entry store lock poisoned: {}", e))
    }
}

#[async_trait]
impl EntryStore for SqliteEntryStore {
    async fn create_entry(&self, user_id: &str, title: &str, content: &str) -> Result<JournalEntry> {
        let conn = self.lock()?;
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        conn.execute(
            r"
            INSERT INTO journal_entries (id, user_id, title, content, top_emotions, analysis_completed, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, '[]', 0, ?5, ?5)
            ",
            params![id, user_id, title, content, timestamp(&now)],
        )
        .with_context(|| format!("Failed to create journal entry for user {}", user_id))?;

        find_entry(&conn, &id, user_id)?
            .with_context(|| format!("Journal entry {} missing after insert", id))
    }

    async fn get_entry(&self, id: &str, user_id: &str) -> Result<Option<JournalEntry>> {
        let conn = self.lock()?;
        find_entry(&conn, id, user_id)
    }

    async fn list_entries(&self, user_id: &str, filter: &EntryFilter) -> Result<Vec<JournalEntry>> {
        let conn = self.lock()?;

        let mut sql = format!("SELECT {} FROM journal_entries WHERE user_id = ?", ENTRY_COLUMNS);
        let mut args: Vec<Value> = vec![Value::Text(user_id.to_string())];

        if let Some(mood) = filter.mood.as_deref().filter(|m| !m.is_empty()) {
            sql.push_str(r" AND LOWER(mood) LIKE ? ESCAPE '\'");
            args.push(Value::Text(format!("%{}%", escape_like(&mood.to_lowercase()))));
        }
        if let Some(min) = filter.min_mood_score {
            sql.push_str(" AND mood_score >= ?");
            args.push(Value::Real(min));
        }
        if let Some(max) = filter.max_mood_score {
            sql.push_str(" AND mood_score <= ?");
            args.push(Value::Real(max));
        }

        sql.push_str(" ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?");
        args.push(Value::Integer(i64::from(filter.limit)));
        args.push(Value::Integer(i64::from(filter.offset)));

        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params_from_iter(args.iter()), row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to list journal entries for user {}", user_id))?;

        Ok(entries)
    }

    async fn update_entry_content(
        &self,
        id: &str,
        user_id: &str,
        title: &str,
        content: &str,
    ) -> Result<Option<JournalEntry>> {
        let conn = self.lock()?;

        let rows = conn
            .execute(
                "UPDATE journal_entries SET title = ?1, content = ?2, updated_at = ?3 WHERE id = ?4 AND user_id = ?5",
                params![title, content, timestamp(&Utc::now()), id, user_id],
            )
            .with_context(|| format!("Failed to update journal entry {}", id))?;

        if rows == 0 {
            return Ok(None);
        }
        find_entry(&conn, id, user_id)
    }

    async fn update_entry_analysis(
        &self,
        id: &str,
        user_id: &str,
        analysis: Option<&AnalysisResult>,
    ) -> Result<Option<JournalEntry>> {
        let conn = self.lock()?;

        let (mood, mood_score, emotions, summary, completed) = match analysis {
            Some(a) => (
                Some(a.mood()),
                Some(a.mood_score()),
                serde_json::to_string(a.top_emotions())?,
                Some(a.summary()),
                true,
            ),
            None => (None, None, "[]".to_string(), None, false),
        };

        let rows = conn
            .execute(
                r"
                UPDATE journal_entries
                SET mood = ?1, mood_score = ?2, top_emotions = ?3, summary = ?4,
                    analysis_completed = ?5, updated_at = ?6
                WHERE id = ?7 AND user_id = ?8
                ",
                params![
                    mood,
                    mood_score,
                    emotions,
                    summary,
                    completed,
                    timestamp(&Utc::now()),
                    id,
                    user_id
                ],
            )
            .with_context(|| format!("Failed to write analysis for journal entry {}", id))?;

        if rows == 0 {
            return Ok(None);
        }
        find_entry(&conn, id, user_id)
    }

    async fn delete_entry(&self, id: &str, user_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let rows = conn
            .execute(
                "DELETE FROM journal_entries WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )
            .with_context(|| format!("Failed to delete journal entry {}", id))?;
        Ok(rows > 0)
    }
}

fn find_entry(conn: &Connection, id: &str, user_id: &str) -> Result<Option<JournalEntry>> {
    let query = format!(
        "SELECT {} FROM journal_entries WHERE id = ?1 AND user_id = ?2",
        ENTRY_COLUMNS
    );

    conn.query_row(&query, params![id, user_id], row_to_entry)
        .optional()
        .with_context(|| format!("Failed to get journal entry {}", id))
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<JournalEntry> {
    let top_emotions: String = row.get(6)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(JournalEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        mood: row.get(4)?,
        mood_score: row.get(5)?,
        top_emotions: serde_json::from_str(&top_emotions).map_err(|e| conversion_error(6, e))?,
        summary: row.get(7)?,
        analysis_completed: row.get(8)?,
        created_at: parse_timestamp(9, &created_at)?,
        updated_at: parse_timestamp(10, &updated_at)?,
    })
}

// Fixed width so text order matches time order.
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}

fn conversion_error(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use journal_analysis::validate_response;
    use tempfile::tempdir;

    fn create_test_store() -> (SqliteEntryStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = SqliteEntryStore::new(&dir.path().join("journal.db")).unwrap();
        (store, dir)
    }

    fn analysis(mood: &str, score: f64) -> AnalysisResult {
        validate_response(&format!(
            r#"{{"mood":"{mood}","mood_score":{score},"top_emotions":["a","b"],"summary":"s"}}"#
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_entry_is_unanalyzed() {
        let (store, _dir) = create_test_store();

        let entry = store.create_entry("u1", "Title", "Body").await.unwrap();

        assert_eq!(entry.user_id, "u1");
        assert_eq!(entry.title, "Title");
        assert_eq!(entry.content, "Body");
        assert!(!entry.analysis_completed);
        assert!(entry.mood.is_none());
        assert!(entry.mood_score.is_none());
        assert!(entry.top_emotions.is_empty());
        assert!(entry.summary.is_none());
    }

    #[tokio::test]
    async fn test_entries_are_scoped_to_owner() {
        let (store, _dir) = create_test_store();
        let entry = store.create_entry("u1", "Title", "Body").await.unwrap();

        assert!(store.get_entry(&entry.id, "u1").await.unwrap().is_some());
        assert!(store.get_entry(&entry.id, "u2").await.unwrap().is_none());
        assert!(store
            .update_entry_content(&entry.id, "u2", "x", "y")
            .await
            .unwrap()
            .is_none());
        assert!(!store.delete_entry(&entry.id, "u2").await.unwrap());
        assert!(store.list_entries("u2", &EntryFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_analysis_write_and_clear() {
        let (store, _dir) = create_test_store();
        let entry = store.create_entry("u1", "Title", "Body").await.unwrap();

        let written = store
            .update_entry_analysis(&entry.id, "u1", Some(&analysis("happy", 8.0)))
            .await
            .unwrap()
            .unwrap();
        assert!(written.analysis_completed);
        assert_eq!(written.mood.as_deref(), Some("Happy"));
        assert_eq!(written.mood_score, Some(8.0));
        assert_eq!(written.top_emotions, vec!["a", "b"]);
        assert_eq!(written.summary.as_deref(), Some("s"));

        let cleared = store
            .update_entry_analysis(&entry.id, "u1", None)
            .await
            .unwrap()
            .unwrap();
        assert!(!cleared.analysis_completed);
        assert!(cleared.mood.is_none());
        assert!(cleared.mood_score.is_none());
        assert!(cleared.top_emotions.is_empty());
        assert!(cleared.summary.is_none());
    }

    #[tokio::test]
    async fn test_analysis_write_and_clear_bump_updated_at() {
        let (store, _dir) = create_test_store();
        let entry = store.create_entry("u1", "Title", "Body").await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let written = store
            .update_entry_analysis(&entry.id, "u1", Some(&analysis("happy", 8.0)))
            .await
            .unwrap()
            .unwrap();
        assert!(written.updated_at > entry.updated_at);
        assert_eq!(written.created_at, entry.created_at);

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let cleared = store
            .update_entry_analysis(&entry.id, "u1", None)
            .await
            .unwrap()
            .unwrap();
        assert!(cleared.updated_at > written.updated_at);
    }

    #[tokio::test]
    async fn test_corrupt_row_is_an_error() {
        let (store, _dir) = create_test_store();
        let bad_emotions = store.create_entry("u1", "Title", "Body").await.unwrap();
        let bad_timestamp = store.create_entry("u1", "Title", "Body").await.unwrap();
        {
            let conn = store.lock().unwrap();
            conn.execute(
                "UPDATE journal_entries SET top_emotions = 'not json' WHERE id = ?1",
                params![bad_emotions.id],
            )
            .unwrap();
            conn.execute(
                "UPDATE journal_entries SET created_at = 'yesterday' WHERE id = ?1",
                params![bad_timestamp.id],
            )
            .unwrap();
        }

        assert!(store.get_entry(&bad_emotions.id, "u1").await.is_err());
        assert!(store.get_entry(&bad_timestamp.id, "u1").await.is_err());
        assert!(store.list_entries("u1", &EntryFilter::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_content_update_keeps_analysis() {
        let (store, _dir) = create_test_store();
        let entry = store.create_entry("u1", "Title", "Body").await.unwrap();
        store
            .update_entry_analysis(&entry.id, "u1", Some(&analysis("calm", 6.0)))
            .await
            .unwrap();

        let updated = store
            .update_entry_content(&entry.id, "u1", "New", "Text")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.title, "New");
        assert_eq!(updated.content, "Text");
        assert_eq!(updated.mood.as_deref(), Some("Calm"));
        assert!(updated.updated_at >= entry.updated_at);
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let (store, _dir) = create_test_store();
        let entry = store.create_entry("u1", "Title", "Body").await.unwrap();

        assert!(store.delete_entry(&entry.id, "u1").await.unwrap());
        assert!(store.get_entry(&entry.id, "u1").await.unwrap().is_none());
        assert!(!store.delete_entry(&entry.id, "u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_newest_first_with_paging() {
        let (store, _dir) = create_test_store();
        for i in 0..5 {
            store.create_entry("u1", &format!("Entry {i}"), "Body").await.unwrap();
        }

        let all = store.list_entries("u1", &EntryFilter::default()).await.unwrap();
        let titles: Vec<_> = all.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["Entry 4", "Entry 3", "Entry 2", "Entry 1", "Entry 0"]);

        let page = store
            .list_entries(
                "u1",
                &EntryFilter {
                    limit: 2,
                    offset: 1,
                    ..EntryFilter::default()
                },
            )
            .await
            .unwrap();
        let titles: Vec<_> = page.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["Entry 3", "Entry 2"]);
    }

    #[tokio::test]
    async fn test_list_filters_by_mood_and_score() {
        let (store, _dir) = create_test_store();
        for (mood, score) in [("happy", 8.0), ("unhappy", 3.0), ("calm", 6.0)] {
            let entry = store.create_entry("u1", mood, "Body").await.unwrap();
            store
                .update_entry_analysis(&entry.id, "u1", Some(&analysis(mood, score)))
                .await
                .unwrap();
        }
        store.create_entry("u1", "pending", "Body").await.unwrap();

        let happy = store
            .list_entries(
                "u1",
                &EntryFilter {
                    mood: Some("HAPPY".into()),
                    ..EntryFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(happy.len(), 2);

        let scored = store
            .list_entries(
                "u1",
                &EntryFilter {
                    min_mood_score: Some(5.0),
                    max_mood_score: Some(8.0),
                    ..EntryFilter::default()
                },
            )
            .await
            .unwrap();
        let mut moods: Vec<_> = scored.iter().filter_map(|e| e.mood.clone()).collect();
        moods.sort();
        assert_eq!(moods, ["Calm", "Happy"]);
    }

    #[tokio::test]
    async fn test_mood_filter_treats_wildcards_literally() {
        let (store, _dir) = create_test_store();
        let entry = store.create_entry("u1", "t", "Body").await.unwrap();
        store
            .update_entry_analysis(&entry.id, "u1", Some(&analysis("happy", 8.0)))
            .await
            .unwrap();

        let filter = EntryFilter {
            mood: Some("%".into()),
            ..EntryFilter::default()
        };
        assert!(store.list_entries("u1", &filter).await.unwrap().is_empty());
    }

    #[test]
    fn test_timestamps_are_fixed_width() {
        let a = timestamp(&Utc::now());
        let b = timestamp(&DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&Utc));
        assert_eq!(a.len(), b.len());
        assert!(b.ends_with(".000000Z"));
    }
}
