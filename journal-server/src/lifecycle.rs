//! Entry lifecycle: persist content, then attach analysis.
//!
//! ```text
//! create:  insert (unanalyzed) → analyze → write analysis
//! update:  title or content given? ── no ──→ return as is
//!                   │ yes
//!                   └→ write content → clear analysis → analyze → write analysis
//! ```
//!
//! Only content writes can fail the operation. Analysis always yields a value,
//! and a failed analysis write is logged while the entry is still returned.

use anyhow::{Context, Result};
use journal_analysis::MoodAnalyzer;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::entry::{EntryStore, JournalEntry};

/// Fields a caller may change on an entry.
#[derive(Debug, Clone, Default)]
pub struct EntryUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// Coordinates entry persistence with mood analysis.
#[derive(Clone)]
pub struct EntryLifecycle {
    store: Arc<dyn EntryStore>,
    analyzer: Arc<MoodAnalyzer>,
}

impl EntryLifecycle {
    pub fn new(store: Arc<dyn EntryStore>, analyzer: Arc<MoodAnalyzer>) -> Self {
        Self { store, analyzer }
    }

    pub fn store(&self) -> &Arc<dyn EntryStore> {
        &self.store
    }

    /// Create an entry and analyze it before returning.
    pub async fn create_entry(&self, user_id: &str, title: &str, content: &str) -> Result<JournalEntry> {
        let entry = self
            .store
            .create_entry(user_id, title, content)
            .await
            .context("Failed to create journal entry")?;

        tracing::info!(entry_id = %entry.id, user_id = %user_id, "Journal entry created");

        Ok(self.analyze_and_record(entry).await)
    }

    /// Apply an update; re-analyze whenever title or content is given,
    /// even if the value matches what is stored.
    ///
    /// Returns `None` when the entry does not exist for this user.
    pub async fn update_entry(
        &self,
        id: &str,
        user_id: &str,
        update: EntryUpdate,
    ) -> Result<Option<JournalEntry>> {
        let Some(current) = self
            .store
            .get_entry(id, user_id)
            .await
            .context("Failed to load journal entry")?
        else {
            return Ok(None);
        };

        if update.title.is_none() && update.content.is_none() {
            tracing::debug!(entry_id = %id, "Nothing to update, keeping analysis");
            return Ok(Some(current));
        }

        let title = update.title.as_deref().unwrap_or(&current.title);
        let content = update.content.as_deref().unwrap_or(&current.content);

        let Some(updated) = self
            .store
            .update_entry_content(id, user_id, title, content)
            .await
            .context("Failed to update journal entry")?
        else {
            return Ok(None);
        };

        let invalidated = match self.store.update_entry_analysis(id, user_id, None).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::error!(
                    entry_id = %id,
                    error = %e,
                    "Failed to clear stale analysis; stored analysis may not match the new content"
                );
                without_analysis(updated)
            }
        };

        tracing::info!(entry_id = %id, "Journal entry updated, re-analyzing");

        Ok(Some(self.analyze_and_record(invalidated).await))
    }

    /// Delete an entry together with its analysis.
    pub async fn delete_entry(&self, id: &str, user_id: &str) -> Result<bool> {
        let deleted = self
            .store
            .delete_entry(id, user_id)
            .await
            .context("Failed to delete journal entry")?;

        if deleted {
            tracing::info!(entry_id = %id, user_id = %user_id, "Journal entry deleted");
        }
        Ok(deleted)
    }

    /// Analyze an entry on a background task.
    ///
    /// Same outcome as the inline path; the caller may await or drop the handle.
    pub fn spawn_analysis(&self, entry: JournalEntry) -> JoinHandle<()> {
        let lifecycle = self.clone();
        let span = tracing::info_span!("background_analysis", entry_id = %entry.id);
        tokio::spawn(
            async move {
                lifecycle.analyze_and_record(entry).await;
            }
            .instrument(span),
        )
    }

    /// Analyze and persist; on a failed write the given entry is returned.
    async fn analyze_and_record(&self, entry: JournalEntry) -> JournalEntry {
        let analysis = self.analyzer.analyze(&entry.title, &entry.content).await;

        match self
            .store
            .update_entry_analysis(&entry.id, &entry.user_id, Some(&analysis))
            .await
        {
            Ok(Some(analyzed)) => {
                tracing::info!(
                    entry_id = %analyzed.id,
                    fallback = analysis.is_fallback(),
                    "Completed mood analysis"
                );
                analyzed
            }
            Ok(None) => {
                tracing::warn!(entry_id = %entry.id, "Entry removed before analysis was saved");
                entry
            }
            Err(e) => {
                tracing::error!(entry_id = %entry.id, error = %e, "Failed to save mood analysis");
                entry
            }
        }
    }
}

fn without_analysis(entry: JournalEntry) -> JournalEntry {
    JournalEntry {
        mood: None,
        mood_score: None,
        top_emotions: Vec::new(),
        summary: None,
        analysis_completed: false,
        ..entry
    }
}
