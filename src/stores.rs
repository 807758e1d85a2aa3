//! Transcript storage and the persisted session document.
//!
//! [`TranscriptStore`] is the seam between the compaction engine and whoever
//! owns the session. It holds two things per thread:
//!
//! - the live transcript, appended to by normal turn processing
//! - at most one [`CompactionRecord`]
//!
//! The only other mutation is [`TranscriptStore::replace_prefix`], which
//! drops a summarized prefix and installs the new record in one step.
//!
//! # Built-in Implementation
//!
//! [`InMemoryStore`] is suitable for testing and single-process hosts. Hosts
//! that persist sessions to disk can serialize a [`SessionState`] document.

use crate::context::CompactionRecord;
use crate::llm::Message;
use crate::types::ThreadId;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use time::OffsetDateTime;

/// Storage for a session's transcript and its compaction record.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Append a message to the thread's transcript
    ///
    /// # Errors
    /// Returns an error if the message cannot be stored.
    async fn append(&self, thread_id: &ThreadId, message: Message) -> Result<()>;

    /// Get the live transcript for a thread, oldest first
    ///
    /// # Errors
    /// Returns an error if the transcript cannot be retrieved.
    async fn get_messages(&self, thread_id: &ThreadId) -> Result<Vec<Message>>;

    /// Get the thread's compaction record, if it was ever compacted
    ///
    /// # Errors
    /// Returns an error if the record cannot be retrieved.
    async fn compaction_record(&self, thread_id: &ThreadId) -> Result<Option<CompactionRecord>>;

    /// Drop the summarized prefix, keeping `retained`, and store `record`.
    ///
    /// Both changes are applied together or not at all.
    ///
    /// # Errors
    /// Returns an error if `retained` is not a suffix of the current
    /// transcript, or if the state cannot be written.
    async fn replace_prefix(
        &self,
        thread_id: &ThreadId,
        retained: Vec<Message>,
        record: CompactionRecord,
    ) -> Result<()>;

    /// Get the message count for a thread
    ///
    /// # Errors
    /// Returns an error if the count cannot be retrieved.
    async fn count(&self, thread_id: &ThreadId) -> Result<usize> {
        Ok(self.get_messages(thread_id).await?.len())
    }
}

/// The persisted-state document of one session.
///
/// Documents written before the session was ever compacted have no
/// `compaction` field and load with `None`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub thread_id: ThreadId,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compaction: Option<CompactionRecord>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl SessionState {
    #[must_use]
    pub fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            messages: Vec::new(),
            compaction: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Serialize to the persisted JSON document.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize session state")
    }

    /// Parse a persisted JSON document.
    ///
    /// # Errors
    /// Returns an error if the document is malformed or a compaction record
    /// fails validation.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse session state")
    }
}

/// In-memory implementation of `TranscriptStore`.
/// Useful for testing and simple use cases.
#[derive(Default)]
pub struct InMemoryStore {
    sessions: RwLock<HashMap<String, SessionState>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the whole session document, if the thread exists.
    ///
    /// # Errors
    /// Returns an error if the lock is poisoned.
    pub fn snapshot(&self, thread_id: &ThreadId) -> Result<Option<SessionState>> {
        let sessions = self.sessions.read().ok().context("lock poisoned")?;
        Ok(sessions.get(&thread_id.0).cloned())
    }

    /// Install a session document, replacing any existing one for its thread.
    ///
    /// # Errors
    /// Returns an error if the lock is poisoned.
    pub fn restore(&self, state: SessionState) -> Result<()> {
        self.sessions
            .write()
            .ok()
            .context("lock poisoned")?
            .insert(state.thread_id.0.clone(), state);
        Ok(())
    }
}

#[async_trait]
impl TranscriptStore for InMemoryStore {
    async fn append(&self, thread_id: &ThreadId, message: Message) -> Result<()> {
        self.sessions
            .write()
            .ok()
            .context("lock poisoned")?
            .entry(thread_id.0.clone())
            .or_insert_with(|| SessionState::new(thread_id.clone()))
            .messages
            .push(message);
        Ok(())
    }

    async fn get_messages(&self, thread_id: &ThreadId) -> Result<Vec<Message>> {
        let sessions = self.sessions.read().ok().context("lock poisoned")?;
        Ok(sessions
            .get(&thread_id.0)
            .map(|s| s.messages.clone())
            .unwrap_or_default())
    }

    async fn compaction_record(&self, thread_id: &ThreadId) -> Result<Option<CompactionRecord>> {
        let sessions = self.sessions.read().ok().context("lock poisoned")?;
        Ok(sessions.get(&thread_id.0).and_then(|s| s.compaction.clone()))
    }

    async fn replace_prefix(
        &self,
        thread_id: &ThreadId,
        retained: Vec<Message>,
        record: CompactionRecord,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().ok().context("lock poisoned")?;
        let Some(session) = sessions.get_mut(&thread_id.0) else {
            bail!("Unknown thread {thread_id}");
        };

        // The kept messages must be exactly the current tail.
        if !session.messages.ends_with(&retained) {
            bail!(
                "Retained messages are not a suffix of the transcript (thread_id={thread_id}, retained={}, current={})",
                retained.len(),
                session.messages.len()
            );
        }

        session.messages = retained;
        session.compaction = Some(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(summary: &str) -> CompactionRecord {
        CompactionRecord::first(summary.to_string(), 2, 100, 40)
    }

    #[tokio::test]
    async fn test_in_memory_transcript_store() -> Result<()> {
        let store = InMemoryStore::new();
        let thread_id = ThreadId::new();

        // Initially empty
        assert!(store.get_messages(&thread_id).await?.is_empty());
        assert!(store.compaction_record(&thread_id).await?.is_none());

        store.append(&thread_id, Message::user("Hello")).await?;
        store
            .append(&thread_id, Message::assistant("Hi there!"))
            .await?;

        assert_eq!(store.get_messages(&thread_id).await?.len(), 2);
        assert_eq!(store.count(&thread_id).await?, 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_replace_prefix_keeps_suffix_and_sets_record() -> Result<()> {
        let store = InMemoryStore::new();
        let thread_id = ThreadId::new();

        store.append(&thread_id, Message::user("Hello")).await?;
        store
            .append(&thread_id, Message::assistant("Hi there!"))
            .await?;
        store
            .append(&thread_id, Message::user("How are you?"))
            .await?;

        store
            .replace_prefix(
                &thread_id,
                vec![Message::user("How are you?")],
                record("greetings"),
            )
            .await?;

        let messages = store.get_messages(&thread_id).await?;
        assert_eq!(messages, vec![Message::user("How are you?")]);
        let stored = store.compaction_record(&thread_id).await?;
        assert_eq!(stored.map(|r| r.summary).as_deref(), Some("greetings"));

        Ok(())
    }

    #[tokio::test]
    async fn test_replace_prefix_rejects_non_suffix() -> Result<()> {
        let store = InMemoryStore::new();
        let thread_id = ThreadId::new();

        store.append(&thread_id, Message::user("Hello")).await?;
        store
            .append(&thread_id, Message::assistant("Hi there!"))
            .await?;

        let result = store
            .replace_prefix(&thread_id, vec![Message::user("Hello")], record("x"))
            .await;

        assert!(result.is_err());
        // Nothing changed
        assert_eq!(store.count(&thread_id).await?, 2);
        assert!(store.compaction_record(&thread_id).await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_replace_prefix_on_unknown_thread_fails() {
        let store = InMemoryStore::new();
        let result = store
            .replace_prefix(&ThreadId::new(), Vec::new(), record("x"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_and_restore() -> Result<()> {
        let store = InMemoryStore::new();
        let thread_id = ThreadId::from_string("thread-1");
        store.append(&thread_id, Message::user("Hello")).await?;

        let snapshot = store.snapshot(&thread_id)?;
        let Some(snapshot) = snapshot else {
            anyhow::bail!("snapshot missing");
        };

        let other = InMemoryStore::new();
        other.restore(snapshot.clone())?;
        assert_eq!(other.snapshot(&thread_id)?, Some(snapshot));
        assert_eq!(other.get_messages(&thread_id).await?.len(), 1);

        Ok(())
    }

    #[test]
    fn test_session_state_round_trip() -> Result<()> {
        let mut state = SessionState::new(ThreadId::from_string("thread-1"));
        state.messages.push(Message::user("Hello"));
        state.compaction = Some(record("summary"));

        let restored = SessionState::from_json(&state.to_json()?)?;
        assert_eq!(restored, state);
        Ok(())
    }

    #[test]
    fn test_session_state_without_compaction_field() -> Result<()> {
        let json = r#"{
            "thread_id": "thread-1",
            "messages": [{"role": "user", "content": [{"type": "text", "text": "hi"}]}],
            "created_at": "2026-01-05T09:00:00Z"
        }"#;

        let state = SessionState::from_json(json)?;
        assert!(state.compaction.is_none());
        assert_eq!(state.messages.len(), 1);
        assert!(!state.to_json()?.contains("compaction"));
        Ok(())
    }

    #[test]
    fn test_session_state_rejects_invalid_record() {
        let json = r#"{
            "thread_id": "thread-1",
            "created_at": "2026-01-05T09:00:00Z",
            "compaction": {
                "summary": "s",
                "compacted_message_count": 1,
                "tokens_before": 10,
                "tokens_after": 5,
                "compaction_count": 0,
                "last_compacted_at": "2026-01-05T09:00:00Z"
            }
        }"#;
        assert!(SessionState::from_json(json).is_err());
    }
}
