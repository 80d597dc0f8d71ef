use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use super::chat_store::{BoxFuture, ChatStore, SavedSession};
use super::error::{StoreError, StoreResult};
use crate::chat::models::{ChatSession, Message};

#[derive(Default)]
struct Inner {
    next_session_id: i64,
    next_message_id: i64,
    sessions: HashMap<i64, ChatSession>,
    // Per-session messages in append order.
    messages: HashMap<i64, Vec<Message>>,
}

/// In-memory chat store.
/// Useful for testing and development.
#[derive(Clone, Default)]
pub struct InMemoryChatStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatStore for InMemoryChatStore {
    fn ensure_schema(&self) -> BoxFuture<'static, StoreResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn list_sessions(&self) -> BoxFuture<'static, StoreResult<Vec<ChatSession>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let inner = inner.lock();
            let mut sessions: Vec<ChatSession> = inner.sessions.values().cloned().collect();
            // Newest first, same as the SQLite store.
            sessions.sort_by_key(|s| std::cmp::Reverse(s.id));
            Ok(sessions)
        })
    }

    fn load_messages(&self, session_id: i64) -> BoxFuture<'static, StoreResult<Vec<Message>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let inner = inner.lock();
            Ok(inner.messages.get(&session_id).cloned().unwrap_or_default())
        })
    }

    fn save_session(
        &self,
        title: &str,
        messages: &[Message],
    ) -> BoxFuture<'static, StoreResult<SavedSession>> {
        let inner = self.inner.clone();
        let title = title.to_string();
        let messages = messages.to_vec();
        Box::pin(async move {
            if title.trim().is_empty() {
                return Err(StoreError::EmptyTitle);
            }

            let mut inner = inner.lock();
            inner.next_session_id += 1;
            let session_id = inner.next_session_id;

            inner.sessions.insert(
                session_id,
                ChatSession {
                    id: session_id,
                    title,
                    created_at: Utc::now().to_rfc3339(),
                },
            );

            let mut message_ids = Vec::with_capacity(messages.len());
            let mut stored = Vec::with_capacity(messages.len());
            for mut message in messages {
                inner.next_message_id += 1;
                message.mark_persisted(inner.next_message_id);
                message_ids.push(inner.next_message_id);
                stored.push(message);
            }
            inner.messages.insert(session_id, stored);

            Ok(SavedSession {
                session_id,
                message_ids,
            })
        })
    }

    fn update_session(
        &self,
        session_id: i64,
        messages: &[Message],
    ) -> BoxFuture<'static, StoreResult<Vec<i64>>> {
        let inner = self.inner.clone();
        let pending: Vec<Message> = messages.iter().filter(|m| !m.persisted).cloned().collect();
        Box::pin(async move {
            if pending.is_empty() {
                return Ok(Vec::new());
            }

            let mut inner = inner.lock();
            // Mirror the SQLite store, where the FK constraint rejects
            // inserts against a session that does not exist.
            if !inner.sessions.contains_key(&session_id) {
                return Err(StoreError::MissingSession { session_id });
            }

            let mut message_ids = Vec::with_capacity(pending.len());
            let mut appended = Vec::with_capacity(pending.len());
            for mut message in pending {
                inner.next_message_id += 1;
                message.mark_persisted(inner.next_message_id);
                message_ids.push(inner.next_message_id);
                appended.push(message);
            }
            inner
                .messages
                .entry(session_id)
                .or_default()
                .extend(appended);

            Ok(message_ids)
        })
    }

    fn delete_session(&self, session_id: i64) -> BoxFuture<'static, StoreResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut inner = inner.lock();
            inner.sessions.remove(&session_id);
            inner.messages.remove(&session_id);
            Ok(())
        })
    }
}
