use std::future::Future;
use std::pin::Pin;

use super::error::StoreResult;
use crate::chat::models::{ChatSession, Message};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Row ids assigned by [`ChatStore::save_session`], in the order the
/// messages were given, so the caller can mark its in-memory copies
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedSession {
    pub session_id: i64,
    pub message_ids: Vec<i64>,
}

/// Durable repository of chat sessions and their ordered messages.
///
/// Absence is never an error here: loading an unknown session yields an
/// empty list, deleting an unknown id is a no-op. Multi-row operations
/// run in a single transaction — a session row is never left referencing
/// a partial message set.
pub trait ChatStore: Send + Sync + 'static {
    /// Idempotently ensure the schema exists. Callers treat failure as
    /// degradation to empty history, not as fatal.
    fn ensure_schema(&self) -> BoxFuture<'static, StoreResult<()>>;

    /// All sessions, newest first. Empty when none exist.
    fn list_sessions(&self) -> BoxFuture<'static, StoreResult<Vec<ChatSession>>>;

    /// The ordered messages of one session, each tagged `persisted`.
    fn load_messages(&self, session_id: i64) -> BoxFuture<'static, StoreResult<Vec<Message>>>;

    /// Atomically create a session and insert all given messages in order.
    /// Fails with [`StoreError::EmptyTitle`] for an empty title.
    fn save_session(
        &self,
        title: &str,
        messages: &[Message],
    ) -> BoxFuture<'static, StoreResult<SavedSession>>;

    /// Append only the messages not yet marked persisted, preserving
    /// their relative order. Returns the assigned row ids (empty when
    /// everything was already persisted — a no-op, not an error).
    fn update_session(
        &self,
        session_id: i64,
        messages: &[Message],
    ) -> BoxFuture<'static, StoreResult<Vec<i64>>>;

    /// Remove the session and, in the same transaction, all its messages.
    fn delete_session(&self, session_id: i64) -> BoxFuture<'static, StoreResult<()>>;
}
