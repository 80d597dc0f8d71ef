/// A saved conversation as listed on the history screen.
///
/// Sessions only come into existence through an explicit save — loading
/// never creates one. Messages belong to exactly one session and are
/// removed with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSession {
    /// Store-assigned, monotonically increasing.
    pub id: i64,
    pub title: String,
    /// RFC 3339 UTC timestamp assigned at save time.
    pub created_at: String,
}
