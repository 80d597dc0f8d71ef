pub mod chat_store;
pub mod error;
pub mod in_memory_store;
pub mod sqlite_store;

pub use chat_store::{BoxFuture, ChatStore, SavedSession};
pub use error::{StoreError, StoreResult};
pub use in_memory_store::InMemoryChatStore;
pub use sqlite_store::SqliteChatStore;
