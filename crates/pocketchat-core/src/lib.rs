//! Core conversation pipeline for the pocketchat mobile client.
//!
//! The UI layers (screens, navigation, theming) live in the platform
//! projects; this crate owns everything with invariants attached:
//! durable session storage, the in-memory conversation state, history
//! windowing, and assembly of multi-modal completion requests.

pub mod chat;
pub mod logging;
pub mod settings;

pub use chat::models::{Attachment, ChatSession, Message, Role};
pub use chat::repositories::{ChatStore, InMemoryChatStore, SqliteChatStore, StoreError};
pub use chat::services::attachment::{AttachmentError, PendingAttachments};
pub use chat::services::chat_service::{ChatService, SendOptions};
pub use chat::services::gateway::{CompletionGateway, GatewayError, OpenAiGateway};
pub use chat::services::history_window::WindowConfig;
pub use chat::state::ConversationState;
pub use settings::{ClientSettings, JsonSettingsRepository};
