//! The send/save pipeline: optimistic append, history windowing, request
//! assembly, gateway call, conditional reply append, and the explicit
//! save/update/open/delete flows against the store.

use std::sync::Arc;

use anyhow::{Context, Result, bail, ensure};
use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::attachment::MAX_ATTACHMENTS;
use super::gateway::CompletionGateway;
use super::history_window::{self, WindowConfig};
use super::request;
use crate::chat::models::{Attachment, ChatSession, Message};
use crate::chat::repositories::ChatStore;
use crate::chat::state::ConversationState;
use crate::settings::ClientSettings;

/// Request-shaping options, carried from settings.
#[derive(Debug, Clone)]
pub struct SendOptions {
    pub model: String,
    pub temperature: f32,
    pub window: WindowConfig,
    /// Standing instruction seeded as the first message of every fresh
    /// conversation. Empty disables the preamble.
    pub system_preamble: String,
}

impl From<&ClientSettings> for SendOptions {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            model: settings.model.clone(),
            temperature: settings.temperature,
            window: settings.window,
            system_preamble: settings.system_preamble.clone(),
        }
    }
}

/// Owns the active conversation and drives it through the pipeline.
///
/// Store and gateway calls never hold the state lock across an await;
/// while a completion is outstanding the conversation stays mutable, and
/// a reply that loses the race against `new_conversation`/`open_conversation`
/// is discarded via the state's generation tag.
pub struct ChatService {
    state: Arc<Mutex<ConversationState>>,
    store: Arc<dyn ChatStore>,
    gateway: Arc<dyn CompletionGateway>,
    options: SendOptions,
    active_session: Mutex<Option<i64>>,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        gateway: Arc<dyn CompletionGateway>,
        options: SendOptions,
    ) -> Self {
        let mut state = ConversationState::new();
        if !options.system_preamble.is_empty() {
            state.append(Message::system(options.system_preamble.clone()));
        }

        Self {
            state: Arc::new(Mutex::new(state)),
            store,
            gateway,
            options,
            active_session: Mutex::new(None),
        }
    }

    /// Shared handle for the rendering layer to read and subscribe.
    pub fn state(&self) -> Arc<Mutex<ConversationState>> {
        self.state.clone()
    }

    /// The stored session the open conversation belongs to, if any.
    pub fn active_session(&self) -> Option<i64> {
        *self.active_session.lock()
    }

    /// Ensure the schema exists. A failing store degrades to
    /// empty-history mode instead of blocking startup.
    pub async fn init_storage(&self) {
        if let Err(error) = self.store.ensure_schema().await {
            warn!(%error, "Chat store unavailable; continuing without history");
        }
    }

    /// Send one user turn through the pipeline.
    ///
    /// The user message is appended before the network call and is never
    /// rolled back; on gateway failure the error propagates and the user
    /// is free to resend. Returns the reply text, or `None` when the
    /// conversation was cleared while the completion was outstanding.
    pub async fn send_message(
        &self,
        text: impl Into<String>,
        attachments: Vec<Attachment>,
    ) -> Result<Option<String>> {
        let text = text.into();
        ensure!(
            !text.is_empty() || !attachments.is_empty(),
            "a message needs text or at least one image"
        );
        ensure!(
            attachments.len() <= MAX_ATTACHMENTS,
            "a message can include at most {MAX_ATTACHMENTS} images"
        );

        let (completion_request, generation) = {
            let mut state = self.state.lock();
            let outgoing = Message::user(text, attachments);
            let window = history_window::select(state.messages(), self.options.window);
            let completion_request = request::assemble(
                &self.options.model,
                self.options.temperature,
                &window,
                &outgoing,
            );
            state.append(outgoing);
            (completion_request, state.generation())
        };

        let reply = self
            .gateway
            .complete(completion_request)
            .await
            .context("completion request failed")?;

        let mut state = self.state.lock();
        if state.append_if_current(generation, Message::assistant(reply.clone())) {
            Ok(Some(reply))
        } else {
            debug!("Reply arrived for a conversation that is gone; dropped");
            Ok(None)
        }
    }

    /// Persist the open conversation as a new session.
    pub async fn save_conversation(&self, title: &str) -> Result<i64> {
        let snapshot: Vec<Message> = self.state.lock().messages().to_vec();

        let saved = self
            .store
            .save_session(title, &snapshot)
            .await
            .context("failed to save chat session")?;

        let assigned: Vec<(Uuid, i64)> = snapshot
            .iter()
            .map(|m| m.local_id)
            .zip(saved.message_ids.iter().copied())
            .collect();
        self.state.lock().mark_persisted(&assigned);
        *self.active_session.lock() = Some(saved.session_id);

        Ok(saved.session_id)
    }

    /// Append the not-yet-persisted messages to the open session.
    /// Returns how many rows were written (zero is a valid no-op).
    pub async fn update_conversation(&self) -> Result<usize> {
        let Some(session_id) = self.active_session() else {
            bail!("no saved session is open");
        };

        let snapshot: Vec<Message> = self.state.lock().messages().to_vec();
        let row_ids = self
            .store
            .update_session(session_id, &snapshot)
            .await
            .context("failed to update chat session")?;

        let assigned: Vec<(Uuid, i64)> = snapshot
            .iter()
            .filter(|m| !m.persisted)
            .map(|m| m.local_id)
            .zip(row_ids.iter().copied())
            .collect();
        self.state.lock().mark_persisted(&assigned);

        Ok(row_ids.len())
    }

    /// Replace the open conversation with a stored session.
    pub async fn open_conversation(&self, session_id: i64) -> Result<()> {
        let messages = self
            .store
            .load_messages(session_id)
            .await
            .context("failed to load chat session")?;

        self.state.lock().replace_all(messages);
        *self.active_session.lock() = Some(session_id);
        Ok(())
    }

    /// Drop the open conversation and start fresh (with the preamble).
    pub fn new_conversation(&self) {
        let mut state = self.state.lock();
        state.clear();
        if !self.options.system_preamble.is_empty() {
            state.append(Message::system(self.options.system_preamble.clone()));
        }
        *self.active_session.lock() = None;
    }

    pub async fn list_conversations(&self) -> Result<Vec<ChatSession>> {
        self.store
            .list_sessions()
            .await
            .context("failed to list chat sessions")
    }

    /// Delete a stored session and return the surviving list.
    pub async fn delete_conversation(&self, session_id: i64) -> Result<Vec<ChatSession>> {
        self.store
            .delete_session(session_id)
            .await
            .context("failed to delete chat session")?;

        if self.active_session() == Some(session_id) {
            self.new_conversation();
        }

        self.list_conversations().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::repositories::{
        BoxFuture, InMemoryChatStore, SavedSession, StoreError, StoreResult,
    };
    use crate::chat::services::gateway::GatewayError;
    use crate::chat::services::request::{CompletionRequest, TurnContent};

    type Hook = Box<dyn Fn() + Send + Sync>;

    /// Store stub standing in for a device whose storage is unavailable:
    /// every operation fails, schema init included.
    struct BrokenStore;

    fn storage_unavailable<T: Send + 'static>() -> BoxFuture<'static, StoreResult<T>> {
        Box::pin(async {
            Err(StoreError::Initialization {
                message: "storage unavailable".to_string(),
            })
        })
    }

    impl ChatStore for BrokenStore {
        fn ensure_schema(&self) -> BoxFuture<'static, StoreResult<()>> {
            storage_unavailable()
        }

        fn list_sessions(&self) -> BoxFuture<'static, StoreResult<Vec<ChatSession>>> {
            storage_unavailable()
        }

        fn load_messages(&self, _session_id: i64) -> BoxFuture<'static, StoreResult<Vec<Message>>> {
            storage_unavailable()
        }

        fn save_session(
            &self,
            _title: &str,
            _messages: &[Message],
        ) -> BoxFuture<'static, StoreResult<SavedSession>> {
            storage_unavailable()
        }

        fn update_session(
            &self,
            _session_id: i64,
            _messages: &[Message],
        ) -> BoxFuture<'static, StoreResult<Vec<i64>>> {
            storage_unavailable()
        }

        fn delete_session(&self, _session_id: i64) -> BoxFuture<'static, StoreResult<()>> {
            storage_unavailable()
        }
    }

    /// Gateway stub: records requests, optionally fails, optionally runs
    /// a hook before replying (to model races against the in-flight call).
    struct StubGateway {
        reply: Option<String>,
        requests: Arc<Mutex<Vec<CompletionRequest>>>,
        before_reply: Mutex<Option<Hook>>,
    }

    impl StubGateway {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                requests: Arc::new(Mutex::new(Vec::new())),
                before_reply: Mutex::new(None),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                requests: Arc::new(Mutex::new(Vec::new())),
                before_reply: Mutex::new(None),
            }
        }
    }

    impl CompletionGateway for StubGateway {
        fn complete(
            &self,
            request: CompletionRequest,
        ) -> BoxFuture<'static, Result<String, GatewayError>> {
            self.requests.lock().push(request);
            if let Some(hook) = self.before_reply.lock().as_ref() {
                hook();
            }
            let reply = self.reply.clone();
            Box::pin(async move {
                reply.ok_or(GatewayError::Remote {
                    status: 500,
                    message: "stub failure".to_string(),
                })
            })
        }
    }

    fn options() -> SendOptions {
        SendOptions {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            window: WindowConfig::default(),
            system_preamble: "send messages in markdown format".to_string(),
        }
    }

    fn service_with(gateway: StubGateway) -> (ChatService, Arc<Mutex<Vec<CompletionRequest>>>) {
        let requests = gateway.requests.clone();
        let service = ChatService::new(
            Arc::new(InMemoryChatStore::new()),
            Arc::new(gateway),
            options(),
        );
        (service, requests)
    }

    #[tokio::test]
    async fn test_send_appends_user_then_reply() {
        let (service, requests) = service_with(StubGateway::replying("hello!"));

        let reply = service.send_message("hi", Vec::new()).await.unwrap();
        assert_eq!(reply.as_deref(), Some("hello!"));

        let state = service.state();
        let state = state.lock();
        let texts: Vec<&str> = state.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["send messages in markdown format", "hi", "hello!"]);

        let requests = requests.lock();
        assert_eq!(requests.len(), 1);
        let turns = &requests[0].messages;
        assert_eq!(turns.len(), 2);
        assert_eq!(
            turns[0].content,
            TurnContent::Text("send messages in markdown format".to_string())
        );
        assert_eq!(turns[1].content, TurnContent::Text("hi".to_string()));
    }

    #[tokio::test]
    async fn test_gateway_failure_keeps_user_message() {
        let (service, _) = service_with(StubGateway::failing());

        let result = service.send_message("hi", Vec::new()).await;
        assert!(result.is_err());

        let state = service.state();
        let state = state.lock();
        let texts: Vec<&str> = state.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["send messages in markdown format", "hi"]);
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let (service, requests) = service_with(StubGateway::replying("never"));

        let result = service.send_message("", Vec::new()).await;
        assert!(result.is_err());
        assert!(requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_empty_text_allowed_with_attachment() {
        let (service, _) = service_with(StubGateway::replying("nice photo"));

        let reply = service
            .send_message("", vec![Attachment::new("aW1n")])
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("nice photo"));
    }

    #[tokio::test]
    async fn test_too_many_attachments_rejected() {
        let (service, requests) = service_with(StubGateway::replying("never"));

        let attachments = (0..4).map(|i| Attachment::new(format!("{i}"))).collect();
        let result = service.send_message("hi", attachments).await;
        assert!(result.is_err());
        assert!(requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_long_history_is_windowed() {
        let (service, requests) = service_with(StubGateway::replying("ok"));

        {
            let state = service.state();
            let mut state = state.lock();
            for i in 0..14 {
                state.append(Message::user(format!("filler {i}"), Vec::new()));
            }
        }

        service.send_message("latest", Vec::new()).await.unwrap();

        let requests = requests.lock();
        // 11 windowed history turns plus the outgoing message.
        assert_eq!(requests[0].messages.len(), 12);
        assert_eq!(
            requests[0].messages[0].content,
            TurnContent::Text("send messages in markdown format".to_string())
        );
        assert_eq!(
            requests[0].messages[11].content,
            TurnContent::Text("latest".to_string())
        );
    }

    #[tokio::test]
    async fn test_reply_racing_a_clear_is_discarded() {
        let gateway = Arc::new(StubGateway::replying("too late"));
        let requests = gateway.requests.clone();

        let service = ChatService::new(
            Arc::new(InMemoryChatStore::new()),
            gateway.clone(),
            options(),
        );

        // Clear the conversation while the completion is outstanding.
        let state = service.state();
        *gateway.before_reply.lock() = Some(Box::new(move || {
            state.lock().clear();
        }));

        let reply = service.send_message("hi", Vec::new()).await.unwrap();
        assert_eq!(reply, None);
        assert_eq!(requests.lock().len(), 1);

        let state = service.state();
        let state = state.lock();
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_save_open_update_round_trip() {
        let (service, _) = service_with(StubGateway::replying("Paris, easily"));

        service.send_message("Where to go?", Vec::new()).await.unwrap();
        let session_id = service.save_conversation("Trip").await.unwrap();

        let sessions = service.list_conversations().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].title, "Trip");

        // Everything snapshot at save time is now persisted.
        {
            let state = service.state();
            let state = state.lock();
            assert!(state.messages().iter().all(|m| m.persisted));
        }

        // A saved session with nothing new is a zero-write update.
        assert_eq!(service.update_conversation().await.unwrap(), 0);

        service.send_message("And in winter?", Vec::new()).await.unwrap();
        assert_eq!(service.update_conversation().await.unwrap(), 2);

        service.open_conversation(session_id).await.unwrap();
        let state = service.state();
        let state = state.lock();
        assert_eq!(state.len(), 5);
        assert!(state.messages().iter().all(|m| m.persisted));
        assert_eq!(state.messages()[1].text, "Where to go?");
        assert_eq!(state.messages()[4].text, "Paris, easily");
    }

    #[tokio::test]
    async fn test_delete_active_session_starts_fresh() {
        let (service, _) = service_with(StubGateway::replying("ok"));

        service.send_message("hi", Vec::new()).await.unwrap();
        let session_id = service.save_conversation("Doomed").await.unwrap();

        let survivors = service.delete_conversation(session_id).await.unwrap();
        assert!(survivors.is_empty());
        assert_eq!(service.active_session(), None);

        let state = service.state();
        let state = state.lock();
        let texts: Vec<&str> = state.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["send messages in markdown format"]);
    }

    #[tokio::test]
    async fn test_broken_store_degrades_to_empty_history() {
        let service = ChatService::new(
            Arc::new(BrokenStore),
            Arc::new(StubGateway::replying("still here")),
            options(),
        );

        // Startup survives a store that cannot initialize.
        service.init_storage().await;

        // Chatting does not depend on storage at all.
        let reply = service.send_message("hi", Vec::new()).await.unwrap();
        assert_eq!(reply.as_deref(), Some("still here"));

        // Persistence paths report failure instead of panicking, and the
        // in-memory conversation is untouched by the failed save.
        assert!(service.list_conversations().await.is_err());
        assert!(service.save_conversation("Trip").await.is_err());

        let state = service.state();
        let state = state.lock();
        assert_eq!(state.len(), 3);
        assert!(state.messages().iter().all(|m| !m.persisted));
    }

    #[tokio::test]
    async fn test_update_without_open_session_fails() {
        let (service, _) = service_with(StubGateway::replying("ok"));
        assert!(service.update_conversation().await.is_err());
    }
}
