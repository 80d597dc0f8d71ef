use tracing::debug;

use super::models::Message;

/// Callback invoked after every mutation, with the new message list.
pub type Subscriber = Box<dyn Fn(&[Message]) + Send + Sync>;

/// Handle returned by [`ConversationState::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// The authoritative in-memory conversation for the screen currently open.
///
/// Replaces the original global reducer store: an explicit object the
/// surrounding application shares (typically behind `Arc<Mutex<_>>`), with
/// subscriptions for UI refresh. Mutation is synchronous — by the time a
/// mutator returns, subscribers have been notified and the change is
/// visible to the next read.
///
/// `generation` identifies the conversation currently loaded: `clear` and
/// `replace_all` bump it, so a completion issued against an earlier
/// generation can detect that its conversation is gone and discard the
/// late reply instead of appending it.
pub struct ConversationState {
    messages: Vec<Message>,
    generation: u64,
    next_subscription: u64,
    subscribers: Vec<(u64, Subscriber)>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            generation: 0,
            next_subscription: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Append one message to the end of the conversation.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.notify();
    }

    /// Append only if the conversation has not been cleared or replaced
    /// since `generation` was observed. Returns whether the message was
    /// appended.
    pub fn append_if_current(&mut self, generation: u64, message: Message) -> bool {
        if generation != self.generation {
            debug!(
                expected = generation,
                current = self.generation,
                "Discarding late message for a replaced conversation"
            );
            return false;
        }
        self.append(message);
        true
    }

    /// Replace the whole conversation, e.g. after a store load.
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.generation += 1;
        self.notify();
    }

    /// Drop every message, including any system preamble.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.generation += 1;
        self.notify();
    }

    /// Apply store-assigned row ids after a save or update. Messages not
    /// named in `assigned` (matched by transient id) are left untouched.
    pub fn mark_persisted(&mut self, assigned: &[(uuid::Uuid, i64)]) {
        for (local_id, row_id) in assigned {
            if let Some(message) = self.messages.iter_mut().find(|m| m.local_id == *local_id) {
                message.mark_persisted(*row_id);
            }
        }
        self.notify();
    }

    pub fn subscribe(&mut self, subscriber: Subscriber) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.subscribers.push((id, subscriber));
        SubscriptionId(id)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscribers.retain(|(sid, _)| *sid != id.0);
    }

    fn notify(&self) {
        for (_, subscriber) in &self.subscribers {
            subscriber(&self.messages);
        }
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}
