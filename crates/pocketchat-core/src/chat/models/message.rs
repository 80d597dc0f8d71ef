use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Every attachment in this system is a JPEG; the camera/gallery layer
/// re-encodes before handing bytes to the core.
pub const ATTACHMENT_MIME: &str = "image/jpeg";

/// Who produced a message. Fixed at creation, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    /// Parse the stored `type` column value.
    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "system" => Some(Role::System),
            _ => None,
        }
    }
}

/// An inline-encoded image owned by exactly one message.
///
/// The payload is the base64 text of the JPEG bytes — never a filesystem
/// path. Serializes transparently so a list of attachments round-trips as
/// a plain JSON array of strings in the `image` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attachment {
    pub data: String,
}

impl Attachment {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }

    /// Self-contained data URI for the wire format.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", ATTACHMENT_MIME, self.data)
    }
}

/// One entry in a conversation.
///
/// Created in memory first (`persisted = false`, identity carried by
/// `local_id`); the store assigns `id` when the message is durably
/// written.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Store-assigned row id, present once persisted.
    pub id: Option<i64>,
    /// Client-assigned transient identity, assigned at creation.
    pub local_id: Uuid,
    pub role: Role,
    pub text: String,
    pub attachments: Vec<Attachment>,
    pub persisted: bool,
}

impl Message {
    fn new(role: Role, text: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            id: None,
            local_id: Uuid::new_v4(),
            role,
            text: text.into(),
            attachments,
            persisted: false,
        }
    }

    pub fn user(text: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self::new(Role::User, text, attachments)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text, Vec::new())
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text, Vec::new())
    }

    /// Record the row id handed back by the store.
    pub fn mark_persisted(&mut self, row_id: i64) {
        self.id = Some(row_id);
        self.persisted = true;
    }
}
