//! Wire types for the completion endpoint (OpenAI-compatible) and the
//! mapping from in-memory messages onto them.

use serde::{Deserialize, Serialize};

use crate::chat::models::{Message, Role};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Turn>,
    pub temperature: f32,
}

/// One role-tagged entry in the outbound request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: TurnContent,
}

/// Text-only turns serialize as a plain string; turns carrying images as
/// a list of typed parts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Map one message onto a wire turn.
///
/// The text part is always present, even when the stored text is empty;
/// image parts follow in the order the attachments were added, each as a
/// self-contained data URI.
pub fn turn_for(message: &Message) -> Turn {
    let content = if message.attachments.is_empty() {
        TurnContent::Text(message.text.clone())
    } else {
        let mut parts = Vec::with_capacity(message.attachments.len() + 1);
        parts.push(ContentPart::Text {
            text: message.text.clone(),
        });
        for attachment in &message.attachments {
            parts.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: attachment.data_uri(),
                },
            });
        }
        TurnContent::Parts(parts)
    };

    Turn {
        role: message.role,
        content,
    }
}

/// Assemble the full request body from the eligible history window plus
/// the new outgoing message. Stateless: no caching, no deduplication.
pub fn assemble(
    model: &str,
    temperature: f32,
    window: &[&Message],
    outgoing: &Message,
) -> CompletionRequest {
    let messages = window
        .iter()
        .copied()
        .chain(std::iter::once(outgoing))
        .map(turn_for)
        .collect();

    CompletionRequest {
        model: model.to_string(),
        messages,
        temperature,
    }
}
