//! Bounds the history forwarded to the remote model.

use serde::{Deserialize, Serialize};

use crate::chat::models::Message;

/// How much history accompanies each completion request.
///
/// The first message of a conversation is the standing system/style
/// instruction and is always kept. Once the conversation outgrows
/// `keep_recent + 1` messages, only the first plus the `keep_recent`
/// most recent ones are eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub keep_recent: usize,
}

impl WindowConfig {
    /// Conversation length above which trimming kicks in.
    pub fn threshold(&self) -> usize {
        self.keep_recent + 1
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { keep_recent: 10 }
    }
}

/// Select the messages eligible for the next request.
///
/// Pure and deterministic: no side effects, the same input list always
/// yields the same window.
pub fn select<'a>(messages: &'a [Message], config: WindowConfig) -> Vec<&'a Message> {
    if messages.len() <= config.threshold() {
        return messages.iter().collect();
    }

    let tail_start = messages.len() - config.keep_recent;
    std::iter::once(&messages[0])
        .chain(messages[tail_start..].iter())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::models::Message;

    fn conversation(len: usize) -> Vec<Message> {
        (0..len)
            .map(|i| {
                if i == 0 {
                    Message::system("preamble")
                } else {
                    Message::user(format!("message {i}"), Vec::new())
                }
            })
            .collect()
    }

    #[test]
    fn test_short_conversation_passes_through() {
        let config = WindowConfig::default();
        for len in 0..=config.threshold() {
            let messages = conversation(len);
            let window = select(&messages, config);
            assert_eq!(window.len(), len);
            for (selected, original) in window.iter().zip(messages.iter()) {
                assert_eq!(selected.text, original.text);
            }
        }
    }

    #[test]
    fn test_long_conversation_keeps_first_plus_recent() {
        let config = WindowConfig::default();
        let messages = conversation(12);
        let window = select(&messages, config);

        assert_eq!(window.len(), 11);
        assert_eq!(window[0].text, "preamble");
        assert_eq!(window[1].text, "message 2");
        assert_eq!(window[10].text, "message 11");
    }

    #[test]
    fn test_window_never_exceeds_threshold() {
        let config = WindowConfig::default();
        for len in 0..50 {
            let messages = conversation(len);
            assert!(select(&messages, config).len() <= config.threshold());
        }
    }

    #[test]
    fn test_custom_tail_length() {
        let config = WindowConfig { keep_recent: 2 };
        let messages = conversation(5);
        let window = select(&messages, config);

        let texts: Vec<&str> = window.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["preamble", "message 3", "message 4"]);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let config = WindowConfig::default();
        let messages = conversation(30);
        let first: Vec<&str> = select(&messages, config)
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        let second: Vec<&str> = select(&messages, config)
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(first, second);
    }
}
