//! Token estimation utilities.
//!
//! Uses a character-based heuristic: 1 token ≈ 2.5 characters of text,
//! rounding up, plus a flat cost per image reference. Only used to decide
//! compaction timing — never surfaced externally.

use riptide_core::message::{ContentPart, Message, MessageContent};

/// Flat token cost attributed to one image reference.
const IMAGE_TOKENS: usize = 85;

/// Estimate the token count for a text segment: ceil(len / 2.5).
pub fn estimate_text_tokens(text: &str) -> usize {
    (text.len() * 2).div_ceil(5)
}

/// Estimate tokens for a single message.
pub fn estimate_message_tokens(message: &Message) -> usize {
    match &message.content {
        MessageContent::Text(text) => estimate_text_tokens(text),
        MessageContent::Parts(parts) => parts
            .iter()
            .map(|p| match p {
                ContentPart::Text { text } => estimate_text_tokens(text),
                ContentPart::Image { .. } => IMAGE_TOKENS,
            })
            .sum(),
    }
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}
