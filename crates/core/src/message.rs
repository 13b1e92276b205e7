//! Message and session domain types.
//!
//! These are the core value objects that flow through the engine:
//! the orchestrator appends messages, the memory store caches and compacts
//! them, and the prompt builder reads them back for the next model call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a session.
///
/// Sessions are created lazily on first execution and persist until
/// explicitly cleared or replaced by a new identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions and tool-result records
    System,
    /// Tool execution result (reserved for provider-native tool protocols)
    Tool,
}

/// One segment of multi-part message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentPart {
    /// A text segment.
    Text { text: String },
    /// A reference to an image by URL; the bytes live elsewhere.
    Image { url: String },
}

/// Message content: either plain text or an ordered part sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Concatenated text of all text segments (images contribute nothing).
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(t) => t.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Image { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// A single message in a session log.
///
/// Immutable once appended, except when replaced wholesale during
/// compaction. Order within a session is conversationally significant and
/// must never be reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The content (text or ordered parts)
    pub content: MessageContent,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Optional metadata (summary markers, tool names, etc.)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Metadata key marking a message as a compaction summary.
pub const SUMMARY_MARKER: &str = "compacted_summary";

impl Message {
    fn with_role(role: Role, content: impl Into<MessageContent>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a compaction summary message (marked in metadata so later
    /// compaction passes know to merge rather than discard it).
    pub fn summary(content: impl Into<MessageContent>) -> Self {
        let mut msg = Self::with_role(Role::System, content);
        msg.metadata
            .insert(SUMMARY_MARKER.into(), serde_json::Value::Bool(true));
        msg
    }

    /// Whether this message is a compaction summary.
    pub fn is_summary(&self) -> bool {
        self.metadata
            .get(SUMMARY_MARKER)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// A permanent record of one compaction pass: a contiguous prefix of a
/// session's log replaced by a single summary. A session may accumulate
/// multiple records over its lifetime, each covering the messages compacted
/// since the previous one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactedMemory {
    /// The summary text that replaced the compacted prefix.
    pub summary: String,

    /// How many original messages this record covers.
    pub message_count: usize,

    /// Index of the oldest compacted message (session-absolute).
    pub from_index: usize,

    /// Index of the newest compacted message (session-absolute).
    pub to_index: usize,
}
