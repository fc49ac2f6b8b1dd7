//! The `Context` — the bounded, assembled input for one generation call.
//!
//! A `Context` is ephemeral: it is built fresh per model call as a rendering
//! of conversation memory plus retrieved evidence at a point in time, and is
//! never persisted directly.

use crate::message::{Message, Role};
use serde::{Deserialize, Serialize};

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

/// The input handed to the completion service for one generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    /// System prompt, kept separate from the message sequence so the
    /// truncator can preserve it unconditionally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Ordered messages.
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Maximum tokens the model may generate.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Context {
    /// Create an empty context with an optional system prompt.
    pub fn new(system_prompt: Option<String>) -> Self {
        Self {
            system_prompt,
            messages: Vec::new(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }

    /// Convenience constructor for a context with a system prompt.
    pub fn with_system(prompt: impl Into<String>) -> Self {
        Self::new(Some(prompt.into()))
    }

    /// Append a message to the context.
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
    }

    /// Append an already-built message (keeps its metadata).
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// The last message, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Render the context as role/content pairs for API consumption.
    /// The system prompt, when present, becomes the leading `system` entry.
    pub fn formatted_messages(&self) -> Vec<(String, String)> {
        let mut formatted = Vec::with_capacity(self.messages.len() + 1);

        if let Some(prompt) = &self.system_prompt {
            formatted.push(("system".to_string(), prompt.clone()));
        }

        for message in &self.messages {
            formatted.push((message.role.as_str().to_string(), message.content.clone()));
        }

        formatted
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(None)
    }
}
