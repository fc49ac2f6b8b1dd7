//! Fact extraction and summarization — the background half of memory.
//!
//! Both operations are invoked fire-and-forget relative to the user-facing
//! response. They must never delay the reply and never propagate errors:
//! extraction degrades to an empty map, summarization to a sentinel string.

use crate::conversation::ConversationMemory;
use crate::decode::decode_topic_map;
use hearth_core::context::Context;
use hearth_core::message::{Message, Role};
use hearth_core::provider::Provider;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Returned by `generate_summary` when there is nothing to summarize.
pub const NO_CONVERSATION_SENTINEL: &str = "No conversation to summarize yet.";

/// Returned by `generate_summary` when the completion service fails.
pub const SUMMARY_FAILED_SENTINEL: &str = "Unable to summarize the conversation.";

const EXTRACTION_PROMPT: &str = "You are a fact extraction specialist. Your task is to identify \
important facts, data points, or information from the given message that should be remembered \
for future reference. Return your response in JSON format like this:\n\
{\n  \"topic1\": [\"fact1\", \"fact2\"],\n  \"topic2\": [\"fact3\"]\n}\n\
Only include truly important information. If no important facts are present, return an empty \
JSON object {}. IMPORTANT: Return ONLY the raw JSON without any markdown formatting, code \
blocks, or explanations.";

const SUMMARY_PROMPT: &str = "You are a conversation summarizer. Create a concise summary of \
the following conversation, focusing on key points, decisions, and important information. \
Highlight any facts or data that should be remembered for future reference. Keep your summary \
under 200 words.";

/// Ask the model to extract topic-keyed facts from one message.
///
/// Never raises to the caller: a provider failure or unparseable output
/// yields an empty map, logged only.
pub async fn extract_key_facts(
    provider: &dyn Provider,
    message: &Message,
) -> HashMap<String, Vec<String>> {
    let mut context = Context::with_system(EXTRACTION_PROMPT);
    context.add_message(
        Role::User,
        format!("Extract important facts from this message:\n\n{}", message.content),
    );

    match provider.generate(&context).await {
        Ok(raw) => {
            let facts = decode_topic_map(&raw);
            debug!(topics = facts.len(), "Fact extraction complete");
            facts
        }
        Err(e) => {
            warn!(error = %e, "Fact extraction call failed");
            HashMap::new()
        }
    }
}

/// Summarize a window of conversation messages.
///
/// Empty input yields [`NO_CONVERSATION_SENTINEL`]; a provider failure
/// yields [`SUMMARY_FAILED_SENTINEL`]. Neither case is an error.
pub async fn generate_summary(provider: &dyn Provider, messages: &[Message]) -> String {
    if messages.is_empty() {
        return NO_CONVERSATION_SENTINEL.to_string();
    }

    let transcript: Vec<String> = messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect();

    let mut context = Context::with_system(SUMMARY_PROMPT);
    context.add_message(
        Role::User,
        format!("Please summarize this conversation:\n\n{}", transcript.join("\n")),
    );

    match provider.generate(&context).await {
        Ok(summary) => summary,
        Err(e) => {
            warn!(error = %e, "Summary generation failed");
            SUMMARY_FAILED_SENTINEL.to_string()
        }
    }
}

/// Owner of a session's fire-and-forget tasks.
///
/// Tasks are tracked in a `JoinSet` so session teardown can abort anything
/// still in flight instead of leaking detached work. There is no ordering
/// guarantee between tasks: a summary spawned on turn N may land after turn
/// N+1 has started, and overlapping summary generations resolve as
/// last-write-wins.
pub struct BackgroundTasks {
    tasks: Mutex<JoinSet<()>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Extract facts from `message` and fold them into long-term memory.
    pub fn spawn_fact_extraction(
        &self,
        provider: Arc<dyn Provider>,
        memory: Arc<ConversationMemory>,
        message: Message,
    ) {
        self.tasks.lock().unwrap().spawn(async move {
            let facts = extract_key_facts(provider.as_ref(), &message).await;
            if facts.is_empty() {
                return;
            }
            let total: usize = facts.values().map(|v| v.len()).sum();
            info!(topics = facts.len(), facts = total, "Storing extracted facts");
            for (topic, fact_list) in facts {
                for fact in fact_list {
                    memory.add_to_long_term(&topic, fact).await;
                }
            }
        });
    }

    /// Regenerate the rolling summary from the current short-term buffer.
    pub fn spawn_summary(&self, provider: Arc<dyn Provider>, memory: Arc<ConversationMemory>) {
        self.tasks.lock().unwrap().spawn(async move {
            let window = memory.short_term().await;
            if window.is_empty() {
                return;
            }
            let summary = generate_summary(provider.as_ref(), &window).await;
            if summary == SUMMARY_FAILED_SENTINEL || summary == NO_CONVERSATION_SENTINEL {
                return;
            }
            memory.add_summary(summary).await;
        });
    }

    /// Abort all outstanding tasks (session teardown).
    pub fn shutdown(&self) {
        self.tasks.lock().unwrap().abort_all();
    }

    /// Wait for every task spawned so far to finish. Test support — the
    /// request path never blocks on background work.
    pub async fn wait_idle(&self) {
        let mut drained = {
            let mut guard = self.tasks.lock().unwrap();
            std::mem::take(&mut *guard)
        };
        while drained.join_next().await.is_some() {}
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_providers::ScriptedProvider;

    #[tokio::test]
    async fn extraction_parses_model_output() {
        let provider = ScriptedProvider::always(r#"{"deadline": ["report due Friday"]}"#);
        let facts = extract_key_facts(&provider, &Message::user("the report is due Friday")).await;
        assert_eq!(facts["deadline"], vec!["report due Friday"]);
    }

    #[tokio::test]
    async fn extraction_never_raises_on_garbage() {
        let provider = ScriptedProvider::always("I couldn't find any facts, sorry!");
        let facts = extract_key_facts(&provider, &Message::user("hi")).await;
        assert!(facts.is_empty());
    }

    #[tokio::test]
    async fn extraction_swallows_provider_errors() {
        let provider = ScriptedProvider::failing("connection refused");
        let facts = extract_key_facts(&provider, &Message::user("hi")).await;
        assert!(facts.is_empty());
    }

    #[tokio::test]
    async fn summary_of_empty_window_is_sentinel() {
        let provider = ScriptedProvider::always("should not be called");
        let summary = generate_summary(&provider, &[]).await;
        assert_eq!(summary, NO_CONVERSATION_SENTINEL);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn summary_failure_is_sentinel() {
        let provider = ScriptedProvider::failing("boom");
        let summary = generate_summary(&provider, &[Message::user("hello")]).await;
        assert_eq!(summary, SUMMARY_FAILED_SENTINEL);
    }

    #[tokio::test]
    async fn summary_prompt_includes_transcript() {
        let provider = ScriptedProvider::always("A short chat.");
        let messages = vec![Message::user("hello"), Message::assistant("hi there")];
        let summary = generate_summary(&provider, &messages).await;
        assert_eq!(summary, "A short chat.");

        let call = &provider.recorded_calls()[0];
        let body = &call.messages[0].content;
        assert!(body.contains("user: hello"));
        assert!(body.contains("assistant: hi there"));
    }

    #[tokio::test]
    async fn background_extraction_feeds_long_term() {
        let provider: Arc<dyn Provider> =
            Arc::new(ScriptedProvider::always(r#"{"contact": ["alice@example.com"]}"#));
        let memory = Arc::new(ConversationMemory::default());
        let tasks = BackgroundTasks::new();

        tasks.spawn_fact_extraction(provider, Arc::clone(&memory), Message::user("mail alice"));
        tasks.wait_idle().await;

        let stats = memory.stats().await;
        assert_eq!(stats.topics, vec!["contact"]);
        assert_eq!(stats.fact_count, 1);
    }

    #[tokio::test]
    async fn background_summary_records_result() {
        let provider: Arc<dyn Provider> = Arc::new(ScriptedProvider::always("They greeted."));
        let memory = Arc::new(ConversationMemory::default());
        memory.add_message(Message::user("hello")).await;

        let tasks = BackgroundTasks::new();
        tasks.spawn_summary(provider, Arc::clone(&memory));
        tasks.wait_idle().await;

        assert_eq!(memory.stats().await.latest_summary.as_deref(), Some("They greeted."));
    }

    #[tokio::test]
    async fn failed_summary_not_recorded() {
        let provider: Arc<dyn Provider> = Arc::new(ScriptedProvider::failing("down"));
        let memory = Arc::new(ConversationMemory::default());
        memory.add_message(Message::user("hello")).await;

        let tasks = BackgroundTasks::new();
        tasks.spawn_summary(provider, Arc::clone(&memory));
        tasks.wait_idle().await;

        assert_eq!(memory.stats().await.summary_count, 0);
    }

    #[tokio::test]
    async fn shutdown_aborts_cleanly() {
        let provider: Arc<dyn Provider> = Arc::new(ScriptedProvider::always("{}"));
        let memory = Arc::new(ConversationMemory::default());
        let tasks = BackgroundTasks::new();
        tasks.spawn_fact_extraction(provider, memory, Message::user("x"));
        tasks.shutdown();
        tasks.wait_idle().await;
    }
}
