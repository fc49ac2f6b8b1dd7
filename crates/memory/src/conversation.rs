//! The three-tier conversation memory.
//!
//! One instance per session. The request path appends messages while
//! background tasks append facts and summaries, so all state lives behind a
//! `tokio::sync::RwLock`; without it a race on the eviction path can lose a
//! message.

use hearth_core::message::{Message, Role};
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::RwLock;
use tracing::debug;

/// Default short-term capacity.
pub const DEFAULT_MAX_SHORT_TERM: usize = 20;

/// Default number of recent messages included in query context.
pub const DEFAULT_RECENT_WINDOW: usize = 5;

/// A topic with its accumulated facts. Topics are kept in insertion order so
/// `context_for_query` iterates them deterministically.
struct Topic {
    name: String,
    facts: Vec<String>,
}

struct MemoryState {
    short_term: VecDeque<Message>,
    long_term: Vec<Topic>,
    summaries: Vec<String>,
}

/// Diagnostic snapshot of a memory instance.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    pub short_term_count: usize,
    pub topics: Vec<String>,
    pub fact_count: usize,
    pub summary_count: usize,
    pub latest_summary: Option<String>,
}

/// Manages conversation history with short-term, long-term, and summary
/// memory. Safe for concurrent use from the request path and background
/// extraction tasks.
pub struct ConversationMemory {
    state: RwLock<MemoryState>,
    max_short_term: usize,
    recent_window: usize,
}

impl ConversationMemory {
    /// Create a memory with the given short-term capacity.
    pub fn new(max_short_term: usize) -> Self {
        Self::with_window(max_short_term, DEFAULT_RECENT_WINDOW)
    }

    /// Create a memory with explicit capacity and recent-window size.
    pub fn with_window(max_short_term: usize, recent_window: usize) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                short_term: VecDeque::with_capacity(max_short_term),
                long_term: Vec::new(),
                summaries: Vec::new(),
            }),
            max_short_term,
            recent_window,
        }
    }

    /// Append a message to short-term memory, evicting the oldest message
    /// once capacity is reached. `len(short_term) <= max_short_term` holds
    /// before and after every call.
    pub async fn add_message(&self, message: Message) {
        let mut state = self.state.write().await;
        state.short_term.push_back(message);
        while state.short_term.len() > self.max_short_term {
            state.short_term.pop_front();
        }
    }

    /// Append a fact under a topic, creating the topic on first use.
    pub async fn add_to_long_term(&self, topic: &str, fact: impl Into<String>) {
        let mut state = self.state.write().await;
        match state.long_term.iter_mut().find(|t| t.name == topic) {
            Some(existing) => existing.facts.push(fact.into()),
            None => state.long_term.push(Topic {
                name: topic.to_string(),
                facts: vec![fact.into()],
            }),
        }
    }

    /// Append a conversation summary. Prior summaries are never removed
    /// (full history retained for audit); only the last one is used for
    /// generation.
    pub async fn add_summary(&self, summary: impl Into<String>) {
        let mut state = self.state.write().await;
        state.summaries.push(summary.into());
        debug!(count = state.summaries.len(), "Summary recorded");
    }

    /// The most recent `count` short-term messages, oldest first.
    pub async fn recent(&self, count: usize) -> Vec<Message> {
        let state = self.state.read().await;
        let skip = state.short_term.len().saturating_sub(count);
        state.short_term.iter().skip(skip).cloned().collect()
    }

    /// A copy of the whole short-term buffer (input to summarization).
    pub async fn short_term(&self) -> Vec<Message> {
        self.state.read().await.short_term.iter().cloned().collect()
    }

    /// Relevant context for a query, in order:
    ///
    /// 1. the most recent messages (recent window), as-is;
    /// 2. the latest summary, if any, wrapped as a system message;
    /// 3. one system message per stored fact for every topic whose name
    ///    appears as a case-insensitive substring of the query, topics in
    ///    insertion order.
    ///
    /// Topic matching is a substring containment heuristic — no ranking, no
    /// recency weighting. That is a known precision limitation, kept as
    /// documented behavior. Read-only: calling this never mutates memory.
    pub async fn context_for_query(&self, query: &str) -> Vec<Message> {
        let state = self.state.read().await;
        let query_lower = query.to_lowercase();

        let skip = state.short_term.len().saturating_sub(self.recent_window);
        let mut context: Vec<Message> = state.short_term.iter().skip(skip).cloned().collect();

        if let Some(summary) = state.summaries.last() {
            context.push(
                Message::new(Role::System, format!("Conversation summary: {summary}"))
                    .with_metadata("source", serde_json::json!("summary")),
            );
        }

        for topic in &state.long_term {
            if query_lower.contains(&topic.name.to_lowercase()) {
                for fact in &topic.facts {
                    context.push(
                        Message::new(
                            Role::System,
                            format!("Related information about {}: {}", topic.name, fact),
                        )
                        .with_metadata("source", serde_json::json!("long_term_memory"))
                        .with_metadata("topic", serde_json::json!(topic.name.clone())),
                    );
                }
            }
        }

        context
    }

    /// Diagnostic counters for the memory endpoint / CLI.
    pub async fn stats(&self) -> MemoryStats {
        let state = self.state.read().await;
        MemoryStats {
            short_term_count: state.short_term.len(),
            topics: state.long_term.iter().map(|t| t.name.clone()).collect(),
            fact_count: state.long_term.iter().map(|t| t.facts.len()).sum(),
            summary_count: state.summaries.len(),
            latest_summary: state.summaries.last().cloned(),
        }
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SHORT_TERM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn short_term_evicts_oldest() {
        let memory = ConversationMemory::new(2);
        memory.add_message(Message::user("A")).await;
        memory.add_message(Message::user("B")).await;
        memory.add_message(Message::user("C")).await;

        let messages = memory.short_term().await;
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["B", "C"]);
    }

    #[tokio::test]
    async fn short_term_never_exceeds_capacity() {
        let memory = ConversationMemory::new(5);
        for i in 0..50 {
            memory.add_message(Message::user(format!("msg {i}"))).await;
            assert!(memory.stats().await.short_term_count <= 5);
        }
        // Contains exactly the 5 most recent, in arrival order
        let messages = memory.short_term().await;
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["msg 45", "msg 46", "msg 47", "msg 48", "msg 49"]);
    }

    #[tokio::test]
    async fn recent_returns_last_k_in_order() {
        let memory = ConversationMemory::new(10);
        for i in 0..8 {
            memory.add_message(Message::user(format!("m{i}"))).await;
        }
        let recent = memory.recent(3).await;
        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m5", "m6", "m7"]);
    }

    #[tokio::test]
    async fn long_term_appends_per_topic() {
        let memory = ConversationMemory::default();
        memory.add_to_long_term("project", "deadline is Friday").await;
        memory.add_to_long_term("project", "budget approved").await;
        memory.add_to_long_term("contact", "alice@example.com").await;

        let stats = memory.stats().await;
        assert_eq!(stats.topics, vec!["project", "contact"]);
        assert_eq!(stats.fact_count, 3);
    }

    #[tokio::test]
    async fn context_includes_matching_topics_in_insertion_order() {
        let memory = ConversationMemory::default();
        memory.add_to_long_term("deadline", "report due Monday").await;
        memory.add_to_long_term("meeting", "standup at 9am").await;

        let context = memory
            .context_for_query("When is the MEETING and the deadline?")
            .await;

        let system: Vec<&str> = context
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(system.len(), 2);
        // "deadline" was inserted first, so it comes first despite appearing
        // later in the query text
        assert!(system[0].contains("deadline"));
        assert!(system[1].contains("meeting"));
    }

    #[tokio::test]
    async fn context_skips_unmatched_topics() {
        let memory = ConversationMemory::default();
        memory.add_to_long_term("billing", "invoice sent").await;
        let context = memory.context_for_query("tell me about the weather").await;
        assert!(context.iter().all(|m| m.role != Role::System));
    }

    #[tokio::test]
    async fn context_includes_latest_summary_only() {
        let memory = ConversationMemory::default();
        memory.add_summary("first summary").await;
        memory.add_summary("second summary").await;

        let context = memory.context_for_query("anything").await;
        let summaries: Vec<&Message> = context
            .iter()
            .filter(|m| m.metadata.get("source") == Some(&serde_json::json!("summary")))
            .collect();
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].content.contains("second summary"));

        // Both summaries are still retained
        assert_eq!(memory.stats().await.summary_count, 2);
    }

    #[tokio::test]
    async fn context_ordering_recent_then_summary_then_facts() {
        let memory = ConversationMemory::default();
        memory.add_message(Message::user("hello")).await;
        memory.add_summary("we said hello").await;
        memory.add_to_long_term("hello", "user greets often").await;

        let context = memory.context_for_query("hello again").await;
        assert_eq!(context[0].content, "hello");
        assert!(context[1].content.starts_with("Conversation summary:"));
        assert!(context[2].content.starts_with("Related information about hello:"));
    }

    #[tokio::test]
    async fn context_for_query_is_idempotent() {
        let memory = ConversationMemory::default();
        memory.add_message(Message::user("hi")).await;
        memory.add_to_long_term("hi", "greeting").await;
        memory.add_summary("greeting exchanged").await;

        let first = memory.context_for_query("hi there").await;
        let second = memory.context_for_query("hi there").await;
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.content, b.content);
        }
    }

    #[tokio::test]
    async fn concurrent_writers_lose_nothing() {
        use std::sync::Arc;

        let memory = Arc::new(ConversationMemory::new(1000));
        let mut handles = Vec::new();
        for task in 0..4 {
            let memory = Arc::clone(&memory);
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    memory.add_message(Message::user(format!("t{task}-{i}"))).await;
                    memory.add_to_long_term(&format!("topic{task}"), format!("fact {i}")).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stats = memory.stats().await;
        assert_eq!(stats.short_term_count, 200);
        assert_eq!(stats.fact_count, 200);
        assert_eq!(stats.topics.len(), 4);
    }
}
