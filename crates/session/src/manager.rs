//! Session table.
//!
//! Sessions are created at first reference to an identifier and live for
//! the process lifetime unless explicitly torn down. The table itself is a
//! `RwLock`-guarded map; each session's memory carries its own lock, so
//! holding the table lock never blocks on a session's contents.

use hearth_config::MemoryConfig;
use hearth_memory::conversation::ConversationMemory;
use hearth_memory::tasks::BackgroundTasks;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// One conversational session: its memory, its background tasks, and a
/// turn counter driving summary cadence.
pub struct Session {
    pub id: String,
    pub memory: Arc<ConversationMemory>,
    pub tasks: BackgroundTasks,
    turns: AtomicUsize,
}

impl Session {
    fn new(id: String, memory_config: &MemoryConfig) -> Self {
        Self {
            id,
            memory: Arc::new(ConversationMemory::with_window(
                memory_config.max_short_term,
                memory_config.recent_window,
            )),
            tasks: BackgroundTasks::new(),
            turns: AtomicUsize::new(0),
        }
    }

    /// Record one completed user turn; returns the new turn count.
    pub fn bump_turn(&self) -> usize {
        self.turns.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Turns completed so far.
    pub fn turn_count(&self) -> usize {
        self.turns.load(Ordering::SeqCst)
    }
}

/// Concurrent-safe map of session id → session.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    memory_config: MemoryConfig,
}

impl SessionManager {
    pub fn new(memory_config: MemoryConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            memory_config,
        }
    }

    /// Fetch a session, creating it on first reference.
    pub async fn get_or_create(&self, id: &str) -> Arc<Session> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(id) {
                return Arc::clone(session);
            }
        }

        let mut sessions = self.sessions.write().await;
        // Double-checked: another task may have created it between locks
        if let Some(session) = sessions.get(id) {
            return Arc::clone(session);
        }

        info!(session_id = id, "Creating session");
        let session = Arc::new(Session::new(id.to_string(), &self.memory_config));
        sessions.insert(id.to_string(), Arc::clone(&session));
        session
    }

    /// Look up an existing session without creating one.
    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Remove a session and abort its in-flight background tasks.
    /// Returns false when the id was unknown.
    pub async fn teardown(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(session) => {
                session.tasks.shutdown();
                debug!(session_id = id, "Session torn down");
                true
            }
            None => false,
        }
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
