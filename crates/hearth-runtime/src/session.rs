use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::llm::Message;

/// Conversation session with message history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create session with specific ID
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    /// Append a message; history is never reordered or deduplicated
    pub fn add_message(&mut self, msg: Message) {
        self.messages.push(msg);
        self.updated_at = Utc::now();
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

/// Exclusive access to one session; holding the lock is holding the turn
pub type SessionHandle = Arc<Mutex<Session>>;

/// In-memory session map. Each session sits behind its own mutex so turns on
/// one id are serialized while different ids proceed independently.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, SessionHandle>,
    /// Message count as of the last finished turn, readable without the session lock
    committed: DashMap<String, usize>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.get(session_id).map(|entry| entry.value().clone())
    }

    /// Store a new session and return its handle
    pub fn insert(&self, session: Session) -> SessionHandle {
        let id = session.id.clone();
        self.commit(&session);
        let handle = Arc::new(Mutex::new(session));
        self.sessions.insert(id, handle.clone());
        handle
    }

    /// Publish the session's current message count
    pub fn commit(&self, session: &Session) {
        self.committed
            .insert(session.id.clone(), session.message_count());
    }

    pub fn committed_count(&self, session_id: &str) -> Option<usize> {
        self.committed.get(session_id).map(|entry| *entry.value())
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sessions_get_unique_ids() {
        let a = Session::new();
        let b = Session::new();
        assert!(!a.id.is_empty());
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_store_returns_shared_handle() {
        let store = SessionStore::new();
        let handle = store.insert(Session::new().with_id("s1"));
        handle.lock().await.add_message(Message::user("hi"));

        let again = store.get("s1").unwrap();
        assert_eq!(again.lock().await.message_count(), 1);
        assert!(store.get("s2").is_none());
        assert_eq!(store.ids(), vec!["s1".to_string()]);
    }

    #[tokio::test]
    async fn test_committed_count_readable_while_locked() {
        let store = SessionStore::new();
        let handle = store.insert(Session::new().with_id("s1"));
        assert_eq!(store.committed_count("s1"), Some(0));

        let mut session = handle.lock().await;
        session.add_message(Message::user("hi"));
        assert_eq!(store.committed_count("s1"), Some(0));
        store.commit(&session);
        assert_eq!(store.committed_count("s1"), Some(1));
        assert_eq!(store.committed_count("s2"), None);
    }
}
