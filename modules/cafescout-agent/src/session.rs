use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::info;

use cafescout_common::{Conversation, Turn};

struct SessionEntry {
    conversation: Arc<Mutex<Conversation>>,
    /// Monotonic touch sequence; wall-clock timestamps can tie at coarse
    /// resolution, so eviction orders by this instead of `last_activity`.
    touch_seq: u64,
}

/// Bounded map of session id to conversation. The table's own lock guards
/// membership and eviction; each conversation has its own lock, so requests
/// for the same session serialize while unrelated sessions never block each
/// other.
pub struct SessionTable {
    entries: Mutex<HashMap<String, SessionEntry>>,
    capacity: usize,
    next_seq: AtomicU64,
}

impl SessionTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
            next_seq: AtomicU64::new(0),
        }
    }

    /// Fetch the conversation for a session, creating it if absent. Touching
    /// a session bumps its activity; growing past capacity evicts exactly
    /// one conversation, the least-recently-active.
    pub async fn get_or_create(&self, session_id: &str) -> Arc<Mutex<Conversation>> {
        let mut entries = self.entries.lock().await;
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        let conversation = match entries.get_mut(session_id) {
            Some(entry) => {
                entry.touch_seq = seq;
                entry.conversation.clone()
            }
            None => {
                let conversation = Arc::new(Mutex::new(Conversation::new()));
                entries.insert(
                    session_id.to_string(),
                    SessionEntry {
                        conversation: conversation.clone(),
                        touch_seq: seq,
                    },
                );
                conversation
            }
        };

        // One eviction per overflow, so the table converges to capacity.
        if entries.len() > self.capacity {
            let oldest = entries
                .iter()
                .filter(|(id, _)| id.as_str() != session_id)
                .min_by_key(|(_, entry)| entry.touch_seq)
                .map(|(id, _)| id.clone());
            if let Some(id) = oldest {
                entries.remove(&id);
                info!(session_id = %id, "Evicted least-recently-active session");
            }
        }

        conversation
    }

    /// Append one turn to a session's history, creating the session if
    /// needed.
    pub async fn append(&self, session_id: &str, turn: Turn) {
        let conversation = self.get_or_create(session_id).await;
        let mut guard = conversation.lock().await;
        guard.turns.push(turn);
        guard.last_activity = Utc::now();
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.entries.lock().await.contains_key(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn table_never_exceeds_capacity_and_evicts_the_oldest() {
        let table = SessionTable::new(50);
        for i in 0..51 {
            table.get_or_create(&format!("session-{i}")).await;
        }

        assert_eq!(table.len().await, 50);
        // session-0 was the least-recently-active.
        assert!(!table.contains("session-0").await);
        for i in 1..51 {
            assert!(table.contains(&format!("session-{i}")).await, "session-{i} missing");
        }
    }

    #[tokio::test]
    async fn touching_a_session_protects_it_from_eviction() {
        let table = SessionTable::new(3);
        table.get_or_create("a").await;
        table.get_or_create("b").await;
        table.get_or_create("c").await;
        // Refresh "a" so "b" becomes the oldest.
        table.get_or_create("a").await;
        table.get_or_create("d").await;

        assert!(table.contains("a").await);
        assert!(!table.contains("b").await);
        assert_eq!(table.len().await, 3);
    }

    #[tokio::test]
    async fn append_creates_the_session_and_records_the_turn() {
        let table = SessionTable::new(10);
        table.append("s1", Turn::user("hello")).await;
        table.append("s1", Turn::assistant("hi there")).await;

        let conversation = table.get_or_create("s1").await;
        let guard = conversation.lock().await;
        assert_eq!(guard.turns.len(), 2);
        assert_eq!(guard.turns[0].content, "hello");
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let table = SessionTable::new(10);
        table.append("one", Turn::user("first session")).await;
        table.append("two", Turn::user("second session")).await;

        let one = table.get_or_create("one").await;
        assert_eq!(one.lock().await.turns.len(), 1);
        let two = table.get_or_create("two").await;
        assert_eq!(two.lock().await.turns[0].content, "second session");
    }
}
