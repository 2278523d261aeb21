use std::collections::HashMap;
use std::sync::{ Mutex, MutexGuard };

use log::debug;

use crate::models::chat::ConversationHistory;
use crate::models::thread::ThreadId;

/// In-memory thread → history map. Entries live until the platform reports the
/// thread gone or the process shuts down; nothing is persisted.
#[derive(Debug, Default)]
pub struct ConversationStore {
    entries: Mutex<HashMap<ThreadId, ConversationHistory>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ThreadId, ConversationHistory>> {
        // Poisoning is ignored: every mutation is a single push or map operation.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, thread: ThreadId) -> Option<ConversationHistory> {
        self.lock().get(&thread).cloned()
    }

    pub fn set(&self, thread: ThreadId, history: ConversationHistory) {
        self.lock().insert(thread, history);
    }

    /// Applies `f` to an existing entry. Never creates one.
    pub fn update<F>(&self, thread: ThreadId, f: F) -> bool
        where F: FnOnce(&mut ConversationHistory)
    {
        match self.lock().get_mut(&thread) {
            Some(history) => {
                f(history);
                true
            }
            None => false,
        }
    }

    pub fn delete(&self, thread: ThreadId) -> bool {
        let removed = self.lock().remove(&thread).is_some();
        if removed {
            debug!("Dropped conversation history for thread {}", thread);
        }
        removed
    }

    pub fn contains(&self, thread: ThreadId) -> bool {
        self.lock().contains_key(&thread)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> ConversationHistory {
        let mut history = ConversationHistory::new("persona");
        history.push_user("ana asked:\nhi");
        history.push_assistant("hello");
        history
    }

    #[test]
    fn get_returns_none_for_unknown_thread() {
        let store = ConversationStore::new();
        assert!(store.get(ThreadId(1)).is_none());
    }

    #[test]
    fn set_inserts_then_replaces() {
        let store = ConversationStore::new();
        store.set(ThreadId(1), history());
        assert_eq!(store.get(ThreadId(1)).map(|h| h.len()), Some(3));

        store.set(ThreadId(1), ConversationHistory::new("other"));
        assert_eq!(store.get(ThreadId(1)).map(|h| h.len()), Some(1));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_is_idempotent() {
        let store = ConversationStore::new();
        store.set(ThreadId(7), history());
        assert!(store.delete(ThreadId(7)));
        assert!(!store.delete(ThreadId(7)));
        assert!(store.get(ThreadId(7)).is_none());
    }

    #[test]
    fn update_only_touches_existing_entries() {
        let store = ConversationStore::new();
        assert!(!store.update(ThreadId(3), |h| h.push_user("ghost")));
        assert!(!store.contains(ThreadId(3)));

        store.set(ThreadId(3), history());
        assert!(store.update(ThreadId(3), |h| h.push_user("more")));
        assert_eq!(store.get(ThreadId(3)).map(|h| h.len()), Some(4));
    }

    #[test]
    fn snapshots_do_not_alias_stored_history() {
        let store = ConversationStore::new();
        store.set(ThreadId(5), history());
        let mut snapshot = store.get(ThreadId(5)).unwrap();
        snapshot.push_user("local only");
        assert_eq!(store.get(ThreadId(5)).map(|h| h.len()), Some(3));
    }

    #[test]
    fn clear_empties_the_store() {
        let store = ConversationStore::new();
        store.set(ThreadId(1), history());
        store.set(ThreadId(2), history());
        store.clear();
        assert!(store.is_empty());
    }
}
