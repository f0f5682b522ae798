//! Context store: owns every user's conversation memory.
//!
//! Backed by a `DashMap` keyed by user id. Shard-level locking means
//! mutations to one user's context are linearized while turns for
//! different users proceed fully in parallel -- there is no global lock.
//!
//! The store enforces the two context invariants on every write: at most
//! one system message, always at position 0, and a bounded window of
//! non-system messages.

use chrono::{Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

use colloquy_types::message::{ContextInfo, ConversationContext, Message};

/// Canonical instructional preamble injected as the system message when a
/// context has none.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Use the \
conversation so far as context, keep replies concise, and say plainly when \
you do not know something.";

/// In-memory store of per-user conversation contexts.
pub struct ContextStore {
    contexts: DashMap<String, ConversationContext>,
    window_size: usize,
    system_prompt: String,
}

impl ContextStore {
    /// Create a store with the given window size and optional system-prompt
    /// override.
    pub fn new(window_size: usize, system_prompt: Option<String>) -> Self {
        Self {
            contexts: DashMap::new(),
            window_size,
            system_prompt: system_prompt.unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }

    /// Fetch a user's context, creating an empty one if absent. Never fails.
    ///
    /// Returns a clone; all mutation goes through the store's own methods so
    /// the invariants hold under shard locking.
    pub fn get_or_create(&self, user_id: &str) -> ConversationContext {
        self.contexts
            .entry(user_id.to_string())
            .or_insert_with(|| ConversationContext::new(user_id))
            .clone()
    }

    /// Append a message to a user's context, enforcing the window invariant
    /// and bumping `last_activity`.
    pub fn append(&self, user_id: &str, message: Message) {
        let mut entry = self
            .contexts
            .entry(user_id.to_string())
            .or_insert_with(|| ConversationContext::new(user_id));
        entry.messages.push(message);
        apply_window(&mut entry.messages, self.window_size);
        let now = Utc::now();
        if now > entry.last_activity {
            entry.last_activity = now;
        }
    }

    /// Inject the canonical system prompt at position 0 if, and only if, the
    /// context has no system message yet. Idempotent.
    pub fn inject_system_prompt(&self, user_id: &str) {
        let mut entry = self
            .contexts
            .entry(user_id.to_string())
            .or_insert_with(|| ConversationContext::new(user_id));
        if !entry.messages.iter().any(Message::is_system) {
            entry
                .messages
                .insert(0, Message::system(self.system_prompt.clone()));
        }
    }

    /// Snapshot a user's current message sequence for request building.
    pub fn snapshot(&self, user_id: &str) -> Vec<Message> {
        self.contexts
            .get(user_id)
            .map(|ctx| ctx.messages.clone())
            .unwrap_or_default()
    }

    /// Delete a user's context. Clearing an absent user is a no-op success.
    pub fn clear(&self, user_id: &str) {
        self.contexts.remove(user_id);
    }

    /// Message count and last activity for a user; zero/None when absent.
    pub fn info(&self, user_id: &str) -> ContextInfo {
        self.contexts
            .get(user_id)
            .map(|ctx| ContextInfo {
                message_count: ctx.messages.len(),
                last_activity: Some(ctx.last_activity),
            })
            .unwrap_or_else(ContextInfo::empty)
    }

    /// Number of live contexts.
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Whether the store holds no contexts.
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Delete every context whose `last_activity` is older than
    /// `now - max_age_hours`. Returns the number of evicted contexts.
    ///
    /// Safe to call concurrently with reads/writes on unrelated keys:
    /// `retain` takes each shard lock in turn, never all at once.
    pub fn sweep(&self, max_age_hours: u32) -> usize {
        let Some(cutoff) = Utc::now().checked_sub_signed(Duration::hours(i64::from(max_age_hours)))
        else {
            // Age window reaches past representable time; nothing qualifies.
            return 0;
        };

        let before = self.contexts.len();
        self.contexts.retain(|_, ctx| ctx.last_activity >= cutoff);
        let evicted = before - self.contexts.len();
        if evicted > 0 {
            debug!(evicted, max_age_hours, "swept stale contexts");
        }
        evicted
    }
}

/// Enforce the window invariant on a message sequence.
///
/// Keeps system messages unchanged and retains only the last `window`
/// non-system messages in their original relative order. Pure and
/// idempotent: applying it twice equals applying it once.
pub fn apply_window(messages: &mut Vec<Message>, window: usize) {
    let non_system = messages.iter().filter(|m| !m.is_system()).count();
    if non_system <= window {
        return;
    }
    let mut to_drop = non_system - window;
    messages.retain(|m| {
        if m.is_system() || to_drop == 0 {
            true
        } else {
            to_drop -= 1;
            false
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_types::message::MessageRole;

    fn filled_store(window: usize, turns: usize) -> ContextStore {
        let store = ContextStore::new(window, None);
        for i in 0..turns {
            store.append("alice", Message::user(format!("u{i}")));
            store.append("alice", Message::assistant(format!("a{i}")));
        }
        store
    }

    #[test]
    fn test_get_or_create_is_lazy_and_stable() {
        let store = ContextStore::new(10, None);
        assert!(store.is_empty());
        let ctx = store.get_or_create("alice");
        assert_eq!(ctx.user_id, "alice");
        assert_eq!(store.len(), 1);
        store.get_or_create("alice");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_window_bounds_non_system_messages() {
        let store = filled_store(4, 10);
        let messages = store.snapshot("alice");
        assert_eq!(messages.len(), 4);
        // The retained suffix keeps original relative order.
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["u8", "a8", "u9", "a9"]);
    }

    #[test]
    fn test_window_preserves_system_message() {
        let store = filled_store(2, 5);
        store.inject_system_prompt("alice");
        store.append("alice", Message::user("next"));
        let messages = store.snapshot("alice");
        assert!(messages[0].is_system());
        assert_eq!(
            messages.iter().filter(|m| !m.is_system()).count(),
            2,
            "non-system count stays within the window"
        );
    }

    #[test]
    fn test_apply_window_idempotent() {
        let mut messages = vec![Message::system("s")];
        for i in 0..12 {
            messages.push(Message::user(format!("m{i}")));
        }
        apply_window(&mut messages, 5);
        let once = messages.clone();
        apply_window(&mut messages, 5);
        let contents =
            |v: &Vec<Message>| v.iter().map(|m| m.content.clone()).collect::<Vec<_>>();
        assert_eq!(contents(&once), contents(&messages));
        assert_eq!(messages.iter().filter(|m| !m.is_system()).count(), 5);
    }

    #[test]
    fn test_inject_system_prompt_idempotent_and_first() {
        let store = ContextStore::new(10, Some("preamble".to_string()));
        store.append("alice", Message::user("hi"));
        store.inject_system_prompt("alice");
        store.inject_system_prompt("alice");

        let messages = store.snapshot("alice");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[0].content, "preamble");
        assert_eq!(
            messages.iter().filter(|m| m.is_system()).count(),
            1,
            "exactly one system message"
        );
    }

    #[test]
    fn test_clear_then_info_is_empty() {
        let store = filled_store(10, 2);
        store.clear("alice");
        let info = store.info("alice");
        assert_eq!(info.message_count, 0);
        assert!(info.last_activity.is_none());
        // Clearing again is a no-op success.
        store.clear("alice");
    }

    #[test]
    fn test_info_reports_counts_and_activity() {
        let store = filled_store(10, 1);
        let info = store.info("alice");
        assert_eq!(info.message_count, 2);
        assert!(info.last_activity.is_some());
    }

    #[test]
    fn test_sweep_zero_removes_all() {
        let store = filled_store(10, 1);
        store.append("bob", Message::user("hello"));
        assert_eq!(store.len(), 2);
        let evicted = store.sweep(0);
        assert_eq!(evicted, 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_sweep_large_age_removes_none() {
        let store = filled_store(10, 1);
        let evicted = store.sweep(u32::MAX);
        assert_eq!(evicted, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_last_activity_monotonic() {
        let store = ContextStore::new(10, None);
        store.append("alice", Message::user("one"));
        let first = store.info("alice").last_activity.unwrap();
        store.append("alice", Message::user("two"));
        let second = store.info("alice").last_activity.unwrap();
        assert!(second >= first);
    }
}
