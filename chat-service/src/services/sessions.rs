//! In-memory conversation sessions.
//!
//! One conversation per session key, created lazily on the first message
//! and discarded wholesale on reset. Turn history is replayed to the
//! provider on every call, so evicting an entry is all it takes to start
//! a conversation from scratch.

use crate::services::providers::Content;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Session key used when the caller does not supply one: every such
/// request shares a single process-wide conversation.
pub const DEFAULT_SESSION_KEY: &str = "default";

/// An ongoing conversation with the model.
#[derive(Debug)]
pub struct Conversation {
    /// Model the conversation was started against.
    pub model: String,
    history: Vec<Content>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(model: String) -> Self {
        let now = Utc::now();
        Self {
            model,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Accumulated turns, oldest first.
    pub fn history(&self) -> &[Content] {
        &self.history
    }

    /// The full content list for the next provider call: history plus the
    /// new user turn.
    pub fn contents_with(&self, user_turn: Content) -> Vec<Content> {
        let mut contents = self.history.clone();
        contents.push(user_turn);
        contents
    }

    /// Record one completed exchange.
    pub fn push_turn(&mut self, user_turn: Content, reply: String) {
        self.history.push(user_turn);
        self.history.push(Content::model(reply));
        self.updated_at = Utc::now();
    }
}

/// Handle to a conversation. The mutex serializes turns within one
/// session: a streamed reply finishes (or is abandoned) before the next
/// message on the same key is sent.
pub type SessionHandle = Arc<Mutex<Conversation>>;

/// Process-wide session map.
pub struct SessionRegistry {
    sessions: DashMap<String, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Return the conversation for `key`, creating it against `model` if
    /// this is the first message. Insert-if-absent is atomic: concurrent
    /// first messages on the same key observe the same handle.
    pub fn get_or_create(&self, key: &str, model: &str) -> SessionHandle {
        let entry = self.sessions.entry(key.to_string()).or_insert_with(|| {
            tracing::info!(session_key = %key, model = %model, "starting new conversation");
            Arc::new(Mutex::new(Conversation::new(model.to_string())))
        });
        entry.value().clone()
    }

    /// Drop every conversation. Returns how many were evicted.
    pub fn clear_all(&self) -> usize {
        let evicted = self.sessions.len();
        self.sessions.clear();
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
