//! Conversation history provider interface.
//!
//! Message persistence lives outside this crate (a relational store
//! keyed by session). The composer consumes only this contract: an
//! ordered, gapless list of turns per session. The in-memory
//! implementation backs the CLI driver and tests; it is not a second
//! source of truth alongside a persistent one.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One conversation turn.
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Consumed contract: ordered-by-sequence history per session.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// The most recent `limit` turns, oldest first, ordering stable and
    /// gapless within a conversation.
    async fn history(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>>;

    /// Record a turn. Callers persist the user's message before asking
    /// for an answer.
    async fn append(&self, session_id: &str, role: Role, content: &str) -> Result<()>;
}

/// In-memory provider for the CLI driver and tests.
#[derive(Default)]
pub struct InMemoryHistory {
    sessions: Mutex<HashMap<String, Vec<Turn>>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryProvider for InMemoryHistory {
    async fn history(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>> {
        let sessions = self.sessions.lock().await;
        let turns = sessions.get(session_id).cloned().unwrap_or_default();
        let start = turns.len().saturating_sub(limit);
        Ok(turns[start..].to_vec())
    }

    async fn append(&self, session_id: &str, role: Role, content: &str) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(session_id.to_string())
            .or_default()
            .push(Turn {
                role,
                content: content.to_string(),
            });
        Ok(())
    }
}
