//! services/bot/src/adapters/state_store.rs
//!
//! In-process `StateStore`. Sessions are lost on restart.

use async_trait::async_trait;
use dashmap::DashMap;
use shop_bot_core::domain::{ChatId, ConversationSession};
use shop_bot_core::ports::{PortResult, StateStore};

#[derive(Default)]
pub struct MemoryStateStore {
    sessions: DashMap<ChatId, ConversationSession>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, chat: ChatId) -> PortResult<ConversationSession> {
        Ok(self
            .sessions
            .get(&chat)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn save(&self, chat: ChatId, session: &ConversationSession) -> PortResult<()> {
        self.sessions.insert(chat, session.clone());
        Ok(())
    }
}
