//! services/bot/src/adapters/redis_store.rs
//!
//! Redis-backed `StateStore`. Each chat's session is one JSON string under
//! `{namespace}:state:{chat_id}`; writes are plain `SET`s, so the last writer wins.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use shop_bot_core::domain::{ChatId, ConversationSession};
use shop_bot_core::ports::{PortError, PortResult, StateStore};
use tracing::warn;

pub struct RedisStateStore {
    namespace: String,
    connection: ConnectionManager,
}

impl RedisStateStore {
    pub async fn connect(url: &str, namespace: impl Into<String>) -> redis::RedisResult<Self> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self {
            namespace: namespace.into(),
            connection,
        })
    }

    fn state_key(&self, chat: ChatId) -> String {
        state_key(&self.namespace, chat)
    }
}

fn state_key(namespace: &str, chat: ChatId) -> String {
    format!("{}:state:{}", namespace, chat)
}

fn unexpected(e: impl std::fmt::Display) -> PortError {
    PortError::Unexpected(e.to_string())
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn load(&self, chat: ChatId) -> PortResult<ConversationSession> {
        let mut conn = self.connection.clone();
        let payload: Option<String> = conn.get(self.state_key(chat)).await.map_err(unexpected)?;
        match payload {
            None => Ok(ConversationSession::default()),
            Some(raw) => serde_json::from_str(&raw).or_else(|e| {
                warn!(chat = %chat, "Discarding unreadable stored session: {}", e);
                Ok(ConversationSession::default())
            }),
        }
    }

    async fn save(&self, chat: ChatId, session: &ConversationSession) -> PortResult<()> {
        let payload = serde_json::to_string(session).map_err(unexpected)?;
        let mut conn = self.connection.clone();
        conn.set::<_, _, ()>(self.state_key(chat), payload)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_per_chat() {
        assert_eq!(state_key("shopbot", ChatId(42)), "shopbot:state:42");
    }
}
