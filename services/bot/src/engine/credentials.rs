//! services/bot/src/engine/credentials.rs
//!
//! The single shared session token for the commerce backend.
//!
//! The backend never says how long a token lives, so staleness is detected lazily: a
//! call reports `SessionInvalid`, the caller refreshes once and retries once. All reads
//! and refreshes go through one async mutex, so concurrent callers that find the cache
//! empty trigger exactly one login exchange and then observe the same token.

use chrono::Utc;
use shop_bot_core::domain::Credential;
use shop_bot_core::ports::{AuthFailure, Authenticator, GatewayError, GatewayResult};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::engine::error::FlowResult;

pub struct CredentialCache {
    authenticator: Arc<dyn Authenticator>,
    current: Mutex<Option<Credential>>,
}

impl CredentialCache {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            authenticator,
            current: Mutex::new(None),
        }
    }

    /// Returns the cached credential, logging in first if there is none.
    pub async fn get_token(&self) -> Result<Credential, AuthFailure> {
        let mut current = self.current.lock().await;
        if let Some(credential) = current.as_ref() {
            return Ok(credential.clone());
        }
        let fresh = self.login().await?;
        *current = Some(fresh.clone());
        Ok(fresh)
    }

    /// Forgets the cached credential; the next `get_token` logs in again.
    pub async fn invalidate(&self) {
        let mut current = self.current.lock().await;
        if current.take().is_some() {
            debug!("Cached backend credential invalidated.");
        }
    }

    /// Replaces `stale` after the backend rejected it.
    ///
    /// If another caller already swapped it for a newer token, that token is returned
    /// without a second login.
    pub async fn refresh(&self, stale: &Credential) -> Result<Credential, AuthFailure> {
        let mut current = self.current.lock().await;
        if let Some(cached) = current.as_ref() {
            if !cached.same_session(stale) {
                debug!("Credential already refreshed by a concurrent caller.");
                return Ok(cached.clone());
            }
        }
        *current = None;
        warn!("Backend rejected the session token; logging in again.");
        let fresh = self.login().await?;
        *current = Some(fresh.clone());
        Ok(fresh)
    }

    /// Records that `credential` was just accepted by the backend.
    pub async fn mark_validated(&self, credential: &Credential) {
        let mut current = self.current.lock().await;
        if let Some(cached) = current.as_mut() {
            if cached.same_session(credential) {
                cached.validated_at = Utc::now();
            }
        }
    }

    /// The cached credential, if any, without logging in.
    pub async fn peek(&self) -> Option<Credential> {
        self.current.lock().await.clone()
    }

    /// Runs `op` with the current credential. On `SessionInvalid` the token is
    /// refreshed once and `op` retried once; any second failure is returned as is.
    pub async fn call<T, F, Fut>(&self, op: F) -> FlowResult<T>
    where
        F: Fn(Credential) -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let credential = self.get_token().await?;
        match op(credential.clone()).await {
            Ok(value) => {
                self.mark_validated(&credential).await;
                Ok(value)
            }
            Err(GatewayError::SessionInvalid) => {
                let fresh = self.refresh(&credential).await?;
                let value = op(fresh.clone()).await?;
                self.mark_validated(&fresh).await;
                Ok(value)
            }
            Err(other) => Err(other.into()),
        }
    }

    async fn login(&self) -> Result<Credential, AuthFailure> {
        match self.authenticator.login().await {
            Ok(credential) => {
                info!(credential = ?credential, "Logged in to the commerce backend.");
                Ok(credential)
            }
            Err(e) => {
                warn!("Login exchange with the commerce backend failed: {}", e);
                Err(e)
            }
        }
    }
}
