//! 内存存储后端实现
//!
//! 所有操作在同一把锁内完成，多步操作天然原子

use crate::error::{DtsError, DtsResult};
use crate::registry::storage::backend::RegistryBackend;
use crate::types::{Identity, TokenRecord, TokenStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
struct MemoryState {
    identities: HashMap<String, Identity>,
    /// 按插入顺序保存
    tokens: Vec<TokenRecord>,
}

impl MemoryState {
    fn token_mut(&mut self, token: &str) -> Option<&mut TokenRecord> {
        self.tokens.iter_mut().find(|r| r.token == token)
    }

    fn insert_token(&mut self, record: &TokenRecord) -> DtsResult<()> {
        if !self.identities.contains_key(&record.identity_id) {
            return Err(DtsError::IdentityNotFound(record.identity_id.clone()));
        }
        if self.tokens.iter().any(|r| r.token == record.token) {
            return Err(DtsError::Internal("Duplicate token".into()));
        }
        self.tokens.push(record.clone());
        Ok(())
    }
}

/// 内存存储后端
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend").finish()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryBackend for MemoryBackend {
    async fn init(&self) -> DtsResult<()> {
        Ok(())
    }

    async fn create_identity(&self, identity: &Identity) -> DtsResult<()> {
        let mut state = self.state.lock().await;
        if state.identities.contains_key(&identity.identity_id) {
            return Err(DtsError::Internal(format!(
                "Identity already exists: {}",
                identity.identity_id
            )));
        }
        state
            .identities
            .insert(identity.identity_id.clone(), identity.clone());
        Ok(())
    }

    async fn get_identity(&self, identity_id: &str) -> DtsResult<Option<Identity>> {
        Ok(self.state.lock().await.identities.get(identity_id).cloned())
    }

    async fn identity_count(&self) -> DtsResult<u64> {
        Ok(self.state.lock().await.identities.len() as u64)
    }

    async fn bootstrap(&self, identity: &Identity, first_token: &TokenRecord) -> DtsResult<()> {
        let mut state = self.state.lock().await;
        if !state.identities.is_empty() {
            return Err(DtsError::AlreadyInitialized);
        }
        state
            .identities
            .insert(identity.identity_id.clone(), identity.clone());
        if let Err(e) = state.insert_token(first_token) {
            state.identities.remove(&identity.identity_id);
            return Err(e);
        }
        Ok(())
    }

    async fn insert_token(&self, record: &TokenRecord) -> DtsResult<()> {
        self.state.lock().await.insert_token(record)
    }

    async fn insert_and_revoke_others(&self, record: &TokenRecord) -> DtsResult<Vec<String>> {
        let mut state = self.state.lock().await;
        state.insert_token(record)?;

        let mut revoked = Vec::new();
        for existing in state.tokens.iter_mut() {
            if existing.identity_id == record.identity_id
                && existing.token != record.token
                && existing.is_active()
            {
                existing.status = TokenStatus::Revoked;
                revoked.push(existing.token.clone());
            }
        }
        Ok(revoked)
    }

    async fn get_token(&self, token: &str) -> DtsResult<Option<TokenRecord>> {
        let state = self.state.lock().await;
        Ok(state.tokens.iter().find(|r| r.token == token).cloned())
    }

    async fn list_tokens(&self, identity_id: &str) -> DtsResult<Vec<TokenRecord>> {
        let state = self.state.lock().await;
        let mut tokens: Vec<TokenRecord> = state
            .tokens
            .iter()
            .filter(|r| r.identity_id == identity_id)
            .cloned()
            .collect();
        tokens.sort_by_key(|r| r.issued_at);
        Ok(tokens)
    }

    async fn revoke_token(&self, token: &str, owner: Option<&str>) -> DtsResult<()> {
        let mut state = self.state.lock().await;
        let record = state
            .token_mut(token)
            .filter(|r| owner.is_none_or(|o| r.identity_id == o))
            .ok_or(DtsError::UnknownToken)?;

        match record.status {
            TokenStatus::Revoked => Err(DtsError::AlreadyRevoked),
            TokenStatus::Active => {
                record.status = TokenStatus::Revoked;
                Ok(())
            }
        }
    }

    async fn touch_last_used(&self, token: &str, at: i64) -> DtsResult<()> {
        if let Some(record) = self.state.lock().await.token_mut(token) {
            record.last_used = Some(at);
        }
        Ok(())
    }
}
