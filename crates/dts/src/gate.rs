//! 身份解析门禁
//!
//! 每次特权操作前调用 [`AuthenticationGate::resolve`]，依次完成：
//!
//! 1. 读取本机凭证（缺失或损坏直接拒绝）
//! 2. 校验签名
//! 3. 注册表确认 token 仍为 active
//! 4. 更新最近使用时间，返回身份 ID
//!
//! [`AuthenticationGate::resolve`] 在后台更新最近使用时间；短生命周期的进程
//! 使用 [`AuthenticationGate::resolve_and_touch`]，在返回前等待更新结束。
//! 两者都不会因更新失败而拒绝调用者。结果不做缓存

use crate::credential::CredentialStore;
use crate::error::{DtsError, DtsResult};
use crate::registry::TokenRegistry;
use crate::types::{Credential, TokenRecord, TokenStatus, token_fingerprint};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct AuthenticationGate {
    store: CredentialStore,
    registry: TokenRegistry,
}

impl AuthenticationGate {
    pub fn new(store: CredentialStore, registry: TokenRegistry) -> Self {
        Self { store, registry }
    }

    /// 解析当前调用者的身份 ID
    pub async fn resolve(&self) -> DtsResult<String> {
        let credential = self.store.read()?.ok_or(DtsError::CredentialMissing)?;
        self.resolve_credential(&credential).await
    }

    /// 解析身份并等待最近使用时间写入完成
    pub async fn resolve_and_touch(&self) -> DtsResult<String> {
        let credential = self.store.read()?.ok_or(DtsError::CredentialMissing)?;
        let record = self.check(&credential).await?;
        touch(&self.registry, &record.token).await;
        Ok(record.identity_id)
    }

    /// 对已加载的凭证执行签名与注册表校验
    pub async fn resolve_credential(&self, credential: &Credential) -> DtsResult<String> {
        let record = self.check(credential).await?;
        self.spawn_touch(record.token);
        Ok(record.identity_id)
    }

    async fn check(&self, credential: &Credential) -> DtsResult<TokenRecord> {
        let fingerprint = token_fingerprint(&credential.token);

        if !self.registry.signer().verify(credential) {
            warn!(
                token = %fingerprint,
                identity_id = %credential.identity_id,
                "Rejected credential: signature is invalid"
            );
            return Err(DtsError::SignatureInvalid);
        }

        let record = match self.registry.lookup(&credential.token).await {
            Ok(record) => record,
            Err(DtsError::UnknownToken) => {
                warn!(token = %fingerprint, "Rejected credential: token is not registered");
                return Err(DtsError::UnknownToken);
            }
            Err(e) => return Err(e),
        };

        if record.identity_id != credential.identity_id {
            warn!(
                token = %fingerprint,
                claimed = %credential.identity_id,
                registered = %record.identity_id,
                "Rejected credential: identity does not match registry"
            );
            return Err(DtsError::SignatureInvalid);
        }

        if record.status == TokenStatus::Revoked {
            warn!(
                token = %fingerprint,
                identity_id = %record.identity_id,
                "Rejected credential: token has been revoked"
            );
            return Err(DtsError::TokenRevoked);
        }

        debug!(token = %fingerprint, "Resolved identity {}", record.identity_id);
        Ok(record)
    }

    /// 最近使用时间只做尽力更新，失败只记日志
    fn spawn_touch(&self, token: String) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No tokio runtime available, skipping last_used update");
            return;
        };

        let registry = self.registry.clone();
        handle.spawn(async move { touch(&registry, &token).await });
    }
}

async fn touch(registry: &TokenRegistry, token: &str) {
    if let Err(e) = registry.touch_last_used(token).await {
        warn!(
            token = %token_fingerprint(token),
            "Failed to update last_used: {}",
            e
        );
    }
}
