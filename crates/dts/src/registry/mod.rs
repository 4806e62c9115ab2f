//! Token 注册表
//!
//! 记录所有签发过的 token 及其状态，是凭证是否可信的唯一依据。
//! 状态只有 `active -> revoked` 一种单向转换，记录永不删除

pub mod storage;

use crate::error::{DtsError, DtsResult};
use crate::signature::{SignatureVersion, Signer};
use crate::types::{
    Identity, IdentityRole, TokenRecord, TokenStatus, generate_token, now_secs, token_fingerprint,
};
use std::path::Path;
use storage::{RegistryConfig, RegistryStorage};
use tracing::{debug, info};

/// 重新签发结果
#[derive(Debug, Clone)]
pub struct Reissued {
    /// 新签发的 token
    pub record: TokenRecord,
    /// 本次被吊销的旧 token
    pub revoked: Vec<String>,
}

/// Token 注册表客户端
///
/// 显式构造后注入调用方，生命周期随进程
#[derive(Clone, Debug)]
pub struct TokenRegistry {
    storage: RegistryStorage,
    signer: Signer,
}

impl TokenRegistry {
    pub fn new(storage: RegistryStorage, signer: Signer) -> Self {
        Self { storage, signer }
    }

    /// 从配置创建注册表
    pub async fn from_config<P: AsRef<Path>>(
        config: &RegistryConfig,
        db_path: P,
        signer: Signer,
    ) -> DtsResult<Self> {
        let storage = RegistryStorage::from_config(config, db_path).await?;
        info!("Token registry using {} backend", storage.backend_name());
        Ok(Self::new(storage, signer))
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// 生成并签名一条新的 active 记录（尚未入库）
    fn mint(&self, identity_id: &str, device_label: Option<&str>) -> DtsResult<TokenRecord> {
        let token = generate_token();
        let issued_at = now_secs();
        let signature = self
            .signer
            .sign(&token, identity_id, issued_at, device_label)?;

        Ok(TokenRecord {
            token,
            identity_id: identity_id.to_string(),
            signature,
            device_label: device_label.map(str::to_string),
            issued_at,
            last_used: None,
            status: TokenStatus::Active,
            signature_version: SignatureVersion::CURRENT.as_u32(),
        })
    }

    /// 签发新 token
    ///
    /// # Errors
    /// * `IdentityNotFound` - 身份不存在
    pub async fn issue(&self, identity_id: &str, device_label: Option<&str>) -> DtsResult<TokenRecord> {
        let record = self.mint(identity_id, device_label)?;
        self.storage.insert_token(&record).await?;
        info!(
            "Issued token {} for identity {}",
            token_fingerprint(&record.token),
            identity_id
        );
        Ok(record)
    }

    /// 吊销 token
    ///
    /// # Errors
    /// * `UnknownToken` - token 不存在
    /// * `AlreadyRevoked` - token 已被吊销
    pub async fn revoke(&self, token: &str) -> DtsResult<()> {
        self.storage.revoke_token(token, None).await?;
        info!("Revoked token {}", token_fingerprint(token));
        Ok(())
    }

    /// 吊销指定身份名下的 token，不属于该身份时视为 `UnknownToken`
    pub async fn revoke_owned(&self, identity_id: &str, token: &str) -> DtsResult<()> {
        self.storage.revoke_token(token, Some(identity_id)).await?;
        info!(
            "Revoked token {} of identity {}",
            token_fingerprint(token),
            identity_id
        );
        Ok(())
    }

    /// 重新签发
    ///
    /// 先签发新 token，再在同一事务内吊销该身份其余 active token，
    /// 任一步失败整体回滚，不会出现没有可用 token 的窗口
    pub async fn reissue(
        &self,
        identity_id: &str,
        device_label: Option<&str>,
        revoke_existing: bool,
    ) -> DtsResult<Reissued> {
        let record = self.mint(identity_id, device_label)?;

        let revoked = if revoke_existing {
            self.storage.insert_and_revoke_others(&record).await?
        } else {
            self.storage.insert_token(&record).await?;
            Vec::new()
        };

        info!(
            "Reissued token {} for identity {} ({} previous token(s) revoked)",
            token_fingerprint(&record.token),
            identity_id,
            revoked.len()
        );
        Ok(Reissued { record, revoked })
    }

    /// 查询 token
    ///
    /// # Errors
    /// * `UnknownToken` - token 不存在
    pub async fn lookup(&self, token: &str) -> DtsResult<TokenRecord> {
        debug!("Looking up token {}", token_fingerprint(token));
        self.storage
            .get_token(token)
            .await?
            .ok_or(DtsError::UnknownToken)
    }

    /// 更新最近使用时间
    pub async fn touch_last_used(&self, token: &str) -> DtsResult<()> {
        self.storage.touch_last_used(token, now_secs()).await
    }

    /// 列出身份名下全部 token
    pub async fn list_for_identity(&self, identity_id: &str) -> DtsResult<Vec<TokenRecord>> {
        self.storage.list_tokens(identity_id).await
    }

    /// 创建身份
    pub async fn create_identity(
        &self,
        display_name: &str,
        role: IdentityRole,
    ) -> DtsResult<Identity> {
        let identity = Identity::new(display_name, role);
        self.storage.create_identity(&identity).await?;
        info!(
            "Created identity {} ({}, role={})",
            identity.identity_id,
            identity.display_name,
            identity.role.as_str()
        );
        Ok(identity)
    }

    pub async fn identity_exists(&self, identity_id: &str) -> DtsResult<bool> {
        Ok(self.storage.get_identity(identity_id).await?.is_some())
    }

    pub async fn identity_count(&self) -> DtsResult<u64> {
        self.storage.identity_count().await
    }

    /// 首次初始化：在身份表为空时创建身份并签发首个 token
    ///
    /// # Errors
    /// * `AlreadyInitialized` - 身份表非空，不做任何写入
    pub async fn bootstrap_identity(
        &self,
        identity: &Identity,
        device_label: Option<&str>,
    ) -> DtsResult<TokenRecord> {
        let record = self.mint(&identity.identity_id, device_label)?;
        self.storage.bootstrap(identity, &record).await?;
        info!(
            "Bootstrapped identity {} with token {}",
            identity.identity_id,
            token_fingerprint(&record.token)
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Credential;
    use tempfile::TempDir;

    struct Fixture {
        registry: TokenRegistry,
        _dir: TempDir,
    }

    async fn sqlite_registry() -> Fixture {
        let dir = TempDir::new().unwrap();
        let signer = Signer::new("registry-test-secret").unwrap();
        let registry = TokenRegistry::from_config(&RegistryConfig::default(), dir.path(), signer)
            .await
            .unwrap();
        Fixture {
            registry,
            _dir: dir,
        }
    }

    fn memory_registry() -> TokenRegistry {
        TokenRegistry::new(
            RegistryStorage::memory(),
            Signer::new("registry-test-secret").unwrap(),
        )
    }

    async fn active_tokens(registry: &TokenRegistry, identity_id: &str) -> Vec<String> {
        registry
            .list_for_identity(identity_id)
            .await
            .unwrap()
            .into_iter()
            .filter(TokenRecord::is_active)
            .map(|r| r.token)
            .collect()
    }

    #[tokio::test]
    async fn test_issue_requires_identity() {
        let fx = sqlite_registry().await;
        let err = fx.registry.issue("ghost", None).await.unwrap_err();
        assert!(matches!(err, DtsError::IdentityNotFound(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_issued_credential_verifies() {
        let fx = sqlite_registry().await;
        let identity = fx
            .registry
            .create_identity("Alex", IdentityRole::Member)
            .await
            .unwrap();
        let record = fx
            .registry
            .issue(&identity.identity_id, Some("laptop"))
            .await
            .unwrap();

        assert_eq!(record.token.len(), 64);
        assert!(record.is_active());
        let credential = Credential::from_record(&record);
        assert!(fx.registry.signer().verify(&credential));

        let found = fx.registry.lookup(&record.token).await.unwrap();
        assert_eq!(found, record);
    }

    #[tokio::test]
    async fn test_revoke_twice_reports_already_revoked() {
        let registry = memory_registry();
        let identity = registry
            .create_identity("Alex", IdentityRole::Member)
            .await
            .unwrap();
        let record = registry.issue(&identity.identity_id, None).await.unwrap();

        registry.revoke(&record.token).await.unwrap();
        assert!(matches!(
            registry.revoke(&record.token).await,
            Err(DtsError::AlreadyRevoked)
        ));
        assert_eq!(
            registry.lookup(&record.token).await.unwrap().status,
            TokenStatus::Revoked
        );
    }

    #[tokio::test]
    async fn test_revoke_unknown_token() {
        let registry = memory_registry();
        assert!(matches!(
            registry.revoke("does-not-exist").await,
            Err(DtsError::UnknownToken)
        ));
        assert!(matches!(
            registry.lookup("does-not-exist").await,
            Err(DtsError::UnknownToken)
        ));
    }

    #[tokio::test]
    async fn test_reissue_leaves_single_active_token() {
        let fx = sqlite_registry().await;
        let identity = fx
            .registry
            .create_identity("Alex", IdentityRole::Member)
            .await
            .unwrap();
        let id = identity.identity_id.as_str();

        let first = fx.registry.issue(id, Some("laptop")).await.unwrap();
        let second = fx.registry.issue(id, Some("phone")).await.unwrap();
        let old_revoked = fx.registry.issue(id, None).await.unwrap();
        fx.registry.revoke(&old_revoked.token).await.unwrap();

        let reissued = fx.registry.reissue(id, Some("desktop"), true).await.unwrap();

        let mut revoked = reissued.revoked.clone();
        revoked.sort();
        let mut expected = vec![first.token.clone(), second.token.clone()];
        expected.sort();
        assert_eq!(revoked, expected);

        assert_eq!(active_tokens(&fx.registry, id).await, vec![reissued.record.token]);
        assert_eq!(fx.registry.list_for_identity(id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_reissue_without_revoking() {
        let registry = memory_registry();
        let identity = registry
            .create_identity("Alex", IdentityRole::Member)
            .await
            .unwrap();
        let id = identity.identity_id.as_str();
        registry.issue(id, None).await.unwrap();

        let reissued = registry.reissue(id, None, false).await.unwrap();
        assert!(reissued.revoked.is_empty());
        assert_eq!(active_tokens(&registry, id).await.len(), 2);
    }

    #[tokio::test]
    async fn test_reissue_unknown_identity_changes_nothing() {
        let registry = memory_registry();
        let identity = registry
            .create_identity("Alex", IdentityRole::Member)
            .await
            .unwrap();
        let record = registry.issue(&identity.identity_id, None).await.unwrap();

        assert!(matches!(
            registry.reissue("ghost", None, true).await,
            Err(DtsError::IdentityNotFound(_))
        ));
        assert!(registry.lookup(&record.token).await.unwrap().is_active());
    }

    #[tokio::test]
    async fn test_bootstrap_identity_once() {
        let fx = sqlite_registry().await;
        let identity = Identity::new("Alex", IdentityRole::Member);
        let record = fx
            .registry
            .bootstrap_identity(&identity, Some("laptop"))
            .await
            .unwrap();
        assert_eq!(record.identity_id, identity.identity_id);
        assert!(fx.registry.identity_exists(&identity.identity_id).await.unwrap());

        let second = Identity::new("Sam", IdentityRole::Member);
        assert!(matches!(
            fx.registry.bootstrap_identity(&second, None).await,
            Err(DtsError::AlreadyInitialized)
        ));
        assert_eq!(fx.registry.identity_count().await.unwrap(), 1);
        assert!(fx.registry.list_for_identity(&second.identity_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_touch_last_used() {
        let registry = memory_registry();
        let identity = registry
            .create_identity("Alex", IdentityRole::Member)
            .await
            .unwrap();
        let record = registry.issue(&identity.identity_id, None).await.unwrap();
        assert!(record.last_used.is_none());

        registry.touch_last_used(&record.token).await.unwrap();
        let touched = registry.lookup(&record.token).await.unwrap();
        assert!(touched.last_used.is_some());
        // 不存在的 token 不报错
        registry.touch_last_used("missing").await.unwrap();
    }
}
