//! 首次初始化
//!
//! 身份表为空时创建第一个身份，签发首个 token 并写入本机凭证

use crate::credential::CredentialStore;
use crate::error::DtsResult;
use crate::registry::TokenRegistry;
use crate::types::{Credential, Identity, IdentityRole};
use tracing::{error, info};

/// 初始化结果
#[derive(Debug, Clone)]
pub struct BootstrapOutcome {
    pub identity: Identity,
    pub credential: Credential,
}

/// 首次初始化流程
#[derive(Debug, Clone)]
pub struct IdentityBootstrap {
    registry: TokenRegistry,
    store: CredentialStore,
}

impl IdentityBootstrap {
    pub fn new(registry: TokenRegistry, store: CredentialStore) -> Self {
        Self { registry, store }
    }

    /// 执行初始化
    ///
    /// 新身份使用默认的非特权角色
    ///
    /// # Errors
    /// * `AlreadyInitialized` - 已存在身份，不做任何写入
    /// * `Io` - 注册表已提交但凭证文件写入失败，可通过管理员导出恢复
    pub async fn bootstrap(
        &self,
        display_name: &str,
        device_label: Option<&str>,
    ) -> DtsResult<BootstrapOutcome> {
        let identity = Identity::new(display_name, IdentityRole::default());
        let record = self
            .registry
            .bootstrap_identity(&identity, device_label)
            .await?;

        let credential = Credential::from_record(&record);
        if let Err(e) = self.store.write(&credential) {
            error!(
                "Identity {} was created but its credential could not be written to {}: {}",
                identity.identity_id,
                self.store.path().display(),
                e
            );
            return Err(e);
        }

        info!(
            "Bootstrap complete: identity {} ({})",
            identity.identity_id, identity.display_name
        );
        Ok(BootstrapOutcome {
            identity,
            credential,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DtsError;
    use crate::registry::storage::RegistryStorage;
    use crate::signature::Signer;
    use tempfile::TempDir;

    fn setup(dir: &TempDir) -> IdentityBootstrap {
        let registry = TokenRegistry::new(
            RegistryStorage::memory(),
            Signer::new("bootstrap-secret").unwrap(),
        );
        IdentityBootstrap::new(registry, CredentialStore::new(dir.path().join("credential.json")))
    }

    #[tokio::test]
    async fn test_bootstrap_writes_credential() {
        let dir = TempDir::new().unwrap();
        let bootstrap = setup(&dir);

        let outcome = bootstrap.bootstrap("Alex", Some("laptop")).await.unwrap();
        assert_eq!(outcome.identity.role, IdentityRole::Member);
        assert_eq!(outcome.credential.identity_id, outcome.identity.identity_id);
        assert_eq!(outcome.credential.device_label.as_deref(), Some("laptop"));

        let stored = bootstrap.store.read().unwrap().unwrap();
        assert_eq!(stored, outcome.credential);
        assert!(bootstrap.registry.signer().verify(&stored));
    }

    #[tokio::test]
    async fn test_second_bootstrap_rejected_without_writes() {
        let dir = TempDir::new().unwrap();
        let bootstrap = setup(&dir);
        let first = bootstrap.bootstrap("Alex", None).await.unwrap();

        let err = bootstrap.bootstrap("Sam", None).await.unwrap_err();
        assert!(matches!(err, DtsError::AlreadyInitialized));
        assert_eq!(bootstrap.registry.identity_count().await.unwrap(), 1);

        // 本机凭证保持不变
        let stored = bootstrap.store.read().unwrap().unwrap();
        assert_eq!(stored, first.credential);
    }

    #[tokio::test]
    async fn test_bootstrap_with_existing_identity_rejected() {
        let dir = TempDir::new().unwrap();
        let bootstrap = setup(&dir);
        bootstrap
            .registry
            .create_identity("Existing", IdentityRole::Admin)
            .await
            .unwrap();

        assert!(matches!(
            bootstrap.bootstrap("Alex", None).await,
            Err(DtsError::AlreadyInitialized)
        ));
        assert!(bootstrap.store.read().unwrap().is_none());
    }
}
