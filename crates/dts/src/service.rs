//! 设备信任服务装配
//!
//! 进程启动时按配置构造一次，各组件共享同一个注册表客户端

use crate::admin::TokenAdmin;
use crate::bootstrap::IdentityBootstrap;
use crate::config::TrustServiceConfig;
use crate::credential::{CredentialPathEnv, CredentialStore, PathStrategy};
use crate::error::DtsResult;
use crate::gate::AuthenticationGate;
use crate::registry::TokenRegistry;
use crate::signature::Signer;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone)]
pub struct TrustService {
    registry: TokenRegistry,
    store: CredentialStore,
}

impl TrustService {
    pub fn new(registry: TokenRegistry, store: CredentialStore) -> Self {
        Self { registry, store }
    }

    /// 从配置构造服务
    ///
    /// # Arguments
    /// * `config` - `[trust]` 配置段
    /// * `db_path` - 数据库目录（来自 DevtrustConfig.sqlite_path）
    pub async fn from_config<P: AsRef<Path>>(
        config: &TrustServiceConfig,
        db_path: P,
    ) -> DtsResult<Self> {
        let signer = Signer::from_source(config.get_secret_source().as_ref())?;

        let strategy = PathStrategy::current();
        let path_env = CredentialPathEnv::from_process(strategy).with_config_overrides(
            config.credential_file.as_deref(),
            config.credential_dir.as_deref(),
        );
        let store = CredentialStore::resolve(strategy, &path_env)?;

        let registry = TokenRegistry::from_config(&config.registry, db_path, signer).await?;

        info!(
            "Trust service ready: credential={}, insecure_default_secret={}",
            store.path().display(),
            registry.signer().is_insecure_default()
        );
        Ok(Self::new(registry, store))
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn gate(&self) -> AuthenticationGate {
        AuthenticationGate::new(self.store.clone(), self.registry.clone())
    }

    pub fn admin(&self) -> TokenAdmin {
        TokenAdmin::new(self.registry.clone(), self.store.clone())
    }

    pub fn bootstrapper(&self) -> IdentityBootstrap {
        IdentityBootstrap::new(self.registry.clone(), self.store.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::storage::RegistryBackendKind;
    use serial_test::serial;
    use tempfile::TempDir;

    #[tokio::test]
    #[serial]
    async fn test_from_config_uses_configured_paths() {
        unsafe {
            std::env::remove_var(crate::credential::CREDENTIAL_FILE_ENV);
            std::env::remove_var(crate::credential::CREDENTIAL_DIR_ENV);
        }
        let dir = TempDir::new().unwrap();
        let config = TrustServiceConfig {
            secret: Some("service-secret".to_string()),
            credential_dir: Some(dir.path().join("cred")),
            ..Default::default()
        };

        let service = TrustService::from_config(&config, dir.path()).await.unwrap();
        assert_eq!(
            service.store().path(),
            dir.path().join("cred").join("credential.json")
        );
        assert!(!service.registry().signer().is_insecure_default());
        assert!(dir.path().join("devtrust.db").exists());

        let outcome = service
            .bootstrapper()
            .bootstrap("Alex", Some("laptop"))
            .await
            .unwrap();
        assert_eq!(
            service.gate().resolve().await.unwrap(),
            outcome.identity.identity_id
        );
    }

    #[tokio::test]
    #[serial]
    async fn test_environment_overrides_config_file_path() {
        let dir = TempDir::new().unwrap();
        let env_file = dir.path().join("from-env.json");
        unsafe {
            std::env::set_var(crate::credential::CREDENTIAL_FILE_ENV, &env_file);
        }

        let mut config = TrustServiceConfig {
            secret: Some("service-secret".to_string()),
            credential_file: Some(dir.path().join("from-config.json")),
            ..Default::default()
        };
        config.registry.backend = RegistryBackendKind::Memory;

        let service = TrustService::from_config(&config, dir.path()).await;
        unsafe {
            std::env::remove_var(crate::credential::CREDENTIAL_FILE_ENV);
        }
        assert_eq!(service.unwrap().store().path(), env_file);
    }
}
