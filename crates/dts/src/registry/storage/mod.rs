//! 注册表存储模块
//!
//! 提供两种存储后端：SQLite（持久化）与内存（测试与临时运行）
//!
//! # 设计
//!
//! - `RegistryBackend` trait 定义统一的异步接口
//! - `RegistryStorage` enum 封装不同的后端实现
//! - 通过 `RegistryConfig` 配置选择和初始化后端

use std::path::Path;

pub mod backend;
pub mod config;
pub mod memory;
pub mod sqlite;

use crate::error::DtsResult;
use crate::types::{Identity, TokenRecord};

pub use backend::RegistryBackend;
pub use config::{RegistryBackendKind, RegistryConfig, SqliteConfig};
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

/// 注册表存储统一接口
///
/// 使用 enum 而不是 trait object，可以 Clone 且无虚函数调用
#[derive(Clone, Debug)]
pub enum RegistryStorage {
    /// SQLite 存储后端
    Sqlite(Box<SqliteBackend>),

    /// 内存存储后端
    Memory(MemoryBackend),
}

impl RegistryStorage {
    /// 从配置创建存储实例
    ///
    /// # Arguments
    /// * `config` - 注册表配置
    /// * `db_path` - 数据库文件存储目录路径（backend = "sqlite" 时使用）
    pub async fn from_config<P: AsRef<Path>>(config: &RegistryConfig, db_path: P) -> DtsResult<Self> {
        match config.backend {
            RegistryBackendKind::Sqlite => {
                let backend = SqliteBackend::new(&config.sqlite, db_path.as_ref()).await?;
                Ok(Self::Sqlite(Box::new(backend)))
            }
            RegistryBackendKind::Memory => Ok(Self::Memory(MemoryBackend::new())),
        }
    }

    /// 新建内存存储
    pub fn memory() -> Self {
        Self::Memory(MemoryBackend::new())
    }

    fn backend(&self) -> &dyn RegistryBackend {
        match self {
            Self::Sqlite(b) => b.as_ref(),
            Self::Memory(b) => b,
        }
    }

    pub async fn create_identity(&self, identity: &Identity) -> DtsResult<()> {
        self.backend().create_identity(identity).await
    }

    pub async fn get_identity(&self, identity_id: &str) -> DtsResult<Option<Identity>> {
        self.backend().get_identity(identity_id).await
    }

    pub async fn identity_count(&self) -> DtsResult<u64> {
        self.backend().identity_count().await
    }

    pub async fn bootstrap(&self, identity: &Identity, first_token: &TokenRecord) -> DtsResult<()> {
        self.backend().bootstrap(identity, first_token).await
    }

    pub async fn insert_token(&self, record: &TokenRecord) -> DtsResult<()> {
        self.backend().insert_token(record).await
    }

    pub async fn insert_and_revoke_others(&self, record: &TokenRecord) -> DtsResult<Vec<String>> {
        self.backend().insert_and_revoke_others(record).await
    }

    pub async fn get_token(&self, token: &str) -> DtsResult<Option<TokenRecord>> {
        self.backend().get_token(token).await
    }

    pub async fn list_tokens(&self, identity_id: &str) -> DtsResult<Vec<TokenRecord>> {
        self.backend().list_tokens(identity_id).await
    }

    pub async fn revoke_token(&self, token: &str, owner: Option<&str>) -> DtsResult<()> {
        self.backend().revoke_token(token, owner).await
    }

    pub async fn touch_last_used(&self, token: &str, at: i64) -> DtsResult<()> {
        self.backend().touch_last_used(token, at).await
    }

    /// 获取后端类型名称
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "SQLite",
            Self::Memory(_) => "Memory",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_storage_from_config_sqlite() {
        let temp_dir = tempdir().unwrap();
        let storage = RegistryStorage::from_config(&RegistryConfig::default(), temp_dir.path())
            .await
            .unwrap();
        assert_eq!(storage.backend_name(), "SQLite");
        assert_eq!(storage.identity_count().await.unwrap(), 0);
        assert!(temp_dir.path().join("devtrust.db").exists());
    }

    #[tokio::test]
    async fn test_storage_from_config_memory() {
        let config = RegistryConfig {
            backend: RegistryBackendKind::Memory,
            ..Default::default()
        };
        let storage = RegistryStorage::from_config(&config, "unused").await.unwrap();
        assert_eq!(storage.backend_name(), "Memory");
    }
}
