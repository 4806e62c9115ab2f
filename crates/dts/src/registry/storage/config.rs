//! 注册表存储后端配置

use serde::{Deserialize, Serialize};

/// 注册表配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryConfig {
    /// 存储后端类型
    #[serde(default)]
    pub backend: RegistryBackendKind,

    /// SQLite 配置（当 backend = "sqlite" 时使用）
    #[serde(default)]
    pub sqlite: SqliteConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: RegistryBackendKind::Sqlite,
            sqlite: SqliteConfig::default(),
        }
    }
}

/// 存储后端类型枚举
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegistryBackendKind {
    /// SQLite 数据库
    #[default]
    Sqlite,
    /// 进程内存（进程退出即丢失，用于测试与临时运行）
    Memory,
}

/// SQLite 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SqliteConfig {
    /// 数据库文件名（位于 sqlite_path 目录下）
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// 连接池大小
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// 数据库忙等待超时（秒）
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            file_name: default_file_name(),
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}

fn default_file_name() -> String {
    "devtrust.db".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_busy_timeout_secs() -> u64 {
    5
}
