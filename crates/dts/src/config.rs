//! 设备信任服务配置

use crate::registry::storage::RegistryConfig;
use crate::signature::SecretSource;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 设备信任服务配置（`[trust]` 段）
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct TrustServiceConfig {
    /// 注册表存储配置
    #[serde(default)]
    pub registry: RegistryConfig,

    /// 签名密钥 - 直接配置
    ///
    /// 直接写在配置文件中不够安全，生产环境建议使用 secret_env 或 secret_file
    #[serde(default)]
    pub secret: Option<String>,

    /// 签名密钥环境变量名称
    ///
    /// 例如：secret_env = "DEVTRUST_SIGNING_SECRET"
    #[serde(default)]
    pub secret_env: Option<String>,

    /// 签名密钥文件路径
    ///
    /// 文件权限应设置为 600 (仅所有者可读写)
    #[serde(default)]
    pub secret_file: Option<PathBuf>,

    /// 凭证文件路径覆盖（环境变量 DEVTRUST_CREDENTIAL_FILE 优先）
    #[serde(default)]
    pub credential_file: Option<PathBuf>,

    /// 凭证目录覆盖（环境变量 DEVTRUST_CREDENTIAL_DIR 优先）
    #[serde(default)]
    pub credential_dir: Option<PathBuf>,
}

impl TrustServiceConfig {
    /// 获取签名密钥源
    ///
    /// 优先级: secret_file > secret_env > secret
    /// 都未配置时返回 None（由签名器决定兜底）
    pub fn get_secret_source(&self) -> Option<SecretSource> {
        if let Some(path) = &self.secret_file {
            return Some(SecretSource::File(path.clone()));
        }

        if let Some(env_var) = &self.secret_env {
            return Some(SecretSource::Environment(env_var.clone()));
        }

        self.secret.clone().map(SecretSource::Direct)
    }
}
