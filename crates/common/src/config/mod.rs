//! 统一配置管理
//!
//! devtrust 进程配置的唯一定义处，所有配置项的文档与默认值都在这里。

use crate::error::ConfigError;
use dts::{RegistryBackendKind, SIGNING_SECRET_ENV, TrustServiceConfig};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};

/// devtrust 主配置
///
/// 配置文件使用 TOML 格式
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DevtrustConfig {
    /// 实例名称
    ///
    /// 用于在日志中区分不同部署，例如 office-lan、lab-01
    pub name: String,

    /// 运行环境标识
    ///
    /// - "dev": 开发环境，允许使用固定开发签名密钥
    /// - "prod": 生产环境，必须配置签名密钥
    /// - "test": 测试环境，用于自动化测试
    pub env: String,

    /// SQLite 数据库文件存储目录路径
    ///
    /// 注册表数据库存储为 `{sqlite_path}/devtrust.db`
    #[serde(
        serialize_with = "serialize_pathbuf",
        deserialize_with = "deserialize_pathbuf"
    )]
    pub sqlite_path: PathBuf,

    /// 设备信任服务配置
    #[serde(default)]
    pub trust: TrustServiceConfig,

    /// 可观测性配置（日志）
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// 可观测性配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ObservabilityConfig {
    /// 过滤级别
    ///
    /// 支持 EnvFilter 语法（如 "info,sqlx=warn"）。默认值 "info"。
    #[serde(default = "default_filter_level")]
    pub filter_level: String,

    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    /// 日志输出目标
    ///
    /// - "console": 仅输出到控制台（默认）
    /// - "file": 输出到文件
    #[serde(default = "default_log_output")]
    pub output: String,

    /// 日志轮转开关
    ///
    /// 当 output = "file" 时有效：
    /// - true: 按天轮转日志文件
    /// - false: 追加到单个文件
    #[serde(default)]
    pub rotate: bool,

    /// 日志文件目录
    ///
    /// 当 output = "file" 时有效
    #[serde(default = "default_log_path")]
    pub path: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            filter_level: default_filter_level(),
            log: LogConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: default_log_output(),
            rotate: false,
            path: default_log_path(),
        }
    }
}

fn default_log_output() -> String {
    "console".to_string()
}

fn default_log_path() -> String {
    "logs/".to_string()
}

fn default_filter_level() -> String {
    "info".to_string()
}

fn serialize_pathbuf<S>(path: &Path, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    path.display().to_string().serialize(serializer)
}

fn deserialize_pathbuf<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(PathBuf::from(s))
}

impl Default for DevtrustConfig {
    fn default() -> Self {
        Self {
            name: "devtrust-default".to_string(),
            env: "dev".to_string(),
            sqlite_path: PathBuf::from("database"),
            trust: TrustServiceConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl DevtrustConfig {
    /// 返回可观测性配置引用
    pub fn observability_config(&self) -> &ObservabilityConfig {
        &self.observability
    }

    /// 检查是否使用控制台日志输出
    pub fn is_console_logging(&self) -> bool {
        self.observability.log.output == "console"
    }

    /// 检查是否应该轮转日志
    pub fn should_rotate_logs(&self) -> bool {
        self.observability.log.output == "file" && self.observability.log.rotate
    }

    /// 获取日志过滤级别，优先使用 RUST_LOG
    pub fn get_filter_level(&self) -> String {
        std::env::var("RUST_LOG")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.observability.filter_level.clone())
    }

    /// 是否会退回固定开发签名密钥
    ///
    /// `[trust]` 未配置任何密钥来源且环境变量 DEVTRUST_SIGNING_SECRET 未设置
    pub fn uses_default_secret(&self) -> bool {
        self.trust.get_secret_source().is_none()
            && std::env::var(SIGNING_SECRET_ENV)
                .map(|v| v.trim().is_empty())
                .unwrap_or(true)
    }

    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(ConfigError::FileNotFound {
                path: path_ref.display().to_string(),
            });
        }

        if !path_ref.is_file() {
            return Err(ConfigError::NotAFile {
                path: path_ref.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_ref.display().to_string(),
            source,
        })?;

        Ok(Self::from_toml(&content)?)
    }

    /// 从 TOML 字符串加载配置
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 将配置序列化为 TOML 字符串
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// 验证配置有效性
    ///
    /// 返回的列表中以 "Warning:" 开头的是建议项，其余为错误
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("Instance name cannot be empty".to_string());
        }

        if !["dev", "prod", "test"].contains(&self.env.as_str()) {
            errors.push(format!(
                "Invalid environment '{}', must be one of: dev, prod, test",
                self.env
            ));
        }

        // 验证过滤级别（EnvFilter 语法）
        {
            let main_level = self
                .observability
                .filter_level
                .split(',')
                .next()
                .unwrap_or("")
                .trim();
            if !["trace", "debug", "info", "warn", "error"].contains(&main_level) {
                errors.push(format!(
                    "Invalid filter level '{}', must start with one of: trace, debug, info, warn, error",
                    self.observability.filter_level
                ));
            }
        }

        if !["console", "file"].contains(&self.observability.log.output.as_str()) {
            errors.push(format!(
                "Invalid log output '{}' (observability.log.output), must be 'console' or 'file'",
                self.observability.log.output
            ));
        }

        if self.trust.registry.backend == RegistryBackendKind::Sqlite
            && self
                .sqlite_path
                .to_str()
                .map(|s| s.trim().is_empty())
                .unwrap_or(true)
        {
            errors.push("SQLite database path cannot be empty".to_string());
        }

        if self.trust.registry.sqlite.max_connections == 0 {
            errors.push("trust.registry.sqlite.max_connections must be greater than 0".to_string());
        }

        if let Some(secret) = &self.trust.secret
            && secret.trim().is_empty()
        {
            errors.push("trust.secret cannot be empty when set".to_string());
        }

        if self.uses_default_secret() {
            if self.env == "prod" {
                errors.push(format!(
                    "Production environment requires a signing secret: set trust.secret_file, trust.secret_env, trust.secret or {SIGNING_SECRET_ENV}"
                ));
            } else {
                errors.push(
                    "Warning: no signing secret configured, falling back to the insecure development secret".to_string(),
                );
            }
        }

        if self.env == "prod" {
            if self.trust.registry.backend == RegistryBackendKind::Memory {
                errors.push(
                    "Production environment cannot use the in-memory registry (trust.registry.backend = \"memory\")".to_string(),
                );
            }

            if self.trust.secret.is_some() && self.trust.secret_file.is_none() && self.trust.secret_env.is_none() {
                errors.push("Warning: Production environment should load the signing secret from secret_file or secret_env".to_string());
            }

            if self.observability.log.output == "console" {
                errors.push("Warning: Production environment should use file logging (observability.log.output = \"file\")".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
