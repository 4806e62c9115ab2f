//! DTS 服务错误定义

use thiserror::Error;

/// DTS 服务错误类型
///
/// 错误信息中不会出现原始 token，需要定位时使用 [`crate::types::token_fingerprint`]
#[derive(Error, Debug)]
pub enum DtsError {
    /// 本机尚未保存凭证文件
    #[error("Credential file not found")]
    CredentialMissing,

    /// 凭证文件存在但无法解析
    #[error("Credential file is corrupt: {0}")]
    CredentialCorrupt(String),

    /// 凭证签名校验失败
    #[error("Credential signature is invalid")]
    SignatureInvalid,

    /// 注册表中不存在该 token（或不属于指定身份）
    #[error("Unknown token")]
    UnknownToken,

    /// token 已被吊销
    #[error("Token has been revoked")]
    TokenRevoked,

    /// 重复吊销
    #[error("Token was already revoked")]
    AlreadyRevoked,

    /// 身份库非空，不能再次初始化
    #[error("Identity store is already initialized")]
    AlreadyInitialized,

    /// 签发时身份不存在
    #[error("Identity not found: {0}")]
    IdentityNotFound(String),

    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// 文件 I/O 错误
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DtsError {
    /// 安全相关的拒绝：直接拒绝，不重试，需要审计日志
    pub fn is_security_denial(&self) -> bool {
        matches!(self, DtsError::SignatureInvalid | DtsError::TokenRevoked)
    }

    /// 用户可恢复的错误：调用方应引导到重新配置设备的流程
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DtsError::CredentialMissing | DtsError::CredentialCorrupt(_)
        )
    }
}

/// DTS 结果类型别名
pub type DtsResult<T> = Result<T, DtsError>;
