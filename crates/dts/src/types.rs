//! DTS 数据类型定义

use crate::error::{DtsError, DtsResult};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// 当前凭证文件格式版本
pub const CREDENTIAL_SCHEMA_VERSION: u32 = 1;

/// token 随机字节数（hex 编码后为 64 个字符）
const TOKEN_BYTES: usize = 32;

/// 设备凭证（本地 JSON 文件）
///
/// 只是一个"声明"，必须经过签名校验并与注册表交叉确认后才可信
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub schema_version: u32,
    pub token: String,
    /// 十六进制签名
    pub signature: String,
    pub identity_id: String,
    /// 签发时间（Unix 秒）
    pub issued_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_label: Option<String>,
    pub signature_version: u32,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("schema_version", &self.schema_version)
            .field("token", &token_fingerprint(&self.token))
            .field("identity_id", &self.identity_id)
            .field("issued_at", &self.issued_at)
            .field("device_label", &self.device_label)
            .field("signature_version", &self.signature_version)
            .finish()
    }
}

impl Credential {
    /// 由注册表记录构造凭证
    pub fn from_record(record: &TokenRecord) -> Self {
        Self {
            schema_version: CREDENTIAL_SCHEMA_VERSION,
            token: record.token.clone(),
            signature: record.signature.clone(),
            identity_id: record.identity_id.clone(),
            issued_at: record.issued_at,
            device_label: record.device_label.clone(),
            signature_version: record.signature_version,
        }
    }

    /// 结构性检查（不做签名校验）
    pub fn check_shape(&self) -> Result<(), String> {
        if self.schema_version != CREDENTIAL_SCHEMA_VERSION {
            return Err(format!(
                "unsupported schema_version {}",
                self.schema_version
            ));
        }
        if self.token.trim().is_empty() {
            return Err("token is empty".to_string());
        }
        if self.identity_id.trim().is_empty() {
            return Err("identity_id is empty".to_string());
        }
        if self.signature.trim().is_empty() {
            return Err("signature is empty".to_string());
        }
        Ok(())
    }
}

/// token 状态：`active --revoke--> revoked`（终态）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Active,
    Revoked,
}

impl TokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Active => "active",
            TokenStatus::Revoked => "revoked",
        }
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenStatus {
    type Err = DtsError;

    fn from_str(s: &str) -> DtsResult<Self> {
        match s {
            "active" => Ok(TokenStatus::Active),
            "revoked" => Ok(TokenStatus::Revoked),
            other => Err(DtsError::Internal(format!("Unknown token status: {other}"))),
        }
    }
}

/// 注册表中的 token 记录（权威数据）
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub token: String,
    pub identity_id: String,
    pub signature: String,
    pub device_label: Option<String>,
    pub issued_at: i64,
    /// 最近使用时间，尽力而为
    pub last_used: Option<i64>,
    pub status: TokenStatus,
    pub signature_version: u32,
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("token", &token_fingerprint(&self.token))
            .field("identity_id", &self.identity_id)
            .field("device_label", &self.device_label)
            .field("issued_at", &self.issued_at)
            .field("last_used", &self.last_used)
            .field("status", &self.status)
            .field("signature_version", &self.signature_version)
            .finish()
    }
}

impl TokenRecord {
    pub fn is_active(&self) -> bool {
        self.status == TokenStatus::Active
    }
}

/// 身份角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdentityRole {
    /// 非特权默认角色
    #[default]
    Member,
    Admin,
}

impl IdentityRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityRole::Member => "member",
            IdentityRole::Admin => "admin",
        }
    }
}

impl FromStr for IdentityRole {
    type Err = DtsError;

    fn from_str(s: &str) -> DtsResult<Self> {
        match s {
            "member" => Ok(IdentityRole::Member),
            "admin" => Ok(IdentityRole::Admin),
            other => Err(DtsError::Internal(format!("Unknown identity role: {other}"))),
        }
    }
}

/// 最小身份记录，身份资料本身由外部系统维护
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub identity_id: String,
    pub display_name: String,
    pub role: IdentityRole,
    pub created_at: i64,
}

impl Identity {
    /// 以随机 UUID 创建新身份
    pub fn new(display_name: impl Into<String>, role: IdentityRole) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), display_name, role)
    }

    pub fn with_id(
        identity_id: impl Into<String>,
        display_name: impl Into<String>,
        role: IdentityRole,
    ) -> Self {
        Self {
            identity_id: identity_id.into(),
            display_name: display_name.into(),
            role,
            created_at: now_secs(),
        }
    }
}

/// 生成新的不透明 token
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// token 指纹，用于日志与展示，避免泄露原始 token
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..6])
}

/// 当前 Unix 时间（秒）
pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}
