//! DTS 凭证签名模块
//!
//! 对凭证字段做 HMAC 签名与校验，按 `signature_version` 分派算法，
//! 以便将来更换算法后旧凭证仍可校验

use crate::error::{DtsError, DtsResult};
use crate::types::Credential;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

type HmacSha256 = Hmac<Sha256>;

/// 默认读取签名密钥的环境变量
pub const SIGNING_SECRET_ENV: &str = "DEVTRUST_SIGNING_SECRET";

/// 未配置密钥时使用的固定开发密钥
///
/// 仅适用于可信局域网部署，生产环境配置校验会拒绝
pub const DEV_FALLBACK_SECRET: &str = "devtrust-insecure-development-signing-secret";

/// 签名算法版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureVersion {
    /// HMAC-SHA256，hex 编码
    V1,
}

impl SignatureVersion {
    /// 新签发凭证使用的版本
    pub const CURRENT: SignatureVersion = SignatureVersion::V1;

    pub fn as_u32(self) -> u32 {
        match self {
            SignatureVersion::V1 => 1,
        }
    }

    pub fn from_u32(version: u32) -> Option<Self> {
        match version {
            1 => Some(SignatureVersion::V1),
            _ => None,
        }
    }
}

/// 签名密钥来源
#[derive(Debug, Clone)]
pub enum SecretSource {
    /// 直接从配置文件读取
    Direct(String),
    /// 从环境变量读取
    Environment(String),
    /// 从文件路径读取
    File(PathBuf),
}

/// 凭证签名器
#[derive(Clone)]
pub struct Signer {
    secret: Arc<Vec<u8>>,
    insecure_default: bool,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("insecure_default", &self.insecure_default)
            .finish()
    }
}

impl Signer {
    /// 使用给定密钥创建签名器
    pub fn new(secret: impl AsRef<[u8]>) -> DtsResult<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(DtsError::Config("Signing secret cannot be empty".into()));
        }
        Ok(Self {
            secret: Arc::new(secret.to_vec()),
            insecure_default: false,
        })
    }

    /// 使用固定开发密钥创建签名器
    pub fn insecure_default() -> Self {
        warn!(
            "No signing secret configured, falling back to the built-in development secret. \
             Set {} or trust.secret_file for any deployment outside a trusted LAN",
            SIGNING_SECRET_ENV
        );
        Self {
            secret: Arc::new(DEV_FALLBACK_SECRET.as_bytes().to_vec()),
            insecure_default: true,
        }
    }

    /// 从密钥来源创建签名器
    ///
    /// `None` 时尝试 [`SIGNING_SECRET_ENV`]，仍未设置则退回开发密钥
    pub fn from_source(source: Option<&SecretSource>) -> DtsResult<Self> {
        let secret = match source {
            Some(SecretSource::Direct(secret)) => {
                debug!("Loading signing secret from direct configuration");
                secret.clone()
            }
            Some(SecretSource::Environment(env_var)) => {
                debug!("Loading signing secret from environment variable: {}", env_var);
                std::env::var(env_var).map_err(|e| {
                    DtsError::Config(format!(
                        "Failed to read signing secret from environment variable {env_var}: {e}"
                    ))
                })?
            }
            Some(SecretSource::File(path)) => {
                debug!("Loading signing secret from file: {}", path.display());
                std::fs::read_to_string(path).map_err(|e| {
                    DtsError::Config(format!(
                        "Failed to read signing secret from file {}: {e}",
                        path.display()
                    ))
                })?
            }
            None => match std::env::var(SIGNING_SECRET_ENV) {
                Ok(secret) if !secret.trim().is_empty() => secret,
                _ => return Ok(Self::insecure_default()),
            },
        };

        let signer = Self::new(secret.trim())?;
        info!("Signing secret loaded successfully");
        Ok(signer)
    }

    /// 是否使用了固定开发密钥
    pub fn is_insecure_default(&self) -> bool {
        self.insecure_default
    }

    /// 规范化签名载荷：`token:identity_id:issued_at:device_label_or_empty`
    pub fn canonical_payload(
        token: &str,
        identity_id: &str,
        issued_at: i64,
        device_label: Option<&str>,
    ) -> String {
        format!(
            "{token}:{identity_id}:{issued_at}:{}",
            device_label.unwrap_or("")
        )
    }

    /// 使用当前版本算法签名
    pub fn sign(
        &self,
        token: &str,
        identity_id: &str,
        issued_at: i64,
        device_label: Option<&str>,
    ) -> DtsResult<String> {
        self.sign_with(
            SignatureVersion::CURRENT,
            token,
            identity_id,
            issued_at,
            device_label,
        )
    }

    /// 使用指定版本算法签名
    pub fn sign_with(
        &self,
        version: SignatureVersion,
        token: &str,
        identity_id: &str,
        issued_at: i64,
        device_label: Option<&str>,
    ) -> DtsResult<String> {
        let payload = Self::canonical_payload(token, identity_id, issued_at, device_label);
        match version {
            SignatureVersion::V1 => {
                let mut mac = self.hmac_sha256()?;
                mac.update(payload.as_bytes());
                Ok(hex::encode(mac.finalize().into_bytes()))
            }
        }
    }

    /// 用凭证自身字段重新计算签名并比较
    ///
    /// 未知版本或非法 hex 一律返回 false
    pub fn verify(&self, credential: &Credential) -> bool {
        let Some(version) = SignatureVersion::from_u32(credential.signature_version) else {
            debug!(
                "Unsupported signature_version: {}",
                credential.signature_version
            );
            return false;
        };

        let Ok(expected) = hex::decode(&credential.signature) else {
            return false;
        };

        let payload = Self::canonical_payload(
            &credential.token,
            &credential.identity_id,
            credential.issued_at,
            credential.device_label.as_deref(),
        );

        match version {
            SignatureVersion::V1 => match self.hmac_sha256() {
                Ok(mut mac) => {
                    mac.update(payload.as_bytes());
                    mac.verify_slice(&expected).is_ok()
                }
                Err(_) => false,
            },
        }
    }

    fn hmac_sha256(&self) -> DtsResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| DtsError::Internal(format!("Failed to create HMAC: {e}")))
    }
}
