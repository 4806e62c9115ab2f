//! Device Trust Service (DTS) - 免登录的设备凭证信任体系
//!
//! DTS 为每个入站的特权操作确定调用者身份：
//! 1. 凭证签名：对凭证字段做 HMAC 签名与校验，按版本分派算法
//! 2. 本机凭证：每台设备一个凭证文件，原子写入
//! 3. Token 注册表：记录所有签发过的 token 及其状态（SQLite / 内存）
//! 4. 首次初始化：身份表为空时创建第一个身份与凭证
//! 5. 身份解析：凭证 -> 签名 -> 注册表 -> 身份 ID
//! 6. 管理操作：列出、吊销、重新签发、导出与跨设备导入

pub mod admin;
pub mod bootstrap;
pub mod config;
pub mod credential;
pub mod error;
pub mod gate;
pub mod registry;
pub mod service;
pub mod signature;
pub mod types;

// Re-export commonly used items
pub use admin::TokenAdmin;
pub use bootstrap::{BootstrapOutcome, IdentityBootstrap};
pub use config::TrustServiceConfig;
pub use credential::{CredentialPathEnv, CredentialStore, PathStrategy, resolve_credential_path};
pub use error::{DtsError, DtsResult};
pub use gate::AuthenticationGate;
pub use registry::storage::{RegistryBackendKind, RegistryConfig, RegistryStorage, SqliteConfig};
pub use registry::{Reissued, TokenRegistry};
pub use service::TrustService;
pub use signature::{
    DEV_FALLBACK_SECRET, SIGNING_SECRET_ENV, SecretSource, SignatureVersion, Signer,
};
pub use types::{
    CREDENTIAL_SCHEMA_VERSION, Credential, Identity, IdentityRole, TokenRecord, TokenStatus,
    token_fingerprint,
};
