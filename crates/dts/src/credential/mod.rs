//! 本机凭证模块
//!
//! - `path`：凭证文件位置解析（纯函数 + 平台策略）
//! - `store`：凭证文件的读取与原子写入

pub mod path;
pub mod store;

pub use path::{
    CREDENTIAL_DIR_ENV, CREDENTIAL_FILE_ENV, CREDENTIAL_FILE_NAME, CredentialPathEnv,
    PathStrategy, resolve_credential_path,
};
pub use store::CredentialStore;
