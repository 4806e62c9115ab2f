//! 本机凭证文件读写
//!
//! 每台设备只有一个凭证文件，写入时整文件原子替换

use crate::credential::path::{CredentialPathEnv, PathStrategy, resolve_credential_path};
use crate::error::{DtsError, DtsResult};
use crate::types::{Credential, token_fingerprint};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// 凭证文件存储
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// 使用确定的文件路径创建存储
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 按路径策略解析位置后创建存储
    pub fn resolve(strategy: PathStrategy, env: &CredentialPathEnv) -> DtsResult<Self> {
        let path = resolve_credential_path(strategy, env).ok_or_else(|| {
            DtsError::Config(
                "Unable to resolve credential file location: no override, platform directory or home directory available"
                    .into(),
            )
        })?;
        debug!("Credential file resolved to {}", path.display());
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取凭证
    ///
    /// * `Ok(None)` - 文件不存在（正常情况）
    /// * `Err(CredentialCorrupt)` - 文件存在但无法解析
    /// * `Err(Io)` - 其他 I/O 错误
    pub fn read(&self) -> DtsResult<Option<Credential>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No credential file at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(DtsError::Io(e)),
        };

        let credential: Credential = serde_json::from_slice(&bytes).map_err(|e| {
            warn!(
                "Credential file {} cannot be parsed: {}",
                self.path.display(),
                e
            );
            DtsError::CredentialCorrupt(e.to_string())
        })?;

        credential.check_shape().map_err(|reason| {
            warn!(
                "Credential file {} is malformed: {}",
                self.path.display(),
                reason
            );
            DtsError::CredentialCorrupt(reason)
        })?;

        Ok(Some(credential))
    }

    /// 原子写入凭证：同目录临时文件 + rename，读者看不到半写状态
    pub fn write(&self, credential: &Credential) -> DtsResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, credential)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o600))?;
        }

        tmp.persist(&self.path).map_err(|e| DtsError::Io(e.error))?;

        info!(
            "Credential written: path={}, identity_id={}, token={}",
            self.path.display(),
            credential.identity_id,
            token_fingerprint(&credential.token)
        );
        Ok(())
    }

    /// 删除凭证文件，文件不存在时返回 false
    pub fn remove(&self) -> DtsResult<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Credential removed: {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DtsError::Io(e)),
        }
    }
}
