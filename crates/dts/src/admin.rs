//! 管理员 token 管理
//!
//! 列出、吊销、重新签发、导出凭证，以及在新设备上导入凭证。
//! 调用方是否具备管理员权限由外部判断

use crate::credential::CredentialStore;
use crate::error::{DtsError, DtsResult};
use crate::registry::TokenRegistry;
use crate::types::{Credential, TokenRecord, TokenStatus, token_fingerprint};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct TokenAdmin {
    registry: TokenRegistry,
    store: CredentialStore,
}

impl TokenAdmin {
    /// `store` 为本机凭证位置，导入时写入
    pub fn new(registry: TokenRegistry, store: CredentialStore) -> Self {
        Self { registry, store }
    }

    /// 列出身份名下全部 token
    pub async fn list_tokens(&self, identity_id: &str) -> DtsResult<Vec<TokenRecord>> {
        self.registry.list_for_identity(identity_id).await
    }

    /// 吊销身份名下的 token
    ///
    /// # Errors
    /// * `UnknownToken` - token 不存在或不属于该身份
    /// * `AlreadyRevoked` - token 已被吊销
    pub async fn revoke_token(&self, identity_id: &str, token: &str) -> DtsResult<()> {
        self.registry.revoke_owned(identity_id, token).await
    }

    /// 重新签发，旧 token 全部吊销，返回需要线下传递到目标设备的新凭证
    pub async fn reissue_token(
        &self,
        identity_id: &str,
        device_label: Option<&str>,
    ) -> DtsResult<Credential> {
        let reissued = self
            .registry
            .reissue(identity_id, device_label, true)
            .await?;
        Ok(Credential::from_record(&reissued.record))
    }

    /// 将身份名下某个 active token 的凭证导出到指定文件
    ///
    /// # Errors
    /// * `UnknownToken` - token 不存在或不属于该身份
    /// * `TokenRevoked` - token 已被吊销
    pub async fn export_credential(
        &self,
        identity_id: &str,
        token: &str,
        dest: &Path,
    ) -> DtsResult<Credential> {
        let record = self.registry.lookup(token).await?;
        if record.identity_id != identity_id {
            return Err(DtsError::UnknownToken);
        }
        if record.status == TokenStatus::Revoked {
            return Err(DtsError::TokenRevoked);
        }

        let credential = Credential::from_record(&record);
        CredentialStore::new(dest).write(&credential)?;
        info!(
            "Exported credential {} of identity {} to {}",
            token_fingerprint(token),
            identity_id,
            dest.display()
        );
        Ok(credential)
    }

    /// 在本机导入凭证
    ///
    /// 三种失败结果分开返回，方便排查：
    /// * `UnknownToken` - 注册表中没有该 token
    /// * `TokenRevoked` - token 已被吊销
    /// * `SignatureInvalid` - 签名不匹配
    ///
    /// 成功时整文件替换本机凭证，返回身份 ID
    pub async fn import_credential(&self, candidate: &Credential) -> DtsResult<String> {
        let fingerprint = token_fingerprint(&candidate.token);

        candidate.check_shape().map_err(DtsError::CredentialCorrupt)?;

        if !self.registry.signer().verify(candidate) {
            warn!(token = %fingerprint, "Import rejected: signature is invalid");
            return Err(DtsError::SignatureInvalid);
        }

        let record = match self.registry.lookup(&candidate.token).await {
            Ok(record) => record,
            Err(DtsError::UnknownToken) => {
                warn!(token = %fingerprint, "Import rejected: token is not registered");
                return Err(DtsError::UnknownToken);
            }
            Err(e) => return Err(e),
        };

        if record.identity_id != candidate.identity_id {
            warn!(token = %fingerprint, "Import rejected: identity does not match registry");
            return Err(DtsError::SignatureInvalid);
        }
        if record.status == TokenStatus::Revoked {
            warn!(token = %fingerprint, "Import rejected: token has been revoked");
            return Err(DtsError::TokenRevoked);
        }

        self.store.write(candidate)?;
        info!(
            token = %fingerprint,
            "Imported credential for identity {} into {}",
            record.identity_id,
            self.store.path().display()
        );
        Ok(record.identity_id)
    }

    /// 从传递过来的文件读取凭证并导入
    ///
    /// # Errors
    /// * `CredentialMissing` - 文件不存在
    /// * `CredentialCorrupt` - 文件无法解析
    pub async fn import_credential_file(&self, path: &Path) -> DtsResult<String> {
        let candidate = CredentialStore::new(path)
            .read()?
            .ok_or(DtsError::CredentialMissing)?;
        self.import_credential(&candidate).await
    }
}
