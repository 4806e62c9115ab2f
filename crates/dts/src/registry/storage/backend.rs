//! 注册表存储后端抽象接口
//!
//! 定义了所有存储后端必须实现的统一异步接口。
//! 后端只负责行数据与事务边界，签名由上层 `TokenRegistry` 完成

use crate::error::DtsResult;
use crate::types::{Identity, TokenRecord};
use async_trait::async_trait;

/// 注册表存储后端抽象接口
#[async_trait]
pub trait RegistryBackend: Send + Sync {
    /// 初始化存储后端（建表、索引等）
    async fn init(&self) -> DtsResult<()>;

    /// 插入身份记录
    async fn create_identity(&self, identity: &Identity) -> DtsResult<()>;

    /// 查询身份记录
    async fn get_identity(&self, identity_id: &str) -> DtsResult<Option<Identity>>;

    /// 身份总数
    async fn identity_count(&self) -> DtsResult<u64>;

    /// 首次初始化：在同一事务中检查身份表为空、插入身份并插入首个 token
    ///
    /// # Errors
    /// * `AlreadyInitialized` - 身份表非空，不做任何写入
    async fn bootstrap(&self, identity: &Identity, first_token: &TokenRecord) -> DtsResult<()>;

    /// 插入 token 记录，身份存在检查与插入为同一条语句
    ///
    /// # Errors
    /// * `IdentityNotFound` - 所属身份不存在
    async fn insert_token(&self, record: &TokenRecord) -> DtsResult<()>;

    /// 在同一事务中先插入新 token，再吊销该身份其余所有 active token
    ///
    /// # Returns
    /// 被吊销的 token 列表
    async fn insert_and_revoke_others(&self, record: &TokenRecord) -> DtsResult<Vec<String>>;

    /// 查询 token 记录
    async fn get_token(&self, token: &str) -> DtsResult<Option<TokenRecord>>;

    /// 列出某身份的全部 token（按签发时间排序）
    async fn list_tokens(&self, identity_id: &str) -> DtsResult<Vec<TokenRecord>>;

    /// 吊销 token，`owner` 不为空时仅匹配该身份名下的 token
    ///
    /// # Errors
    /// * `UnknownToken` - token 不存在（或不属于 owner）
    /// * `AlreadyRevoked` - token 已是 revoked 状态
    async fn revoke_token(&self, token: &str, owner: Option<&str>) -> DtsResult<()>;

    /// 更新最近使用时间
    async fn touch_last_used(&self, token: &str, at: i64) -> DtsResult<()>;
}
