//! SQLite 存储后端实现
//!
//! 使用 sqlx 提供原生异步 SQLite 存储支持。
//! 多步操作都放在一个事务里，且事务的第一条语句就是写操作，
//! 这样 SQLite 会在读取前先拿到写锁，并发调用方只能串行通过

use crate::error::{DtsError, DtsResult};
use crate::registry::storage::backend::RegistryBackend;
use crate::registry::storage::config::SqliteConfig;
use crate::types::{Identity, IdentityRole, TokenRecord, TokenStatus};
use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteSynchronous,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

type TokenRow = (
    String,
    String,
    String,
    Option<String>,
    i64,
    Option<i64>,
    String,
    i64,
);

type IdentityRow = (String, String, String, i64);

const TOKEN_COLUMNS: &str = "token, identity_id, signature, device_label, issued_at, last_used, status, signature_version";

/// SQLite 存储后端
#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
    file: PathBuf,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("file", &self.file)
            .finish()
    }
}

impl SqliteBackend {
    /// 创建新的 SQLite 后端实例
    ///
    /// # Arguments
    /// * `config` - SQLite 配置
    /// * `db_path` - 数据库文件存储目录路径（来自 DevtrustConfig.sqlite_path）
    pub async fn new(config: &SqliteConfig, db_path: &Path) -> DtsResult<Self> {
        let file = db_path.join(&config.file_name);

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", file.display()))
            .map_err(|e| DtsError::Internal(format!("Failed to parse SQLite URL: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        let backend = Self { pool, file };
        backend.init().await?;

        info!(
            "SQLite registry initialized: path={}, WAL mode enabled",
            backend.file.display()
        );

        Ok(backend)
    }

    /// 关闭连接池
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn record_from_row(row: TokenRow) -> DtsResult<TokenRecord> {
    let (token, identity_id, signature, device_label, issued_at, last_used, status, version) = row;
    Ok(TokenRecord {
        token,
        identity_id,
        signature,
        device_label,
        issued_at,
        last_used,
        status: status.parse::<TokenStatus>()?,
        signature_version: u32::try_from(version).map_err(|_| {
            DtsError::Internal(format!("Invalid signature_version in registry: {version}"))
        })?,
    })
}

fn identity_from_row(row: IdentityRow) -> DtsResult<Identity> {
    let (identity_id, display_name, role, created_at) = row;
    Ok(Identity {
        identity_id,
        display_name,
        role: role.parse::<IdentityRole>()?,
        created_at,
    })
}

/// 插入 token，所属身份不存在时影响行数为 0
async fn insert_token_row(conn: &mut SqliteConnection, record: &TokenRecord) -> DtsResult<u64> {
    let result = sqlx::query(
        r#"INSERT INTO device_tokens
               (token, identity_id, signature, device_label, issued_at, last_used, status, signature_version)
           SELECT ?1, ?2, ?3, ?4, ?5, NULL, ?6, ?7
           WHERE EXISTS (SELECT 1 FROM identities WHERE identity_id = ?2)"#,
    )
    .bind(&record.token)
    .bind(&record.identity_id)
    .bind(&record.signature)
    .bind(&record.device_label)
    .bind(record.issued_at)
    .bind(record.status.as_str())
    .bind(i64::from(record.signature_version))
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

#[async_trait]
impl RegistryBackend for SqliteBackend {
    async fn init(&self) -> DtsResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS identities (
                identity_id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                role TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS device_tokens (
                token TEXT PRIMARY KEY,
                identity_id TEXT NOT NULL REFERENCES identities(identity_id),
                signature TEXT NOT NULL,
                device_label TEXT,
                issued_at INTEGER NOT NULL,
                last_used INTEGER,
                status TEXT NOT NULL CHECK (status IN ('active', 'revoked')),
                signature_version INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_device_tokens_identity ON device_tokens(identity_id, status)",
        )
        .execute(&self.pool)
        .await?;

        debug!("SQLite tables and indexes initialized");
        Ok(())
    }

    async fn create_identity(&self, identity: &Identity) -> DtsResult<()> {
        sqlx::query(
            r#"INSERT INTO identities (identity_id, display_name, role, created_at)
               VALUES (?1, ?2, ?3, ?4)"#,
        )
        .bind(&identity.identity_id)
        .bind(&identity.display_name)
        .bind(identity.role.as_str())
        .bind(identity.created_at)
        .execute(&self.pool)
        .await?;

        debug!("Created identity: {}", identity.identity_id);
        Ok(())
    }

    async fn get_identity(&self, identity_id: &str) -> DtsResult<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "SELECT identity_id, display_name, role, created_at FROM identities WHERE identity_id = ?",
        )
        .bind(identity_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(identity_from_row).transpose()
    }

    async fn identity_count(&self) -> DtsResult<u64> {
        let (count,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM identities")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn bootstrap(&self, identity: &Identity, first_token: &TokenRecord) -> DtsResult<()> {
        let mut tx = self.pool.begin().await?;

        // 检查为空与插入合并为一条写语句
        let inserted = sqlx::query(
            r#"INSERT INTO identities (identity_id, display_name, role, created_at)
               SELECT ?1, ?2, ?3, ?4
               WHERE NOT EXISTS (SELECT 1 FROM identities)"#,
        )
        .bind(&identity.identity_id)
        .bind(&identity.display_name)
        .bind(identity.role.as_str())
        .bind(identity.created_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DtsError::AlreadyInitialized);
        }

        if insert_token_row(&mut tx, first_token).await? == 0 {
            tx.rollback().await?;
            return Err(DtsError::Internal(
                "Bootstrap identity vanished inside its own transaction".into(),
            ));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_token(&self, record: &TokenRecord) -> DtsResult<()> {
        let mut conn = self.pool.acquire().await?;
        if insert_token_row(&mut conn, record).await? == 0 {
            return Err(DtsError::IdentityNotFound(record.identity_id.clone()));
        }
        Ok(())
    }

    async fn insert_and_revoke_others(&self, record: &TokenRecord) -> DtsResult<Vec<String>> {
        let mut tx = self.pool.begin().await?;

        // 先签发新 token，避免出现没有任何 active token 的窗口
        if insert_token_row(&mut tx, record).await? == 0 {
            tx.rollback().await?;
            return Err(DtsError::IdentityNotFound(record.identity_id.clone()));
        }

        let previous = sqlx::query_as::<_, (String,)>(
            r#"SELECT token FROM device_tokens
               WHERE identity_id = ?1 AND status = 'active' AND token != ?2
               ORDER BY issued_at, rowid"#,
        )
        .bind(&record.identity_id)
        .bind(&record.token)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query(
            r#"UPDATE device_tokens SET status = 'revoked'
               WHERE identity_id = ?1 AND status = 'active' AND token != ?2"#,
        )
        .bind(&record.identity_id)
        .bind(&record.token)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(previous.into_iter().map(|(token,)| token).collect())
    }

    async fn get_token(&self, token: &str) -> DtsResult<Option<TokenRecord>> {
        let row = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM device_tokens WHERE token = ?"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(record_from_row).transpose()
    }

    async fn list_tokens(&self, identity_id: &str) -> DtsResult<Vec<TokenRecord>> {
        let rows = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM device_tokens WHERE identity_id = ? ORDER BY issued_at, rowid"
        ))
        .bind(identity_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(record_from_row).collect()
    }

    async fn revoke_token(&self, token: &str, owner: Option<&str>) -> DtsResult<()> {
        let result = sqlx::query(
            r#"UPDATE device_tokens SET status = 'revoked'
               WHERE token = ?1 AND status = 'active' AND (?2 IS NULL OR identity_id = ?2)"#,
        )
        .bind(token)
        .bind(owner)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let status = sqlx::query_as::<_, (String,)>(
            "SELECT status FROM device_tokens WHERE token = ?1 AND (?2 IS NULL OR identity_id = ?2)",
        )
        .bind(token)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        match status {
            None => Err(DtsError::UnknownToken),
            Some((status,)) => match status.parse::<TokenStatus>()? {
                TokenStatus::Revoked => Err(DtsError::AlreadyRevoked),
                TokenStatus::Active => Err(DtsError::Internal(
                    "Token remained active after revoke".into(),
                )),
            },
        }
    }

    async fn touch_last_used(&self, token: &str, at: i64) -> DtsResult<()> {
        sqlx::query("UPDATE device_tokens SET last_used = ?1 WHERE token = ?2")
            .bind(at)
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
