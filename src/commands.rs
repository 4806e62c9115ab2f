//! 子命令实现
//!
//! 每个子命令构造一次 `TrustService`，执行后退出

use crate::cli::{Commands, TokenCommands};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use devtrust_common::config::DevtrustConfig;
use dts::{CredentialStore, TokenRecord, TrustService, token_fingerprint};
use std::path::Path;
use tracing::info;

/// 执行需要信任服务的子命令
pub(crate) async fn execute(command: Commands, config: &DevtrustConfig) -> Result<()> {
    let service = TrustService::from_config(&config.trust, &config.sqlite_path).await?;

    if service.registry().signer().is_insecure_default() && config.env == "prod" {
        return Err(Error::service_validation(
            "Refusing to run with the development signing secret in production",
        ));
    }

    match command {
        Commands::Test { .. } => Err(Error::custom(
            "The test command only validates configuration",
        )),
        Commands::Init { name, device } => init(&service, &name, device.as_deref()).await,
        Commands::Whoami => whoami(&service).await,
        Commands::Tokens(tokens) => run_tokens(&service, tokens).await,
        Commands::Import { file } => import(&service, &file).await,
        Commands::Reset => reset(&service),
    }
}

async fn init(service: &TrustService, name: &str, device: Option<&str>) -> Result<()> {
    let outcome = service.bootstrapper().bootstrap(name, device).await?;
    println!("identity_id: {}", outcome.identity.identity_id);
    println!("credential: {}", service.store().path().display());
    Ok(())
}

async fn whoami(service: &TrustService) -> Result<()> {
    // 进程随即退出，等待 last_used 写入
    let identity_id = service.gate().resolve_and_touch().await?;
    println!("identity_id: {identity_id}");
    Ok(())
}

async fn run_tokens(service: &TrustService, command: TokenCommands) -> Result<()> {
    let admin = service.admin();

    match command {
        TokenCommands::List { identity_id } => {
            let tokens = admin.list_tokens(&identity_id).await?;
            if tokens.is_empty() {
                println!("no tokens for identity {identity_id}");
            }
            for record in &tokens {
                println!("{}", format_record(record));
            }
        }
        TokenCommands::Revoke { identity_id, token } => {
            admin.revoke_token(&identity_id, &token).await?;
            println!("revoked: {}", token_fingerprint(&token));
        }
        TokenCommands::Reissue {
            identity_id,
            device,
            out,
        } => {
            let credential = admin.reissue_token(&identity_id, device.as_deref()).await?;
            match out {
                Some(path) => {
                    CredentialStore::new(&path).write(&credential)?;
                    println!("token: {}", credential.token);
                    println!("credential: {}", path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&credential)?),
            }
        }
        TokenCommands::Export {
            identity_id,
            token,
            out,
        } => {
            admin.export_credential(&identity_id, &token, &out).await?;
            println!("credential: {}", out.display());
        }
    }

    Ok(())
}

async fn import(service: &TrustService, file: &Path) -> Result<()> {
    let identity_id = service.admin().import_credential_file(file).await?;
    println!("identity_id: {identity_id}");
    Ok(())
}

fn reset(service: &TrustService) -> Result<()> {
    let path = service.store().path();
    if service.store().remove()? {
        info!("Local credential removed: {}", path.display());
        println!("removed: {}", path.display());
    } else {
        println!("no credential at {}", path.display());
    }
    Ok(())
}

fn format_timestamp(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}

/// 单行展示：token 状态 设备 签发时间 最近使用
fn format_record(record: &TokenRecord) -> String {
    format!(
        "{}  {}  {}  issued_at={}  last_used={}",
        record.token,
        record.status,
        record.device_label.as_deref().unwrap_or("-"),
        format_timestamp(record.issued_at),
        record
            .last_used
            .map(format_timestamp)
            .unwrap_or_else(|| "never".to_string())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use dts::TokenStatus;

    #[test]
    fn test_format_record() {
        let record = TokenRecord {
            token: "ab".repeat(32),
            identity_id: "u1".to_string(),
            signature: "cd".repeat(32),
            device_label: None,
            issued_at: 0,
            last_used: None,
            status: TokenStatus::Revoked,
            signature_version: 1,
        };
        let line = format_record(&record);
        assert!(line.starts_with(&"ab".repeat(32)));
        assert!(line.contains("  revoked  -  "));
        assert!(line.contains("issued_at=1970-01-01T00:00:00+00:00"));
        assert!(line.ends_with("last_used=never"));
    }
}
