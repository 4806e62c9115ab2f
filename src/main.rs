//! devtrust 运维命令行主程序
//!
//! 初始化首个身份、解析本机身份，以及管理员的 token 吊销/重签/导出/导入

mod cli;
mod commands;
mod error;
mod observability;

use anyhow::Context;
use clap::Parser;
use devtrust_common::config::DevtrustConfig;
use dts::RegistryBackendKind;
use observability::init_observability;
use std::path::{Path, PathBuf};

use tracing::{error, info};

macro_rules! bootstrap_info {
    ($($arg:tt)*) => {
        eprintln!($($arg)*);
    };
}

macro_rules! bootstrap_error {
    ($($arg:tt)*) => {
        eprintln!($($arg)*);
    };
}

use cli::{Cli, Commands};
use error::{Error, Result};

/// Application launcher utilities
struct ApplicationLauncher;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Test { config_file } => {
            let config_path =
                ApplicationLauncher::find_config_file(config_file.as_ref().unwrap_or(&cli.config))?;
            ApplicationLauncher::test_config_file(&config_path)
        }
        command => {
            let config_path = ApplicationLauncher::find_config_file(&cli.config)?;
            let config = ApplicationLauncher::load_config(&config_path)?;

            // 初始化日志
            let _observability_guard = init_observability(&config)?;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;

            runtime.block_on(commands::execute(command, &config))
        }
    }
}

impl ApplicationLauncher {
    /// Find config file with fallback locations
    fn find_config_file(provided_path: &PathBuf) -> Result<PathBuf> {
        // If the provided path is not the default "config.toml", check if it exists
        if provided_path != Path::new("config.toml") {
            if provided_path.exists() {
                bootstrap_info!("Using provided config file: {:?}", provided_path);
                return Ok(provided_path.clone());
            } else {
                bootstrap_error!("Provided config file not found: {:?}", provided_path);
                return Err(Error::custom(format!(
                    "Config file not found: {provided_path:?}"
                )));
            }
        }

        let fallback_paths = vec![
            // 1. Current working directory
            PathBuf::from("config.toml"),
            // 2. System config directory
            PathBuf::from("/etc/devtrust/config.toml"),
        ];

        for path in &fallback_paths {
            if path.exists() {
                bootstrap_info!("Found config file: {:?}", path);
                return Ok(path.clone());
            }
        }

        bootstrap_error!("No configuration file found!");
        bootstrap_error!("Please create a config file in one of these locations:");
        for (i, path) in fallback_paths.iter().enumerate() {
            bootstrap_error!("  {}. {:?}", i + 1, path);
        }
        bootstrap_error!("Or specify a custom path with: devtrust --config <path>");

        Err(Error::custom(
            "No configuration file found. Please create one or specify path with --config",
        ))
    }

    /// 测试配置文件是否有效
    fn test_config_file(config_path: &Path) -> Result<()> {
        // Initialize basic logging for test command
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(std::io::stderr)
            .init();

        match DevtrustConfig::from_file(config_path) {
            Ok(config) => {
                info!("✅ 配置文件解析成功: {:?}", config_path);

                if let Err(errors) = config.validate() {
                    error!("❌ 配置验证发现问题:");
                    for (i, err) in errors.iter().enumerate() {
                        if err.starts_with("Warning:") {
                            info!("  {}. ⚠️  {}", i + 1, err);
                        } else {
                            error!("  {}. ❌ {}", i + 1, err);
                        }
                    }
                    let has_errors = errors.iter().any(|e| !e.starts_with("Warning:"));
                    if has_errors {
                        return Err(Error::service_validation("配置验证失败".to_string()));
                    }
                }

                info!("✅ 完整配置验证通过");
                Ok(())
            }
            Err(e) => {
                error!("❌ 配置文件解析失败: {}", e);
                Err(Error::service_validation(format!("配置解析失败: {e}")))
            }
        }
    }

    /// 加载并验证配置，准备数据目录
    fn load_config(config_path: &Path) -> Result<DevtrustConfig> {
        let config = match DevtrustConfig::from_file(config_path) {
            Ok(config) => config,
            Err(e) => {
                bootstrap_error!("❌ 配置加载失败: {}", e);
                return Err(e.into());
            }
        };

        if let Err(errors) = config.validate() {
            let mut has_critical_errors = false;
            for err in &errors {
                if err.starts_with("Warning:") {
                    bootstrap_info!("⚠️  {}", err);
                } else {
                    bootstrap_error!("❌ {}", err);
                    has_critical_errors = true;
                }
            }
            if has_critical_errors {
                return Err(Error::service_validation(
                    "配置验证失败，请修复上述错误".to_string(),
                ));
            }
        }

        // ensure sqlite_path directory exists
        if config.trust.registry.backend == RegistryBackendKind::Sqlite
            && !config.sqlite_path.exists()
        {
            std::fs::create_dir_all(&config.sqlite_path).with_context(|| {
                format!(
                    "Failed to create SQLite data directory: {}",
                    config.sqlite_path.display()
                )
            })?;
        }

        Ok(config)
    }
}
