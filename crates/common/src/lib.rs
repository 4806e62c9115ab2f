//! 通用基础设施库
//!
//! 为 devtrust 命令行与宿主应用提供进程级配置与配置错误类型

pub mod config;
pub mod error;

// Re-export commonly used types for convenience
pub use config::{DevtrustConfig, LogConfig, ObservabilityConfig};
pub use error::ConfigError;
