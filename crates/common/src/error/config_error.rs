//! 配置相关错误类型
//!
//! 定义所有与配置加载、解析、验证相关的错误

use thiserror::Error;

/// 配置相关错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Path is not a regular file: {path}")]
    NotAFile { path: String },

    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {source}")]
    ParseError {
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize configuration: {source}")]
    SerializeError {
        #[source]
        source: toml::ser::Error,
    },
}

impl From<toml::de::Error> for ConfigError {
    fn from(source: toml::de::Error) -> Self {
        ConfigError::ParseError { source }
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(source: toml::ser::Error) -> Self {
        ConfigError::SerializeError { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::FileNotFound {
            path: "/etc/devtrust/config.toml".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Configuration file not found: /etc/devtrust/config.toml"
        );
    }

    #[test]
    fn test_parse_error_from_toml() {
        let parse_err = toml::from_str::<toml::Value>("name = ").unwrap_err();
        let err: ConfigError = parse_err.into();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().starts_with("Failed to parse configuration"));
    }
}
