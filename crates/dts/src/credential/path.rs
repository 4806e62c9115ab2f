//! 凭证文件位置解析
//!
//! 优先级：显式文件路径 > 显式目录 > 平台默认目录 > 用户主目录兜底。
//! [`resolve_credential_path`] 是纯函数，所有环境输入都通过 [`CredentialPathEnv`] 传入

use std::path::{Path, PathBuf};

/// 凭证文件名
pub const CREDENTIAL_FILE_NAME: &str = "credential.json";

/// 应用目录名
pub const APP_DIR_NAME: &str = "devtrust";

/// 显式指定凭证文件路径的环境变量
pub const CREDENTIAL_FILE_ENV: &str = "DEVTRUST_CREDENTIAL_FILE";

/// 显式指定凭证目录的环境变量
pub const CREDENTIAL_DIR_ENV: &str = "DEVTRUST_CREDENTIAL_DIR";

/// 平台路径策略，启动时选定一次后注入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStrategy {
    /// `$XDG_CONFIG_HOME/devtrust`，兜底 `~/.config/devtrust`
    Posix,
    /// `%APPDATA%\devtrust`，兜底 `%USERPROFILE%\.devtrust`
    Windows,
}

impl PathStrategy {
    /// 当前编译目标平台对应的策略
    pub fn current() -> Self {
        if cfg!(windows) {
            PathStrategy::Windows
        } else {
            PathStrategy::Posix
        }
    }

    /// 提供平台默认目录的环境变量名
    pub fn platform_base_env(self) -> &'static str {
        match self {
            PathStrategy::Posix => "XDG_CONFIG_HOME",
            PathStrategy::Windows => "APPDATA",
        }
    }

    fn platform_default(self, base: &Path) -> PathBuf {
        base.join(APP_DIR_NAME).join(CREDENTIAL_FILE_NAME)
    }

    fn home_fallback(self, home: &Path) -> PathBuf {
        match self {
            PathStrategy::Posix => home
                .join(".config")
                .join(APP_DIR_NAME)
                .join(CREDENTIAL_FILE_NAME),
            PathStrategy::Windows => home
                .join(format!(".{APP_DIR_NAME}"))
                .join(CREDENTIAL_FILE_NAME),
        }
    }
}

/// 路径解析的全部输入
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialPathEnv {
    pub file_override: Option<PathBuf>,
    pub dir_override: Option<PathBuf>,
    pub platform_base: Option<PathBuf>,
    pub home: Option<PathBuf>,
}

impl CredentialPathEnv {
    /// 从当前进程环境采集输入
    pub fn from_process(strategy: PathStrategy) -> Self {
        Self {
            file_override: env_path(CREDENTIAL_FILE_ENV),
            dir_override: env_path(CREDENTIAL_DIR_ENV),
            platform_base: env_path(strategy.platform_base_env()),
            home: dirs::home_dir(),
        }
    }

    /// 用配置文件中的值补齐未设置的覆盖项（环境变量优先）
    pub fn with_config_overrides(
        mut self,
        file: Option<&Path>,
        dir: Option<&Path>,
    ) -> Self {
        if self.file_override.is_none() {
            self.file_override = file.map(Path::to_path_buf);
        }
        if self.dir_override.is_none() {
            self.dir_override = dir.map(Path::to_path_buf);
        }
        self
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// 解析凭证文件路径，无可用位置时返回 None
pub fn resolve_credential_path(
    strategy: PathStrategy,
    env: &CredentialPathEnv,
) -> Option<PathBuf> {
    if let Some(file) = &env.file_override {
        return Some(file.clone());
    }
    if let Some(dir) = &env.dir_override {
        return Some(dir.join(CREDENTIAL_FILE_NAME));
    }
    if let Some(base) = &env.platform_base {
        return Some(strategy.platform_default(base));
    }
    env.home.as_deref().map(|home| strategy.home_fallback(home))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_env() -> CredentialPathEnv {
        CredentialPathEnv {
            file_override: Some(PathBuf::from("/override/cred.json")),
            dir_override: Some(PathBuf::from("/override-dir")),
            platform_base: Some(PathBuf::from("/xdg")),
            home: Some(PathBuf::from("/home/alex")),
        }
    }

    #[test]
    fn test_file_override_wins() {
        let path = resolve_credential_path(PathStrategy::Posix, &full_env());
        assert_eq!(path, Some(PathBuf::from("/override/cred.json")));
    }

    #[test]
    fn test_dir_override_second() {
        let env = CredentialPathEnv {
            file_override: None,
            ..full_env()
        };
        let path = resolve_credential_path(PathStrategy::Posix, &env);
        assert_eq!(path, Some(PathBuf::from("/override-dir/credential.json")));
    }

    #[test]
    fn test_platform_default_third() {
        let env = CredentialPathEnv {
            file_override: None,
            dir_override: None,
            ..full_env()
        };
        let path = resolve_credential_path(PathStrategy::Posix, &env);
        assert_eq!(path, Some(PathBuf::from("/xdg/devtrust/credential.json")));
    }

    #[test]
    fn test_home_fallback_per_platform() {
        let env = CredentialPathEnv {
            home: Some(PathBuf::from("/home/alex")),
            ..Default::default()
        };
        assert_eq!(
            resolve_credential_path(PathStrategy::Posix, &env),
            Some(PathBuf::from("/home/alex/.config/devtrust/credential.json"))
        );
        assert_eq!(
            resolve_credential_path(PathStrategy::Windows, &env),
            Some(PathBuf::from("/home/alex/.devtrust/credential.json"))
        );
    }

    #[test]
    fn test_nothing_resolves() {
        let env = CredentialPathEnv::default();
        assert_eq!(resolve_credential_path(PathStrategy::Posix, &env), None);
    }

    #[test]
    fn test_platform_base_env_names() {
        assert_eq!(PathStrategy::Posix.platform_base_env(), "XDG_CONFIG_HOME");
        assert_eq!(PathStrategy::Windows.platform_base_env(), "APPDATA");
    }

    #[test]
    fn test_config_overrides_fill_gaps_only() {
        let env = CredentialPathEnv {
            file_override: Some(PathBuf::from("/env/cred.json")),
            ..Default::default()
        }
        .with_config_overrides(
            Some(Path::new("/config/cred.json")),
            Some(Path::new("/config-dir")),
        );
        assert_eq!(env.file_override, Some(PathBuf::from("/env/cred.json")));
        assert_eq!(env.dir_override, Some(PathBuf::from("/config-dir")));
    }
}
