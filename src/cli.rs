//! 命令行界面定义
//!
//! 定义了主程序的命令行参数和选项
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "devtrust")]
#[command(version)]
#[command(
    about = "Device credential trust tool: bootstrap, identity resolution and token administration"
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,

    /// Configuration file path (defaults to searching standard locations)
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub(crate) config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Test configuration file
    Test {
        /// Configuration file path (optional, defaults to config.toml)
        #[arg(index = 1)]
        config_file: Option<PathBuf>,
    },

    /// Create the first identity and write this device's credential
    Init {
        /// Display name of the first identity
        #[arg(long)]
        name: String,

        /// Label of this device
        #[arg(long)]
        device: Option<String>,
    },

    /// Resolve the identity bound to this device's credential
    Whoami,

    /// Administer tokens of an identity
    #[command(subcommand)]
    Tokens(TokenCommands),

    /// Import a transferred credential file onto this device
    Import {
        /// Credential file produced by `tokens export` or `tokens reissue --out`
        file: PathBuf,
    },

    /// Remove this device's credential file
    Reset,
}

#[derive(Subcommand, Debug)]
pub(crate) enum TokenCommands {
    /// List all tokens of an identity
    List {
        identity_id: String,
    },

    /// Revoke one token of an identity
    Revoke {
        identity_id: String,
        token: String,
    },

    /// Issue a new token and revoke every previous active token
    Reissue {
        identity_id: String,

        /// Label of the target device
        #[arg(long)]
        device: Option<String>,

        /// Write the new credential to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Write the credential of an active token to a file for transfer
    Export {
        identity_id: String,
        token: String,

        #[arg(long)]
        out: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reissue_with_options() {
        let cli = Cli::parse_from([
            "devtrust",
            "-c",
            "custom.toml",
            "tokens",
            "reissue",
            "u1",
            "--device",
            "tablet",
            "--out",
            "cred.json",
        ]);
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        match cli.command {
            Commands::Tokens(TokenCommands::Reissue {
                identity_id,
                device,
                out,
            }) => {
                assert_eq!(identity_id, "u1");
                assert_eq!(device.as_deref(), Some("tablet"));
                assert_eq!(out, Some(PathBuf::from("cred.json")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_config_flag_after_subcommand() {
        let cli = Cli::parse_from(["devtrust", "whoami", "--config", "a.toml"]);
        assert!(matches!(cli.command, Commands::Whoami));
        assert_eq!(cli.config, PathBuf::from("a.toml"));
    }

    #[test]
    fn test_export_requires_out() {
        assert!(Cli::try_parse_from(["devtrust", "tokens", "export", "u1", "tok"]).is_err());
    }
}
