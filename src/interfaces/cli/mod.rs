//! CLI interface module

pub mod commands;

use std::fmt;

use crate::cli::{Commands, ConfigCommands};
use crate::config::StaticConfig;
use crate::errors::LinkShortenerError;
use crate::runtime::lifetime::{shutdown, startup};
use commands::{
    add_link, config_generate, config_show, delete_link, get_link, link_stats, ping, visit_link,
};

#[derive(Debug)]
pub enum CliError {
    Service(LinkShortenerError),
    ParseError(String),
    CommandError(String),
}

impl CliError {
    pub fn format_simple(&self) -> String {
        match self {
            CliError::Service(e) => e.format_simple(),
            CliError::ParseError(msg) => format!("Parse error: {}", msg),
            CliError::CommandError(msg) => format!("Command error: {}", msg),
        }
    }

    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        match self {
            CliError::Service(e) => e.format_colored(),
            CliError::ParseError(msg) => {
                format!("{} {}", "Parse error:".yellow().bold(), msg.white())
            }
            CliError::CommandError(msg) => {
                format!("{} {}", "Command error:".red().bold(), msg.white())
            }
        }
    }

    /// Configuration problems abort the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CliError::Service(e) if e.is_fatal())
    }

    /// 1 is reserved for configuration aborts; every other failure exits with 2.
    pub fn exit_code(&self) -> i32 {
        if self.is_fatal() { 1 } else { 2 }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for CliError {}

impl From<LinkShortenerError> for CliError {
    fn from(err: LinkShortenerError) -> Self {
        CliError::Service(err)
    }
}

/// Run one parsed command against the configured store.
pub async fn run_cli_command(cmd: Commands, config: &StaticConfig) -> Result<(), CliError> {
    // Config 命令不需要打开存储
    if let Commands::Config { action } = cmd {
        return match action {
            ConfigCommands::Generate { output_path, force } => {
                config_generate(output_path, force).await
            }
            ConfigCommands::Show => config_show(config),
        };
    }

    let ctx = startup::prepare_startup(config).await.map_err(|e| {
        match e.downcast_ref::<LinkShortenerError>() {
            Some(inner) => CliError::Service(inner.clone()),
            None => CliError::CommandError(format!("{:#}", e)),
        }
    })?;
    let service = ctx.link_service.as_ref();

    let result = match cmd {
        Commands::Add {
            url,
            password,
            memo,
            expire,
        } => add_link(service, url, password, memo, expire).await,

        Commands::Get { hash, password } => get_link(service, &hash, password.as_deref()).await,

        Commands::Visit {
            hash,
            password,
            ip,
            user_agent,
        } => visit_link(service, &hash, password.as_deref(), ip, user_agent).await,

        Commands::Stats {
            hash,
            token,
            page,
            size,
            json,
        } => link_stats(service, &hash, &token, page, size, json).await,

        Commands::Delete { hash, token } => delete_link(service, &hash, &token).await,

        Commands::Ping => ping(service).await,

        Commands::Config { .. } => unreachable!("handled above"),
    };

    shutdown::shutdown(&ctx.store).await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let fatal = CliError::from(LinkShortenerError::configuration("unsupported backend"));
        assert!(fatal.is_fatal());
        assert_eq!(fatal.exit_code(), 1);

        for err in [
            CliError::from(LinkShortenerError::not_found("missing")),
            CliError::from(LinkShortenerError::transport("down")),
            CliError::CommandError("wrong password".into()),
            CliError::ParseError("bad".into()),
        ] {
            assert!(!err.is_fatal());
            assert_eq!(err.exit_code(), 2);
        }
    }

    #[tokio::test]
    async fn test_unsupported_backend_is_fatal() {
        let mut config = StaticConfig::default();
        config.database.backend = "sqlite".into();
        let err = run_cli_command(
            Commands::Get {
                hash: "abc".into(),
                password: None,
            },
            &config,
        )
        .await
        .unwrap_err();
        assert!(err.is_fatal(), "{:?}", err);
    }
}
