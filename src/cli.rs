//! Command-line interface definitions using clap

use clap::{Parser, Subcommand};

use crate::config::DEFAULT_CONFIG_PATH;

/// linkshortener - short links on MongoDB or an embedded RocksDB
#[derive(Parser, Debug)]
#[command(name = "linkshortener")]
#[command(version)]
#[command(about = "A self-hosted URL shortener", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(long, short = 'c', global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a short link for a URL
    Add {
        /// Target URL (http or https)
        url: String,

        /// Password protection
        #[arg(long)]
        password: Option<String>,

        /// Free-form note
        #[arg(long, default_value = "")]
        memo: String,

        /// Expiration time (RFC3339 or relative like "1d", "2h")
        #[arg(long)]
        expire: Option<String>,
    },

    /// Resolve a short hash to its target URL
    Get {
        hash: String,

        #[arg(long)]
        password: Option<String>,
    },

    /// Resolve a short hash and record the access
    Visit {
        hash: String,

        #[arg(long)]
        password: Option<String>,

        #[arg(long, default_value = "")]
        ip: String,

        #[arg(long, default_value = "")]
        user_agent: String,
    },

    /// Show access records of a link
    Stats {
        hash: String,

        /// Management token returned by `add`
        token: String,

        #[arg(long, default_value_t = 1)]
        page: u64,

        #[arg(long, default_value_t = 20)]
        size: u64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Soft-delete a short link
    Delete {
        hash: String,

        /// Management token returned by `add`
        token: String,
    },

    /// Check that the store answers reads and writes
    Ping,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: config.example.toml)
        output_path: Option<String>,

        /// Force overwrite without confirmation
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

impl Commands {
    /// Commands that never touch the store.
    pub fn needs_store(&self) -> bool {
        !matches!(self, Commands::Config { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add() {
        let cli = Cli::try_parse_from([
            "linkshortener",
            "add",
            "https://example.com",
            "--expire",
            "1d",
            "--password",
            "pw",
        ])
        .unwrap();
        assert_eq!(cli.config, DEFAULT_CONFIG_PATH);
        match cli.command {
            Commands::Add {
                url,
                password,
                expire,
                memo,
            } => {
                assert_eq!(url, "https://example.com");
                assert_eq!(password.as_deref(), Some("pw"));
                assert_eq!(expire.as_deref(), Some("1d"));
                assert!(memo.is_empty());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_stats_defaults_and_global_config() {
        let cli =
            Cli::try_parse_from(["linkshortener", "stats", "abc", "tok", "-c", "other.toml"])
                .unwrap();
        assert_eq!(cli.config, "other.toml");
        match cli.command {
            Commands::Stats { page, size, json, .. } => {
                assert_eq!((page, size, json), (1, 20, false));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_config_commands_skip_store() {
        let cli = Cli::try_parse_from(["linkshortener", "config", "show"]).unwrap();
        assert!(!cli.command.needs_store());
        let cli = Cli::try_parse_from(["linkshortener", "delete", "abc", "tok"]).unwrap();
        assert!(cli.command.needs_store());
        let cli = Cli::try_parse_from(["linkshortener", "ping"]).unwrap();
        assert!(matches!(cli.command, Commands::Ping));
        assert!(cli.command.needs_store());
    }
}
