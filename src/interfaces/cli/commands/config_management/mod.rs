//! Configuration commands

use std::io::{self, BufRead, Write};
use std::path::Path;

use colored::Colorize;

use crate::config::StaticConfig;
use crate::interfaces::cli::CliError;

const DEFAULT_OUTPUT_PATH: &str = "config.example.toml";

/// Generate example configuration file
pub async fn config_generate(output_path: Option<String>, force: bool) -> Result<(), CliError> {
    let path = output_path.unwrap_or_else(|| DEFAULT_OUTPUT_PATH.to_string());

    // 非 --force 模式下交互确认
    if !force && Path::new(&path).exists() && !confirm_overwrite(&path)? {
        println!("{}", "Aborted.".red());
        return Ok(());
    }

    StaticConfig::default().save_to_file(&path)?;
    println!(
        "{} Configuration file generated: {}",
        "✓".bold().green(),
        path.blue()
    );
    Ok(())
}

/// Print the effective configuration (file + environment) as TOML.
pub fn config_show(config: &StaticConfig) -> Result<(), CliError> {
    let mut shown = config.clone();
    if !shown.database.networked.password.is_empty() {
        shown.database.networked.password = "******".to_string();
    }
    let out = toml::to_string_pretty(&shown).map_err(|e| CliError::CommandError(e.to_string()))?;
    print!("{}", out);
    Ok(())
}

fn confirm_overwrite(path: &str) -> Result<bool, CliError> {
    print!(
        "{} {} {}",
        "File already exists:".yellow(),
        path.blue(),
        "Overwrite? [y/N] ".yellow()
    );
    io::stdout()
        .flush()
        .map_err(|e| CliError::CommandError(e.to_string()))?;

    let mut input = String::new();
    io::stdin()
        .lock()
        .read_line(&mut input)
        .map_err(|e| CliError::CommandError(e.to_string()))?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_writes_loadable_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap().to_string();

        config_generate(Some(path.clone()), true).await.unwrap();
        let loaded = StaticConfig::load_from(&path).unwrap();
        assert_eq!(loaded.database.backend, "embedded");
    }
}
