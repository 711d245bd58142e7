//! Link management commands

use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::interfaces::cli::CliError;
use crate::services::{AccessEvent, CreateLinkRequest, LinkService, ResolveOutcome};
use crate::utils::time_parser::parse_expire;

pub async fn add_link(
    service: &LinkService,
    url: String,
    password: Option<String>,
    memo: String,
    expire: Option<String>,
) -> Result<(), CliError> {
    let expire = match expire.as_deref() {
        Some(input) => parse_expire(input, Utc::now())?,
        None => 0,
    };

    let created = service
        .create_link(CreateLinkRequest {
            url: url.clone(),
            password,
            memo,
            expire,
        })
        .await?;

    match format_expire(expire) {
        Some(expires_at) => println!(
            "{} Added short link: {} -> {} (expires: {})",
            "✓".bold().green(),
            created.hash.cyan(),
            url.blue().underline(),
            expires_at.yellow()
        ),
        None => println!(
            "{} Added short link: {} -> {}",
            "✓".bold().green(),
            created.hash.cyan(),
            url.blue().underline()
        ),
    }
    println!(
        "{} Management token: {}",
        "ℹ".bold().blue(),
        created.token.magenta()
    );
    Ok(())
}

pub async fn get_link(
    service: &LinkService,
    hash: &str,
    password: Option<&str>,
) -> Result<(), CliError> {
    let outcome = service.resolve(hash, password).await?;
    print_outcome(hash, &outcome)
}

pub async fn visit_link(
    service: &LinkService,
    hash: &str,
    password: Option<&str>,
    ip: String,
    user_agent: String,
) -> Result<(), CliError> {
    let outcome = service.resolve(hash, password).await?;
    if matches!(outcome, ResolveOutcome::Target(_)) {
        let id = service
            .record_access(
                hash,
                AccessEvent {
                    ip,
                    user_agent,
                    ..AccessEvent::default()
                },
            )
            .await?;
        println!("{} Access recorded: {}", "✓".bold().green(), id.dimmed());
    }
    print_outcome(hash, &outcome)
}

pub async fn link_stats(
    service: &LinkService,
    hash: &str,
    token: &str,
    page: u64,
    size: u64,
    json: bool,
) -> Result<(), CliError> {
    let stats = service.access_stats(hash, token, page, size).await?;

    if json {
        let out = serde_json::to_string_pretty(&stats)
            .map_err(|e| CliError::CommandError(e.to_string()))?;
        println!("{}", out);
        return Ok(());
    }

    println!(
        "{} {} access records, page {}/{} (size {})",
        "ℹ".bold().blue(),
        stats.total.to_string().cyan(),
        stats.current,
        stats.pages,
        stats.size
    );
    for record in &stats.records {
        println!(
            "  {} {} {}",
            format_timestamp(record.created).yellow(),
            record.ip.white(),
            record.user_agent.dimmed()
        );
    }
    Ok(())
}

pub async fn delete_link(service: &LinkService, hash: &str, token: &str) -> Result<(), CliError> {
    service.delete_link(hash, token).await?;
    println!("{} Deleted short link: {}", "✓".bold().green(), hash.cyan());
    Ok(())
}

pub async fn ping(service: &LinkService) -> Result<(), CliError> {
    service.health_check().await?;
    println!("{} pong", "✓".bold().green());
    Ok(())
}

fn print_outcome(hash: &str, outcome: &ResolveOutcome) -> Result<(), CliError> {
    match outcome {
        ResolveOutcome::Target(url) => {
            println!("{} -> {}", hash.cyan(), url.blue().underline());
            Ok(())
        }
        ResolveOutcome::PasswordRequired => Err(CliError::CommandError(format!(
            "link '{}' is password protected, pass --password",
            hash
        ))),
        ResolveOutcome::PasswordMismatch => Err(CliError::CommandError(format!(
            "wrong password for link '{}'",
            hash
        ))),
    }
}

fn format_expire(expire: i64) -> Option<String> {
    (expire > 0).then(|| format_timestamp(expire))
}

fn format_timestamp(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}
