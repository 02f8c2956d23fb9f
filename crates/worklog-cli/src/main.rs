//! Worklog - command-line frontend for the worklog desktop client.
//!
//! Wires the core session manager to a handful of commands so the
//! credential lifecycle can be driven without the desktop UI.

mod cli;

use std::io;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use worklog_core::auth::IdentityExchange;
use worklog_core::{ApiClient, GoogleOAuthClient, RefreshOutcome, SessionManager, SessionOptions};

use crate::cli::{Cli, Command};

// ============================================================================
// Constants
// ============================================================================

/// Log file name prefix inside the log directory
const LOG_FILE_PREFIX: &str = "worklog.log";

/// Initialize the tracing subscriber for logging.
///
/// Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug).
/// Logs go to stderr and to a daily file under the config directory.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_writer = worklog_core::config::config_dir()
        .ok()
        .map(|dir| dir.join("logs"))
        .and_then(|dir| std::fs::create_dir_all(&dir).ok().map(|_| dir))
        .map(|dir| tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX)));

    let (file_layer, guard) = match file_writer {
        Some((writer, guard)) => (
            Some(fmt::layer().with_ansi(false).with_writer(writer)),
            Some(guard),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn format_refreshed_at(at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(at) => at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => "not this run".to_string(),
    }
}

async fn run(command: Command) -> Result<()> {
    let options = SessionOptions::from_default_path()?;
    // Commands that talk to the backend want a fresh token up front.
    let options =
        options.with_auto_refresh(matches!(command, Command::Login { .. } | Command::Worklogs { .. }));
    let session = SessionManager::new(options)
        .await
        .context("Failed to initialize session")?;

    match command {
        Command::Status => {
            let snapshot = session.snapshot();
            if snapshot.is_signed_in() {
                println!("Signed in (last refresh: {})", format_refreshed_at(snapshot.refreshed_at));
            } else {
                println!("Signed out");
            }
            match GoogleOAuthClient::load() {
                Ok(client) => println!("Google OAuth client: {}", client.client_id),
                Err(_) => println!("Google OAuth client: not configured"),
            }
        }
        Command::Login { google_id_token } => {
            let exchange = IdentityExchange::new()?;
            let (access_token, refresh_token) = exchange
                .exchange_google_id_token(&session.identity_config().api_key, &google_id_token)
                .await
                .context("Failed to exchange Google ID token")?;
            session.sign_in(&access_token, &refresh_token);
            println!("Signed in");
        }
        Command::Refresh => match session.refresh().await {
            RefreshOutcome::Refreshed => println!("Access token refreshed"),
            RefreshOutcome::Skipped => println!("Not signed in; nothing to refresh"),
            RefreshOutcome::SignedOut => anyhow::bail!("Refresh failed; you have been signed out"),
            RefreshOutcome::Superseded => println!("Session changed during refresh"),
        },
        Command::Logout => {
            session.sign_out();
            println!("Signed out");
        }
        Command::Worklogs { params } => {
            let token = session
                .access_token()
                .ok_or_else(|| anyhow::anyhow!("Not signed in. Run `worklog login` first."))?;
            let client = ApiClient::new()?
                .with_auth_failure_hook(session.auth_failure_hook())
                .with_token(token);
            let params: Vec<(&str, &str)> = params
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            let worklogs = match client.get_worklogs(&params).await {
                Ok(worklogs) => worklogs,
                Err(e) if e.is_auth_failure() => {
                    anyhow::bail!("{}. You have been signed out; run `worklog login`.", e)
                }
                Err(e) => return Err(e).context("Failed to fetch worklogs"),
            };
            println!("{}", serde_json::to_string_pretty(&worklogs)?);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let _log_guard = init_tracing();
    info!(command = cli.command.name(), "Worklog starting");

    run(cli.command).await
}
