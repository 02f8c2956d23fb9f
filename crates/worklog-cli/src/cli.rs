//! CLI argument definitions.

use clap::{Parser, Subcommand};

/// Drive the worklog session from the terminal.
#[derive(Parser, Debug)]
#[command(name = "worklog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Show whether a session is active
    Status,

    /// Exchange a Google ID token and sign in
    Login {
        /// ID token from the Google consent flow
        #[arg(value_parser = parse_non_empty)]
        google_id_token: String,
    },

    /// Refresh the access token now
    Refresh,

    /// Sign out and delete saved credentials
    Logout,

    /// Fetch worklogs from the backend
    Worklogs {
        /// Query parameters forwarded as-is
        #[arg(value_name = "KEY=VALUE", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
    },
}

impl Command {
    /// Name for logging. Never includes arguments.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Status => "status",
            Command::Login { .. } => "login",
            Command::Refresh => "refresh",
            Command::Logout => "logout",
            Command::Worklogs { .. } => "worklogs",
        }
    }
}

fn parse_non_empty(value: &str) -> Result<String, String> {
    if value.is_empty() {
        Err("value must not be empty".to_string())
    } else {
        Ok(value.to_string())
    }
}

fn parse_key_value(pair: &str) -> Result<(String, String), String> {
    pair.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", pair))
}
