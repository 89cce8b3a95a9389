//! sessionguard - inspect, use and clear the locally stored session token.

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use sessionguard_core::auth::jwt;
use sessionguard_core::{AuthorizedClient, Config, SessionStatus};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "sessionguard")]
#[command(about = "Check, use and clear the locally stored session token")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a valid session is stored (exit 1 if not)
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the stored token
    Token,
    /// Store a session token (prompts when not given)
    Login {
        token: Option<String>,
    },
    /// Clear the stored token
    Logout,
    /// Decode a token's claims without checking or clearing anything
    Inspect {
        /// Token to decode instead of the stored one
        token: Option<String>,
    },
    /// Send an authorized GET request and print the JSON response
    Get {
        url: String,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .context("--log-file must name a file")?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_file.as_deref())?;

    match cli.command {
        Commands::Status { json } => status(&load_config()?, json),
        Commands::Token => token(&load_config()?),
        Commands::Login { token } => login(&load_config()?, token),
        Commands::Logout => logout(&load_config()?),
        Commands::Inspect { token } => inspect(token, load_config),
        Commands::Get { url } => get(&load_config()?, &url).await,
    }
}

/// Only commands that touch the stored token need the config.
fn load_config() -> Result<Config> {
    let config = Config::load()?;
    info!(backend = ?config.backend, "Loaded configuration");
    Ok(config)
}

fn status(config: &Config, json: bool) -> Result<ExitCode> {
    let guard = config.session_guard()?;
    let status = guard.status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("{}", describe(&status));
    }

    Ok(exit_for(status.is_authenticated()))
}

fn token(config: &Config) -> Result<ExitCode> {
    let guard = config.session_guard()?;
    match guard.token()? {
        Some(token) => {
            println!("{}", token);
            Ok(ExitCode::SUCCESS)
        }
        None => Ok(ExitCode::FAILURE),
    }
}

fn login(config: &Config, token: Option<String>) -> Result<ExitCode> {
    let token = match token {
        Some(token) => token,
        None => rpassword::prompt_password("Token: ").context("Failed to read token")?,
    };

    let guard = config.session_guard()?;
    let status = guard.login(&token)?;
    println!("{}", describe(&status));
    Ok(exit_for(status.is_authenticated()))
}

fn logout(config: &Config) -> Result<ExitCode> {
    let guard = config.session_guard()?;
    let logout = guard.logout()?;
    println!("Logged out. Continue at {}", logout.redirect_to);
    Ok(ExitCode::SUCCESS)
}

fn inspect(
    token: Option<String>,
    load_config: impl FnOnce() -> Result<Config>,
) -> Result<ExitCode> {
    let token = match token {
        Some(token) => token,
        None => match load_config()?.session_guard()?.token()? {
            Some(token) => token,
            None => {
                eprintln!("No token stored");
                return Ok(ExitCode::FAILURE);
            }
        },
    };

    let claims = jwt::decode_claims(&token)?;
    println!("{}", serde_json::to_string_pretty(&claims)?);
    Ok(ExitCode::SUCCESS)
}

async fn get(config: &Config, url: &str) -> Result<ExitCode> {
    let client = AuthorizedClient::new(config.session_guard()?)?;
    let body: serde_json::Value = client.get_json(url).await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(ExitCode::SUCCESS)
}

fn describe(status: &SessionStatus) -> String {
    match status {
        SessionStatus::Absent => "Not logged in".to_string(),
        SessionStatus::Malformed { reason } => {
            format!("Stored token was invalid and has been cleared: {}", reason)
        }
        SessionStatus::Expired { expired_at } => {
            format!("Session expired at {} and has been cleared", expired_at.to_rfc3339())
        }
        SessionStatus::Authenticated { expires_at } => {
            let minutes = status.minutes_until_expiry(Utc::now()).unwrap_or(0);
            format!(
                "Logged in until {} ({} min remaining)",
                expires_at.to_rfc3339(),
                minutes
            )
        }
    }
}

fn exit_for(authenticated: bool) -> ExitCode {
    if authenticated {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
