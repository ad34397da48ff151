//! cogauth - local credential broker
//!
//! Turns a Cognito user pool, OIDC or Google login into short-lived AWS
//! credentials, refreshing the identity tokens and re-federating on demand.

mod auth;
mod cli;
mod client;
mod config;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::config::settings::env;
use crate::error::Result;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout carries credential output, so logs go to stderr
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(env::LOG_LEVEL).unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        if e.is_retriable() {
            eprintln!("This may be temporary. Try again in a moment.");
        }
        // exit status 2 means an interactive login is required
        std::process::exit(if e.requires_reauth() { 2 } else { 1 });
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        cli::commands::handle_completions(shell);
        return Ok(());
    }

    let config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Login { username, password } => {
            cli::commands::handle_login(config, &username, password).await
        },
        Commands::OidcLogin { no_browser } => cli::commands::handle_oidc_login(config, no_browser).await,
        Commands::Logout => cli::commands::handle_logout(config).await,
        Commands::Credentials { format } => cli::commands::handle_credentials(config, format).await,
        Commands::ConsoleSignin { no_browser } => {
            cli::commands::handle_console_signin(config, no_browser).await
        },
        Commands::ResetPassword { username } => {
            cli::commands::handle_reset_password(config, &username).await
        },
        Commands::Status => cli::commands::handle_status(config),
        Commands::Completions { .. } => Ok(()),
    }
}
