//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Local credential broker for Cognito and OIDC logins.
///
/// Logs in against a Cognito user pool or an OIDC provider, keeps the
/// identity tokens fresh, and exchanges them through a Cognito identity
/// pool for short-lived AWS credentials.
#[derive(Parser, Debug)]
#[command(name = "cogauth")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "COGAUTH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in with a user pool username and password.
    ///
    /// Prompts for the password when it is not given, and for a new
    /// password when the account requires one.
    Login {
        /// User pool username.
        #[arg(short, long, env = "COGAUTH_USERNAME")]
        username: String,

        /// Password (prompted for when omitted).
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Log in through the configured OIDC provider in a browser.
    OidcLogin {
        /// Print the sign-in URL instead of opening a browser.
        #[arg(long)]
        no_browser: bool,
    },

    /// Sign out globally and remove cached tokens and credentials.
    Logout,

    /// Print AWS credentials, refreshing them when needed.
    ///
    /// The default format is suitable for `credential_process` in
    /// `~/.aws/config`.
    Credentials {
        /// Output format.
        #[arg(short, long, value_enum, default_value = "process")]
        format: OutputFormat,
    },

    /// Open the AWS console signed in with the current credentials.
    ConsoleSignin {
        /// Print the sign-in link instead of opening a browser.
        #[arg(long)]
        no_browser: bool,
    },

    /// Reset a forgotten user pool password.
    ResetPassword {
        /// User pool username.
        #[arg(short, long, env = "COGAUTH_USERNAME")]
        username: String,
    },

    /// Show what is cached and when it expires.
    Status,

    /// Generate shell completion scripts.
    ///
    /// Outputs completion script for the specified shell.
    /// Follow shell-specific instructions to install.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: ShellType,
    },
}

/// Credential output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `credential_process` JSON.
    Process,
    /// Shell `export` statements.
    Env,
}

/// Supported shell types for completions.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ShellType {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn credentials_default_to_process_format() {
        let cli = Cli::try_parse_from(["cogauth", "credentials"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Credentials {
                format: OutputFormat::Process
            }
        ));
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli =
            Cli::try_parse_from(["cogauth", "login", "-u", "alice", "--config", "/tmp/c.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        assert!(matches!(cli.command, Commands::Login { ref username, password: None } if username == "alice"));
    }
}
