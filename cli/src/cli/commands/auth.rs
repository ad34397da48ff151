//! Login, logout and status command handlers.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::auth::cache::StoreError;
use crate::auth::tokens::is_expired_at;
use crate::auth::{AwsCredentials, Broker, CallbackListener, LoginOutcome};
use crate::cli::prompt;
use crate::config::BrokerConfig;
use crate::error::{BrokerError, Result};

/// How many times a rejected new password may be re-entered.
const MAX_CHALLENGE_ATTEMPTS: usize = 3;

/// Handle the `cogauth login` command.
pub async fn handle_login(config: BrokerConfig, username: &str, password: Option<String>) -> Result<()> {
    let broker = Broker::from_config(config)?;
    let password = match password {
        Some(password) => password,
        None => prompt::password("Password:")?,
    };

    let mut handler = broker.login_handler();
    let mut outcome = handler.login_with_password(username, &password).await?;
    let mut attempts = 0;

    loop {
        let challenge = match outcome {
            LoginOutcome::Authenticated(creds) => {
                print_logged_in(username, &creds);
                return Ok(());
            },
            LoginOutcome::Challenge(challenge) if challenge.is_new_password_required() => challenge,
            LoginOutcome::Challenge(challenge) => {
                return Err(BrokerError::UnsupportedChallenge(challenge.name));
            },
        };

        tracing::debug!(state = ?handler.state(), attempts, "answering new password challenge");
        if attempts == 0 {
            println!("Your account requires a new password.");
        }
        attempts += 1;
        let new_password = prompt::new_password()?;

        outcome = match handler
            .complete_challenge(username, &new_password, &challenge.session)
            .await
        {
            Ok(next) => next,
            Err(e @ BrokerError::ChallengeFailed { .. }) if attempts < MAX_CHALLENGE_ATTEMPTS => {
                eprintln!("{e}");
                LoginOutcome::Challenge(challenge)
            },
            Err(e) => return Err(e),
        };
    }
}

/// Handle the `cogauth oidc-login` command.
pub async fn handle_oidc_login(config: BrokerConfig, no_browser: bool) -> Result<()> {
    let timeout = Duration::from_secs(config.oidc.callback_timeout_secs);
    let redirect_url = config.oidc.redirect_url.clone();
    let broker = Broker::from_config(config)?;

    let mut handler = broker.login_handler();
    let (auth_url, state) = handler.authorization_request()?;
    let listener = CallbackListener::for_redirect(&redirect_url).await?;

    println!("To sign in, visit:");
    println!();
    println!("  {auth_url}");
    println!();

    if !no_browser {
        match open::that(auth_url.as_str()) {
            Ok(()) => println!("Browser opened automatically."),
            Err(e) => {
                tracing::debug!(error = %e, "could not open browser");
                println!("Could not open browser. Please visit the URL manually.");
            },
        }
    }

    println!("Waiting for authorization...");
    let code = listener.wait(&state, timeout).await?;

    match handler.login_with_code(&code).await? {
        LoginOutcome::Authenticated(creds) => {
            println!();
            println!("Logged in.");
            print_expiry(&creds);
            Ok(())
        },
        LoginOutcome::Challenge(challenge) => Err(BrokerError::UnsupportedChallenge(challenge.name)),
    }
}

/// Handle the `cogauth logout` command.
pub async fn handle_logout(config: BrokerConfig) -> Result<()> {
    let broker = Broker::from_config(config)?;
    broker.credentials_resolver().logout().await?;
    println!("Logged out.");
    Ok(())
}

/// Handle the `cogauth status` command.
///
/// Only reads the caches; nothing is refreshed.
pub fn handle_status(config: BrokerConfig) -> Result<()> {
    let broker = Broker::from_config(config)?;
    let resolver = broker.credentials_resolver();
    let now = Utc::now();

    let tokens = resolver.tokens().cache().get();
    let has_refresh_token = tokens.as_ref().is_ok_and(|t| !t.refresh_token.is_empty());
    let creds = resolver.cache().get();

    println!("  Flow:          {:?}", broker.config().flow);
    println!("  Store:         {:?}", broker.config().cache.store);
    println!("  OAuth tokens:  {}", describe(tokens.map(|t| t.expiry), now));
    if has_refresh_token {
        println!("                 refresh token stored");
    }
    println!("  AWS creds:     {}", describe(creds.map(|c| c.expiry), now));

    Ok(())
}

fn print_logged_in(username: &str, creds: &AwsCredentials) {
    println!();
    println!("Logged in as {username}.");
    print_expiry(creds);
}

fn print_expiry(creds: &AwsCredentials) {
    println!("AWS credentials valid until {}.", creds.expiry.to_rfc3339());
}

fn describe(record: std::result::Result<DateTime<Utc>, StoreError>, now: DateTime<Utc>) -> String {
    match record {
        Ok(expiry) if is_expired_at(expiry, now) => format!("expired at {}", expiry.to_rfc3339()),
        Ok(expiry) => format!("valid until {}", expiry.to_rfc3339()),
        Err(StoreError::NotFound(_)) => "not cached".to_string(),
        Err(e @ StoreError::Corrupt { .. }) => format!("unreadable ({e})"),
        Err(e) => format!("unavailable ({e})"),
    }
}
