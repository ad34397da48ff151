//! Credential output and console sign-in handlers.

use serde::Serialize;

use crate::auth::{AwsCredentials, Broker};
use crate::cli::OutputFormat;
use crate::config::BrokerConfig;
use crate::error::Result;

/// `credential_process` output document.
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ProcessCredentials<'a> {
    version: u8,
    access_key_id: &'a str,
    secret_access_key: &'a str,
    session_token: &'a str,
    expiration: String,
}

/// Handle the `cogauth credentials` command.
pub async fn handle_credentials(config: BrokerConfig, format: OutputFormat) -> Result<()> {
    let broker = Broker::from_config(config)?;
    let creds = broker.credentials_resolver().get_aws_credentials().await?;
    println!("{}", render(&creds, format)?);
    Ok(())
}

/// Handle the `cogauth console-signin` command.
pub async fn handle_console_signin(config: BrokerConfig, no_browser: bool) -> Result<()> {
    let broker = Broker::from_config(config)?;
    let creds = broker.credentials_resolver().get_aws_credentials().await?;
    let link = broker.console_signin()?.sign_in_link(&creds).await?;

    if no_browser {
        println!("{link}");
        return Ok(());
    }

    if let Err(e) = open::that(link.as_str()) {
        tracing::debug!(error = %e, "could not open browser");
        println!("Could not open browser. Visit this link to sign in:");
        println!();
        println!("  {link}");
    }
    Ok(())
}

fn render(creds: &AwsCredentials, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Process => Ok(serde_json::to_string_pretty(&ProcessCredentials {
            version: 1,
            access_key_id: &creds.access_key,
            secret_access_key: &creds.secret_access_key,
            session_token: &creds.session_token,
            expiration: creds.expiry.to_rfc3339(),
        })?),
        OutputFormat::Env => Ok(format!(
            "export AWS_ACCESS_KEY_ID={}\nexport AWS_SECRET_ACCESS_KEY={}\nexport AWS_SESSION_TOKEN={}\nexport AWS_CREDENTIAL_EXPIRATION={}",
            creds.access_key,
            creds.secret_access_key,
            creds.session_token,
            creds.expiry.to_rfc3339()
        )),
    }
}
