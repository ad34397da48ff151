//! Password reset command handler.

use crate::auth::Broker;
use crate::cli::prompt;
use crate::config::BrokerConfig;
use crate::error::Result;

/// Handle the `cogauth reset-password` command.
pub async fn handle_reset_password(config: BrokerConfig, username: &str) -> Result<()> {
    let broker = Broker::from_config(config)?;
    let resetter = broker.password_resetter();

    let delivery = resetter.init_reset(username).await?;
    if delivery.destination.is_empty() {
        println!("A verification code was sent.");
    } else {
        println!(
            "A verification code was sent to {} ({}).",
            delivery.destination,
            delivery.medium.to_lowercase()
        );
    }

    let code = prompt::text("Verification code:")?;
    let new_password = prompt::new_password()?;
    resetter.confirm_reset(username, code.trim(), &new_password).await?;

    println!("Password updated. Run 'cogauth login' to sign in.");
    Ok(())
}
