//! Connect command: the two-phase cross-account role setup flow (§4.6)
//! exposed directly as a CLI for operators who aren't going through the
//! caller-facing console.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use super::config::AppConfig;

#[derive(Args)]
pub struct ConnectArgs {
    #[command(subcommand)]
    pub action: ConnectAction,
}

#[derive(Subcommand)]
pub enum ConnectAction {
    /// Start the connection flow: returns a nonce and a one-click console URL
    Initiate {
        #[arg(long)]
        caller_id: String,
    },
    /// Verify that the caller's role can be assumed with its nonce
    Verify {
        #[arg(long)]
        caller_id: String,
        #[arg(long)]
        role_arn: String,
    },
}

pub async fn execute(args: ConnectArgs) -> Result<()> {
    let config = AppConfig::from_env()?;
    let broker = config.credential_broker().await;

    match args.action {
        ConnectAction::Initiate { caller_id } => {
            let init = broker.initiate(&caller_id);
            println!("nonce: {}", init.nonce);
            println!("console url: {}", init.console_url);
        }
        ConnectAction::Verify { caller_id, role_arn } => {
            let account_id = broker.verify(&caller_id, &role_arn).await.context("verification failed")?;
            println!("verified: account {account_id} connected for {caller_id}");
        }
    }
    Ok(())
}
