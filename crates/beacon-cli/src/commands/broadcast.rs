//! Manual broadcast command.

use anyhow::Result;
use clap::Args;

use crate::client::BeaconClient;
use crate::commands::DEFAULT_SERVER_URL;
use crate::output;

#[derive(Args)]
pub struct BroadcastArgs {
    /// Message to send to every connected client
    pub message: String,

    /// Base URL of the server
    #[arg(long, env = "BEACON_URL", default_value = DEFAULT_SERVER_URL)]
    pub url: String,
}

pub async fn execute(args: BroadcastArgs) -> Result<()> {
    let response = BeaconClient::new(&args.url).broadcast(&args.message).await?;
    output::print_broadcast(&response);
    Ok(())
}
