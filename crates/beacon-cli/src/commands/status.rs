//! Server status command.

use anyhow::Result;
use clap::Args;

use crate::client::BeaconClient;
use crate::commands::DEFAULT_SERVER_URL;
use crate::output;

#[derive(Args)]
pub struct StatusArgs {
    /// Base URL of the server
    #[arg(long, env = "BEACON_URL", default_value = DEFAULT_SERVER_URL)]
    pub url: String,
}

pub async fn execute(args: StatusArgs) -> Result<()> {
    let status = BeaconClient::new(&args.url).status().await?;
    output::print_status(&args.url, &status);
    Ok(())
}
