use anyhow::{Context, Result};
use clap::Parser;

use ferroftp::core_cli::ClientCli;
use ferroftp::core_client::ftp::ClientPi;
use ferroftp::core_client::repl;
use ferroftp::core_log;

#[tokio::main]
async fn main() -> Result<()> {
    let args = ClientCli::parse();
    core_log::init(args.log.as_deref())?;

    let pi = ClientPi::connect(&args.host, args.port)
        .await
        .with_context(|| format!("Failed to connect to {}:{}", args.host, args.port))?;

    repl::run(pi).await
}
