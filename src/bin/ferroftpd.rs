use anyhow::Result;
use clap::Parser;

use ferroftp::core_cli::ServerCli;
use ferroftp::{config, core_log, server};

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerCli::parse();
    core_log::init(args.log.as_deref())?;

    let mut config = config::load_config(&args.config)?;
    if let Some(port) = args.port {
        config.server.listen_port = port;
    }

    server::run(config).await
}
