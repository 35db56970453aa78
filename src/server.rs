use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

use crate::core_auth::AuthStore;
use crate::core_network::network;
use crate::Config;

/// Runs the FTP server with the provided configuration.
///
/// Loads the authentication store once (it is shared read-only across
/// all sessions) and hands off to the accept loop.
pub async fn run(config: Config) -> Result<()> {
    info!("Starting server with config: {:?}", config);

    let auth_store = AuthStore::load(&config.server.passwd_file)
        .with_context(|| "Failed to load the authentication store")?;

    network::start_server(Arc::new(config), Arc::new(auth_store)).await
}
