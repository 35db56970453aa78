use std::sync::Arc;

use log::info;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

use crate::core_ftpcommand::utils::send_reply;
use crate::session::Session;
use crate::Config;

/// Handles the USER FTP command.
///
/// Restarts the login sequence: a known name moves the session to
/// password-pending, an unknown name leaves it unauthenticated.
///
/// # Arguments
///
/// * `writer` - A shared, locked write half for sending replies.
/// * `_config` - A shared server configuration (not used in this command).
/// * `session` - A shared, locked session containing the user's current state.
/// * `arg` - The username provided by the client.
///
/// # Returns
///
/// Result<(), std::io::Error> indicating the success or failure of the operation.
pub async fn handle_user_command(
    writer: Arc<Mutex<OwnedWriteHalf>>,
    _config: Arc<Config>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    let code = {
        let mut session = session.lock().await;
        let known = session.auth_store.user_exists(&arg);
        info!(
            "Conn {}: USER {} ({})",
            session.id,
            arg,
            if known { "known" } else { "unknown" }
        );
        session.user_submitted(&arg, known)
    };

    if code == 331 {
        send_reply(&writer, 331, "User name okay, need password.").await
    } else {
        send_reply(&writer, 530, "Not logged in.").await
    }
}
