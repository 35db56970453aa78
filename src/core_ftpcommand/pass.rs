use std::sync::Arc;

use log::{info, warn};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

use crate::core_ftpcommand::utils::send_reply;
use crate::session::Session;
use crate::Config;

/// Handles the PASS FTP command.
///
/// Only meaningful directly after USER; checks the password against the
/// authentication store. A wrong password drops the pending username so
/// the client has to start over with USER.
pub async fn handle_pass_command(
    writer: Arc<Mutex<OwnedWriteHalf>>,
    _config: Arc<Config>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    let code = {
        let mut session = session.lock().await;
        let password_ok = match &session.username {
            Some(name) => session.auth_store.check_password(name, &arg),
            None => false,
        };
        session.pass_submitted(password_ok)
    };

    match code {
        230 => {
            info!("User logged in");
            send_reply(&writer, 230, "User logged in, proceed.").await
        }
        503 => {
            warn!("PASS received without a preceding USER");
            send_reply(&writer, 503, "Bad sequence of commands.").await
        }
        _ => {
            warn!("Login failed: wrong password");
            send_reply(&writer, 530, "Not logged in.").await
        }
    }
}
