// src/core_ftpcommand/pwd.rs
use std::sync::Arc;

use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

use crate::core_ftpcommand::utils::send_reply;
use crate::session::Session;
use crate::Config;

pub async fn handle_pwd_command(
    writer: Arc<Mutex<OwnedWriteHalf>>,
    _config: Arc<Config>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    let current_dir = {
        let session = session.lock().await;
        if !session.is_authenticated {
            return send_reply(&writer, 530, "Must be authenticated to run this command.").await;
        }
        session.current_dir.clone()
    };
    // PWD takes no argument.
    if !arg.is_empty() {
        return send_reply(&writer, 501, "Syntax error in parameters or arguments.").await;
    }

    let response = format!("\"{}\" is the current directory.", current_dir);
    send_reply(&writer, 257, &response).await
}
