use std::sync::Arc;

use log::info;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

use crate::core_ftpcommand::utils::send_reply;
use crate::session::Session;
use crate::Config;

/// Handles the QUIT FTP command.
///
/// Sends the closing reply; the command loop tears the connection down
/// right after.
pub async fn handle_quit_command(
    writer: Arc<Mutex<OwnedWriteHalf>>,
    _config: Arc<Config>,
    session: Arc<Mutex<Session>>,
    _arg: String,
) -> Result<(), std::io::Error> {
    {
        let session = session.lock().await;
        info!("Conn {}: QUIT, closing control connection", session.id);
    }
    send_reply(&writer, 221, "Service closing control connection.").await
}
