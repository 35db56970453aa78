use std::sync::Arc;

use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

use crate::core_ftpcommand::cwd::change_directory;
use crate::core_ftpcommand::utils::send_reply;
use crate::session::Session;
use crate::Config;

/// CDUP is CWD with a fixed `..` argument and no argument of its own.
pub async fn handle_cdup_command(
    writer: Arc<Mutex<OwnedWriteHalf>>,
    _config: Arc<Config>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    if !arg.is_empty() {
        return send_reply(&writer, 501, "Syntax error in parameters or arguments.").await;
    }
    change_directory(&writer, &session, "..").await
}
