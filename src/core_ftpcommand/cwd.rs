use std::sync::Arc;

use log::{info, warn};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

use crate::core_ftpcommand::utils::{display_path, resolve_path, send_reply};
use crate::session::Session;
use crate::Config;

pub async fn handle_cwd_command(
    writer: Arc<Mutex<OwnedWriteHalf>>,
    _config: Arc<Config>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    change_directory(&writer, &session, &arg).await
}

/// Shared by CWD and CDUP. Resolves the target through the sandbox and,
/// on success, updates the session's displayed working directory.
pub(crate) async fn change_directory(
    writer: &Arc<Mutex<OwnedWriteHalf>>,
    session: &Arc<Mutex<Session>>,
    target: &str,
) -> Result<(), std::io::Error> {
    let mut session = session.lock().await;
    if !session.is_authenticated {
        return send_reply(writer, 530, "Must be authenticated to run this command.").await;
    }
    if target.is_empty() {
        return send_reply(writer, 501, "Syntax error in parameters or arguments.").await;
    }

    match resolve_path(&session.base_path, &session.current_dir, target) {
        Ok(canonical) if canonical.is_dir() => {
            session.current_dir = display_path(&session.base_path, &canonical);
            info!(
                "Conn {}: changed directory, cwd={}",
                session.id, session.current_dir
            );
            send_reply(writer, 250, "Directory successfully changed.").await
        }
        _ => {
            warn!("Conn {}: refusing to change directory to {:?}", session.id, target);
            send_reply(writer, 550, "Cannot change to that path.").await
        }
    }
}
