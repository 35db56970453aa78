use std::sync::Arc;

use log::{error, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

use crate::core_ftpcommand::utils::{resolve_path, send_reply};
use crate::core_network::open_data_connection;
use crate::session::Session;
use crate::Config;

/// Handles the LIST FTP command.
///
/// Sends the names in the requested directory (the working directory when
/// no argument is given) over the negotiated data connection, one name
/// per CRLF-terminated line.
///
/// # Arguments
///
/// * `writer` - A shared, locked write half for sending replies.
/// * `_config` - A shared server configuration (not used in this command).
/// * `session` - A shared, locked session containing the user's current state.
/// * `arg` - Optional path to list.
///
/// # Returns
///
/// Result<(), std::io::Error> indicating the success or failure of the operation.
pub async fn handle_list_command(
    writer: Arc<Mutex<OwnedWriteHalf>>,
    _config: Arc<Config>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    let (conn_id, canonical) = {
        let session = session.lock().await;
        if !session.is_authenticated {
            return send_reply(&writer, 530, "Must be authenticated to run this command.").await;
        }
        if !session.dtp_ready {
            return send_reply(
                &writer,
                450,
                "Specify a data transfer control command first (i.e. PORT, PASV, EPRT, EPSV).",
            )
            .await;
        }
        let target = if arg.is_empty() { "." } else { arg.as_str() };
        match resolve_path(&session.base_path, &session.current_dir, target) {
            Ok(path) if path.is_dir() => (session.id, path),
            _ => {
                warn!("Conn {}: LIST with illegal path {:?}", session.id, arg);
                return send_reply(&writer, 550, "Illegal path.").await;
            }
        }
    };

    send_reply(&writer, 150, "Here comes the directory listing.").await?;

    let mut data_stream = match open_data_connection(&session).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Conn {}: no data connection for LIST: {}", conn_id, e);
            return send_reply(&writer, 425, "Can't open data connection.").await;
        }
    };

    let mut entries = match tokio::fs::read_dir(&canonical).await {
        Ok(entries) => entries,
        Err(e) => {
            error!("Conn {}: error opening directory for listing: {}", conn_id, e);
            return send_reply(
                &writer,
                451,
                "Requested action aborted: local error in processing.",
            )
            .await;
        }
    };
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let line = format!("{}\r\n", entry.file_name().to_string_lossy());
                if let Err(e) = data_stream.write_all(line.as_bytes()).await {
                    warn!("Conn {}: error sending directory listing: {}", conn_id, e);
                    return send_reply(
                        &writer,
                        451,
                        "Requested action aborted: local error in processing.",
                    )
                    .await;
                }
            }
            Ok(None) => break,
            Err(e) => {
                error!("Conn {}: error reading directory: {}", conn_id, e);
                return send_reply(
                    &writer,
                    451,
                    "Requested action aborted: local error in processing.",
                )
                .await;
            }
        }
    }
    drop(data_stream);

    info!("Conn {}: directory listing sent", conn_id);
    send_reply(&writer, 226, "Directory send OK.").await
}
